/// Sprite Chain Library
///
/// The on-chain collaborators of the ledger: the deposit account address,
/// the deposit oracle, and the pool price source, all read through the
/// Solana RPC client.

pub mod error;
pub mod oracle;
pub mod pda;
pub mod price;

pub use error::{ChainError, Result};
pub use oracle::{DepositOracle, RpcDepositOracle};
pub use price::{PoolPriceSource, PriceSource};
pub use solana_client::nonblocking::rpc_client::RpcClient;
pub use solana_sdk::pubkey::Pubkey;

use solana_sdk::commitment_config::CommitmentConfig;

/// RPC client reading at `confirmed` commitment.
pub fn rpc_client(url: String) -> RpcClient {
    RpcClient::new_with_commitment(url, CommitmentConfig::confirmed())
}
