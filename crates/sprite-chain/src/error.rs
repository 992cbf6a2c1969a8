use solana_client::client_error::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("rpc error: {0}")]
    Rpc(#[from] ClientError),

    #[error("malformed rpc response: {0}")]
    Malformed(String),

    #[error("invalid token account: {0}")]
    InvalidAccount(String),

    #[error("no viable program address for the given seeds")]
    NoProgramAddress,
}

pub type Result<T> = std::result::Result<T, ChainError>;
