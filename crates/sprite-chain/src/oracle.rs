use std::sync::Arc;

use async_trait::async_trait;
use sprite_crypto::LedgerId;
use tracing::debug;

use crate::pda::deposit_address;
use crate::{Pubkey, Result, RpcClient};

/// Answers whether the user has paid a pending deposit on chain.
#[async_trait]
pub trait DepositOracle: Send + Sync {
    async fn is_deposit_complete(&self, vault: &Pubkey, deposit_id: &[u8; 32]) -> Result<bool>;
}

/// Looks for the deposit account the vault program creates on payment.
pub struct RpcDepositOracle {
    rpc: Arc<RpcClient>,
    program_id: Pubkey,
}

impl RpcDepositOracle {
    pub fn new(rpc: Arc<RpcClient>, program_id: Pubkey) -> Self {
        Self { rpc, program_id }
    }
}

#[async_trait]
impl DepositOracle for RpcDepositOracle {
    async fn is_deposit_complete(&self, vault: &Pubkey, deposit_id: &[u8; 32]) -> Result<bool> {
        let address = deposit_address(&self.program_id, vault, deposit_id)?;
        let account = self
            .rpc
            .get_account_with_commitment(&address, self.rpc.commitment())
            .await?
            .value;

        let complete = account.is_some_and(|a| a.lamports > 0);
        debug!(
            deposit = %LedgerId::from_bytes(*deposit_id).short(),
            account = %address,
            complete,
            "checked deposit account"
        );
        Ok(complete)
    }
}
