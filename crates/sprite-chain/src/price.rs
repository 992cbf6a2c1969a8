use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::account::Account;

use crate::{ChainError, Pubkey, Result, RpcClient};

/// SPL token accounts are 165 bytes; the amount is the u64 at offset 64.
const TOKEN_ACCOUNT_LEN: usize = 165;
const TOKEN_AMOUNT_OFFSET: usize = 64;

const IVY_DECIMALS: f64 = 1_000_000_000.0;
const USDC_DECIMALS: f64 = 1_000_000.0;

/// Fetches the current token price in USD.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_price(&self) -> Result<f64>;
}

/// Derives the price from the reserves of the IVY/USDC pool.
pub struct PoolPriceSource {
    rpc: Arc<RpcClient>,
    ivy_pool: Pubkey,
    usdc_pool: Pubkey,
}

impl PoolPriceSource {
    pub fn new(rpc: Arc<RpcClient>, ivy_pool: Pubkey, usdc_pool: Pubkey) -> Self {
        Self {
            rpc,
            ivy_pool,
            usdc_pool,
        }
    }
}

#[async_trait]
impl PriceSource for PoolPriceSource {
    async fn fetch_price(&self) -> Result<f64> {
        let accounts = self
            .rpc
            .get_multiple_accounts(&[self.ivy_pool, self.usdc_pool])
            .await?;

        let [ivy, usdc] = accounts.as_slice() else {
            return Err(ChainError::Malformed("expected two pool accounts".into()));
        };
        let ivy = token_amount(ivy.as_ref())?;
        let usdc = token_amount(usdc.as_ref())?;

        pool_price(ivy, usdc)
    }
}

fn token_amount(account: Option<&Account>) -> Result<u64> {
    let account = account.ok_or_else(|| ChainError::InvalidAccount("pool account missing".into()))?;
    token_amount_from_data(&account.data)
}

pub fn token_amount_from_data(data: &[u8]) -> Result<u64> {
    if data.len() < TOKEN_ACCOUNT_LEN {
        return Err(ChainError::InvalidAccount(format!(
            "token account is {} bytes, expected {}",
            data.len(),
            TOKEN_ACCOUNT_LEN
        )));
    }
    let mut amount = [0u8; 8];
    amount.copy_from_slice(&data[TOKEN_AMOUNT_OFFSET..TOKEN_AMOUNT_OFFSET + 8]);
    Ok(u64::from_le_bytes(amount))
}

/// USD per IVY from the two pool reserves.
pub fn pool_price(ivy_raw: u64, usdc_raw: u64) -> Result<f64> {
    if ivy_raw == 0 {
        return Err(ChainError::InvalidAccount("IVY pool is empty".into()));
    }
    Ok((usdc_raw as f64 / USDC_DECIMALS) / (ivy_raw as f64 / IVY_DECIMALS))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_account(amount: u64) -> Vec<u8> {
        let mut data = vec![0u8; TOKEN_ACCOUNT_LEN];
        data[TOKEN_AMOUNT_OFFSET..TOKEN_AMOUNT_OFFSET + 8].copy_from_slice(&amount.to_le_bytes());
        data
    }

    #[test]
    fn reads_amount_at_offset() {
        assert_eq!(token_amount_from_data(&token_account(42)).unwrap(), 42);
    }

    #[test]
    fn short_accounts_are_rejected() {
        assert!(token_amount_from_data(&[0u8; 100]).is_err());
    }

    #[test]
    fn missing_pool_account_is_invalid() {
        assert!(matches!(token_amount(None), Err(ChainError::InvalidAccount(_))));

        let account = Account {
            lamports: 1,
            data: token_account(7),
            ..Account::default()
        };
        assert_eq!(token_amount(Some(&account)).unwrap(), 7);
    }

    #[test]
    fn price_from_reserves() {
        // 1000 IVY against 250 USDC
        let price = pool_price(1_000 * 1_000_000_000, 250 * 1_000_000).unwrap();
        assert!((price - 0.25).abs() < 1e-12);
        assert!(pool_price(0, 1).is_err());
    }
}
