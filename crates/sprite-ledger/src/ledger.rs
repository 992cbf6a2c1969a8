use std::sync::Arc;

use sprite_db::{Database, LedgerError, Result};
use sprite_types::UserIdentity;
use tracing::info;

use crate::amount::{self, usd_value};
use crate::{PriceCache, blocking};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Balance {
    pub balance_raw: u64,
    pub usd_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TipReceipt {
    pub amount_raw: u64,
    pub sender_balance_raw: u64,
    pub recipient_balance_raw: u64,
}

/// Balances and user-to-user tips.
#[derive(Clone)]
pub struct Ledger {
    db: Arc<Database>,
    prices: Arc<PriceCache>,
}

impl Ledger {
    pub fn new(db: Arc<Database>, prices: Arc<PriceCache>) -> Self {
        Self { db, prices }
    }

    /// Parse a decimal or `$` amount at the cached price. Zero is rejected.
    pub fn parse_amount(&self, text: &str) -> Result<u64> {
        amount::parse_positive(text, || self.prices.get())
    }

    /// Balance of `user`, creating the account on first sight.
    pub async fn balance(&self, user: UserIdentity) -> Result<Balance> {
        let key = user.canonical();
        let balance_raw = blocking(&self.db, move |db| {
            db.ensure_user(&key)?;
            db.get_balance(&key)
        })
        .await?;

        Ok(Balance {
            balance_raw,
            usd_value: usd_value(balance_raw, self.prices.get()),
        })
    }

    /// Send `amount_raw` from one user to another.
    ///
    /// The sender's balance is checked first; the transfer itself is not
    /// compare-and-swap, but the store refuses any debit that would overdraw.
    /// With `require_existing_recipient` the tip fails with `NotFound` unless
    /// the recipient already has an account.
    pub async fn tip(
        &self,
        from: UserIdentity,
        to: UserIdentity,
        amount_raw: u64,
        require_existing_recipient: bool,
    ) -> Result<TipReceipt> {
        if amount_raw == 0 {
            return Err(LedgerError::InvalidAmount("amount must be positive".into()));
        }
        let sender = from.canonical();
        let recipient = to.canonical();

        let receipt = blocking(&self.db, move |db| {
            db.ensure_user(&sender)?;
            if require_existing_recipient {
                if !db.user_exists(&recipient)? {
                    return Err(LedgerError::NotFound(format!("user {}", recipient)));
                }
            } else {
                db.ensure_user(&recipient)?;
            }

            if db.get_balance(&sender)? < amount_raw {
                return Err(LedgerError::InsufficientBalance { user: sender });
            }
            db.transfer(&sender, &recipient, amount_raw)?;

            Ok(TipReceipt {
                amount_raw,
                sender_balance_raw: db.get_balance(&sender)?,
                recipient_balance_raw: db.get_balance(&recipient)?,
            })
        })
        .await?;

        info!(from = %from, to = %to, amount_raw, "tip sent");
        Ok(receipt)
    }
}
