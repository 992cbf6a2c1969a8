use std::sync::Arc;

use sprite_db::{Database, LedgerError, Result};
use sprite_types::UserIdentity;
use tracing::info;

use crate::{LedgerConfig, blocking, parse_identities};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RainReceipt {
    pub total_raw: u64,
    pub per_recipient_raw: u64,
    pub recipients: Vec<UserIdentity>,
    pub sender_balance_raw: u64,
}

/// Splits a sender's funds between the active users of a server.
#[derive(Clone)]
pub struct RainDistributor {
    db: Arc<Database>,
    config: Arc<LedgerConfig>,
}

impl RainDistributor {
    pub fn new(db: Arc<Database>, config: Arc<LedgerConfig>) -> Self {
        Self { db, config }
    }

    /// Distribute `total_raw` from `sender` evenly between eligible users of
    /// `server` (the sender excluded), at most `max_recipients` of them,
    /// highest activity first.
    ///
    /// `min_score` defaults to the configured activity requirement.
    pub async fn rain(
        &self,
        server: &str,
        sender: UserIdentity,
        total_raw: u64,
        min_score: Option<u8>,
        max_recipients: Option<usize>,
    ) -> Result<RainReceipt> {
        if total_raw < self.config.rain_min_raw {
            return Err(LedgerError::BelowMinimum {
                amount_raw: total_raw,
                minimum_raw: self.config.rain_min_raw,
            });
        }
        if max_recipients == Some(0) {
            return Err(LedgerError::InvalidInput(
                "max_recipients must be at least 1".into(),
            ));
        }
        let min_score = min_score.unwrap_or(self.config.rain_min_score);
        let server_id = server.to_string();
        let sender_key = sender.canonical();

        let receipt = blocking(&self.db, move |db| {
            db.ensure_user(&sender_key)?;
            let observed = db.get_balance(&sender_key)?;
            if observed < total_raw {
                return Err(LedgerError::InsufficientBalance { user: sender_key });
            }

            let candidates: Vec<String> = db
                .eligible_for_rain(&server_id, min_score)?
                .into_iter()
                .filter(|key| *key != sender_key)
                .collect();
            let mut recipients = parse_identities(candidates);
            if recipients.is_empty() {
                return Err(LedgerError::NoEligibleUsers);
            }
            if let Some(max) = max_recipients {
                recipients.truncate(max);
            }

            let keys: Vec<String> = recipients.iter().map(UserIdentity::canonical).collect();
            let per_recipient_raw = db.distribute(&sender_key, &keys, total_raw, observed)?;

            Ok(RainReceipt {
                total_raw,
                per_recipient_raw,
                recipients,
                // The debit was conditioned on `observed`, so this is exact.
                sender_balance_raw: observed - total_raw,
            })
        })
        .await?;

        info!(
            server,
            sender = %sender,
            recipients = receipt.recipients.len(),
            per_recipient_raw = receipt.per_recipient_raw,
            "rain distributed"
        );
        Ok(receipt)
    }

    /// Number of users who would currently receive rain in `server`.
    pub async fn rain_check(&self, server: &str, min_score: Option<u8>) -> Result<usize> {
        let min_score = min_score.unwrap_or(self.config.rain_min_score);
        let server = server.to_string();
        let keys = blocking(&self.db, move |db| db.eligible_for_rain(&server, min_score)).await?;
        Ok(parse_identities(keys).len())
    }
}
