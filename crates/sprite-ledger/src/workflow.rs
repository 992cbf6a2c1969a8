use std::sync::Arc;

use sprite_chain::DepositOracle;
use sprite_crypto::keys::parse_pubkey;
use sprite_crypto::{LedgerId, WithdrawalSigner};
use sprite_db::models::{DepositRow, WithdrawalRow};
use sprite_db::{Database, LedgerError, Result};
use sprite_types::UserIdentity;
use sprite_types::api::DepositStatus;
use tracing::{info, warn};

use crate::{LedgerConfig, blocking};

const MIN_PREFIX_LEN: usize = 6;
const MAX_PREFIX_LEN: usize = 64;

/// Outcome of checking a deposit against the chain.
#[derive(Debug, Clone)]
pub struct DepositCheck {
    pub status: DepositStatus,
    pub deposit: DepositRow,
    /// Set when this check completed the deposit.
    pub new_balance_raw: Option<u64>,
}

/// Two-phase deposit and withdrawal flows.
///
/// Deposits are recorded as pending and completed once the oracle sees the
/// payment on chain. Withdrawals are signed for the destination wallet and
/// debited in one compare-and-swap; the claim itself happens on chain.
#[derive(Clone)]
pub struct Workflow {
    db: Arc<Database>,
    oracle: Arc<dyn DepositOracle>,
    signer: Arc<dyn WithdrawalSigner>,
    config: Arc<LedgerConfig>,
}

impl Workflow {
    pub fn new(
        db: Arc<Database>,
        oracle: Arc<dyn DepositOracle>,
        signer: Arc<dyn WithdrawalSigner>,
        config: Arc<LedgerConfig>,
    ) -> Self {
        Self {
            db,
            oracle,
            signer,
            config,
        }
    }

    pub async fn create_deposit(&self, user: UserIdentity, amount_raw: u64) -> Result<DepositRow> {
        require_positive(amount_raw)?;
        let id = LedgerId::generate(amount_raw);
        let key = user.canonical();

        blocking(&self.db, move |db| db.create_deposit(&id.to_hex(), &key, amount_raw)).await
    }

    /// Resolve `prefix` to the user's most recent matching deposit and, if
    /// it is still pending, ask the oracle whether it has been paid.
    pub async fn check_deposit(&self, user: UserIdentity, prefix: &str) -> Result<DepositCheck> {
        let prefix = normalize_prefix(prefix)?;
        let key = user.canonical();
        let deposit = blocking(&self.db, move |db| db.find_deposit_by_prefix(&key, &prefix)).await?;

        if deposit.completed {
            return Ok(DepositCheck {
                status: DepositStatus::AlreadyCompleted,
                deposit,
                new_balance_raw: None,
            });
        }

        let id = LedgerId::from_hex(&deposit.deposit_id)
            .map_err(|e| LedgerError::InvalidInput(format!("stored deposit id: {}", e)))?;
        let paid = self
            .oracle
            .is_deposit_complete(&self.config.vault, id.as_bytes())
            .await
            .map_err(|e| LedgerError::ExternalService(e.to_string()))?;

        if !paid {
            return Ok(DepositCheck {
                status: DepositStatus::Pending,
                deposit,
                new_balance_raw: None,
            });
        }

        let deposit_id = deposit.deposit_id.clone();
        match blocking(&self.db, move |db| db.complete_deposit(&deposit_id)).await {
            Ok(done) => Ok(DepositCheck {
                status: DepositStatus::Completed,
                deposit: DepositRow {
                    completed: true,
                    ..deposit
                },
                new_balance_raw: Some(done.balance_raw),
            }),
            // A concurrent check got there first.
            Err(LedgerError::AlreadyCompleted(_)) => Ok(DepositCheck {
                status: DepositStatus::AlreadyCompleted,
                deposit: DepositRow {
                    completed: true,
                    ..deposit
                },
                new_balance_raw: None,
            }),
            Err(e) => Err(e),
        }
    }

    /// Sign and record a withdrawal of `amount_raw` to the base58 wallet
    /// `destination`. Returns the row and the user's new balance.
    pub async fn create_withdrawal(
        &self,
        user: UserIdentity,
        amount_raw: u64,
        destination: &str,
    ) -> Result<(WithdrawalRow, u64)> {
        require_positive(amount_raw)?;
        let wallet = parse_pubkey(destination)
            .map_err(|e| LedgerError::InvalidInput(format!("destination: {}", e)))?;
        let key = user.canonical();

        let observed = {
            let key = key.clone();
            blocking(&self.db, move |db| {
                db.ensure_user(&key)?;
                db.get_balance(&key)
            })
            .await?
        };
        if observed < amount_raw {
            return Err(LedgerError::InsufficientBalance { user: key });
        }

        let id = LedgerId::generate(amount_raw);
        let signature = self
            .signer
            .sign_withdrawal(&self.config.vault, &wallet, &id)
            .map_err(|e| {
                warn!("withdrawal signing failed: {}", e);
                LedgerError::ExternalService(format!("signer: {}", e))
            })?;
        let signature = hex::encode(signature);

        let (row, balance) = blocking(&self.db, move |db| {
            db.create_withdrawal(&id.to_hex(), &key, observed, amount_raw, &signature)
        })
        .await?;

        info!(user = %user, withdraw_id = %id.short(), amount_raw, "withdrawal signed");
        Ok((row, balance))
    }

    pub async fn list_deposits(&self, user: UserIdentity, limit: usize) -> Result<Vec<DepositRow>> {
        let limit = limit.clamp(1, self.config.list_limit_max);
        let key = user.canonical();
        blocking(&self.db, move |db| db.list_deposits(&key, limit)).await
    }

    pub async fn list_withdrawals(&self, user: UserIdentity, limit: usize) -> Result<Vec<WithdrawalRow>> {
        let limit = limit.clamp(1, self.config.list_limit_max);
        let key = user.canonical();
        blocking(&self.db, move |db| db.list_withdrawals(&key, limit)).await
    }
}

fn require_positive(amount_raw: u64) -> Result<()> {
    if amount_raw == 0 {
        return Err(LedgerError::InvalidAmount("amount must be positive".into()));
    }
    Ok(())
}

fn normalize_prefix(prefix: &str) -> Result<String> {
    let prefix = prefix.trim().to_ascii_lowercase();
    let valid_len = (MIN_PREFIX_LEN..=MAX_PREFIX_LEN).contains(&prefix.len());
    if !valid_len || !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(LedgerError::InvalidInput(format!(
            "deposit prefix must be {}-{} hex characters",
            MIN_PREFIX_LEN, MAX_PREFIX_LEN
        )));
    }
    Ok(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use async_trait::async_trait;
    use sprite_chain::{ChainError, Pubkey};
    use sprite_crypto::KeypairWithdrawalSigner;
    use sprite_crypto::signing::verify_withdrawal;
    use solana_sdk::signature::Signature;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const USER: UserIdentity = UserIdentity::Discord(42);

    struct MockOracle {
        paid: AtomicBool,
        broken: bool,
        calls: AtomicUsize,
    }

    impl MockOracle {
        fn new(paid: bool) -> Arc<Self> {
            Arc::new(Self {
                paid: AtomicBool::new(paid),
                broken: false,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DepositOracle for MockOracle {
        async fn is_deposit_complete(&self, _vault: &Pubkey, _id: &[u8; 32]) -> sprite_chain::Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.broken {
                return Err(ChainError::Malformed("rpc down".into()));
            }
            Ok(self.paid.load(Ordering::SeqCst))
        }
    }

    const VAULT: Pubkey = Pubkey::new_from_array([4u8; 32]);

    fn workflow(db: Arc<Database>, oracle: Arc<dyn DepositOracle>) -> (Workflow, Arc<KeypairWithdrawalSigner>) {
        let signer = Arc::new(KeypairWithdrawalSigner::from_secret(&[9u8; 32]).unwrap());
        let config = LedgerConfig {
            vault: VAULT,
            ..LedgerConfig::default()
        };
        (Workflow::new(db, oracle, signer.clone(), Arc::new(config)), signer)
    }

    #[tokio::test]
    async fn deposit_completes_once() {
        let db = testutil::db();
        let oracle = MockOracle::new(false);
        let (flow, _) = workflow(db.clone(), oracle.clone());

        let row = flow.create_deposit(USER, 500).await.unwrap();
        assert_eq!(row.deposit_id.len(), 64);
        assert_eq!(LedgerId::from_hex(&row.deposit_id).unwrap().amount_raw(), 500);

        let prefix = &row.deposit_id[..6];
        let pending = flow.check_deposit(USER, prefix).await.unwrap();
        assert_eq!(pending.status, DepositStatus::Pending);
        assert_eq!(db.get_balance("42").unwrap(), 0);

        oracle.paid.store(true, Ordering::SeqCst);
        let done = flow.check_deposit(USER, prefix).await.unwrap();
        assert_eq!(done.status, DepositStatus::Completed);
        assert_eq!(done.new_balance_raw, Some(500));

        let again = flow.check_deposit(USER, &prefix.to_uppercase()).await.unwrap();
        assert_eq!(again.status, DepositStatus::AlreadyCompleted);
        assert_eq!(db.get_balance("42").unwrap(), 500);
        // Completed deposits are answered without asking the chain.
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn bad_prefixes_are_rejected() {
        let (flow, _) = workflow(testutil::db(), MockOracle::new(true));
        let long = "a".repeat(65);
        for prefix in ["abc", "zzzzzz", "abc%ef", long.as_str()] {
            assert!(matches!(
                flow.check_deposit(USER, prefix).await,
                Err(LedgerError::InvalidInput(_))
            ));
        }
        assert!(matches!(
            flow.check_deposit(USER, "abcdef").await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn oracle_failure_is_external() {
        let db = testutil::db();
        let oracle = Arc::new(MockOracle {
            paid: AtomicBool::new(true),
            broken: true,
            calls: AtomicUsize::new(0),
        });
        let (flow, _) = workflow(db.clone(), oracle);
        let row = flow.create_deposit(USER, 500).await.unwrap();

        assert!(matches!(
            flow.check_deposit(USER, &row.deposit_id).await,
            Err(LedgerError::ExternalService(_))
        ));
        assert!(!db.get_deposit(&row.deposit_id).unwrap().completed);
    }

    #[tokio::test]
    async fn withdrawal_is_signed_and_debited() {
        let db = testutil::db();
        testutil::fund(&db, "42", 1_000);
        let (flow, signer) = workflow(db.clone(), MockOracle::new(false));

        let wallet = Pubkey::new_from_array([8u8; 32]);
        let (row, balance) = flow
            .create_withdrawal(USER, 400, &wallet.to_string())
            .await
            .unwrap();
        assert_eq!(balance, 600);

        let id = LedgerId::from_hex(&row.withdraw_id).unwrap();
        assert_eq!(id.amount_raw(), 400);
        let signature: [u8; 64] = hex::decode(&row.signature).unwrap().try_into().unwrap();
        let signature = Signature::from(signature);
        assert!(verify_withdrawal(&signer.authority(), &VAULT, &wallet, &id, &signature));
        assert_eq!(flow.list_withdrawals(USER, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn withdrawal_checks_balance_and_destination() {
        let db = testutil::db();
        testutil::fund(&db, "42", 100);
        let (flow, _) = workflow(db.clone(), MockOracle::new(false));
        let wallet = Pubkey::new_from_array([8u8; 32]).to_string();

        assert!(matches!(
            flow.create_withdrawal(USER, 101, &wallet).await,
            Err(LedgerError::InsufficientBalance { .. })
        ));
        assert!(matches!(
            flow.create_withdrawal(USER, 10, "not-a-key").await,
            Err(LedgerError::InvalidInput(_))
        ));
        assert!(flow.list_withdrawals(USER, 10).await.unwrap().is_empty());
        assert_eq!(db.get_balance("42").unwrap(), 100);
    }

    #[tokio::test]
    async fn list_limit_is_capped() {
        let db = testutil::db();
        let (flow, _) = workflow(db.clone(), MockOracle::new(false));
        for _ in 0..60 {
            flow.create_deposit(USER, 1).await.unwrap();
        }
        assert_eq!(flow.list_deposits(USER, 500).await.unwrap().len(), 50);
        assert_eq!(flow.list_deposits(USER, 3).await.unwrap().len(), 3);
    }
}
