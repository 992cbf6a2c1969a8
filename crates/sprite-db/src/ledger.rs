use rusqlite::{Connection, OptionalExtension, Transaction};
use tracing::{debug, info};

use crate::{Database, LedgerError, Result};

impl Database {
    // -- Accounts --

    /// Create the account with a zero balance if it does not exist yet.
    pub fn ensure_user(&self, user_id: &str) -> Result<()> {
        self.with_conn(|conn| insert_user(conn, user_id))
    }

    pub fn user_exists(&self, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| user_exists(conn, user_id))
    }

    pub fn get_balance(&self, user_id: &str) -> Result<u64> {
        self.with_conn(|conn| query_balance(conn, user_id))
    }

    // -- Unconditional mutations --

    /// Add `amount_raw` to the balance.
    pub fn credit(&self, user_id: &str, amount_raw: u64) -> Result<u64> {
        let delta = to_sql_amount(amount_raw)?;
        self.with_tx(|tx| apply_delta(tx, user_id, delta))
    }

    /// Subtract `amount_raw` without comparing against a previously read
    /// balance. The schema still refuses to store a negative balance, so an
    /// overdraft surfaces as `InsufficientBalance` instead of committing.
    pub fn debit_unconditional(&self, user_id: &str, amount_raw: u64) -> Result<u64> {
        let delta = to_sql_amount(amount_raw)?;
        self.with_tx(|tx| apply_delta(tx, user_id, -delta))
    }

    /// Move `amount_raw` from sender to recipient in one transaction.
    ///
    /// Not compare-and-swap: callers check the sender's balance first, and two
    /// concurrent transfers that both fit the balance both commit.
    pub fn transfer(&self, sender_id: &str, recipient_id: &str, amount_raw: u64) -> Result<()> {
        let delta = to_sql_amount(amount_raw)?;
        self.with_tx(|tx| {
            apply_delta(tx, sender_id, -delta)?;
            apply_delta(tx, recipient_id, delta)?;
            Ok(())
        })?;

        info!(sender = sender_id, recipient = recipient_id, amount_raw, "transfer committed");
        Ok(())
    }

    // -- Compare-and-swap mutations --

    /// Debit `amount_raw` only if the balance still equals `observed_raw`,
    /// then run `record` inside the same transaction. Returns the new balance.
    ///
    /// If another request changed the balance after the caller read it, no
    /// row matches and the whole transaction fails with `Conflict`.
    pub fn conditional_debit_and_record<F>(
        &self,
        user_id: &str,
        observed_raw: u64,
        amount_raw: u64,
        record: F,
    ) -> Result<u64>
    where
        F: FnOnce(&Transaction<'_>) -> Result<()>,
    {
        self.with_tx(|tx| {
            let balance = cas_debit(tx, user_id, observed_raw, amount_raw)?;
            record(tx)?;
            Ok(balance)
        })
    }

    /// Split `total_raw` evenly between `recipients`, debiting the sender
    /// with the same compare-and-swap as withdrawals. Returns the amount each
    /// recipient received.
    ///
    /// The sender is debited the full `total_raw`; the floor-division
    /// remainder (at most `recipients.len() - 1` raw units) is burned.
    pub fn distribute(
        &self,
        sender_id: &str,
        recipients: &[String],
        total_raw: u64,
        observed_sender_raw: u64,
    ) -> Result<u64> {
        if recipients.is_empty() {
            return Err(LedgerError::NoRecipients);
        }

        let per_recipient = total_raw / recipients.len() as u64;
        if per_recipient == 0 {
            return Err(LedgerError::AmountTooSmall {
                recipients: recipients.len(),
            });
        }
        let per_delta = to_sql_amount(per_recipient)?;

        self.with_tx(|tx| {
            cas_debit(tx, sender_id, observed_sender_raw, total_raw)?;

            for recipient in recipients {
                insert_user(tx, recipient)?;
                apply_delta(tx, recipient, per_delta)?;
            }
            Ok(())
        })?;

        info!(
            sender = sender_id,
            recipients = recipients.len(),
            total_raw,
            per_recipient,
            "distribution committed"
        );
        Ok(per_recipient)
    }
}

/// SQLite stores integers as i64; anything above that is not a valid amount.
pub(crate) fn to_sql_amount(amount_raw: u64) -> Result<i64> {
    i64::try_from(amount_raw)
        .map_err(|_| LedgerError::InvalidAmount(format!("{} raw units is out of range", amount_raw)))
}

pub(crate) fn from_sql_amount(value: i64) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| LedgerError::InvalidAmount(format!("stored amount {} is negative", value)))
}

pub(crate) fn insert_user(conn: &Connection, user_id: &str) -> Result<()> {
    conn.execute("INSERT OR IGNORE INTO users (user_id) VALUES (?1)", [user_id])?;
    Ok(())
}

pub(crate) fn user_exists(conn: &Connection, user_id: &str) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM users WHERE user_id = ?1", [user_id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn query_balance(conn: &Connection, user_id: &str) -> Result<u64> {
    let balance: Option<i64> = conn
        .query_row(
            "SELECT balance_raw FROM users WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )
        .optional()?;

    match balance {
        Some(b) => from_sql_amount(b),
        None => Err(LedgerError::NotFound(format!("user {}", user_id))),
    }
}

/// Add a signed delta and return the new balance.
pub(crate) fn apply_delta(conn: &Connection, user_id: &str, delta: i64) -> Result<u64> {
    let balance: Option<i64> = conn
        .query_row(
            "UPDATE users SET balance_raw = balance_raw + ?1 WHERE user_id = ?2 RETURNING balance_raw",
            rusqlite::params![delta, user_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| balance_error(e, user_id))?;

    match balance {
        Some(b) => from_sql_amount(b),
        None => Err(LedgerError::NotFound(format!("user {}", user_id))),
    }
}

/// Compare-and-swap debit. Zero matching rows means either the user does not
/// exist or the balance moved since `observed_raw` was read.
fn cas_debit(conn: &Connection, user_id: &str, observed_raw: u64, amount_raw: u64) -> Result<u64> {
    if amount_raw > observed_raw {
        return Err(LedgerError::InsufficientBalance {
            user: user_id.to_string(),
        });
    }

    let balance: Option<i64> = conn
        .query_row(
            "UPDATE users SET balance_raw = balance_raw - ?1
             WHERE user_id = ?2 AND balance_raw = ?3
             RETURNING balance_raw",
            rusqlite::params![to_sql_amount(amount_raw)?, user_id, to_sql_amount(observed_raw)?],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| balance_error(e, user_id))?;

    match balance {
        Some(b) => from_sql_amount(b),
        None if user_exists(conn, user_id)? => {
            debug!(user = user_id, observed_raw, "compare-and-swap debit lost the race");
            Err(LedgerError::Conflict {
                user: user_id.to_string(),
            })
        }
        None => Err(LedgerError::NotFound(format!("user {}", user_id))),
    }
}

/// Translate the balance CHECK constraints into ledger errors.
fn balance_error(e: rusqlite::Error, user_id: &str) -> LedgerError {
    let message = e.to_string();
    if message.contains("balance_non_negative") {
        LedgerError::InsufficientBalance {
            user: user_id.to_string(),
        }
    } else if message.contains("balance_integer") {
        LedgerError::InvalidAmount(format!("balance of {} would overflow", user_id))
    } else {
        LedgerError::Storage(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn db_with(balances: &[(&str, u64)]) -> Database {
        let db = Database::open_in_memory().unwrap();
        for (user, balance) in balances {
            db.ensure_user(user).unwrap();
            if *balance > 0 {
                db.credit(user, *balance).unwrap();
            }
        }
        db
    }

    #[test]
    fn ensure_user_is_idempotent() {
        let db = db_with(&[("a", 10)]);
        db.ensure_user("a").unwrap();
        assert_eq!(db.get_balance("a").unwrap(), 10);
    }

    #[test]
    fn missing_user_is_not_found() {
        let db = db_with(&[]);
        assert!(matches!(db.get_balance("ghost"), Err(LedgerError::NotFound(_))));
        assert!(matches!(db.credit("ghost", 1), Err(LedgerError::NotFound(_))));
        assert!(!db.user_exists("ghost").unwrap());
    }

    #[test]
    fn tip_moves_funds() {
        let db = db_with(&[("a", 1_000_000_000), ("b", 0)]);
        db.transfer("a", "b", 250_000_000).unwrap();
        assert_eq!(db.get_balance("a").unwrap(), 750_000_000);
        assert_eq!(db.get_balance("b").unwrap(), 250_000_000);
    }

    #[test]
    fn transfer_to_missing_recipient_rolls_back() {
        let db = db_with(&[("a", 100)]);
        assert!(matches!(db.transfer("a", "ghost", 50), Err(LedgerError::NotFound(_))));
        assert_eq!(db.get_balance("a").unwrap(), 100);
    }

    #[test]
    fn overdraft_is_refused_by_the_store() {
        let db = db_with(&[("a", 10), ("b", 0)]);
        assert!(matches!(
            db.transfer("a", "b", 11),
            Err(LedgerError::InsufficientBalance { .. })
        ));
        assert!(matches!(
            db.debit_unconditional("a", 11),
            Err(LedgerError::InsufficientBalance { .. })
        ));
        assert_eq!(db.get_balance("a").unwrap(), 10);
        assert_eq!(db.get_balance("b").unwrap(), 0);
    }

    #[test]
    fn amounts_beyond_i64_are_invalid() {
        let db = db_with(&[("a", 0)]);
        assert!(matches!(db.credit("a", u64::MAX), Err(LedgerError::InvalidAmount(_))));
    }

    #[test]
    fn cas_debit_requires_matching_snapshot() {
        let db = db_with(&[("a", 100)]);

        let stale = db.conditional_debit_and_record("a", 90, 10, |_| Ok(()));
        assert!(matches!(stale, Err(LedgerError::Conflict { .. })));

        let fresh = db.conditional_debit_and_record("a", 100, 10, |_| Ok(())).unwrap();
        assert_eq!(fresh, 90);
    }

    #[test]
    fn cas_debit_rolls_back_when_record_fails() {
        let db = db_with(&[("a", 100)]);
        let res = db.conditional_debit_and_record("a", 100, 10, |_| {
            Err(LedgerError::InvalidAmount("boom".into()))
        });
        assert!(res.is_err());
        assert_eq!(db.get_balance("a").unwrap(), 100);
    }

    #[test]
    fn distribute_burns_the_remainder() {
        let db = db_with(&[("sender", 103)]);
        let recipients: Vec<String> = (0..5).map(|i| format!("r{}", i)).collect();

        let per = db.distribute("sender", &recipients, 103, 103).unwrap();
        assert_eq!(per, 20);
        assert_eq!(db.get_balance("sender").unwrap(), 0);
        for r in &recipients {
            assert_eq!(db.get_balance(r).unwrap(), 20);
        }
    }

    #[test]
    fn distribute_rejects_before_mutating() {
        let db = db_with(&[("sender", 100)]);
        let recipients: Vec<String> = (0..5).map(|i| format!("r{}", i)).collect();

        assert!(matches!(
            db.distribute("sender", &recipients, 4, 100),
            Err(LedgerError::AmountTooSmall { recipients: 5 })
        ));
        assert!(matches!(
            db.distribute("sender", &[], 50, 100),
            Err(LedgerError::NoRecipients)
        ));
        assert_eq!(db.get_balance("sender").unwrap(), 100);
        assert!(!db.user_exists("r0").unwrap());
    }

    #[test]
    fn distribute_with_stale_snapshot_conflicts() {
        let db = db_with(&[("sender", 100)]);
        let recipients = vec!["r".to_string()];
        assert!(matches!(
            db.distribute("sender", &recipients, 50, 80),
            Err(LedgerError::Conflict { .. })
        ));
        assert!(!db.user_exists("r").unwrap());
    }

    #[test]
    fn concurrent_cas_debits_admit_exactly_one() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open_with_pool(&dir.path().join("ledger.db"), 4).unwrap());
        db.ensure_user("a").unwrap();
        db.credit("a", 100).unwrap();

        let outcomes: Vec<Result<u64>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let db = db.clone();
                    s.spawn(move || db.conditional_debit_and_record("a", 100, 70, |_| Ok(())))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let ok = outcomes.iter().filter(|r| r.is_ok()).count();
        let conflicts = outcomes
            .iter()
            .filter(|r| matches!(r, Err(LedgerError::Conflict { .. })))
            .count();
        assert_eq!(ok, 1);
        assert_eq!(conflicts, 1);
        assert_eq!(db.get_balance("a").unwrap(), 30);
    }

    #[test]
    fn concurrent_distributions_never_overdraw() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open_with_pool(&dir.path().join("ledger.db"), 4).unwrap());
        db.ensure_user("sender").unwrap();
        db.credit("sender", 1_000).unwrap();

        std::thread::scope(|s| {
            for t in 0..8 {
                let db = db.clone();
                s.spawn(move || {
                    let recipients = vec![format!("r{}", t)];
                    for _ in 0..10 {
                        let observed = db.get_balance("sender").unwrap();
                        let _ = db.distribute("sender", &recipients, 60, observed);
                    }
                });
            }
        });

        let remaining = db.get_balance("sender").unwrap();
        let credited: u64 = (0..8)
            .map(|t| db.get_balance(&format!("r{}", t)).unwrap_or(0))
            .sum();
        assert_eq!(remaining + credited, 1_000);
    }
}
