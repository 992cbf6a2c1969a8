use rusqlite::{OptionalExtension, Row};
use tracing::info;

use crate::ledger::{from_sql_amount, to_sql_amount};
use crate::models::WithdrawalRow;
use crate::{Database, LedgerError, Result, unix_now};

const WITHDRAWAL_COLUMNS: &str = "withdraw_id, user_id, timestamp, amount_raw, signature";

impl Database {
    /// Debit the user with a compare-and-swap against `observed_raw` and
    /// record the signed withdrawal in the same transaction.
    ///
    /// Returns the stored row and the user's new balance.
    pub fn create_withdrawal(
        &self,
        withdraw_id: &str,
        user_id: &str,
        observed_raw: u64,
        amount_raw: u64,
        signature: &str,
    ) -> Result<(WithdrawalRow, u64)> {
        let amount = to_sql_amount(amount_raw)?;
        let timestamp = unix_now();

        let balance = self.conditional_debit_and_record(user_id, observed_raw, amount_raw, |tx| {
            tx.execute(
                "INSERT INTO withdrawals (withdraw_id, user_id, timestamp, amount_raw, signature)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![withdraw_id, user_id, timestamp, amount, signature],
            )?;
            Ok(())
        })?;

        info!(user = user_id, withdraw_id, amount_raw, "withdrawal recorded");
        Ok((
            WithdrawalRow {
                withdraw_id: withdraw_id.to_string(),
                user_id: user_id.to_string(),
                timestamp,
                amount_raw,
                signature: signature.to_string(),
            },
            balance,
        ))
    }

    pub fn get_withdrawal(&self, withdraw_id: &str) -> Result<WithdrawalRow> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM withdrawals WHERE withdraw_id = ?1", WITHDRAWAL_COLUMNS);
            let row = conn.query_row(&sql, [withdraw_id], read_row).optional()?;
            row.transpose()?
                .ok_or_else(|| LedgerError::NotFound(format!("withdrawal {}", withdraw_id)))
        })
    }

    /// Most recent withdrawals first.
    pub fn list_withdrawals(&self, user_id: &str, limit: usize) -> Result<Vec<WithdrawalRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM withdrawals WHERE user_id = ?1
                 ORDER BY timestamp DESC, rowid DESC LIMIT ?2",
                WITHDRAWAL_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params![user_id, limit as i64], read_row)?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row??);
            }
            Ok(out)
        })
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<Result<WithdrawalRow>> {
    let withdraw_id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let timestamp: i64 = row.get(2)?;
    let amount: i64 = row.get(3)?;
    let signature: String = row.get(4)?;

    Ok(from_sql_amount(amount).map(|amount_raw| WithdrawalRow {
        withdraw_id,
        user_id,
        timestamp,
        amount_raw,
        signature,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn withdrawal_debits_and_records() {
        let db = Database::open_in_memory().unwrap();
        db.ensure_user("42").unwrap();
        db.credit("42", 1_000).unwrap();

        let (row, balance) = db.create_withdrawal("w1", "42", 1_000, 400, "sig").unwrap();
        assert_eq!(balance, 600);
        assert_eq!(row.amount_raw, 400);
        assert_eq!(db.get_withdrawal("w1").unwrap().signature, "sig");
        assert_eq!(db.list_withdrawals("42", 10).unwrap().len(), 1);
    }

    #[test]
    fn stale_snapshot_records_nothing() {
        let db = Database::open_in_memory().unwrap();
        db.ensure_user("42").unwrap();
        db.credit("42", 1_000).unwrap();

        assert!(matches!(
            db.create_withdrawal("w1", "42", 900, 400, "sig"),
            Err(LedgerError::Conflict { .. })
        ));
        assert!(db.list_withdrawals("42", 10).unwrap().is_empty());
        assert_eq!(db.get_balance("42").unwrap(), 1_000);
    }

    #[test]
    fn duplicate_id_rolls_back_debit() {
        let db = Database::open_in_memory().unwrap();
        db.ensure_user("42").unwrap();
        db.credit("42", 1_000).unwrap();

        db.create_withdrawal("w1", "42", 1_000, 100, "sig").unwrap();
        assert!(matches!(
            db.create_withdrawal("w1", "42", 900, 100, "sig"),
            Err(LedgerError::Storage(_))
        ));
        assert_eq!(db.get_balance("42").unwrap(), 900);
    }
}
