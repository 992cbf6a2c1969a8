use rusqlite::{OptionalExtension, Row};
use tracing::info;

use crate::ledger::{apply_delta, from_sql_amount, insert_user, to_sql_amount};
use crate::models::{CompletedDeposit, DepositRow};
use crate::{Database, LedgerError, Result, unix_now};

const DEPOSIT_COLUMNS: &str = "deposit_id, user_id, timestamp, amount_raw, completed";

impl Database {
    /// Record a pending deposit. The user row is created if missing.
    pub fn create_deposit(&self, deposit_id: &str, user_id: &str, amount_raw: u64) -> Result<DepositRow> {
        self.create_deposit_at(deposit_id, user_id, amount_raw, unix_now())
    }

    pub fn create_deposit_at(
        &self,
        deposit_id: &str,
        user_id: &str,
        amount_raw: u64,
        timestamp: i64,
    ) -> Result<DepositRow> {
        let amount = to_sql_amount(amount_raw)?;
        self.with_tx(|tx| {
            insert_user(tx, user_id)?;
            tx.execute(
                "INSERT INTO deposits (deposit_id, user_id, timestamp, amount_raw, completed)
                 VALUES (?1, ?2, ?3, ?4, 0)",
                rusqlite::params![deposit_id, user_id, timestamp, amount],
            )?;
            Ok(())
        })?;

        info!(user = user_id, deposit_id, amount_raw, "deposit created");
        Ok(DepositRow {
            deposit_id: deposit_id.to_string(),
            user_id: user_id.to_string(),
            timestamp,
            amount_raw,
            completed: false,
        })
    }

    pub fn get_deposit(&self, deposit_id: &str) -> Result<DepositRow> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM deposits WHERE deposit_id = ?1", DEPOSIT_COLUMNS);
            let row = conn.query_row(&sql, [deposit_id], read_row).optional()?;
            row.transpose()?
                .ok_or_else(|| LedgerError::NotFound(format!("deposit {}", deposit_id)))
        })
    }

    /// Most recent deposit of `user_id` whose identifier starts with `prefix`.
    /// The prefix is matched case-insensitively against the lowercase hex id.
    pub fn find_deposit_by_prefix(&self, user_id: &str, prefix: &str) -> Result<DepositRow> {
        let prefix = prefix.to_ascii_lowercase();
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(LedgerError::NotFound(format!("deposit {}", prefix)));
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM deposits
                 WHERE user_id = ?1 AND substr(deposit_id, 1, ?2) = ?3
                 ORDER BY timestamp DESC, rowid DESC
                 LIMIT 1",
                DEPOSIT_COLUMNS
            );
            let row = conn
                .query_row(
                    &sql,
                    rusqlite::params![user_id, prefix.len() as i64, prefix],
                    read_row,
                )
                .optional()?;
            row.transpose()?
                .ok_or_else(|| LedgerError::NotFound(format!("deposit {}", prefix)))
        })
    }

    /// Most recent deposits first.
    pub fn list_deposits(&self, user_id: &str, limit: usize) -> Result<Vec<DepositRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM deposits WHERE user_id = ?1
                 ORDER BY timestamp DESC, rowid DESC LIMIT ?2",
                DEPOSIT_COLUMNS
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

    /// Mark a pending deposit completed and credit its amount, atomically.
    ///
    /// The completion flag is flipped with a guarded update, so only one of
    /// several concurrent completions credits the user.
    pub fn complete_deposit(&self, deposit_id: &str) -> Result<CompletedDeposit> {
        let completed = self.with_tx(|tx| {
            let claimed: Option<(String, i64)> = tx
                .query_row(
                    "UPDATE deposits SET completed = 1
                     WHERE deposit_id = ?1 AND completed = 0
                     RETURNING user_id, amount_raw",
                    [deposit_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let (user_id, amount) = match claimed {
                Some(c) => c,
                None => {
                    let exists = tx
                        .query_row(
                            "SELECT 1 FROM deposits WHERE deposit_id = ?1",
                            [deposit_id],
                            |_| Ok(()),
                        )
                        .optional()?
                        .is_some();
                    return Err(if exists {
                        LedgerError::AlreadyCompleted(deposit_id.to_string())
                    } else {
                        LedgerError::NotFound(format!("deposit {}", deposit_id))
                    });
                }
            };

            insert_user(tx, &user_id)?;
            let balance_raw = apply_delta(tx, &user_id, amount)?;
            Ok(CompletedDeposit {
                user_id,
                amount_raw: from_sql_amount(amount)?,
                balance_raw,
            })
        })?;

        info!(
            user = %completed.user_id,
            deposit_id,
            amount_raw = completed.amount_raw,
            "deposit completed"
        );
        Ok(completed)
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<Result<DepositRow>> {
    let amount: i64 = row.get(3)?;
    let completed: i64 = row.get(4)?;
    let deposit_id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let timestamp: i64 = row.get(2)?;

    Ok(from_sql_amount(amount).map(|amount_raw| DepositRow {
        deposit_id,
        user_id,
        timestamp,
        amount_raw,
        completed: completed != 0,
    }))
}
