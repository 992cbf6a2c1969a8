use rusqlite::OptionalExtension;
use sprite_types::activity::{RESET_HORIZON_SECS, next_score};
use tracing::debug;

use crate::models::ActivityRow;
use crate::{Database, Result, unix_now};

impl Database {
    /// Record a message from `user_id` in `server_id` and return the
    /// resulting activity score.
    pub fn touch_activity(&self, server_id: &str, user_id: &str) -> Result<u8> {
        self.touch_activity_at(server_id, user_id, unix_now())
    }

    /// Read-modify-write of one activity row, inside a single transaction so
    /// concurrent messages from the same user cannot lose an update.
    pub fn touch_activity_at(&self, server_id: &str, user_id: &str, now: i64) -> Result<u8> {
        self.with_tx(|tx| {
            let existing: Option<(i64, i64)> = tx
                .query_row(
                    "SELECT score, last_message_timestamp FROM activity
                     WHERE server_id = ?1 AND user_id = ?2",
                    [server_id, user_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((score, last)) = existing else {
                tx.execute(
                    "INSERT INTO activity (server_id, user_id, score, last_message_timestamp)
                     VALUES (?1, ?2, 1, ?3)",
                    rusqlite::params![server_id, user_id, now],
                )?;
                return Ok(1);
            };

            let score = score.clamp(0, u8::MAX as i64) as u8;
            let updated = next_score(score, now - last);

            // Always written, so a debounced message still moves the clock.
            tx.execute(
                "UPDATE activity SET score = ?1, last_message_timestamp = ?2
                 WHERE server_id = ?3 AND user_id = ?4",
                rusqlite::params![updated as i64, now, server_id, user_id],
            )?;
            Ok(updated)
        })
    }

    /// Drop every activity row (in all servers) last touched before `cutoff`.
    pub fn prune_activity(&self, cutoff: i64) -> Result<usize> {
        let removed = self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM activity WHERE last_message_timestamp < ?1",
                [cutoff],
            )?)
        })?;
        if removed > 0 {
            debug!(removed, cutoff, "pruned stale activity");
        }
        Ok(removed)
    }

    /// All tracked users of a server, highest score first.
    pub fn active_users(&self, server_id: &str) -> Result<Vec<ActivityRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT server_id, user_id, score, last_message_timestamp FROM activity
                 WHERE server_id = ?1
                 ORDER BY score DESC, last_message_timestamp DESC",
            )?;
            let rows = stmt.query_map([server_id], |row| {
                let score: i64 = row.get(2)?;
                Ok(ActivityRow {
                    server_id: row.get(0)?,
                    user_id: row.get(1)?,
                    score: score.clamp(0, u8::MAX as i64) as u8,
                    last_message_timestamp: row.get(3)?,
                })
            })?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn eligible_for_rain(&self, server_id: &str, min_score: u8) -> Result<Vec<String>> {
        self.eligible_for_rain_at(server_id, min_score, unix_now())
    }

    /// Prune stale rows, then return users of `server_id` whose score is at
    /// least `min_score`, highest score first.
    ///
    /// The prune and the select are separate statements; a message landing
    /// between them is either counted or not, both are acceptable.
    pub fn eligible_for_rain_at(&self, server_id: &str, min_score: u8, now: i64) -> Result<Vec<String>> {
        self.prune_activity(now - RESET_HORIZON_SECS)?;

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM activity
                 WHERE server_id = ?1 AND score >= ?2
                 ORDER BY score DESC, last_message_timestamp DESC",
            )?;
            let rows = stmt.query_map(rusqlite::params![server_id, min_score as i64], |row| {
                row.get::<_, String>(0)
            })?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn activity_score(&self, server_id: &str, user_id: &str) -> Result<Option<u8>> {
        self.with_conn(|conn| {
            let score: Option<i64> = conn
                .query_row(
                    "SELECT score FROM activity WHERE server_id = ?1 AND user_id = ?2",
                    [server_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(score.map(|s| s.clamp(0, u8::MAX as i64) as u8))
        })
    }
}
