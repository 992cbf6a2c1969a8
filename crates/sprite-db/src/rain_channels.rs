use rusqlite::OptionalExtension;

use crate::{Database, Result};

impl Database {
    /// Returns false if the channel was already whitelisted.
    pub fn add_rain_channel(&self, server_id: &str, channel_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO rain_channels (server_id, channel_id) VALUES (?1, ?2)",
                [server_id, channel_id],
            )?;
            Ok(inserted > 0)
        })
    }

    /// Returns false if the channel was not whitelisted.
    pub fn remove_rain_channel(&self, server_id: &str, channel_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM rain_channels WHERE server_id = ?1 AND channel_id = ?2",
                [server_id, channel_id],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn clear_rain_channels(&self, server_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM rain_channels WHERE server_id = ?1", [server_id])?)
        })
    }

    pub fn list_rain_channels(&self, server_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT channel_id FROM rain_channels WHERE server_id = ?1 ORDER BY channel_id",
            )?;
            let rows = stmt.query_map([server_id], |row| row.get::<_, String>(0))?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Whether messages in this channel count towards activity.
    pub fn is_rain_channel(&self, server_id: &str, channel_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let listed: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM rain_channels WHERE server_id = ?1 AND channel_id = ?2",
                    [server_id, channel_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(listed.is_some())
        })
    }
}
