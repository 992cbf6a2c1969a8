use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Ledger DB: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                user_id     TEXT PRIMARY KEY,
                balance_raw INTEGER NOT NULL DEFAULT 0,
                CONSTRAINT balance_non_negative CHECK (balance_raw >= 0),
                CONSTRAINT balance_integer CHECK (typeof(balance_raw) = 'integer')
            );

            CREATE TABLE deposits (
                deposit_id  TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                timestamp   INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
                amount_raw  INTEGER NOT NULL,
                completed   INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_deposit_user ON deposits(user_id, timestamp);

            CREATE TABLE withdrawals (
                withdraw_id TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                timestamp   INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
                amount_raw  INTEGER NOT NULL,
                signature   TEXT NOT NULL
            );

            CREATE INDEX idx_withdrawal_user ON withdrawals(user_id, timestamp);

            CREATE TABLE activity (
                server_id               TEXT NOT NULL,
                user_id                 TEXT NOT NULL,
                score                   INTEGER NOT NULL DEFAULT 1,
                last_message_timestamp  INTEGER NOT NULL,
                PRIMARY KEY (server_id, user_id)
            );

            CREATE INDEX idx_activity_last ON activity(last_message_timestamp);

            CREATE TABLE rain_channels (
                server_id   TEXT NOT NULL,
                channel_id  TEXT NOT NULL,
                PRIMARY KEY (server_id, channel_id)
            );

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Ledger DB migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn balances_cannot_go_negative() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        conn.execute("INSERT INTO users (user_id) VALUES ('a')", []).unwrap();
        let res = conn.execute("UPDATE users SET balance_raw = balance_raw - 1 WHERE user_id = 'a'", []);
        assert!(res.is_err());
    }
}
