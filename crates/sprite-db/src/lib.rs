pub mod activity;
pub mod deposits;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod models;
pub mod rain_channels;
pub mod withdrawals;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::info;

pub use error::{LedgerError, Result};

pub const DEFAULT_POOL_SIZE: usize = 4;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Ledger store: a small pool of read-write SQLite connections.
///
/// There is no process-wide lock around ledger mutations. Each mutating
/// operation runs in its own `BEGIN IMMEDIATE` transaction on whichever
/// connection it checks out, so SQLite's write lock (plus the
/// compare-and-swap updates in `ledger`) is what keeps balances consistent.
pub struct Database {
    conns: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_pool(path, DEFAULT_POOL_SIZE)
    }

    pub fn open_with_pool(path: &Path, pool_size: usize) -> Result<Self> {
        let pool_size = pool_size.max(1);

        let first = Connection::open(path)?;
        configure(&first)?;
        migrations::run(&first)?;

        let mut conns = Vec::with_capacity(pool_size);
        conns.push(Mutex::new(first));
        for _ in 1..pool_size {
            let conn = Connection::open(path)?;
            configure(&conn)?;
            conns.push(Mutex::new(conn));
        }

        info!(
            "Ledger DB opened at {} ({} connections)",
            path.display(),
            pool_size
        );
        Ok(Self {
            conns,
            next: AtomicUsize::new(0),
        })
    }

    /// Single-connection in-memory store, for tests and tooling.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run(&conn)?;
        Ok(Self {
            conns: vec![Mutex::new(conn)],
            next: AtomicUsize::new(0),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.checkout()?;
        f(&conn)
    }

    /// Run `f` inside an immediate transaction. Commits on `Ok`, rolls
    /// back on `Err` (the transaction is dropped uncommitted).
    pub fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.checkout()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    fn checkout(&self) -> Result<MutexGuard<'_, Connection>> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.conns.len();
        self.conns[idx]
            .lock()
            .map_err(|e| LedgerError::Unavailable(format!("connection lock poisoned: {}", e)))
    }
}

fn configure(conn: &Connection) -> Result<()> {
    // WAL mode so readers never block the writer
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}

/// Current Unix time in seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
