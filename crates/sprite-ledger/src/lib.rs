/// Sprite Ledger Library
///
/// The async service layer between the adapter-facing API and the store:
/// amount parsing, the price cache, and the balance, deposit/withdrawal,
/// activity and rain operations.

pub mod activity;
pub mod amount;
pub mod config;
pub mod ledger;
pub mod price;
pub mod rain;
pub mod workflow;

use std::sync::Arc;

use sprite_db::{Database, LedgerError, Result};
use sprite_types::UserIdentity;
use tracing::warn;

pub use activity::ActivityTracker;
pub use config::LedgerConfig;
pub use ledger::Ledger;
pub use price::PriceCache;
pub use rain::RainDistributor;
pub use workflow::Workflow;

/// Run a store operation on the blocking pool.
pub(crate) async fn blocking<F, T>(db: &Arc<Database>, f: F) -> Result<T>
where
    F: FnOnce(&Database) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| LedgerError::Unavailable(format!("store task failed: {}", e)))?
}

/// Parse stored user keys back into identities, skipping rows that do not
/// belong to a known platform.
pub(crate) fn parse_identities(keys: Vec<String>) -> Vec<UserIdentity> {
    keys.into_iter()
        .filter_map(|key| match key.parse::<UserIdentity>() {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("skipping unparseable user key: {}", e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use sprite_chain::PriceSource;
    use sprite_db::Database;

    use crate::PriceCache;

    pub struct FixedPrice(pub f64);

    #[async_trait]
    impl PriceSource for FixedPrice {
        async fn fetch_price(&self) -> sprite_chain::Result<f64> {
            Ok(self.0)
        }
    }

    pub fn db() -> Arc<Database> {
        Arc::new(Database::open_in_memory().unwrap())
    }

    pub async fn prices(usd: f64) -> Arc<PriceCache> {
        let cache = PriceCache::new(Arc::new(FixedPrice(usd)), Duration::from_secs(60));
        cache.refresh().await.unwrap();
        cache
    }

    pub fn fund(db: &Database, user: &str, raw: u64) {
        db.ensure_user(user).unwrap();
        db.credit(user, raw).unwrap();
    }
}
