use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use sprite_chain::PriceSource;
use tracing::{debug, warn};

/// Last known token price, refreshed in the background.
///
/// `get` never waits on the network: it returns whatever price is cached
/// and, when that price is older than `max_age`, starts one refresh task.
/// Further calls while that refresh is in flight start nothing.
pub struct PriceCache {
    source: Arc<dyn PriceSource>,
    max_age_secs: i64,
    state: Mutex<PriceState>,
}

#[derive(Debug, Default)]
struct PriceState {
    usd: f64,
    updated_at: Option<i64>,
    updating: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSnapshot {
    pub usd: f64,
    pub updated_at: Option<i64>,
}

impl PriceCache {
    pub fn new(source: Arc<dyn PriceSource>, max_age: Duration) -> Arc<Self> {
        Arc::new(Self {
            source,
            max_age_secs: max_age.as_secs() as i64,
            state: Mutex::new(PriceState::default()),
        })
    }

    /// Cached USD price (0.0 before the first successful refresh).
    pub fn get(self: &Arc<Self>) -> f64 {
        let now = chrono::Utc::now().timestamp();

        let (usd, spawn) = {
            let mut state = self.lock();
            let stale = state
                .updated_at
                .is_none_or(|t| now.saturating_sub(t) > self.max_age_secs);
            let spawn = stale && !state.updating;
            if spawn {
                state.updating = true;
            }
            (state.usd, spawn)
        };

        if spawn {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let cache = Arc::clone(self);
                    handle.spawn(async move {
                        let _ = cache.refresh().await;
                    });
                }
                Err(_) => {
                    warn!("no async runtime, skipping price refresh");
                    self.lock().updating = false;
                }
            }
        }
        usd
    }

    pub fn snapshot(&self) -> PriceSnapshot {
        let state = self.lock();
        PriceSnapshot {
            usd: state.usd,
            updated_at: state.updated_at,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().updating
    }

    /// Fetch a fresh price now. The in-flight flag is cleared whether or not
    /// the fetch succeeds, so a failed refresh is retried on a later `get`.
    pub async fn refresh(&self) -> sprite_chain::Result<f64> {
        let result = self.source.fetch_price().await;

        let mut state = self.lock();
        state.updating = false;
        match result {
            Ok(usd) => {
                state.usd = usd;
                state.updated_at = Some(chrono::Utc::now().timestamp());
                debug!(usd, "price refreshed");
                Ok(usd)
            }
            Err(e) => {
                warn!("price refresh failed: {}", e);
                Err(e)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, PriceState> {
        // The state is plain data; a panic mid-update cannot leave it invalid.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sprite_chain::ChainError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl PriceSource for CountingSource {
        async fn fetch_price(&self) -> sprite_chain::Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ChainError::Malformed("pool unavailable".into()))
            } else {
                Ok(0.25)
            }
        }
    }

    async fn settle(cache: &PriceCache) {
        for _ in 0..100 {
            if !cache.is_refreshing() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("refresh never finished");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn stale_get_spawns_exactly_one_refresh() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0), fail: false });
        let cache = PriceCache::new(source.clone(), Duration::from_secs(60));

        // The spawned refresh cannot run until this task yields.
        assert_eq!(cache.get(), 0.0);
        assert_eq!(cache.get(), 0.0);
        assert_eq!(cache.get(), 0.0);
        assert!(cache.is_refreshing());

        settle(&cache).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(), 0.25);
        assert!(cache.snapshot().updated_at.is_some());

        // Fresh price: no further refresh.
        assert!(!cache.is_refreshing());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_refresh_clears_the_flag() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0), fail: true });
        let cache = PriceCache::new(source.clone(), Duration::from_secs(60));

        cache.get();
        settle(&cache).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.snapshot().updated_at, None);

        cache.get();
        settle(&cache).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn explicit_refresh_updates_snapshot() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0), fail: false });
        let cache = PriceCache::new(source, Duration::from_secs(60));
        assert_eq!(cache.refresh().await.unwrap(), 0.25);
        assert_eq!(cache.snapshot().usd, 0.25);
    }
}
