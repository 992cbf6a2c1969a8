use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};
use uuid::Uuid;

use sprite_types::events::GatewayEvent;

const CHANNEL_CAPACITY: usize = 1024;

/// Fans ledger events out to every connected adapter.
///
/// Delivery is best-effort: with no adapters connected, or an adapter lagging
/// behind the channel capacity, events are dropped and the ledger never sees it.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Connected adapters: conn_id -> adapter name
    adapters: RwLock<HashMap<Uuid, String>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                adapters: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected adapters.
    pub fn broadcast(&self, event: GatewayEvent) {
        if self.inner.broadcast_tx.send(event).is_err() {
            debug!("no adapters connected, event dropped");
        }
    }

    pub fn broadcast_all(&self, events: impl IntoIterator<Item = GatewayEvent>) {
        for event in events {
            self.broadcast(event);
        }
    }

    /// Register a connected adapter. Returns its connection id.
    pub async fn adapter_online(&self, adapter: &str) -> Uuid {
        let conn_id = Uuid::new_v4();
        self.inner
            .adapters
            .write()
            .await
            .insert(conn_id, adapter.to_string());
        info!("adapter {} online ({})", adapter, conn_id);
        conn_id
    }

    pub async fn adapter_offline(&self, conn_id: Uuid) {
        if let Some(adapter) = self.inner.adapters.write().await.remove(&conn_id) {
            info!("adapter {} offline ({})", adapter, conn_id);
        }
    }

    /// Names of connected adapters (one entry per connection).
    pub async fn adapters(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.adapters.read().await.values().cloned().collect();
        names.sort();
        names
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprite_types::UserIdentity;

    fn tip() -> GatewayEvent {
        GatewayEvent::TipReceived {
            from: UserIdentity::Discord(1),
            to: UserIdentity::Discord(2),
            amount_raw: 5,
            balance_raw: 5,
        }
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_is_harmless() {
        let dispatcher = Dispatcher::new();
        dispatcher.broadcast(tip());
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();
        dispatcher.broadcast_all([tip(), tip()]);

        assert!(matches!(rx.recv().await.unwrap(), GatewayEvent::TipReceived { .. }));
        assert!(matches!(rx.recv().await.unwrap(), GatewayEvent::TipReceived { .. }));
    }

    #[tokio::test]
    async fn tracks_adapters() {
        let dispatcher = Dispatcher::new();
        let a = dispatcher.adapter_online("telegram").await;
        let _b = dispatcher.adapter_online("discord").await;
        assert_eq!(dispatcher.adapters().await, vec!["discord", "telegram"]);

        dispatcher.adapter_offline(a).await;
        assert_eq!(dispatcher.adapters().await, vec!["discord"]);
    }
}
