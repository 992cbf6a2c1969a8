use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use sprite_types::Platform;
use sprite_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const MAX_MISSED_PONGS: u8 = 2;

/// Platforms an adapter asked for. Empty means everything.
type Subscriptions = Arc<RwLock<HashSet<Platform>>>;

/// Handle an adapter WebSocket. The bearer token was already checked when
/// the connection was upgraded, so the adapter goes straight to Ready.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, adapter: String) {
    let (mut sender, receiver) = socket.split();

    let ready = GatewayEvent::Ready {
        adapter: adapter.clone(),
    };
    if send_event(&mut sender, &ready).await.is_err() {
        return;
    }

    let conn_id = dispatcher.adapter_online(&adapter).await;
    run_connection_loop(sender, receiver, dispatcher.clone(), adapter.clone()).await;
    dispatcher.adapter_offline(conn_id).await;
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: Dispatcher,
    adapter: String,
) {
    let mut broadcast_rx = dispatcher.subscribe();

    let subscriptions: Subscriptions = Arc::new(RwLock::new(HashSet::new()));
    let send_subscriptions = subscriptions.clone();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let adapter_send = adapter.clone();
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(RecvError::Lagged(n)) => {
                            warn!("adapter {} lagged by {} events", adapter_send, n);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    if !wants(&send_subscriptions, &event) {
                        continue;
                    }
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= MAX_MISSED_PONGS {
                            warn!("adapter {} missed {} pongs, dropping connection", adapter_send, missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let adapter_recv = adapter.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => handle_command(&adapter_recv, cmd, &subscriptions),
                    Err(e) => {
                        warn!(
                            "adapter {} bad command: {} -- raw: {}",
                            adapter_recv,
                            e,
                            truncate(&text, 200)
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("adapter {} disconnected from gateway", adapter);
}

fn handle_command(adapter: &str, cmd: GatewayCommand, subscriptions: &Subscriptions) {
    match cmd {
        GatewayCommand::Subscribe { platforms } => {
            info!("adapter {} subscribing to {:?}", adapter, platforms);
            let mut subs = subscriptions.write().unwrap_or_else(|e| e.into_inner());
            *subs = platforms.into_iter().collect();
        }
    }
}

/// Whether an event passes the adapter's platform filter.
fn wants(subscriptions: &Subscriptions, event: &GatewayEvent) -> bool {
    let subs = subscriptions.read().unwrap_or_else(|e| e.into_inner());
    passes_filter(&subs, event)
}

fn passes_filter(subs: &HashSet<Platform>, event: &GatewayEvent) -> bool {
    if subs.is_empty() {
        return true;
    }
    match event.recipient_platform() {
        Some(platform) => subs.contains(&platform),
        None => true,
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), ()> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            // Not fatal for the connection; skip the event.
            warn!("failed to serialize gateway event: {}", e);
            return Ok(());
        }
    };
    debug!("gateway -> {}", truncate(&text, 120));
    sender.send(Message::Text(text.into())).await.map_err(|_| ())
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
