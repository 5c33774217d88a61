use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;
use tracing::{debug, error};

use wrangler_types::events::GatewayEvent;

/// A pre-serialized event plus the channels it concerns.
#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    /// Empty means every connection receives it.
    pub channel_ids: Vec<String>,
    pub json: Arc<str>,
}

impl BroadcastMessage {
    pub fn concerns(&self, subscribed: &HashSet<String>) -> bool {
        self.channel_ids.is_empty() || self.channel_ids.iter().any(|id| subscribed.contains(id))
    }
}

/// Tracks connected clients and broadcasts events to them.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
    connections: AtomicUsize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                connections: AtomicUsize::new(0),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Serialize once and fan out. Dropped silently when nobody listens.
    pub fn broadcast(&self, event: &GatewayEvent) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize gateway event: {}", e);
                return;
            }
        };
        let message = BroadcastMessage {
            channel_ids: event.channel_ids().into_iter().map(String::from).collect(),
            json: Arc::from(json),
        };
        if let Ok(receivers) = self.inner.broadcast_tx.send(message) {
            debug!("Gateway event sent to {} connections", receivers);
        }
    }

    pub fn connection_opened(&self) {
        self.inner.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.inner.connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.load(Ordering::Relaxed)
    }
}
