//! Per-session event fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use chat_core::ChatEvent;
use tokio::sync::{mpsc, RwLock};

/// Buffered events per subscriber before sends start dropping.
const CHANNEL_CAPACITY: usize = 64;

/// Fans one session's events out to every connected subscriber.
///
/// Delivery is best-effort: `broadcast` uses `try_send`, so a subscriber
/// whose channel is closed or full is pruned rather than awaited. A slow
/// consumer loses its stream instead of stalling the turn.
#[derive(Clone, Default)]
pub struct EventBroadcaster {
    subscribers: Arc<RwLock<HashMap<String, Vec<mpsc::Sender<ChatEvent>>>>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new subscription to a session's event stream.
    pub async fn subscribe(&self, session_id: &str) -> mpsc::Receiver<ChatEvent> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut subscribers = self.subscribers.write().await;
        subscribers.entry(session_id.to_string()).or_default().push(tx);
        rx
    }

    /// Deliver an event to all of a session's subscribers.
    pub async fn broadcast(&self, session_id: &str, event: ChatEvent) {
        let mut subscribers = self.subscribers.write().await;
        let Some(senders) = subscribers.get_mut(session_id) else {
            return;
        };

        senders.retain(|tx| tx.try_send(event.clone()).is_ok());
        if senders.is_empty() {
            subscribers.remove(session_id);
        }
    }

    /// Number of subscribers a session currently has.
    pub async fn subscriber_count(&self, session_id: &str) -> usize {
        self.subscribers
            .read()
            .await
            .get(session_id)
            .map(|senders| senders.len())
            .unwrap_or(0)
    }
}
