//! Fan-out of state changes to live observers.
//!
//! Each subscriber owns a bounded queue. Publishing is best effort per
//! subscriber: a closed or full queue drops that subscriber and delivery
//! continues to the rest.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::task::state::TaskState;

/// Queue depth per subscriber before it counts as stalled.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

/// Event pushed to observers, serialised as `{"type": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum StudioEvent {
    /// The task record changed.
    StatusUpdate(TaskState),
    /// The operator saved a new prompt.
    PromptUpdate {
        /// The saved prompt text.
        prompt: String,
    },
}

/// Opaque handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Subscriber registry with per-subscriber delivery.
#[derive(Debug)]
pub struct BroadcastChannel {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<StudioEvent>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Default for BroadcastChannel {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl BroadcastChannel {
    /// Create a channel with the default per-subscriber capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a channel whose subscriber queues hold `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    /// Register a new observer and return its id and event stream.
    pub fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<StudioEvent>) {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.capacity);
        let total = {
            let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            subs.insert(id, tx);
            subs.len()
        };
        debug!(%id, total, "observer subscribed");
        (id, rx)
    }

    /// Remove an observer. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let (removed, total) = {
            let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            let removed = subs.remove(&id).is_some();
            (removed, subs.len())
        };
        if removed {
            debug!(%id, total, "observer unsubscribed");
        }
    }

    /// Deliver `event` to every subscriber, returning how many received it.
    pub fn publish(&self, event: &StudioEvent) -> usize {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        let mut delivered = 0usize;
        subs.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!(%id, "observer gone, dropping");
                false
            }
            Err(TrySendError::Full(_)) => {
                warn!(%id, "observer stalled, dropping");
                false
            }
        });
        delivered
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}
