use std::sync::{Arc, Mutex};

use crate::protocol::TeamEvent;

/// A broadcast-style event bus built on top of flume channels.
///
/// Each call to [`subscribe`](EventBus::subscribe) creates a new receiver that
/// gets every event published after the subscription was created, in publish
/// order. The bus is cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<Vec<flume::Sender<TeamEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a new subscriber and return its receiving end.
    pub fn subscribe(&self) -> flume::Receiver<TeamEvent> {
        let (tx, rx) = flume::unbounded();
        let mut senders = self.inner.lock().expect("EventBus lock poisoned");
        senders.push(tx);
        rx
    }

    /// Publish an event to all current subscribers.
    ///
    /// Disconnected subscribers (whose receivers have been dropped) are
    /// pruned.
    pub fn publish(&self, event: TeamEvent) {
        tracing::trace!(event = event.name(), "publish");
        let mut senders = self.inner.lock().expect("EventBus lock poisoned");
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        let senders = self.inner.lock().expect("EventBus lock poisoned");
        senders.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
