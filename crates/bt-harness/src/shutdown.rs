use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// ShutdownSignal
// ---------------------------------------------------------------------------

/// Cooperative shutdown coordinator for the daemon's background loops.
///
/// Loops take a [`ShutdownListener`] and `select!` on
/// [`ShutdownListener::wait`] alongside their work. A listener created after
/// [`trigger`](ShutdownSignal::trigger) resolves immediately, so loops spawned
/// late never miss the signal.
///
/// Each loop holds a [`ShutdownGuard`]; dropping it counts the loop as
/// drained, which [`wait_for_drain`](ShutdownSignal::wait_for_drain) observes.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    triggered: Arc<watch::Sender<bool>>,
    drained: Arc<watch::Sender<usize>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (triggered, _) = watch::channel(false);
        let (drained, _) = watch::channel(0);
        Self {
            triggered: Arc::new(triggered),
            drained: Arc::new(drained),
        }
    }

    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.triggered.subscribe(),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.triggered.borrow()
    }

    /// Trigger shutdown. Later calls are no-ops.
    pub fn trigger(&self) {
        let first = self.triggered.send_if_modified(|flag| {
            if *flag {
                false
            } else {
                *flag = true;
                true
            }
        });
        if first {
            info!("shutdown signal triggered");
        } else {
            warn!("shutdown already triggered");
        }
    }

    /// Hand out a guard that confirms drain when dropped.
    pub fn guard(&self) -> ShutdownGuard {
        ShutdownGuard {
            drained: Arc::clone(&self.drained),
        }
    }

    /// Wait until `expected` guards have been dropped, or `timeout` elapses.
    pub async fn wait_for_drain(&self, expected: usize, timeout: Duration) -> DrainResult {
        let mut rx = self.drained.subscribe();
        let reached = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|count| *count >= expected)).await,
            Ok(Ok(_))
        );
        let confirmed = *self.drained.borrow();
        if reached {
            info!(count = confirmed, "all components drained");
            DrainResult::Complete(confirmed)
        } else {
            warn!(confirmed, expected, "drain timeout, some components did not confirm");
            DrainResult::Timeout {
                confirmed,
                expected,
            }
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ShutdownListener
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Resolve once shutdown has been triggered.
    pub async fn wait(&mut self) {
        // Sender dropped means the owning signal is gone; treat as shutdown.
        let _ = self.rx.wait_for(|flag| *flag).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

// ---------------------------------------------------------------------------
// DrainResult / ShutdownGuard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainResult {
    Complete(usize),
    Timeout { confirmed: usize, expected: usize },
}

impl DrainResult {
    pub fn is_complete(&self) -> bool {
        matches!(self, DrainResult::Complete(_))
    }
}

pub struct ShutdownGuard {
    drained: Arc<watch::Sender<usize>>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.drained.send_modify(|count| *count += 1);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_is_idempotent() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_shutting_down());
        signal.trigger();
        signal.trigger();
        assert!(signal.is_shutting_down());
    }

    #[tokio::test]
    async fn late_listener_sees_earlier_trigger() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        let mut listener = signal.listener();
        assert!(listener.is_triggered());
        listener.wait().await;
    }

    #[tokio::test]
    async fn listener_wakes_on_trigger() {
        let signal = ShutdownSignal::new();
        let mut listener = signal.listener();
        let handle = tokio::spawn(async move {
            listener.wait().await;
            true
        });
        tokio::task::yield_now().await;
        signal.trigger();
        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn dropped_guards_complete_drain() {
        let signal = ShutdownSignal::new();
        let a = signal.guard();
        let b = signal.guard();
        drop(a);
        drop(b);
        let result = signal.wait_for_drain(2, Duration::from_secs(1)).await;
        assert_eq!(result, DrainResult::Complete(2));
    }

    #[tokio::test(start_paused = true)]
    async fn drain_times_out_when_guard_is_held() {
        let signal = ShutdownSignal::new();
        let _held = signal.guard();
        let result = signal.wait_for_drain(1, Duration::from_millis(100)).await;
        assert_eq!(
            result,
            DrainResult::Timeout {
                confirmed: 0,
                expected: 1
            }
        );
        assert!(!result.is_complete());
    }
}
