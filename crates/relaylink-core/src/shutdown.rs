//! Cooperative shutdown signal.
//!
//! `Shutdown` is the trigger side and can be cloned freely; each waiter takes
//! its own `ShutdownSignal`. Triggering is sticky: a signal taken after the
//! trigger resolves immediately.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Trigger side of the shutdown signal
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    /// Create an untriggered shutdown signal
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request shutdown
    pub fn trigger(&self) {
        if !self.tx.send_replace(true) {
            debug!("Shutdown requested");
        }
    }

    /// Whether shutdown has been requested
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// A waiter for this signal
    #[must_use]
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Waiting side of the shutdown signal
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve once shutdown is requested
    ///
    /// Never resolves if every `Shutdown` handle is dropped untriggered.
    pub async fn wait(&mut self) {
        if self.rx.wait_for(|triggered| *triggered).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Whether shutdown has been requested
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time;

    #[tokio::test]
    async fn test_trigger_wakes_waiter() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.signal();
        let waiter = tokio::spawn(async move { signal.wait().await });

        shutdown.trigger();

        time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_late_signal_resolves_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.trigger();

        let mut signal = shutdown.signal();
        assert!(signal.is_triggered());
        time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_trigger_never_resolves() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.signal();
        drop(shutdown);

        let result = time::timeout(Duration::from_secs(60), signal.wait()).await;
        assert!(result.is_err());
    }
}
