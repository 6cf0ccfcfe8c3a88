// Stop signal shared by the background loops

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

/// One-shot stop signal for a background loop
///
/// A stop requested before the loop subscribed is not lost: `subscribe`
/// returns `None` once the signal has fired.
#[derive(Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    requested: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(1);
        Self {
            tx,
            requested: AtomicBool::new(false),
        }
    }

    /// Get a shutdown signal receiver, or `None` if stop was already requested
    pub fn subscribe(&self) -> Option<broadcast::Receiver<()>> {
        let rx = self.tx.subscribe();
        if self.requested.load(Ordering::SeqCst) {
            None
        } else {
            Some(rx)
        }
    }

    /// Fire the signal
    pub fn trigger(&self) {
        self.requested.store(true, Ordering::SeqCst);
        let _ = self.tx.send(());
    }

    pub fn is_triggered(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
