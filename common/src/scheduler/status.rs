// Scheduler health status

use tokio::sync::watch;

/// Status reported by a clean tick
pub const STATUS_OK: &str = "OK";

/// Status before the first tick completes
pub const STATUS_NOT_RUNNING: &str = "Not Running";

/// Outcome of the last scheduler tick
///
/// Single writer (the tick loop), any number of readers. Clones share the
/// same underlying value.
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    tx: std::sync::Arc<watch::Sender<String>>,
}

impl SchedulerStatus {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(STATUS_NOT_RUNNING.to_string());
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    pub(crate) fn set(&self, status: &str) {
        self.tx.send_if_modified(|current| {
            if current == status {
                false
            } else {
                *current = status.to_string();
                true
            }
        });
    }

    pub(crate) fn set_ok(&self) {
        self.set(STATUS_OK);
    }

    /// Raw status string
    pub fn current(&self) -> String {
        self.tx.borrow().clone()
    }

    /// Health query: `"OK"`, or the diagnostic decorated with a warning sign
    pub fn status(&self) -> String {
        let current = self.tx.borrow();
        if current.as_str() == STATUS_OK {
            STATUS_OK.to_string()
        } else {
            format!("⚠ {}", current.as_str())
        }
    }

    /// Watch status changes
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.tx.subscribe()
    }
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status_is_a_warning() {
        let status = SchedulerStatus::new();
        assert_eq!(status.current(), STATUS_NOT_RUNNING);
        assert_eq!(status.status(), "⚠ Not Running");
    }

    #[test]
    fn test_ok_is_not_decorated() {
        let status = SchedulerStatus::new();
        status.set_ok();
        assert_eq!(status.status(), "OK");

        status.set("Run> Unable to commit a transaction");
        assert_eq!(status.status(), "⚠ Run> Unable to commit a transaction");
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let status = SchedulerStatus::new();
        let reader = status.clone();
        let mut rx = reader.subscribe();

        status.set_ok();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), "OK");
        assert_eq!(reader.status(), "OK");
    }
}
