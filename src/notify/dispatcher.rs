//! Fire-and-forget notification queue
//!
//! [`QueuedSink`] accepts notifications on the caller's thread and delivers
//! them from a dedicated worker thread that owns the real sink. Failed
//! deliveries are logged and counted, never retried.

use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;
use std::thread::JoinHandle;
use tracing::{debug, warn};

use super::{Notification, NotificationSink, NotifyError};

/// Delivery counters reported when the queue shuts down
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: usize,
    pub failed: usize,
}

pub struct QueuedSink {
    sender: Mutex<Option<Sender<Notification>>>,
    worker: Mutex<Option<JoinHandle<DeliveryStats>>>,
}

impl QueuedSink {
    /// Start the worker thread. `inner` is moved onto it and dropped there.
    pub fn spawn<S: NotificationSink + 'static>(inner: S) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Notification>();

        let worker = std::thread::Builder::new()
            .name("notify-worker".to_string())
            .spawn(move || {
                let mut stats = DeliveryStats::default();
                for notification in rx {
                    match inner.deliver(&notification) {
                        Ok(()) => stats.delivered += 1,
                        Err(e) => {
                            stats.failed += 1;
                            warn!(
                                "Notification to {} not delivered: {}",
                                notification.recipient_id, e
                            );
                        }
                    }
                }
                debug!(
                    "Notification worker finished: {} delivered, {} failed",
                    stats.delivered, stats.failed
                );
                stats
            })?;

        Ok(Self {
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Close the queue and wait for queued notifications to be processed
    pub fn shutdown(&self) -> DeliveryStats {
        self.sender
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();

        match handle.map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                warn!("Notification worker panicked");
                DeliveryStats::default()
            }
            None => DeliveryStats::default(),
        }
    }
}

impl NotificationSink for QueuedSink {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let guard = self.sender.lock().unwrap_or_else(|p| p.into_inner());
        match guard.as_ref() {
            Some(tx) => tx
                .send(notification.clone())
                .map_err(|_| NotifyError::QueueClosed),
            None => Err(NotifyError::QueueClosed),
        }
    }
}

impl Drop for QueuedSink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Notification>>,
    }

    impl NotificationSink for Recorder {
        fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
            if notification.recipient_id == "broken" {
                return Err(NotifyError::Rejected {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            self.seen.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    #[test]
    fn test_queue_delivers_in_order() {
        let recorder = Arc::new(Recorder::default());
        let queue = QueuedSink::spawn(recorder.clone()).unwrap();

        for i in 0..5 {
            queue
                .deliver(&Notification::new(format!("u{}", i), "msg", i as f64))
                .unwrap();
        }
        let stats = queue.shutdown();

        assert_eq!(stats, DeliveryStats { delivered: 5, failed: 0 });
        let seen = recorder.seen.lock().unwrap();
        let ids: Vec<_> = seen.iter().map(|n| n.recipient_id.as_str()).collect();
        assert_eq!(ids, vec!["u0", "u1", "u2", "u3", "u4"]);
    }

    #[test]
    fn test_failures_are_counted_not_propagated() {
        let queue = QueuedSink::spawn(Recorder::default()).unwrap();
        assert!(queue.deliver(&Notification::new("broken", "x", 1.0)).is_ok());
        assert!(queue.deliver(&Notification::new("ok", "y", 1.0)).is_ok());
        let stats = queue.shutdown();
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn test_closed_queue_rejects() {
        let queue = QueuedSink::spawn(Recorder::default()).unwrap();
        queue.shutdown();
        assert!(matches!(
            queue.deliver(&Notification::new("u", "z", 0.0)),
            Err(NotifyError::QueueClosed)
        ));
    }
}
