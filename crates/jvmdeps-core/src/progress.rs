//! Cancellation and progress reporting for long-running analyses.
//!
//! Producers (per-dependency tasks) report through a bounded channel so a slow
//! consumer can never block network-bound work.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Channel capacity for progress updates.
const PROGRESS_CHANNEL_CAPACITY: usize = 16;

/// Shared cancelled-flag polled before each unit of remaining work.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub completed: usize,
    pub total: usize,
    pub message: String,
}

impl ProgressUpdate {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Non-blocking sender for progress updates.
///
/// Cheap to clone. The producer owns the total, since only it knows how many
/// units survive its own filtering. Updates are dropped when the channel is
/// full or the receiver is gone.
#[derive(Clone)]
pub struct ProgressSender {
    tx: mpsc::Sender<ProgressUpdate>,
}

impl ProgressSender {
    pub fn channel() -> (Self, mpsc::Receiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }

    pub fn send(&self, completed: usize, total: usize, message: impl Into<String>) {
        let _ = self.tx.try_send(ProgressUpdate {
            completed,
            total,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn test_progress_updates_delivered() {
        let (sender, mut rx) = ProgressSender::channel();
        sender.send(1, 4, "Analyzing guava");
        sender.send(2, 4, "Analyzing slf4j-api");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.completed, 1);
        assert_eq!(first.total, 4);
        assert_eq!(first.message, "Analyzing guava");
        assert!((rx.recv().await.unwrap().fraction() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_send_never_blocks_when_full() {
        let (sender, mut rx) = ProgressSender::channel();
        for i in 0..(PROGRESS_CHANNEL_CAPACITY * 4) {
            sender.send(i, 1000, "tick");
        }
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, PROGRESS_CHANNEL_CAPACITY);
    }

    #[test]
    fn test_fraction_empty_total() {
        let update = ProgressUpdate {
            completed: 0,
            total: 0,
            message: String::new(),
        };
        assert!((update.fraction() - 1.0).abs() < f64::EPSILON);
    }
}
