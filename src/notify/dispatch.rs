//! Deferred dispatch: an mpsc queue in front of the notification gate.
//!
//! Producers enqueue and return immediately; a single worker task drains
//! the queue and drives each request through the gate.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use super::gate::{NotificationGate, NotificationKind};
use crate::error::NotificationError;

/// One queued notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationRequest {
    pub task_id: i64,
    pub kind: NotificationKind,
}

/// Sending half of the notification queue. Cheap to clone.
///
/// Overflow is bounded too: once the channel is full, at most `capacity`
/// more requests wait in background senders. Past that, `enqueue` returns
/// `QueueFull` and the request is dropped. A dropped completed-notification
/// is lost; a dropped overdue one is retried by the next scan.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<NotificationRequest>,
    deferred: Arc<Semaphore>,
    max_deferred: usize,
}

impl NotificationDispatcher {
    /// Create a dispatcher and the receiver its worker drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NotificationRequest>) {
        let (tx, rx) = mpsc::channel(capacity);
        let dispatcher = Self {
            tx,
            deferred: Arc::new(Semaphore::new(capacity)),
            max_deferred: capacity,
        };
        (dispatcher, rx)
    }

    /// Queue a notification without waiting for it.
    ///
    /// When the queue is full the request is handed to a background task
    /// that waits for room, so the caller never blocks.
    pub fn enqueue(&self, task_id: i64, kind: NotificationKind) -> Result<(), NotificationError> {
        let request = NotificationRequest { task_id, kind };
        match self.tx.try_send(request) {
            Ok(()) => {
                debug!(task_id, kind = %kind, "Notification queued");
                Ok(())
            }
            Err(TrySendError::Full(request)) => {
                let Ok(permit) = Arc::clone(&self.deferred).try_acquire_owned() else {
                    return Err(NotificationError::QueueFull {
                        deferred: self.max_deferred,
                    });
                };
                warn!(task_id, kind = %kind, "Notification queue full, deferring");
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    if tx.send(request).await.is_err() {
                        warn!(task_id, "Notification queue closed before request was queued");
                    }
                    drop(permit);
                });
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(NotificationError::QueueClosed),
        }
    }
}

/// Drain `rx` through `gate` until every dispatcher is dropped.
pub fn spawn_notification_worker(
    gate: Arc<NotificationGate>,
    mut rx: mpsc::Receiver<NotificationRequest>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let NotificationRequest { task_id, kind } = request;
            if let Err(e) = gate.try_mark_and_send(task_id, kind, Utc::now()).await {
                warn!(task_id, kind = %kind, error = %e, "Queued notification failed");
            }
        }
        info!("Notification worker stopped");
    })
}
