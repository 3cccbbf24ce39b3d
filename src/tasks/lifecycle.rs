//! Lifecycle orchestrator: the entry points the transport and the clock call.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, warn};

use super::history::TaskHistoryEntry;
use super::model::{NewTask, Task, TaskPatch, TaskStatus};
use super::repository::TaskRepository;
use crate::error::{DatabaseError, Error};
use crate::notify::{NotificationDispatcher, NotificationGate, NotificationKind, OverdueScan, ScanReport};
use crate::store::{TaskQuery, TaskStore};

/// Wires repository mutations to notification triggers.
pub struct TaskLifecycle {
    repo: TaskRepository,
    scan: OverdueScan,
    dispatcher: NotificationDispatcher,
}

impl TaskLifecycle {
    pub fn new(
        store: Arc<dyn TaskStore>,
        gate: Arc<NotificationGate>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            repo: TaskRepository::new(Arc::clone(&store)),
            scan: OverdueScan::new(store, gate),
            dispatcher,
        }
    }

    pub async fn on_create(&self, input: NewTask) -> Result<Task, Error> {
        self.repo.create(input).await
    }

    pub async fn on_list(&self, query: TaskQuery) -> Result<Vec<Task>, DatabaseError> {
        self.repo.list(query).await
    }

    pub async fn on_get(&self, id: i64) -> Result<Option<Task>, DatabaseError> {
        self.repo.get(id).await
    }

    pub async fn on_history(&self, id: i64) -> Result<Vec<TaskHistoryEntry>, DatabaseError> {
        self.repo.history(id).await
    }

    /// Apply `patch`; queue a completed-notification if this update is the
    /// one that moved the task to completed.
    pub async fn on_update(&self, id: i64, patch: TaskPatch) -> Result<Option<Task>, Error> {
        let Some(previous) = self.repo.get(id).await? else {
            return Ok(None);
        };

        let Some(updated) = self.repo.update(id, patch).await? else {
            return Ok(None);
        };

        if previous.status != TaskStatus::Completed && updated.status == TaskStatus::Completed {
            if let Err(e) = self.dispatcher.enqueue(id, NotificationKind::Completed) {
                warn!(task_id = id, error = %e, "Could not queue completed notification");
            }
        }

        Ok(Some(updated))
    }

    pub async fn on_delete(&self, id: i64) -> Result<bool, DatabaseError> {
        self.repo.delete(id).await
    }

    /// Run the overdue scan at the current time.
    pub async fn on_overdue_tick(&self) -> Result<ScanReport, DatabaseError> {
        self.scan.scan(Utc::now()).await
    }
}

/// Spawn a background task that runs the overdue scan every `interval`.
pub fn spawn_overdue_ticker(
    lifecycle: Arc<TaskLifecycle>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = lifecycle.on_overdue_tick().await {
                error!(error = %e, "Overdue scan failed");
            }
        }
    })
}
