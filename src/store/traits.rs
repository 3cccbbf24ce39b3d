//! Store traits: the transactional persistence contract for tasks and history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tracing::warn;

use crate::error::DatabaseError;
use crate::tasks::history::{NewHistoryEntry, TaskHistoryEntry};
use crate::tasks::model::{NewTask, Task, TaskStatus};

/// Filter and window for listing tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskQuery {
    pub offset: u32,
    pub limit: u32,
    pub status: Option<TaskStatus>,
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 10,
            status: None,
        }
    }
}

/// Backend-agnostic task store.
///
/// Reads go straight to the store. Every mutation goes through a
/// [`StoreTx`] obtained from [`TaskStore::begin`].
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    /// Open a unit of work. Nothing it writes is visible until commit.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, DatabaseError>;

    /// Get a task by ID.
    async fn get_task(&self, id: i64) -> Result<Option<Task>, DatabaseError>;

    /// List tasks in insertion order.
    async fn list_tasks(&self, query: TaskQuery) -> Result<Vec<Task>, DatabaseError>;

    /// Tasks owed an overdue notification at `now`: past due, still
    /// pending, with an email, and not yet notified.
    async fn list_overdue_candidates(&self, now: DateTime<Utc>)
    -> Result<Vec<Task>, DatabaseError>;

    /// All history rows for a task, oldest first. Works for deleted tasks.
    async fn list_history(&self, task_id: i64) -> Result<Vec<TaskHistoryEntry>, DatabaseError>;
}

/// One atomic unit of work against the store.
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait StoreTx: Send {
    /// Read a task inside the transaction.
    async fn get_task(&mut self, id: i64) -> Result<Option<Task>, DatabaseError>;

    /// Insert a pending task and return it with its store-assigned ID.
    async fn insert_task(
        &mut self,
        task: &NewTask,
        created_at: DateTime<Utc>,
    ) -> Result<Task, DatabaseError>;

    /// Overwrite every mutable column of an existing task.
    async fn update_task(&mut self, task: &Task) -> Result<(), DatabaseError>;

    /// Remove a task row. Returns `false` if it did not exist.
    async fn delete_task(&mut self, id: i64) -> Result<bool, DatabaseError>;

    /// Append a history row and return its ID.
    async fn insert_history(&mut self, entry: &NewHistoryEntry) -> Result<i64, DatabaseError>;

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError>;
}

/// Commit `tx` if `result` is `Ok`, otherwise roll it back and return the
/// original error.
pub async fn finish<T>(
    tx: Box<dyn StoreTx>,
    result: Result<T, DatabaseError>,
) -> Result<T, DatabaseError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}
