//! Task repository: CRUD with an audit row around every mutation.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use super::history::{AuditRecorder, TaskEventType, TaskHistoryEntry};
use super::model::{NewTask, Task, TaskPatch};
use super::snapshot::{TaskField, all_fields, changed_fields, snapshot};
use crate::error::{DatabaseError, Error};
use crate::store::{StoreTx, TaskQuery, TaskStore, finish};

/// Create, read, update and delete tasks.
///
/// Each mutation runs in its own transaction together with its history
/// row; either both land or neither does.
pub struct TaskRepository {
    store: Arc<dyn TaskStore>,
    audit: AuditRecorder,
}

impl TaskRepository {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            audit: AuditRecorder::new(),
        }
    }

    /// Validate and persist a new pending task, recording CREATED.
    pub async fn create(&self, input: NewTask) -> Result<Task, Error> {
        input.validate()?;

        let mut tx = self.store.begin().await?;
        let result = self.create_in(tx.as_mut(), &input).await;
        let task = finish(tx, result).await?;

        debug!(task_id = task.id, "Task created");
        Ok(task)
    }

    async fn create_in(&self, tx: &mut dyn StoreTx, input: &NewTask) -> Result<Task, DatabaseError> {
        let task = tx.insert_task(input, Utc::now()).await?;
        let after = snapshot(&task);
        let fields = all_fields(&after);
        self.audit
            .record(tx, task.id, TaskEventType::Created, None, Some(after), fields)
            .await?;
        Ok(task)
    }

    pub async fn list(&self, query: TaskQuery) -> Result<Vec<Task>, DatabaseError> {
        self.store.list_tasks(query).await
    }

    pub async fn get(&self, id: i64) -> Result<Option<Task>, DatabaseError> {
        self.store.get_task(id).await
    }

    pub async fn history(&self, id: i64) -> Result<Vec<TaskHistoryEntry>, DatabaseError> {
        self.store.list_history(id).await
    }

    /// Apply the supplied fields of `patch`. `None` if the task is missing.
    ///
    /// Records STATUS_CHANGED when the status moved, UPDATED for any other
    /// change, and nothing when the patch left every field as it was.
    pub async fn update(&self, id: i64, patch: TaskPatch) -> Result<Option<Task>, Error> {
        patch.validate()?;

        let mut tx = self.store.begin().await?;
        let result = self.update_in(tx.as_mut(), id, patch).await;
        Ok(finish(tx, result).await?)
    }

    async fn update_in(
        &self,
        tx: &mut dyn StoreTx,
        id: i64,
        patch: TaskPatch,
    ) -> Result<Option<Task>, DatabaseError> {
        let Some(stored) = tx.get_task(id).await? else {
            return Ok(None);
        };

        let mut task = stored.clone();
        patch.apply(&mut task);
        let before = snapshot(&stored);
        let after = snapshot(&task);

        let changed = changed_fields(&before, &after);
        if changed.is_empty() {
            debug!(task_id = id, "Update left task unchanged");
            return Ok(Some(stored));
        }

        tx.update_task(&task).await?;
        // Read back so the caller sees the stored precision.
        let task = tx
            .get_task(id)
            .await?
            .ok_or_else(|| DatabaseError::Query(format!("update_task: task {id} vanished")))?;

        let event = if changed.contains(&TaskField::Status) {
            TaskEventType::StatusChanged
        } else {
            TaskEventType::Updated
        };
        self.audit
            .record(tx, id, event, Some(before), Some(after), changed)
            .await?;

        debug!(task_id = id, event = %event, "Task updated");
        Ok(Some(task))
    }

    /// Remove a task, recording DELETED first. `false` if it was missing.
    pub async fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        let mut tx = self.store.begin().await?;
        let result = self.delete_in(tx.as_mut(), id).await;
        let deleted = finish(tx, result).await?;

        if deleted {
            debug!(task_id = id, "Task deleted");
        }
        Ok(deleted)
    }

    async fn delete_in(&self, tx: &mut dyn StoreTx, id: i64) -> Result<bool, DatabaseError> {
        let Some(task) = tx.get_task(id).await? else {
            return Ok(false);
        };

        let before = snapshot(&task);
        let fields = all_fields(&before);
        self.audit
            .record(tx, id, TaskEventType::Deleted, Some(before), None, fields)
            .await?;
        tx.delete_task(id).await
    }
}
