//! Audit trail: immutable history records and the recorder that writes them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::snapshot::{Snapshot, TaskField};
use crate::error::DatabaseError;
use crate::store::StoreTx;

/// Kind of change a history row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskEventType {
    Created,
    Updated,
    StatusChanged,
    Deleted,
    NotifiedCompleted,
    NotifiedOverdue,
}

impl TaskEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::StatusChanged => "STATUS_CHANGED",
            Self::Deleted => "DELETED",
            Self::NotifiedCompleted => "NOTIFIED_COMPLETED",
            Self::NotifiedOverdue => "NOTIFIED_OVERDUE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(Self::Created),
            "UPDATED" => Some(Self::Updated),
            "STATUS_CHANGED" => Some(Self::StatusChanged),
            "DELETED" => Some(Self::Deleted),
            "NOTIFIED_COMPLETED" => Some(Self::NotifiedCompleted),
            "NOTIFIED_OVERDUE" => Some(Self::NotifiedOverdue),
            _ => None,
        }
    }
}

impl fmt::Display for TaskEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A history row about to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub task_id: i64,
    pub event_type: TaskEventType,
    pub changed_at: DateTime<Utc>,
    pub before_data: Option<Snapshot>,
    pub after_data: Option<Snapshot>,
    pub changed_fields: Vec<TaskField>,
}

/// A persisted history row.
///
/// `task_id` is a plain reference: rows outlive the task they describe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHistoryEntry {
    pub id: i64,
    pub task_id: i64,
    pub event_type: TaskEventType,
    pub changed_at: DateTime<Utc>,
    pub before_data: Option<Snapshot>,
    pub after_data: Option<Snapshot>,
    pub changed_fields: Vec<TaskField>,
}

impl TaskHistoryEntry {
    pub fn from_new(id: i64, entry: NewHistoryEntry) -> Self {
        Self {
            id,
            task_id: entry.task_id,
            event_type: entry.event_type,
            changed_at: entry.changed_at,
            before_data: entry.before_data,
            after_data: entry.after_data,
            changed_fields: entry.changed_fields,
        }
    }
}

/// Appends history rows inside a caller-owned transaction.
///
/// Never commits: the caller decides when the mutation and its audit row
/// land together.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditRecorder;

impl AuditRecorder {
    pub fn new() -> Self {
        Self
    }

    pub async fn record(
        &self,
        tx: &mut dyn StoreTx,
        task_id: i64,
        event_type: TaskEventType,
        before: Option<Snapshot>,
        after: Option<Snapshot>,
        changed_fields: Vec<TaskField>,
    ) -> Result<TaskHistoryEntry, DatabaseError> {
        let entry = NewHistoryEntry {
            task_id,
            event_type,
            changed_at: Utc::now(),
            before_data: before,
            after_data: after,
            changed_fields,
        };
        let id = tx.insert_history(&entry).await?;
        debug!(task_id, history_id = id, event = %event_type, "History recorded");
        Ok(TaskHistoryEntry::from_new(id, entry))
    }
}
