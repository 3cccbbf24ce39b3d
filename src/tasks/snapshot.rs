//! Normalized task snapshots used for change detection and audit storage.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::Task;

/// Every tracked task field, in declaration order.
///
/// The derived `Ord` follows variant order, so a [`Snapshot`] iterates
/// fields in the same order the entity declares them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskField {
    Id,
    Title,
    Description,
    Status,
    DueDate,
    CreatedAt,
    NotificationEmail,
    CompletedNotifiedAt,
    OverdueNotifiedAt,
}

impl TaskField {
    pub const ALL: [TaskField; 9] = [
        Self::Id,
        Self::Title,
        Self::Description,
        Self::Status,
        Self::DueDate,
        Self::CreatedAt,
        Self::NotificationEmail,
        Self::CompletedNotifiedAt,
        Self::OverdueNotifiedAt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Title => "title",
            Self::Description => "description",
            Self::Status => "status",
            Self::DueDate => "due_date",
            Self::CreatedAt => "created_at",
            Self::NotificationEmail => "notification_email",
            Self::CompletedNotifiedAt => "completed_notified_at",
            Self::OverdueNotifiedAt => "overdue_notified_at",
        }
    }
}

impl fmt::Display for TaskField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field name → normalized value.
pub type Snapshot = BTreeMap<TaskField, Value>;

/// Canonical timestamp rendering: RFC 3339, UTC, microseconds, `Z` suffix.
///
/// Fixed width, so rendered values also sort chronologically as text.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp_value(ts: Option<DateTime<Utc>>) -> Value {
    ts.map_or(Value::Null, |ts| Value::String(format_timestamp(ts)))
}

fn text_value(s: Option<&str>) -> Value {
    s.map_or(Value::Null, |s| Value::String(s.to_string()))
}

/// Build the snapshot of a task.
pub fn snapshot(task: &Task) -> Snapshot {
    TaskField::ALL
        .iter()
        .map(|field| {
            let value = match field {
                TaskField::Id => Value::from(task.id),
                TaskField::Title => Value::String(task.title.clone()),
                TaskField::Description => text_value(task.description.as_deref()),
                TaskField::Status => Value::String(task.status.as_str().to_string()),
                TaskField::DueDate => timestamp_value(task.due_date),
                TaskField::CreatedAt => timestamp_value(Some(task.created_at)),
                TaskField::NotificationEmail => {
                    text_value(task.notification_email.as_ref().map(|e| e.as_str()))
                }
                TaskField::CompletedNotifiedAt => timestamp_value(task.completed_notified_at),
                TaskField::OverdueNotifiedAt => timestamp_value(task.overdue_notified_at),
            };
            (*field, value)
        })
        .collect()
}

/// Fields whose values differ between two snapshots, in field order.
pub fn changed_fields(before: &Snapshot, after: &Snapshot) -> Vec<TaskField> {
    TaskField::ALL
        .into_iter()
        .filter(|field| before.get(field) != after.get(field))
        .collect()
}

/// Every key of a snapshot, used for CREATED and DELETED events.
pub fn all_fields(snapshot: &Snapshot) -> Vec<TaskField> {
    snapshot.keys().copied().collect()
}
