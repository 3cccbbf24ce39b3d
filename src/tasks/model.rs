//! Task data model: entities, validated inputs, and partial updates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

/// Longest accepted title, counted in Unicode code points.
pub const MAX_TITLE_CHARS: usize = 100;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    /// String value used in snapshots and in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    /// Parse the stored string value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A syntactically valid email address used for task notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NotificationEmail(String);

impl NotificationEmail {
    /// Validate an address with lettre's RFC 5321 parser.
    pub fn parse(address: impl Into<String>) -> Result<Self, ValidationError> {
        let address = address.into();
        match address.parse::<lettre::Address>() {
            Ok(_) => Ok(Self(address)),
            Err(e) => Err(ValidationError::InvalidEmail {
                address,
                reason: e.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NotificationEmail {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<NotificationEmail> for String {
    fn from(email: NotificationEmail) -> Self {
        email.0
    }
}

impl fmt::Display for NotificationEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Store-assigned ID.
    pub id: i64,
    /// Short title (1–100 characters).
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Where notifications go. `None` suppresses all notifications.
    #[serde(default)]
    pub notification_email: Option<NotificationEmail>,
    /// Set once the completed-notification has been claimed.
    #[serde(default)]
    pub completed_notified_at: Option<DateTime<Utc>>,
    /// Set once the overdue-notification has been claimed.
    #[serde(default)]
    pub overdue_notified_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Whether the deadline has passed relative to `now`.
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.due_date.is_some_and(|due| due < now)
    }
}

/// Input for creating a task. Status always starts as pending.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notification_email: Option<NotificationEmail>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            due_date: None,
            notification_email: None,
        }
    }

    /// Builder: set description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Builder: set due date.
    pub fn with_due_date(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    /// Builder: set notification email.
    pub fn with_email(mut self, email: NotificationEmail) -> Self {
        self.notification_email = Some(email);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)
    }
}

/// Check the title bounds.
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    let length = title.chars().count();
    if length == 0 {
        return Err(ValidationError::EmptyTitle);
    }
    if length > MAX_TITLE_CHARS {
        return Err(ValidationError::TitleTooLong {
            length,
            max: MAX_TITLE_CHARS,
        });
    }
    Ok(())
}

/// One field of a partial update: either left alone or explicitly set.
///
/// For nullable columns use `Field<Option<T>>`, so `Set(None)` clears the
/// value while `Absent` leaves it untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Absent,
    Set(T),
}

// Manual impl: a derive would demand `T: Default`.
impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> Field<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Self::Set(value) => Some(value),
            Self::Absent => None,
        }
    }

    /// Overwrite `target` if the field was supplied.
    pub fn apply_to(self, target: &mut T) {
        if let Self::Set(value) = self {
            *target = value;
        }
    }
}

// A key present in the payload (even as `null`) deserializes to `Set`;
// a missing key falls back to `Default`, which is `Absent`.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Field::Set)
    }
}

/// Sparse update of a task. Only `Set` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TaskPatch {
    pub title: Field<String>,
    pub description: Field<Option<String>>,
    pub status: Field<TaskStatus>,
    pub due_date: Field<Option<DateTime<Utc>>>,
    pub notification_email: Field<Option<NotificationEmail>>,
}

impl TaskPatch {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Field::Set(title.into());
        self
    }

    pub fn with_description(mut self, desc: Option<String>) -> Self {
        self.description = Field::Set(desc);
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Field::Set(status);
        self
    }

    pub fn with_due_date(mut self, due: Option<DateTime<Utc>>) -> Self {
        self.due_date = Field::Set(due);
        self
    }

    pub fn with_email(mut self, email: Option<NotificationEmail>) -> Self {
        self.notification_email = Field::Set(email);
        self
    }

    pub fn is_empty(&self) -> bool {
        !(self.title.is_set()
            || self.description.is_set()
            || self.status.is_set()
            || self.due_date.is_set()
            || self.notification_email.is_set())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = self.title.as_set() {
            validate_title(title)?;
        }
        Ok(())
    }

    /// Write the supplied fields onto `task`.
    pub fn apply(self, task: &mut Task) {
        self.title.apply_to(&mut task.title);
        self.description.apply_to(&mut task.description);
        self.status.apply_to(&mut task.status);
        self.due_date.apply_to(&mut task.due_date);
        self.notification_email.apply_to(&mut task.notification_email);
    }
}
