//! Notification gate: claim a notification in the store, then deliver it.
//!
//! The claim (re-check, set `*_notified_at`, append history) commits before
//! the mailer is called. A send that fails after the claim is logged and
//! lost; it is never retried, so each notification goes out at most once.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use super::mailer::Mailer;
use crate::error::DatabaseError;
use crate::store::{StoreTx, TaskStore, finish};
use crate::tasks::history::{AuditRecorder, TaskEventType};
use crate::tasks::model::{NotificationEmail, Task, TaskStatus};
use crate::tasks::snapshot::{changed_fields, format_timestamp, snapshot};

/// Which lifecycle notification is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Completed,
    Overdue,
}

impl NotificationKind {
    pub fn event_type(&self) -> TaskEventType {
        match self {
            Self::Completed => TaskEventType::NotifiedCompleted,
            Self::Overdue => TaskEventType::NotifiedOverdue,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Overdue => "overdue",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the gate declined to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotFound,
    NotCompleted,
    NotPending,
    NoDueDate,
    NotYetDue,
    NoEmail,
    AlreadyNotified,
}

/// Result of one pass through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Claimed and handed to the mailer successfully.
    Delivered,
    /// A precondition did not hold; nothing was written or sent.
    Skipped(SkipReason),
    /// Claimed, but the mailer failed. The claim stands.
    DeliveryFailed(String),
}

impl NotifyOutcome {
    /// Whether the notification was claimed in the store.
    pub fn was_claimed(&self) -> bool {
        !matches!(self, Self::Skipped(_))
    }
}

/// Check whether `task` is owed a `kind` notification at `now`.
///
/// Returns the recipient when it is.
pub fn eligibility(
    kind: NotificationKind,
    task: &Task,
    now: DateTime<Utc>,
) -> Result<&NotificationEmail, SkipReason> {
    match kind {
        NotificationKind::Completed => {
            if task.status != TaskStatus::Completed {
                return Err(SkipReason::NotCompleted);
            }
            let email = task.notification_email.as_ref().ok_or(SkipReason::NoEmail)?;
            if task.completed_notified_at.is_some() {
                return Err(SkipReason::AlreadyNotified);
            }
            Ok(email)
        }
        NotificationKind::Overdue => {
            if task.due_date.is_none() {
                return Err(SkipReason::NoDueDate);
            }
            if !task.is_past_due(now) {
                return Err(SkipReason::NotYetDue);
            }
            if task.status != TaskStatus::Pending {
                return Err(SkipReason::NotPending);
            }
            let email = task.notification_email.as_ref().ok_or(SkipReason::NoEmail)?;
            if task.overdue_notified_at.is_some() {
                return Err(SkipReason::AlreadyNotified);
            }
            Ok(email)
        }
    }
}

/// Subject and body for a notification about `task`.
pub fn render(kind: NotificationKind, task: &Task, now: DateTime<Utc>) -> (String, String) {
    match kind {
        NotificationKind::Completed => (
            format!("Task completed: {}", task.title),
            format!(
                "Task '{}' has been marked as completed.\nID: {}\nCompleted at: {}",
                task.title,
                task.id,
                format_timestamp(task.completed_notified_at.unwrap_or(now)),
            ),
        ),
        NotificationKind::Overdue => (
            format!("Deadline missed: {}", task.title),
            format!(
                "Task '{}' has missed its deadline.\nID: {}\nDeadline: {}",
                task.title,
                task.id,
                task.due_date
                    .map(format_timestamp)
                    .unwrap_or_else(|| "N/A".to_string()),
            ),
        ),
    }
}

enum Claim {
    Claimed(Task, NotificationEmail),
    Skipped(SkipReason),
}

/// Decides, claims and delivers lifecycle notifications.
pub struct NotificationGate {
    store: Arc<dyn TaskStore>,
    mailer: Arc<dyn Mailer>,
    audit: AuditRecorder,
}

impl NotificationGate {
    pub fn new(store: Arc<dyn TaskStore>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            store,
            mailer,
            audit: AuditRecorder::new(),
        }
    }

    /// Claim and send a `kind` notification for `task_id` if one is owed.
    ///
    /// Store failures propagate; a failed precondition or a failed send
    /// is reported in the outcome.
    pub async fn try_mark_and_send(
        &self,
        task_id: i64,
        kind: NotificationKind,
        now: DateTime<Utc>,
    ) -> Result<NotifyOutcome, DatabaseError> {
        let mut tx = self.store.begin().await?;
        let result = self.claim(tx.as_mut(), task_id, kind, now).await;
        let (task, email) = match finish(tx, result).await? {
            Claim::Claimed(task, email) => (task, email),
            Claim::Skipped(reason) => {
                debug!(task_id, kind = %kind, reason = ?reason, "Notification skipped");
                return Ok(NotifyOutcome::Skipped(reason));
            }
        };

        info!(task_id, kind = %kind, "Notification claimed");

        let (subject, body) = render(kind, &task, now);
        match self.mailer.send(email.as_str(), &subject, &body).await {
            Ok(()) => {
                info!(task_id, kind = %kind, "Notification delivered");
                Ok(NotifyOutcome::Delivered)
            }
            Err(e) => {
                error!(
                    task_id,
                    kind = %kind,
                    error = %e,
                    "Notification delivery failed; it will not be retried"
                );
                Ok(NotifyOutcome::DeliveryFailed(e.to_string()))
            }
        }
    }

    async fn claim(
        &self,
        tx: &mut dyn StoreTx,
        task_id: i64,
        kind: NotificationKind,
        now: DateTime<Utc>,
    ) -> Result<Claim, DatabaseError> {
        let Some(mut task) = tx.get_task(task_id).await? else {
            return Ok(Claim::Skipped(SkipReason::NotFound));
        };

        let email = match eligibility(kind, &task, now) {
            Ok(email) => email.clone(),
            Err(reason) => return Ok(Claim::Skipped(reason)),
        };

        let before = snapshot(&task);
        match kind {
            NotificationKind::Completed => task.completed_notified_at = Some(now),
            NotificationKind::Overdue => task.overdue_notified_at = Some(now),
        }
        let after = snapshot(&task);
        let changed = changed_fields(&before, &after);

        tx.update_task(&task).await?;
        self.audit
            .record(tx, task_id, kind.event_type(), Some(before), Some(after), changed)
            .await?;

        Ok(Claim::Claimed(task, email))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::notify::mailer::testing::RecordingMailer;
    use crate::store::LibSqlStore;
    use crate::tasks::model::{NewTask, TaskPatch};
    use crate::tasks::repository::TaskRepository;
    use crate::tasks::snapshot::TaskField;

    struct Fixture {
        repo: TaskRepository,
        gate: NotificationGate,
        mailer: Arc<RecordingMailer>,
        store: Arc<LibSqlStore>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let mailer = Arc::new(RecordingMailer::default());
        Fixture {
            repo: TaskRepository::new(store.clone()),
            gate: NotificationGate::new(store.clone(), mailer.clone()),
            mailer,
            store,
        }
    }

    fn email(s: &str) -> NotificationEmail {
        NotificationEmail::parse(s).unwrap()
    }

    async fn completed_task(f: &Fixture, addr: Option<&str>) -> Task {
        let task = f.repo.create(NewTask::new("Pay rent")).await.unwrap();
        f.repo
            .update(
                task.id,
                TaskPatch::default()
                    .with_status(TaskStatus::Completed)
                    .with_email(addr.map(email)),
            )
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn completed_notification_sent_once() {
        let f = fixture().await;
        let task = completed_task(&f, Some("a@b.com")).await;
        let now = Utc::now();

        let outcome = f
            .gate
            .try_mark_and_send(task.id, NotificationKind::Completed, now)
            .await
            .unwrap();
        assert_eq!(outcome, NotifyOutcome::Delivered);

        let sent = f.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@b.com");
        assert_eq!(sent[0].subject, "Task completed: Pay rent");
        assert!(sent[0].body.contains(&format!("ID: {}", task.id)));

        let stored = f.store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(
            stored.completed_notified_at.map(format_timestamp),
            Some(format_timestamp(now))
        );

        let history = f.store.list_history(task.id).await.unwrap();
        let last = history.last().unwrap();
        assert_eq!(last.event_type, TaskEventType::NotifiedCompleted);
        assert_eq!(last.changed_fields, vec![TaskField::CompletedNotifiedAt]);

        // Re-trigger: no new send, no new history row.
        let again = f
            .gate
            .try_mark_and_send(task.id, NotificationKind::Completed, Utc::now())
            .await
            .unwrap();
        assert_eq!(again, NotifyOutcome::Skipped(SkipReason::AlreadyNotified));
        assert_eq!(f.mailer.attempts(), 1);
        assert_eq!(f.store.list_history(task.id).await.unwrap().len(), history.len());
    }

    #[tokio::test]
    async fn completed_preconditions() {
        let f = fixture().await;
        let now = Utc::now();

        let missing = f
            .gate
            .try_mark_and_send(999, NotificationKind::Completed, now)
            .await
            .unwrap();
        assert_eq!(missing, NotifyOutcome::Skipped(SkipReason::NotFound));

        let pending = f
            .repo
            .create(NewTask::new("Pending").with_email(email("a@b.com")))
            .await
            .unwrap();
        let outcome = f
            .gate
            .try_mark_and_send(pending.id, NotificationKind::Completed, now)
            .await
            .unwrap();
        assert_eq!(outcome, NotifyOutcome::Skipped(SkipReason::NotCompleted));

        let no_email = completed_task(&f, None).await;
        let outcome = f
            .gate
            .try_mark_and_send(no_email.id, NotificationKind::Completed, now)
            .await
            .unwrap();
        assert_eq!(outcome, NotifyOutcome::Skipped(SkipReason::NoEmail));

        assert_eq!(f.mailer.attempts(), 0);
    }

    #[tokio::test]
    async fn overdue_preconditions() {
        let f = fixture().await;
        let now = Utc::now();

        let future = f
            .repo
            .create(
                NewTask::new("Later")
                    .with_due_date(now + Duration::hours(1))
                    .with_email(email("c@d.com")),
            )
            .await
            .unwrap();
        let outcome = f
            .gate
            .try_mark_and_send(future.id, NotificationKind::Overdue, now)
            .await
            .unwrap();
        assert_eq!(outcome, NotifyOutcome::Skipped(SkipReason::NotYetDue));

        let undated = f
            .repo
            .create(NewTask::new("Whenever").with_email(email("c@d.com")))
            .await
            .unwrap();
        let outcome = f
            .gate
            .try_mark_and_send(undated.id, NotificationKind::Overdue, now)
            .await
            .unwrap();
        assert_eq!(outcome, NotifyOutcome::Skipped(SkipReason::NoDueDate));

        let done = f
            .repo
            .create(
                NewTask::new("Done late")
                    .with_due_date(now - Duration::days(1))
                    .with_email(email("c@d.com")),
            )
            .await
            .unwrap();
        f.repo
            .update(done.id, TaskPatch::default().with_status(TaskStatus::Completed))
            .await
            .unwrap();
        let outcome = f
            .gate
            .try_mark_and_send(done.id, NotificationKind::Overdue, now)
            .await
            .unwrap();
        assert_eq!(outcome, NotifyOutcome::Skipped(SkipReason::NotPending));

        assert_eq!(f.mailer.attempts(), 0);
    }

    #[tokio::test]
    async fn overdue_marks_and_renders_deadline() {
        let f = fixture().await;
        let now = Utc::now();
        let due = now - Duration::days(1);
        let task = f
            .repo
            .create(
                NewTask::new("Report")
                    .with_due_date(due)
                    .with_email(email("c@d.com")),
            )
            .await
            .unwrap();

        let outcome = f
            .gate
            .try_mark_and_send(task.id, NotificationKind::Overdue, now)
            .await
            .unwrap();
        assert_eq!(outcome, NotifyOutcome::Delivered);

        let sent = f.mailer.sent();
        assert_eq!(sent[0].subject, "Deadline missed: Report");
        assert!(sent[0].body.contains(&format_timestamp(due)));

        let stored = f.store.get_task(task.id).await.unwrap().unwrap();
        assert!(stored.overdue_notified_at.is_some());
    }

    #[tokio::test]
    async fn delivery_failure_keeps_the_claim() {
        let f = fixture().await;
        f.mailer.set_failing(true);
        let task = completed_task(&f, Some("a@b.com")).await;

        let outcome = f
            .gate
            .try_mark_and_send(task.id, NotificationKind::Completed, Utc::now())
            .await
            .unwrap();
        assert!(matches!(outcome, NotifyOutcome::DeliveryFailed(_)));
        assert!(outcome.was_claimed());

        let stored = f.store.get_task(task.id).await.unwrap().unwrap();
        assert!(stored.completed_notified_at.is_some());

        // Mail is back, but the notification was already claimed.
        f.mailer.set_failing(false);
        let again = f
            .gate
            .try_mark_and_send(task.id, NotificationKind::Completed, Utc::now())
            .await
            .unwrap();
        assert_eq!(again, NotifyOutcome::Skipped(SkipReason::AlreadyNotified));
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn concurrent_triggers_send_once() {
        let f = fixture().await;
        let task_id = completed_task(&f, Some("a@b.com")).await.id;
        let gate = Arc::new(f.gate);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                gate.try_mark_and_send(task_id, NotificationKind::Completed, Utc::now())
                    .await
                    .unwrap()
            }));
        }

        let mut delivered = 0;
        for handle in handles {
            if handle.await.unwrap() == NotifyOutcome::Delivered {
                delivered += 1;
            }
        }
        assert_eq!(delivered, 1);
        assert_eq!(f.mailer.sent().len(), 1);
    }

    #[test]
    fn overdue_eligibility_is_strictly_after_deadline() {
        let now = Utc::now();
        let mut task = Task {
            id: 4,
            title: "Boundary".into(),
            description: None,
            status: TaskStatus::Pending,
            due_date: Some(now),
            created_at: now - Duration::days(1),
            notification_email: Some(email("c@d.com")),
            completed_notified_at: None,
            overdue_notified_at: None,
        };
        assert_eq!(
            eligibility(NotificationKind::Overdue, &task, now),
            Err(SkipReason::NotYetDue)
        );

        task.due_date = Some(now - Duration::microseconds(1));
        assert!(eligibility(NotificationKind::Overdue, &task, now).is_ok());

        task.due_date = None;
        assert_eq!(
            eligibility(NotificationKind::Overdue, &task, now),
            Err(SkipReason::NoDueDate)
        );
    }

    #[test]
    fn overdue_body_without_deadline() {
        let task = Task {
            id: 3,
            title: "Loose end".into(),
            description: None,
            status: TaskStatus::Pending,
            due_date: None,
            created_at: Utc::now(),
            notification_email: None,
            completed_notified_at: None,
            overdue_notified_at: None,
        };
        let (subject, body) = render(NotificationKind::Overdue, &task, Utc::now());
        assert_eq!(subject, "Deadline missed: Loose end");
        assert!(body.ends_with("Deadline: N/A"));
    }
}
