//! libSQL backend: async `TaskStore` implementation.
//!
//! Supports local file and in-memory databases. A single connection is
//! shared behind an async mutex; each transaction holds the lock from
//! `BEGIN IMMEDIATE` until commit or rollback, so units of work never
//! interleave.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, Transaction, TransactionBehavior, params};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{StoreTx, TaskQuery, TaskStore};
use crate::tasks::history::{NewHistoryEntry, TaskEventType, TaskHistoryEntry};
use crate::tasks::model::{NewTask, NotificationEmail, Task, TaskStatus};
use crate::tasks::snapshot::{Snapshot, TaskField, format_timestamp};

/// libSQL task store.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Arc<Mutex<Connection>>,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db)?;
        store.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let store = Self::from_database(db)?;
        store.init_schema().await?;
        Ok(store)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Column list for task SELECT queries (9 columns).
const TASK_COLUMNS: &str = "id, title, description, status, due_date, created_at, notification_email, completed_notified_at, overdue_notified_at";

const HISTORY_COLUMNS: &str =
    "id, task_id, event_type, changed_at, before_data, after_data, changed_fields";

fn opt_timestamp(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(format_timestamp)
}

fn parse_timestamp(column: &str, s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Serialization(format!("{column}: invalid timestamp '{s}': {e}")))
}

/// Read a nullable TEXT column.
fn opt_text(row: &libsql::Row, idx: i32, column: &str) -> Result<Option<String>, DatabaseError> {
    match row
        .get_value(idx)
        .map_err(|e| DatabaseError::Query(format!("{column}: {e}")))?
    {
        libsql::Value::Null => Ok(None),
        libsql::Value::Text(s) => Ok(Some(s)),
        other => Err(DatabaseError::Serialization(format!(
            "{column}: expected text, got {other:?}"
        ))),
    }
}

fn opt_timestamp_col(
    row: &libsql::Row,
    idx: i32,
    column: &str,
) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    opt_text(row, idx, column)?
        .map(|s| parse_timestamp(column, &s))
        .transpose()
}

fn row_to_task(row: &libsql::Row) -> Result<Task, DatabaseError> {
    let id: i64 = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("task.id: {e}")))?;
    let title: String = row
        .get(1)
        .map_err(|e| DatabaseError::Query(format!("task.title: {e}")))?;
    let description = opt_text(row, 2, "task.description")?;

    let status_str: String = row
        .get(3)
        .map_err(|e| DatabaseError::Query(format!("task.status: {e}")))?;
    let status = TaskStatus::parse(&status_str).ok_or_else(|| {
        DatabaseError::Serialization(format!("task.status: unknown value '{status_str}'"))
    })?;

    let due_date = opt_timestamp_col(row, 4, "task.due_date")?;

    let created_at_str: String = row
        .get(5)
        .map_err(|e| DatabaseError::Query(format!("task.created_at: {e}")))?;
    let created_at = parse_timestamp("task.created_at", &created_at_str)?;

    let notification_email = opt_text(row, 6, "task.notification_email")?
        .map(NotificationEmail::parse)
        .transpose()
        .map_err(|e| DatabaseError::Serialization(format!("task.notification_email: {e}")))?;

    Ok(Task {
        id,
        title,
        description,
        status,
        due_date,
        created_at,
        notification_email,
        completed_notified_at: opt_timestamp_col(row, 7, "task.completed_notified_at")?,
        overdue_notified_at: opt_timestamp_col(row, 8, "task.overdue_notified_at")?,
    })
}

fn parse_snapshot(column: &str, raw: Option<String>) -> Result<Option<Snapshot>, DatabaseError> {
    raw.map(|s| serde_json::from_str::<Snapshot>(&s))
        .transpose()
        .map_err(|e| DatabaseError::Serialization(format!("{column}: {e}")))
}

fn row_to_history(row: &libsql::Row) -> Result<TaskHistoryEntry, DatabaseError> {
    let id: i64 = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("history.id: {e}")))?;
    let task_id: i64 = row
        .get(1)
        .map_err(|e| DatabaseError::Query(format!("history.task_id: {e}")))?;

    let event_str: String = row
        .get(2)
        .map_err(|e| DatabaseError::Query(format!("history.event_type: {e}")))?;
    let event_type = TaskEventType::parse(&event_str).ok_or_else(|| {
        DatabaseError::Serialization(format!("history.event_type: unknown value '{event_str}'"))
    })?;

    let changed_at_str: String = row
        .get(3)
        .map_err(|e| DatabaseError::Query(format!("history.changed_at: {e}")))?;
    let changed_at = parse_timestamp("history.changed_at", &changed_at_str)?;

    let before_data = parse_snapshot("history.before_data", opt_text(row, 4, "history.before_data")?)?;
    let after_data = parse_snapshot("history.after_data", opt_text(row, 5, "history.after_data")?)?;

    let changed_fields = match opt_text(row, 6, "history.changed_fields")? {
        Some(raw) => serde_json::from_str::<Vec<TaskField>>(&raw)
            .map_err(|e| DatabaseError::Serialization(format!("history.changed_fields: {e}")))?,
        None => Vec::new(),
    };

    Ok(TaskHistoryEntry {
        id,
        task_id,
        event_type,
        changed_at,
        before_data,
        after_data,
        changed_fields,
    })
}

async fn collect_tasks(mut rows: libsql::Rows, context: &str) -> Result<Vec<Task>, DatabaseError> {
    let mut tasks = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("{context} row: {e}")))?
    {
        tasks.push(row_to_task(&row)?);
    }
    Ok(tasks)
}

async fn fetch_task(conn: &Connection, id: i64) -> Result<Option<Task>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("get_task: {e}")))?;

    match rows.next().await {
        Ok(Some(row)) => Ok(Some(row_to_task(&row)?)),
        Ok(None) => Ok(None),
        Err(e) => Err(DatabaseError::Query(format!("get_task row: {e}"))),
    }
}

fn snapshot_json(column: &str, snapshot: Option<&Snapshot>) -> Result<Option<String>, DatabaseError> {
    snapshot
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| DatabaseError::Serialization(format!("{column}: {e}")))
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl TaskStore for LibSqlStore {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.conn.lock().await;
        migrations::run_migrations(&conn).await
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, DatabaseError> {
        let guard = Arc::clone(&self.conn).lock_owned().await;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(|e| DatabaseError::Query(format!("begin: {e}")))?;
        Ok(Box::new(LibSqlTx { tx, _guard: guard }))
    }

    async fn get_task(&self, id: i64) -> Result<Option<Task>, DatabaseError> {
        let conn = self.conn.lock().await;
        fetch_task(&conn, id).await
    }

    async fn list_tasks(&self, query: TaskQuery) -> Result<Vec<Task>, DatabaseError> {
        let conn = self.conn.lock().await;
        let limit = i64::from(query.limit);
        let offset = i64::from(query.offset);
        let rows = match query.status {
            Some(status) => {
                conn.query(
                    &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE status = ?1 ORDER BY id ASC LIMIT ?2 OFFSET ?3"),
                    params![status.as_str(), limit, offset],
                )
                .await
            }
            None => {
                conn.query(
                    &format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id ASC LIMIT ?1 OFFSET ?2"),
                    params![limit, offset],
                )
                .await
            }
        }
        .map_err(|e| DatabaseError::Query(format!("list_tasks: {e}")))?;

        collect_tasks(rows, "list_tasks").await
    }

    async fn list_overdue_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>, DatabaseError> {
        let conn = self.conn.lock().await;
        // Timestamps are stored in a fixed-width UTC format, so text
        // comparison orders them chronologically.
        let rows = conn
            .query(
                &format!(
                    "SELECT {TASK_COLUMNS} FROM tasks \
                     WHERE due_date IS NOT NULL AND due_date < ?1 \
                     AND status = ?2 \
                     AND notification_email IS NOT NULL \
                     AND overdue_notified_at IS NULL \
                     ORDER BY id ASC"
                ),
                params![format_timestamp(now), TaskStatus::Pending.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_overdue_candidates: {e}")))?;

        collect_tasks(rows, "list_overdue_candidates").await
    }

    async fn list_history(&self, task_id: i64) -> Result<Vec<TaskHistoryEntry>, DatabaseError> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {HISTORY_COLUMNS} FROM task_history WHERE task_id = ?1 ORDER BY id ASC"
                ),
                params![task_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_history: {e}")))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_history row: {e}")))?
        {
            entries.push(row_to_history(&row)?);
        }
        Ok(entries)
    }
}

/// An open `BEGIN IMMEDIATE` transaction plus the connection lock it holds.
struct LibSqlTx {
    tx: Transaction,
    _guard: OwnedMutexGuard<Connection>,
}

#[async_trait]
impl StoreTx for LibSqlTx {
    async fn get_task(&mut self, id: i64) -> Result<Option<Task>, DatabaseError> {
        fetch_task(&self.tx, id).await
    }

    async fn insert_task(
        &mut self,
        task: &NewTask,
        created_at: DateTime<Utc>,
    ) -> Result<Task, DatabaseError> {
        let status = TaskStatus::Pending;
        self.tx
            .execute(
                "INSERT INTO tasks (title, description, status, due_date, created_at, notification_email, completed_notified_at, overdue_notified_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, NULL)",
                params![
                    task.title.as_str(),
                    task.description.as_deref(),
                    status.as_str(),
                    opt_timestamp(task.due_date),
                    format_timestamp(created_at),
                    task.notification_email.as_ref().map(|e| e.as_str()),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_task: {e}")))?;

        let id = self.tx.last_insert_rowid();
        debug!(id, "Task inserted");

        // Re-read so the returned entity carries exactly what was stored.
        fetch_task(&self.tx, id)
            .await?
            .ok_or_else(|| DatabaseError::Query(format!("insert_task: row {id} vanished")))
    }

    async fn update_task(&mut self, task: &Task) -> Result<(), DatabaseError> {
        self.tx
            .execute(
                "UPDATE tasks SET title = ?1, description = ?2, status = ?3, due_date = ?4, notification_email = ?5, completed_notified_at = ?6, overdue_notified_at = ?7 WHERE id = ?8",
                params![
                    task.title.as_str(),
                    task.description.as_deref(),
                    task.status.as_str(),
                    opt_timestamp(task.due_date),
                    task.notification_email.as_ref().map(|e| e.as_str()),
                    opt_timestamp(task.completed_notified_at),
                    opt_timestamp(task.overdue_notified_at),
                    task.id,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_task: {e}")))?;
        Ok(())
    }

    async fn delete_task(&mut self, id: i64) -> Result<bool, DatabaseError> {
        let count = self
            .tx
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_task: {e}")))?;
        Ok(count > 0)
    }

    async fn insert_history(&mut self, entry: &NewHistoryEntry) -> Result<i64, DatabaseError> {
        let before = snapshot_json("before_data", entry.before_data.as_ref())?;
        let after = snapshot_json("after_data", entry.after_data.as_ref())?;
        let fields = serde_json::to_string(&entry.changed_fields)
            .map_err(|e| DatabaseError::Serialization(format!("changed_fields: {e}")))?;

        self.tx
            .execute(
                "INSERT INTO task_history (task_id, event_type, changed_at, before_data, after_data, changed_fields)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.task_id,
                    entry.event_type.as_str(),
                    format_timestamp(entry.changed_at),
                    before,
                    after,
                    fields,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_history: {e}")))?;
        Ok(self.tx.last_insert_rowid())
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        let LibSqlTx { tx, _guard } = *self;
        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("commit: {e}")))
    }

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
        let LibSqlTx { tx, _guard } = *self;
        tx.rollback()
            .await
            .map_err(|e| DatabaseError::Query(format!("rollback: {e}")))
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    async fn test_store() -> LibSqlStore {
        LibSqlStore::new_memory().await.unwrap()
    }

    async fn insert(store: &LibSqlStore, task: NewTask) -> Task {
        let mut tx = store.begin().await.unwrap();
        let task = tx.insert_task(&task, Utc::now()).await.unwrap();
        tx.commit().await.unwrap();
        task
    }

    fn email(s: &str) -> NotificationEmail {
        NotificationEmail::parse(s).unwrap()
    }

    #[tokio::test]
    async fn insert_and_get() {
        let store = test_store().await;
        let due = Utc::now() + Duration::days(3);
        let created = insert(
            &store,
            NewTask::new("Pay rent")
                .with_description("Landlord")
                .with_due_date(due)
                .with_email(email("a@b.com")),
        )
        .await;

        let fetched = store.get_task(created.id).await.unwrap().expect("task should exist");
        assert_eq!(fetched, created);
        assert_eq!(fetched.title, "Pay rent");
        assert_eq!(fetched.description.as_deref(), Some("Landlord"));
        assert_eq!(fetched.status, TaskStatus::Pending);
        assert_eq!(
            fetched.due_date.map(format_timestamp),
            Some(format_timestamp(due))
        );
        assert_eq!(fetched.notification_email, Some(email("a@b.com")));
        assert!(fetched.completed_notified_at.is_none());
        assert!(fetched.overdue_notified_at.is_none());
    }

    #[tokio::test]
    async fn ids_are_store_assigned_and_increasing() {
        let store = test_store().await;
        let a = insert(&store, NewTask::new("A")).await;
        let b = insert(&store, NewTask::new("B")).await;
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn get_not_found() {
        let store = test_store().await;
        assert!(store.get_task(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_in_insertion_order_with_window_and_filter() {
        let store = test_store().await;
        for title in ["one", "two", "three", "four"] {
            insert(&store, NewTask::new(title)).await;
        }
        let mut tx = store.begin().await.unwrap();
        let mut second = tx.get_task(2).await.unwrap().unwrap();
        second.status = TaskStatus::Completed;
        tx.update_task(&second).await.unwrap();
        tx.commit().await.unwrap();

        let all = store.list_tasks(TaskQuery::default()).await.unwrap();
        let titles: Vec<_> = all.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["one", "two", "three", "four"]);

        let window = store
            .list_tasks(TaskQuery { offset: 1, limit: 2, status: None })
            .await
            .unwrap();
        let titles: Vec<_> = window.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["two", "three"]);

        let done = store
            .list_tasks(TaskQuery { status: Some(TaskStatus::Completed), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].title, "two");

        let pending = store
            .list_tasks(TaskQuery { status: Some(TaskStatus::Pending), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(pending.len(), 3);
    }

    #[tokio::test]
    async fn update_persists_all_mutable_columns() {
        let store = test_store().await;
        let mut task = insert(&store, NewTask::new("Original").with_description("d")).await;

        let now = Utc::now();
        task.title = "Updated".into();
        task.description = None;
        task.status = TaskStatus::Completed;
        task.notification_email = Some(email("x@y.org"));
        task.completed_notified_at = Some(now);

        let mut tx = store.begin().await.unwrap();
        tx.update_task(&task).await.unwrap();
        tx.commit().await.unwrap();

        let fetched = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Updated");
        assert!(fetched.description.is_none());
        assert_eq!(fetched.status, TaskStatus::Completed);
        assert_eq!(fetched.notification_email, Some(email("x@y.org")));
        assert_eq!(
            fetched.completed_notified_at.map(format_timestamp),
            Some(format_timestamp(now))
        );
        assert_eq!(fetched.created_at, task.created_at);
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = test_store().await;
        let task = insert(&store, NewTask::new("Delete me")).await;

        let mut tx = store.begin().await.unwrap();
        assert!(tx.delete_task(task.id).await.unwrap());
        assert!(!tx.delete_task(task.id).await.unwrap());
        tx.commit().await.unwrap();

        assert!(store.get_task(task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let store = test_store().await;
        let mut tx = store.begin().await.unwrap();
        let task = tx.insert_task(&NewTask::new("Ghost"), Utc::now()).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(store.get_task(task.id).await.unwrap().is_none());
        // The connection is usable again after rollback.
        insert(&store, NewTask::new("Real")).await;
        assert_eq!(store.list_tasks(TaskQuery::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn overdue_candidates_filter() {
        let store = test_store().await;
        let now = Utc::now();
        let yesterday = now - Duration::days(1);
        let tomorrow = now + Duration::days(1);

        let due = insert(
            &store,
            NewTask::new("due").with_due_date(yesterday).with_email(email("c@d.com")),
        )
        .await;
        insert(&store, NewTask::new("future").with_due_date(tomorrow).with_email(email("c@d.com"))).await;
        insert(&store, NewTask::new("no email").with_due_date(yesterday)).await;
        insert(&store, NewTask::new("no due date").with_email(email("c@d.com"))).await;

        let mut done = insert(
            &store,
            NewTask::new("completed").with_due_date(yesterday).with_email(email("c@d.com")),
        )
        .await;
        let mut notified = insert(
            &store,
            NewTask::new("notified").with_due_date(yesterday).with_email(email("c@d.com")),
        )
        .await;
        done.status = TaskStatus::Completed;
        notified.overdue_notified_at = Some(now);
        let mut tx = store.begin().await.unwrap();
        tx.update_task(&done).await.unwrap();
        tx.update_task(&notified).await.unwrap();
        tx.commit().await.unwrap();

        let candidates = store.list_overdue_candidates(now).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, due.id);

        // Strictly before: a task due exactly now is not yet overdue.
        let exact = store.list_overdue_candidates(yesterday).await.unwrap();
        assert!(exact.is_empty());
    }

    #[tokio::test]
    async fn history_roundtrip_and_survives_delete() {
        let store = test_store().await;
        let task = insert(&store, NewTask::new("Tracked")).await;
        let snap = crate::tasks::snapshot::snapshot(&task);

        let mut tx = store.begin().await.unwrap();
        let entry = NewHistoryEntry {
            task_id: task.id,
            event_type: TaskEventType::Deleted,
            changed_at: Utc::now(),
            before_data: Some(snap.clone()),
            after_data: None,
            changed_fields: vec![TaskField::Title, TaskField::Status],
        };
        let history_id = tx.insert_history(&entry).await.unwrap();
        tx.delete_task(task.id).await.unwrap();
        tx.commit().await.unwrap();

        let history = store.list_history(task.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, history_id);
        assert_eq!(history[0].event_type, TaskEventType::Deleted);
        assert_eq!(history[0].before_data.as_ref(), Some(&snap));
        assert!(history[0].after_data.is_none());
        assert_eq!(history[0].changed_fields, vec![TaskField::Title, TaskField::Status]);
    }

    #[tokio::test]
    async fn transactions_serialize() {
        let store = Arc::new(test_store().await);
        let task_id = insert(&store, NewTask::new("Counter")).await.id;

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let mut tx = store.begin().await.unwrap();
                let mut t = tx.get_task(task_id).await.unwrap().unwrap();
                t.title = format!("{}+{i}", t.title);
                tx.update_task(&t).await.unwrap();
                tx.commit().await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Each writer saw the previous writer's result: no lost updates.
        let title = store.get_task(task_id).await.unwrap().unwrap().title;
        assert_eq!(title.matches('+').count(), 8);
    }

    #[tokio::test]
    async fn new_local_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("dir").join("tasks.db");
        let store = LibSqlStore::new_local(&db_path).await.unwrap();
        assert!(db_path.exists());
        insert(&store, NewTask::new("On disk")).await;
        drop(store);

        let reopened = LibSqlStore::new_local(&db_path).await.unwrap();
        let tasks = reopened.list_tasks(TaskQuery::default()).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "On disk");
    }
}
