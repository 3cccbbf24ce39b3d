//! Tasks: the data model, snapshots, audit trail, repository, lifecycle
//! orchestration, and the REST routes on top.

pub mod history;
pub mod lifecycle;
pub mod model;
pub mod repository;
pub mod routes;
pub mod snapshot;

pub use history::{AuditRecorder, TaskEventType, TaskHistoryEntry};
pub use lifecycle::{TaskLifecycle, spawn_overdue_ticker};
pub use model::{Field, NewTask, NotificationEmail, Task, TaskPatch, TaskStatus};
pub use repository::TaskRepository;
pub use routes::task_routes;
pub use snapshot::{Snapshot, TaskField};
