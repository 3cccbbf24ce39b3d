//! Persistence layer: libSQL-backed storage for tasks and their history.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use traits::{StoreTx, TaskQuery, TaskStore, finish};
