//! tasktrail: task lifecycle engine with an audit trail and
//! exactly-once-marked email notifications.

pub mod config;
pub mod error;
pub mod notify;
pub mod store;
pub mod tasks;
