//! Error types for tasktrail.

/// Top-level error for the repository and lifecycle entry points.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Malformed input, rejected before anything reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("title is {length} characters long, at most {max} allowed")]
    TitleTooLong { length: usize, max: usize },

    #[error("invalid email address '{address}': {reason}")]
    InvalidEmail { address: String, reason: String },
}

/// Outbound mail delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Failed to build message: {0}")]
    Message(String),

    #[error("Notification queue closed")]
    QueueClosed,

    #[error("Notification queue full, {deferred} sends already waiting")]
    QueueFull { deferred: usize },
}
