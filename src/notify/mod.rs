//! Lifecycle notifications: mail transport, the claim-then-send gate,
//! the overdue scan, and the deferred dispatch queue.

pub mod dispatch;
pub mod gate;
pub mod mailer;
pub mod scan;

pub use dispatch::{NotificationDispatcher, NotificationRequest, spawn_notification_worker};
pub use gate::{NotificationGate, NotificationKind, NotifyOutcome, SkipReason};
pub use mailer::{MailConfig, Mailer, SmtpMailer};
pub use scan::{OverdueScan, ScanReport};
