//! # qms-notify
//!
//! Notification rules, mail transports, and best-effort dispatch.
//!
//! - [`rules`]: which events produce messages, and the pure reminder evaluation
//! - [`mailer`]: the [`Mailer`] trait with log, outbox, webhook, and in-memory transports
//! - [`dispatcher`]: the [`Notifier`] that queues messages and never fails its caller

pub mod dispatcher;
pub mod error;
pub mod mailer;
pub mod message;
pub mod rules;

pub use dispatcher::{DispatchSnapshot, Notifier};
pub use error::NotifyError;
pub use mailer::{Mailer, MemoryMailer, build_mailer};
pub use message::{Notification, NotificationKind};
pub use rules::{NotificationRules, ReminderCandidate, evaluate_reminders};
