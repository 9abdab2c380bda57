//! Notification error types.
//!
//! These never reach the caller of a domain operation: the dispatcher logs
//! them and moves on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    /// The transport refused or could not deliver the message.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Writing to the outbox failed.
    #[error("Outbox I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The webhook request failed.
    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The dispatch queue is full or its worker has stopped.
    #[error("Notification queue unavailable: {0}")]
    QueueClosed(String),

    /// The mail configuration cannot produce a transport.
    #[error("Mail transport not configured: {0}")]
    NotConfigured(String),
}
