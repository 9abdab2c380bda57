//! Mail transports.
//!
//! A [`Mailer`] delivers one [`Notification`]. The dispatcher owns the retry
//! and failure policy, so transports just report what happened.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use qms_config::{MailConfig, MailTransport};

use crate::error::NotifyError;
use crate::message::{Notification, NotificationKind};

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Short transport name for log lines.
    fn name(&self) -> &'static str;

    /// Deliver one message.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError` if the transport rejects or cannot deliver the message.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// The on-disk and on-wire envelope of a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailEnvelope {
    pub from: String,
    pub to: String,
    pub kind: NotificationKind,
    pub subject: String,
    pub body: String,
    pub queued_at: DateTime<Utc>,
}

impl MailEnvelope {
    fn new(from: &str, notification: &Notification) -> Self {
        Self {
            from: from.to_string(),
            to: notification.to.clone(),
            kind: notification.kind,
            subject: notification.subject.clone(),
            body: notification.body.clone(),
            queued_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// LogMailer
// ---------------------------------------------------------------------------

/// Writes messages to the tracing log. Development default.
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    #[must_use]
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            from = %self.from,
            to = %notification.to,
            kind = ?notification.kind,
            subject = %notification.subject,
            "mail"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// OutboxMailer
// ---------------------------------------------------------------------------

/// Appends each message as one JSON line to `{dir}/outbox.jsonl`.
#[derive(Debug, Clone)]
pub struct OutboxMailer {
    from: String,
    path: PathBuf,
}

impl OutboxMailer {
    /// Create an outbox writer, creating `dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Io` if the directory cannot be created.
    pub fn new(from: impl Into<String>, dir: &Path) -> Result<Self, NotifyError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            from: from.into(),
            path: dir.join("outbox.jsonl"),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every envelope written so far.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Io` if the file cannot be read or a line is malformed.
    pub fn read_all(&self) -> Result<Vec<MailEnvelope>, NotifyError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let envelopes = serde_jsonlines::json_lines(&self.path)?.collect::<Result<Vec<_>, _>>()?;
        Ok(envelopes)
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    fn name(&self) -> &'static str {
        "outbox"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let envelope = MailEnvelope::new(&self.from, notification);
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || serde_jsonlines::append_json_lines(&path, [envelope]))
            .await
            .map_err(|e| NotifyError::Transport(format!("outbox writer panicked: {e}")))??;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// WebhookMailer
// ---------------------------------------------------------------------------

/// POSTs each envelope as JSON to a relay URL.
#[derive(Debug, Clone)]
pub struct WebhookMailer {
    from: String,
    url: String,
    client: reqwest::Client,
}

impl WebhookMailer {
    #[must_use]
    pub fn new(from: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Mailer for WebhookMailer {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let envelope = MailEnvelope::new(&self.from, notification);
        let resp = self.client.post(&self.url).json(&envelope).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Transport(format!("HTTP {status}: {body}")));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryMailer
// ---------------------------------------------------------------------------

/// Keeps delivered messages in memory. Used for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
        Ok(())
    }
}

/// Build the transport selected by `config.transport`.
///
/// # Errors
///
/// Returns `NotifyError::NotConfigured` if the selected transport lacks its
/// target, or `NotifyError::Io` if the outbox directory cannot be created.
pub fn build_mailer(config: &MailConfig) -> Result<Arc<dyn Mailer>, NotifyError> {
    match config.transport {
        MailTransport::Log => Ok(Arc::new(LogMailer::new(config.from.clone()))),
        MailTransport::Outbox => {
            if config.outbox_dir.trim().is_empty() {
                return Err(NotifyError::NotConfigured("mail.outbox_dir is empty".into()));
            }
            let mailer = OutboxMailer::new(config.from.clone(), Path::new(&config.outbox_dir))?;
            Ok(Arc::new(mailer))
        }
        MailTransport::Webhook => {
            if config.webhook_url.trim().is_empty() {
                return Err(NotifyError::NotConfigured("mail.webhook_url is not set".into()));
            }
            Ok(Arc::new(WebhookMailer::new(
                config.from.clone(),
                config.webhook_url.clone(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Notification {
        Notification::nc_assigned("owner@example.com", "ncr-00000001", "Calibration lapsed", "HIGH")
    }

    #[tokio::test]
    async fn outbox_appends_json_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let mailer = OutboxMailer::new("qms@example.com", &dir.path().join("mail")).unwrap();

        mailer.send(&sample()).await.unwrap();
        mailer.send(&sample()).await.unwrap();

        let envelopes = mailer.read_all().unwrap();
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].from, "qms@example.com");
        assert_eq!(envelopes[0].to, "owner@example.com");
        assert_eq!(envelopes[1].kind, NotificationKind::NcAssigned);
    }

    #[tokio::test]
    async fn memory_mailer_records_messages() {
        let mailer = MemoryMailer::new();
        mailer.send(&sample()).await.unwrap();
        assert_eq!(mailer.sent(), vec![sample()]);
    }

    #[test]
    fn build_mailer_rejects_webhook_without_url() {
        let config = MailConfig {
            transport: MailTransport::Webhook,
            ..MailConfig::default()
        };
        let err = build_mailer(&config).err().unwrap();
        assert!(matches!(err, NotifyError::NotConfigured(_)));
    }

    #[test]
    fn build_mailer_defaults_to_log() {
        let mailer = build_mailer(&MailConfig::default()).unwrap();
        assert_eq!(mailer.name(), "log");
    }
}
