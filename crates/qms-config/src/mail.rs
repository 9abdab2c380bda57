//! Mail transport configuration.

use serde::{Deserialize, Serialize};

/// How outgoing notifications leave the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MailTransport {
    /// Write messages to the log only.
    #[default]
    Log,
    /// Append messages to a JSONL outbox file for an external relay.
    Outbox,
    /// POST messages as JSON to an HTTP endpoint.
    Webhook,
}

fn default_from() -> String {
    "qms@localhost".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailConfig {
    #[serde(default)]
    pub transport: MailTransport,

    /// Sender address stamped on every message.
    #[serde(default = "default_from")]
    pub from: String,

    /// Directory holding `outbox.jsonl` (outbox transport).
    #[serde(default)]
    pub outbox_dir: String,

    /// Endpoint receiving messages (webhook transport).
    #[serde(default)]
    pub webhook_url: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            transport: MailTransport::default(),
            from: default_from(),
            outbox_dir: String::new(),
            webhook_url: String::new(),
        }
    }
}

impl MailConfig {
    /// Whether the selected transport has what it needs.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        match self.transport {
            MailTransport::Log => true,
            MailTransport::Outbox => !self.outbox_dir.is_empty(),
            MailTransport::Webhook => !self.webhook_url.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_transport_needs_nothing() {
        assert!(MailConfig::default().is_configured());
    }

    #[test]
    fn outbox_requires_dir() {
        let mut config = MailConfig {
            transport: MailTransport::Outbox,
            ..Default::default()
        };
        assert!(!config.is_configured());
        config.outbox_dir = "./outbox".into();
        assert!(config.is_configured());
    }

    #[test]
    fn webhook_requires_url() {
        let config = MailConfig {
            transport: MailTransport::Webhook,
            ..Default::default()
        };
        assert!(!config.is_configured());
    }
}
