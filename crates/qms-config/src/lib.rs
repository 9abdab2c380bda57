//! # qms-config
//!
//! Layered configuration loading for the QMS backend using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`QMS_*` prefix, `__` as separator)
//! 2. Project-level `.qms/config.toml`
//! 3. User-level `~/.config/qms/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `QMS_DATABASE__PATH` -> `database.path`,
//! `QMS_NOTIFICATIONS__REMINDER_DAYS_BEFORE_DUE` -> `notifications.reminder_days_before_due`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use qms_config::QmsConfig;
//!
//! let config = QmsConfig::load_with_dotenv().expect("config");
//! config.validate().expect("valid config");
//! println!("listening on {}", config.server.bind);
//! ```

mod database;
mod error;
mod general;
mod mail;
mod notifications;
mod server;

pub use database::DatabaseConfig;
pub use error::ConfigError;
pub use general::GeneralConfig;
pub use mail::{MailConfig, MailTransport};
pub use notifications::NotificationsConfig;
pub use server::ServerConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QmsConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub general: GeneralConfig,
}

impl QmsConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy`; use [`Self::load_with_dotenv`] for `.env` support.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Figment` if a source cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment().extract().map_err(ConfigError::from)
    }

    /// Load configuration with `.env` file support from the current directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Figment` if a source cannot be parsed.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    /// Load with an explicit TOML file layered above the project config.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Figment` if a source cannot be parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::figment_with(Some(path))
            .extract()
            .map_err(ConfigError::from)
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment directly or add providers on top.
    #[must_use]
    pub fn figment() -> Figment {
        Self::figment_with(None)
    }

    fn figment_with(explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = PathBuf::from(".qms/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        if let Some(path) = explicit {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed("QMS_").split("__"))
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("qms").join("config.toml"))
    }

    /// Reject combinations the runtime cannot honour.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.mail.is_configured() {
            let field = match self.mail.transport {
                MailTransport::Outbox => "mail.outbox_dir",
                MailTransport::Webhook => "mail.webhook_url",
                MailTransport::Log => "mail.transport",
            };
            return Err(ConfigError::InvalidValue {
                field: field.into(),
                reason: format!("required by the {:?} transport", self.mail.transport),
            });
        }
        if self.notifications.sweep_interval_hours == 0 {
            return Err(ConfigError::InvalidValue {
                field: "notifications.sweep_interval_hours".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.notifications.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "notifications.queue_capacity".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database.path".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Render` if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
