//! Startup wiring: configuration, mail transport, notifier, service.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;

use qms_config::QmsConfig;
use qms_db::service::QmsService;
use qms_notify::{Notifier, build_mailer};

/// Load and validate configuration, with `.env` support.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<QmsConfig> {
    let config = match explicit {
        Some(path) => {
            let _ = dotenvy::dotenv();
            QmsConfig::load_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?
        }
        None => QmsConfig::load_with_dotenv().context("failed to load configuration")?,
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Build the notifier described by `[mail]` and `[notifications]`.
///
/// Returns the worker handle when a queue was started.
pub fn build_notifier(config: &QmsConfig) -> anyhow::Result<(Notifier, Option<JoinHandle<()>>)> {
    if !config.notifications.enabled {
        tracing::info!("notifications disabled");
        return Ok((Notifier::disabled(), None));
    }
    let mailer = build_mailer(&config.mail).context("failed to set up mail transport")?;
    tracing::info!(transport = mailer.name(), "notifications enabled");
    let (notifier, worker) = Notifier::start(mailer, config.notifications.queue_capacity);
    Ok((notifier, Some(worker)))
}

/// Open the database and assemble the service.
pub async fn open_service(
    config: &QmsConfig,
    notifier: Notifier,
) -> anyhow::Result<QmsService> {
    QmsService::from_config(config, notifier)
        .await
        .with_context(|| format!("failed to open database at {}", config.database.path))
}

/// Wait up to `grace` for the notifier worker to flush its queue. The worker
/// only finishes once every `Notifier` clone is gone, so drop the service
/// first. Returns `false` when messages may have been left undelivered.
pub async fn drain_notifier(worker: Option<JoinHandle<()>>, grace: Duration) -> bool {
    let Some(worker) = worker else {
        return true;
    };
    match tokio::time::timeout(grace, worker).await {
        Ok(Ok(())) => true,
        Ok(Err(error)) => {
            tracing::error!(%error, "notification worker failed");
            false
        }
        Err(_) => {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                "notification queue not drained before shutdown, pending messages dropped"
            );
            false
        }
    }
}
