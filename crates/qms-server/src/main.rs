use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

mod auth;
mod bootstrap;
mod cli;
mod error;
mod extract;
mod routes;
mod scheduler;
mod state;

use cli::{Cli, Commands, ConfigCommands};
use state::AppState;

const NOTIFIER_DRAIN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("qmsd error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let config = bootstrap::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Config { action } => match action {
            ConfigCommands::Show => {
                print!("{}", config.to_toml_string()?);
                Ok(())
            }
            ConfigCommands::Check => {
                println!("configuration ok");
                Ok(())
            }
        },
        Commands::Sweep { date } => {
            let (notifier, worker) = bootstrap::build_notifier(&config)?;
            let service = bootstrap::open_service(&config, notifier).await?;
            let today = date.unwrap_or_else(|| chrono::Utc::now().date_naive());
            let report = service
                .run_reminder_sweep(today)
                .await
                .context("reminder sweep failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            // The sweep sends directly, so the queue worker has nothing left to drain.
            if let Some(worker) = worker {
                worker.abort();
            }
            Ok(())
        }
        Commands::Serve { bind } => serve(config, bind).await,
    }
}

async fn serve(mut config: qms_config::QmsConfig, bind: Option<String>) -> anyhow::Result<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    let (notifier, worker) = bootstrap::build_notifier(&config)?;
    let service = bootstrap::open_service(&config, notifier).await?;
    let state = AppState::new(service, config);

    let sweeper = state.config.notifications.sweep_enabled.then(|| {
        scheduler::spawn_reminder_sweep(
            Arc::clone(&state.service),
            state.config.notifications.sweep_interval_hours,
        )
    });

    let listener = tokio::net::TcpListener::bind(&state.config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", state.config.server.bind))?;
    tracing::info!(addr = %state.config.server.bind, "qmsd listening");

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
        // The aborted task still owns a service handle until it is polled to completion.
        let _ = sweeper.await;
    }
    bootstrap::drain_notifier(worker, NOTIFIER_DRAIN_GRACE).await;
    tracing::info!("qmsd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("QMS_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
