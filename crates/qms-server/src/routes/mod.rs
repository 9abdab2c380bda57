//! HTTP surface. Every route except `/health` requires a caller identity.

mod admin;
mod audits;
mod catalog;
mod dashboard;
mod documents;
mod nc;
mod reports;
mod users;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::state::AppState;

/// Assemble the full router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(nc::routes())
        .merge(audits::routes())
        .merge(catalog::routes())
        .merge(documents::routes())
        .merge(dashboard::routes())
        .merge(users::routes())
        .merge(admin::routes())
        .merge(reports::routes())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let stats = state.service.notifier().stats();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "notifications": {
            "enabled": state.service.notifier().is_enabled(),
            "queued": stats.queued,
            "sent": stats.sent,
            "failed": stats.failed,
            "dropped": stats.dropped,
        }
    }))
}
