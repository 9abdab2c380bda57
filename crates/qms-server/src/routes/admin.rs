//! Operator endpoints: on-demand reminder sweep and the activity log.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use qms_core::entities::ActivityEntry;
use qms_core::enums::{ActivityAction, EntityType};
use qms_core::responses::SweepReport;
use qms_db::repos::activity::ActivityFilter;

use crate::auth::{ADMIN, Authenticated};
use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/reminders/sweep", post(run_sweep))
        .route("/admin/activity", get(activity))
}

#[derive(Debug, Deserialize)]
struct SweepQuery {
    date: Option<NaiveDate>,
}

async fn run_sweep(
    State(state): State<AppState>,
    caller: Authenticated,
    ApiQuery(query): ApiQuery<SweepQuery>,
) -> Result<Json<SweepReport>, ApiError> {
    caller.require(ADMIN)?;
    let today = query.date.unwrap_or_else(|| chrono::Utc::now().date_naive());
    let report = state.service.run_reminder_sweep(today).await?;
    tracing::info!(
        by = caller.user_id(),
        candidates = report.candidates,
        sent = report.sent,
        failed = report.failed,
        "manual reminder sweep"
    );
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityQuery {
    entity_type: Option<EntityType>,
    entity_id: Option<String>,
    action: Option<ActivityAction>,
    actor_id: Option<String>,
    limit: Option<u32>,
}

async fn activity(
    State(state): State<AppState>,
    caller: Authenticated,
    ApiQuery(query): ApiQuery<ActivityQuery>,
) -> Result<Json<Vec<ActivityEntry>>, ApiError> {
    caller.require(ADMIN)?;
    let filter = ActivityFilter {
        entity_type: query.entity_type,
        entity_id: query.entity_id,
        action: query.action,
        actor_id: query.actor_id,
        limit: Some(query.limit.unwrap_or(state.config.general.default_limit)),
    };
    Ok(Json(state.service.query_activity(&filter).await?))
}
