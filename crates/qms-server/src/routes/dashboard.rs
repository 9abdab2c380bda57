//! Dashboard metrics.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use qms_core::responses::{Breakdown, ComplianceReport, DashboardMetrics, TrendPoint};

use crate::auth::{ADMIN, Authenticated, STAFF};
use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/admin", get(admin_metrics))
        .route("/dashboard/compliance", get(compliance))
        .route("/dashboard/nc-status", get(nc_status))
        .route("/dashboard/nc-severity", get(nc_severity))
        .route("/dashboard/audits-status", get(audits_status))
        .route("/dashboard/audits-department", get(audits_department))
        .route("/dashboard/nc-trend", get(nc_trend))
}

fn today() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}

async fn admin_metrics(
    State(state): State<AppState>,
    caller: Authenticated,
) -> Result<Json<DashboardMetrics>, ApiError> {
    caller.require(ADMIN)?;
    let months = i64::from(state.config.general.trend_months);
    Ok(Json(state.service.admin_metrics(today(), months).await?))
}

async fn compliance(
    State(state): State<AppState>,
    caller: Authenticated,
) -> Result<Json<ComplianceReport>, ApiError> {
    caller.require(STAFF)?;
    Ok(Json(state.service.compute_compliance().await?))
}

async fn nc_status(
    State(state): State<AppState>,
    caller: Authenticated,
) -> Result<Json<Breakdown>, ApiError> {
    caller.require(STAFF)?;
    Ok(Json(state.service.ncs_by_status().await?))
}

async fn nc_severity(
    State(state): State<AppState>,
    caller: Authenticated,
) -> Result<Json<Breakdown>, ApiError> {
    caller.require(STAFF)?;
    Ok(Json(state.service.ncs_by_severity().await?))
}

async fn audits_status(
    State(state): State<AppState>,
    caller: Authenticated,
) -> Result<Json<Breakdown>, ApiError> {
    caller.require(STAFF)?;
    Ok(Json(state.service.audits_by_status().await?))
}

async fn audits_department(
    State(state): State<AppState>,
    caller: Authenticated,
) -> Result<Json<Breakdown>, ApiError> {
    caller.require(STAFF)?;
    Ok(Json(state.service.audits_by_department().await?))
}

#[derive(Debug, Deserialize)]
struct TrendQuery {
    months: Option<i64>,
}

/// Out-of-range `months` values are clamped, not rejected.
async fn nc_trend(
    State(state): State<AppState>,
    caller: Authenticated,
    ApiQuery(query): ApiQuery<TrendQuery>,
) -> Result<Json<Vec<TrendPoint>>, ApiError> {
    caller.require(STAFF)?;
    let months = query
        .months
        .unwrap_or_else(|| i64::from(state.config.general.trend_months));
    Ok(Json(state.service.nc_monthly_trend(today(), months).await?))
}
