//! Non-conformity, corrective-action, and RCA endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;

use qms_core::entities::{CorrectiveAction, NonConformity, RcaStep, RcaStepInput};
use qms_core::enums::{ActionStatus, NcStatus, Role, Severity};
use qms_core::responses::NcView;
use qms_db::error::DatabaseError;
use qms_db::repos::nc::{NcFilter, NewNc};
use qms_db::updates::nc::NcUpdateBuilder;

use crate::auth::{AUDIT_MANAGERS, Authenticated, REVIEWERS, STAFF};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiJsonOrDefault, ApiPath, ApiQuery};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/nc", post(create_nc).get(list_ncs))
        .route("/nc/overdue", get(list_overdue))
        .route("/nc/audit/:audit_id", get(list_for_audit))
        .route("/nc/assignee/:user_id", get(list_for_assignee))
        .route("/nc/severity/:severity", get(list_by_severity))
        .route("/nc/actions/:action_id/status", patch(update_action_status))
        .route("/nc/actions/:action_id/approval", post(review_action))
        .route("/nc/:id", get(get_nc).patch(update_nc))
        .route("/nc/:id/status", patch(update_nc_status))
        .route("/nc/:id/actions", post(add_action).get(list_actions))
        .route("/nc/:id/rca", post(submit_rca).get(list_rca))
        .route("/nc/:id/close", post(close_nc))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateNcBody {
    audit_id: String,
    instance_id: Option<String>,
    clause_id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    severity: Option<Severity>,
    #[serde(default)]
    assigned_to_id: String,
    created_by_id: Option<String>,
}

async fn create_nc(
    State(state): State<AppState>,
    caller: Authenticated,
    ApiJson(body): ApiJson<CreateNcBody>,
) -> Result<(StatusCode, Json<NonConformity>), ApiError> {
    caller.require(AUDIT_MANAGERS)?;
    let created_by = body.created_by_id.as_deref().unwrap_or(caller.user_id());
    let input = NewNc {
        audit_id: &body.audit_id,
        title: &body.title,
        description: &body.description,
        severity: body.severity,
        assigned_to: &body.assigned_to_id,
        created_by: Some(created_by),
        instance_id: body.instance_id.as_deref(),
        clause_id: body.clause_id.as_deref(),
    };
    let nc = state
        .service
        .create_nc(&input, Some(caller.user_id()))
        .await?;
    Ok((StatusCode::CREATED, Json(nc)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListNcQuery {
    status: Option<NcStatus>,
    severity: Option<Severity>,
    audit_id: Option<String>,
    assignee_id: Option<String>,
    limit: Option<u32>,
}

async fn list_ncs(
    State(state): State<AppState>,
    caller: Authenticated,
    ApiQuery(query): ApiQuery<ListNcQuery>,
) -> Result<Json<Vec<NonConformity>>, ApiError> {
    caller.require(STAFF)?;
    let filter = NcFilter {
        status: query.status,
        severity: query.severity,
        audit_id: query.audit_id,
        assignee_id: query.assignee_id,
        limit: Some(query.limit.unwrap_or(state.config.general.default_limit)),
    };
    Ok(Json(state.service.list_ncs(&filter).await?))
}

async fn list_overdue(
    State(state): State<AppState>,
    caller: Authenticated,
) -> Result<Json<Vec<NonConformity>>, ApiError> {
    caller.require(STAFF)?;
    let today = chrono::Utc::now().date_naive();
    Ok(Json(state.service.list_overdue_ncs(today).await?))
}

async fn list_for_audit(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(audit_id): Path<String>,
) -> Result<Json<Vec<NonConformity>>, ApiError> {
    caller.require(STAFF)?;
    Ok(Json(state.service.list_ncs_for_audit(&audit_id).await?))
}

#[derive(Debug, Deserialize)]
struct AssigneeQuery {
    status: Option<NcStatus>,
}

async fn list_for_assignee(
    State(state): State<AppState>,
    _caller: Authenticated,
    Path(user_id): Path<String>,
    ApiQuery(query): ApiQuery<AssigneeQuery>,
) -> Result<Json<Vec<NonConformity>>, ApiError> {
    Ok(Json(
        state
            .service
            .list_ncs_for_assignee(&user_id, query.status)
            .await?,
    ))
}

async fn list_by_severity(
    State(state): State<AppState>,
    caller: Authenticated,
    ApiPath(severity): ApiPath<Severity>,
) -> Result<Json<Vec<NonConformity>>, ApiError> {
    caller.require(STAFF)?;
    Ok(Json(state.service.list_ncs_by_severity(severity).await?))
}

async fn get_nc(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<NcView>, ApiError> {
    require_role_or_assignee(&state, &caller, STAFF, &id).await?;
    Ok(Json(state.service.get_nc_view(&id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateNcBody {
    title: Option<String>,
    description: Option<String>,
    severity: Option<Severity>,
    assigned_to_id: Option<String>,
}

async fn update_nc(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateNcBody>,
) -> Result<Json<NcView>, ApiError> {
    caller.require(AUDIT_MANAGERS)?;
    let mut update = NcUpdateBuilder::new();
    if let Some(title) = body.title {
        update = update.title(title);
    }
    if let Some(description) = body.description {
        update = update.description(description);
    }
    if let Some(severity) = body.severity {
        update = update.severity(severity);
    }
    if let Some(user_id) = body.assigned_to_id {
        update = update.assigned_to(user_id);
    }
    let view = state
        .service
        .update_nc(&id, update.build(), Some(caller.user_id()))
        .await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
struct StatusBody<T> {
    status: T,
}

async fn update_nc_status(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StatusBody<NcStatus>>,
) -> Result<Json<NcView>, ApiError> {
    caller.require(AUDIT_MANAGERS)?;
    let view = state
        .service
        .update_nc_status(&id, body.status, Some(caller.user_id()))
        .await?;
    Ok(Json(view))
}

/// Holders of `roles` pass without the NC being read. Anyone else must be
/// its assignee, and an unknown NC is a 403 for them rather than a 404, so
/// ids stay hidden.
async fn require_role_or_assignee(
    state: &AppState,
    caller: &Authenticated,
    roles: &[Role],
    nc_id: &str,
) -> Result<(), ApiError> {
    if caller.0.has_any_role(roles) {
        return Ok(());
    }
    match state.service.get_nc(nc_id).await {
        Ok(nc) => caller.require_or_owner(roles, &nc.assigned_to),
        Err(DatabaseError::NotFound { .. }) => caller.require(roles),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddActionBody {
    #[serde(default)]
    description: String,
    #[serde(default)]
    responsible_id: String,
    due_date: Option<chrono::NaiveDate>,
}

async fn add_action(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AddActionBody>,
) -> Result<(StatusCode, Json<NcView>), ApiError> {
    require_role_or_assignee(&state, &caller, AUDIT_MANAGERS, &id).await?;
    let view = state
        .service
        .add_corrective_action(
            &id,
            &body.description,
            &body.responsible_id,
            body.due_date,
            Some(caller.user_id()),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_actions(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Vec<CorrectiveAction>>, ApiError> {
    require_role_or_assignee(&state, &caller, STAFF, &id).await?;
    state.service.get_nc(&id).await?;
    Ok(Json(state.service.list_actions_for_nc(&id).await?))
}

async fn update_action_status(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(action_id): Path<String>,
    ApiJson(body): ApiJson<StatusBody<ActionStatus>>,
) -> Result<Json<NcView>, ApiError> {
    if !caller.0.has_any_role(AUDIT_MANAGERS) {
        match state.service.get_action(&action_id).await {
            Ok(action) => caller.require_or_owner(AUDIT_MANAGERS, &action.responsible_id)?,
            Err(DatabaseError::NotFound { .. }) => caller.require(AUDIT_MANAGERS)?,
            Err(e) => return Err(e.into()),
        }
    }
    let view = state
        .service
        .update_action_status(&action_id, body.status, Some(caller.user_id()))
        .await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewBody {
    reviewer_id: Option<String>,
    approved: bool,
    comments: Option<String>,
}

async fn review_action(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(action_id): Path<String>,
    ApiJson(body): ApiJson<ReviewBody>,
) -> Result<Json<NcView>, ApiError> {
    caller.require(REVIEWERS)?;
    let reviewer_id = body.reviewer_id.as_deref().unwrap_or(caller.user_id());
    let view = state
        .service
        .review_action(
            &action_id,
            reviewer_id,
            body.approved,
            body.comments.as_deref(),
            Some(caller.user_id()),
        )
        .await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RcaStepBody {
    step_number: u32,
    #[serde(default)]
    why_text: String,
}

#[derive(Debug, Deserialize)]
struct RcaBody {
    steps: Vec<RcaStepBody>,
}

async fn submit_rca(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<RcaBody>,
) -> Result<Json<NcView>, ApiError> {
    require_role_or_assignee(&state, &caller, AUDIT_MANAGERS, &id).await?;
    let steps: Vec<RcaStepInput> = body
        .steps
        .into_iter()
        .map(|s| RcaStepInput::new(s.step_number, s.why_text))
        .collect();
    let view = state
        .service
        .submit_rca(&id, &steps, Some(caller.user_id()))
        .await?;
    Ok(Json(view))
}

async fn list_rca(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Vec<RcaStep>>, ApiError> {
    require_role_or_assignee(&state, &caller, STAFF, &id).await?;
    state.service.get_nc(&id).await?;
    Ok(Json(state.service.list_rca_steps(&id).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloseBody {
    #[serde(default)]
    final_evidence_ids: Vec<String>,
    reviewer_comment: Option<String>,
}

async fn close_nc(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
    ApiJsonOrDefault(body): ApiJsonOrDefault<CloseBody>,
) -> Result<Json<NcView>, ApiError> {
    caller.require(STAFF)?;
    let view = state
        .service
        .close_nc(
            &id,
            &body.final_evidence_ids,
            body.reviewer_comment.as_deref(),
            Some(caller.user_id()),
        )
        .await?;
    Ok(Json(view))
}
