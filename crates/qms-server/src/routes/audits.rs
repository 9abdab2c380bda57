//! Audit, checklist, and evaluation endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use qms_core::entities::{Audit, Checklist, ChecklistItem, Instance};
use qms_core::enums::{AuditStatus, ConformityStatus, Severity};
use qms_core::responses::AuditProgress;
use qms_db::repos::audit::{AuditFilter, NewAudit};
use qms_db::repos::checklist::{ChecklistWithItems, NewChecklistItem};
use qms_db::updates::audit::AuditUpdateBuilder;

use crate::auth::{AUDIT_MANAGERS, Authenticated, STAFF};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/audits", post(create_audit).get(list_audits))
        .route("/audits/:id", get(get_audit).patch(update_audit))
        .route("/audits/:id/status", patch(transition_audit))
        .route("/audits/:id/auditors", post(assign_auditor))
        .route("/audits/:id/progress", get(progress))
        .route("/audits/:id/checklists", post(create_checklist).get(list_checklists))
        .route("/audits/:id/instances", get(list_instances))
        .route("/checklists/:id/items", get(list_checklist_items))
        .route("/instances/:id", get(get_instance))
        .route("/instances/:id/evaluation", put(evaluate_instance))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAuditBody {
    #[serde(default)]
    title: String,
    #[serde(default)]
    scope: String,
    department: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

async fn create_audit(
    State(state): State<AppState>,
    caller: Authenticated,
    ApiJson(body): ApiJson<CreateAuditBody>,
) -> Result<(StatusCode, Json<Audit>), ApiError> {
    caller.require(AUDIT_MANAGERS)?;
    let input = NewAudit {
        title: &body.title,
        scope: &body.scope,
        department: body.department.as_deref(),
        start_date: body.start_date,
        end_date: body.end_date,
        created_by: Some(caller.user_id()),
    };
    let audit = state
        .service
        .create_audit(&input, Some(caller.user_id()))
        .await?;
    Ok((StatusCode::CREATED, Json(audit)))
}

#[derive(Debug, Deserialize)]
struct ListAuditQuery {
    status: Option<AuditStatus>,
    department: Option<String>,
    limit: Option<u32>,
}

async fn list_audits(
    State(state): State<AppState>,
    caller: Authenticated,
    ApiQuery(query): ApiQuery<ListAuditQuery>,
) -> Result<Json<Vec<Audit>>, ApiError> {
    caller.require(STAFF)?;
    let filter = AuditFilter {
        status: query.status,
        department: query.department,
        limit: Some(query.limit.unwrap_or(state.config.general.default_limit)),
    };
    Ok(Json(state.service.list_audits(&filter).await?))
}

async fn get_audit(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Audit>, ApiError> {
    caller.require(STAFF)?;
    Ok(Json(state.service.get_audit(&id).await?))
}

/// `null` clears a nullable field, absence leaves it alone.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateAuditBody {
    title: Option<String>,
    scope: Option<String>,
    #[serde(default, with = "double_option")]
    department: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    start_date: Option<Option<NaiveDate>>,
    #[serde(default, with = "double_option")]
    end_date: Option<Option<NaiveDate>>,
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

async fn update_audit(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateAuditBody>,
) -> Result<Json<Audit>, ApiError> {
    caller.require(AUDIT_MANAGERS)?;
    let mut update = AuditUpdateBuilder::new();
    if let Some(title) = body.title {
        update = update.title(title);
    }
    if let Some(scope) = body.scope {
        update = update.scope(scope);
    }
    if let Some(department) = body.department {
        update = update.department(department);
    }
    if let Some(start) = body.start_date {
        update = update.start_date(start);
    }
    if let Some(end) = body.end_date {
        update = update.end_date(end);
    }
    let audit = state
        .service
        .update_audit(&id, update.build(), Some(caller.user_id()))
        .await?;
    Ok(Json(audit))
}

#[derive(Debug, Deserialize)]
struct TransitionBody {
    status: AuditStatus,
}

async fn transition_audit(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<TransitionBody>,
) -> Result<Json<Audit>, ApiError> {
    caller.require(AUDIT_MANAGERS)?;
    let audit = state
        .service
        .transition_audit(&id, body.status, Some(caller.user_id()))
        .await?;
    Ok(Json(audit))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignAuditorBody {
    user_id: String,
}

async fn assign_auditor(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AssignAuditorBody>,
) -> Result<Json<Audit>, ApiError> {
    caller.require(AUDIT_MANAGERS)?;
    let audit = state
        .service
        .assign_auditor(&id, &body.user_id, Some(caller.user_id()))
        .await?;
    Ok(Json(audit))
}

async fn progress(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<AuditProgress>, ApiError> {
    caller.require(STAFF)?;
    Ok(Json(state.service.get_audit_progress(&id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChecklistItemBody {
    clause_id: String,
    #[serde(default)]
    question: String,
}

#[derive(Debug, Deserialize)]
struct CreateChecklistBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    items: Vec<ChecklistItemBody>,
}

async fn create_checklist(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CreateChecklistBody>,
) -> Result<(StatusCode, Json<ChecklistWithItems>), ApiError> {
    caller.require(AUDIT_MANAGERS)?;
    let items: Vec<NewChecklistItem> = body
        .items
        .into_iter()
        .map(|item| NewChecklistItem {
            clause_id: item.clause_id,
            question: item.question,
        })
        .collect();
    let created = state
        .service
        .create_checklist(&id, &body.name, &items, Some(caller.user_id()))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_checklists(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Vec<Checklist>>, ApiError> {
    caller.require(STAFF)?;
    Ok(Json(state.service.list_checklists(&id).await?))
}

async fn list_checklist_items(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Vec<ChecklistItem>>, ApiError> {
    caller.require(STAFF)?;
    Ok(Json(state.service.list_checklist_items(&id).await?))
}

async fn list_instances(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Vec<Instance>>, ApiError> {
    caller.require(STAFF)?;
    Ok(Json(state.service.list_instances(&id).await?))
}

async fn get_instance(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Instance>, ApiError> {
    caller.require(STAFF)?;
    Ok(Json(state.service.get_instance(&id).await?))
}

#[derive(Debug, Deserialize)]
struct EvaluationBody {
    status: ConformityStatus,
    severity: Option<Severity>,
    comments: Option<String>,
}

async fn evaluate_instance(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<EvaluationBody>,
) -> Result<Json<Instance>, ApiError> {
    caller.require(AUDIT_MANAGERS)?;
    let instance = state
        .service
        .evaluate_instance(
            &id,
            body.status,
            body.severity,
            body.comments.as_deref(),
            Some(caller.user_id()),
        )
        .await?;
    Ok(Json(instance))
}
