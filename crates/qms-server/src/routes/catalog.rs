//! Standards, clauses, and cross-standard clause mappings.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use qms_core::entities::{Clause, ClauseMapping, Standard};
use qms_core::enums::MappingRelation;

use crate::auth::{ADMIN, Authenticated};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/standards", post(create_standard).get(list_standards))
        .route("/clauses", post(create_clause).get(list_clauses))
        .route("/clauses/:id", get(get_clause))
        .route("/clauses/:id/mappings", post(map_clause).get(list_mappings))
}

#[derive(Debug, Deserialize)]
struct CreateStandardBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    title: String,
}

async fn create_standard(
    State(state): State<AppState>,
    caller: Authenticated,
    ApiJson(body): ApiJson<CreateStandardBody>,
) -> Result<(StatusCode, Json<Standard>), ApiError> {
    caller.require(ADMIN)?;
    let standard = state.service.create_standard(&body.code, &body.title).await?;
    Ok((StatusCode::CREATED, Json(standard)))
}

async fn list_standards(
    State(state): State<AppState>,
    _caller: Authenticated,
) -> Result<Json<Vec<Standard>>, ApiError> {
    Ok(Json(state.service.list_standards().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateClauseBody {
    standard_id: String,
    #[serde(default)]
    number: String,
    #[serde(default)]
    title: String,
    description: Option<String>,
}

async fn create_clause(
    State(state): State<AppState>,
    caller: Authenticated,
    ApiJson(body): ApiJson<CreateClauseBody>,
) -> Result<(StatusCode, Json<Clause>), ApiError> {
    caller.require(ADMIN)?;
    let clause = state
        .service
        .create_clause(
            &body.standard_id,
            &body.number,
            &body.title,
            body.description.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(clause)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClauseQuery {
    standard_id: Option<String>,
}

async fn list_clauses(
    State(state): State<AppState>,
    _caller: Authenticated,
    ApiQuery(query): ApiQuery<ClauseQuery>,
) -> Result<Json<Vec<Clause>>, ApiError> {
    Ok(Json(
        state
            .service
            .list_clauses(query.standard_id.as_deref())
            .await?,
    ))
}

async fn get_clause(
    State(state): State<AppState>,
    _caller: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Clause>, ApiError> {
    Ok(Json(state.service.get_clause(&id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapClauseBody {
    target_clause_id: String,
    relation: MappingRelation,
}

async fn map_clause(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<MapClauseBody>,
) -> Result<(StatusCode, Json<ClauseMapping>), ApiError> {
    caller.require(ADMIN)?;
    let mapping = state
        .service
        .map_clauses(&id, &body.target_clause_id, body.relation)
        .await?;
    Ok((StatusCode::CREATED, Json(mapping)))
}

async fn list_mappings(
    State(state): State<AppState>,
    _caller: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Vec<ClauseMapping>>, ApiError> {
    Ok(Json(state.service.list_clause_mappings(&id).await?))
}
