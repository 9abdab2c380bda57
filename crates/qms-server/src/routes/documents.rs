//! Document registry and NC evidence attachments.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use qms_core::entities::Document;

use crate::auth::{Authenticated, STAFF};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/documents", post(create_document))
        .route("/documents/:id", get(get_document))
        .route("/nc/:id/documents", post(attach_document).get(list_nc_documents))
}

#[derive(Debug, Deserialize)]
struct CreateDocumentBody {
    #[serde(default)]
    title: String,
    #[serde(default)]
    reference: String,
}

async fn create_document(
    State(state): State<AppState>,
    caller: Authenticated,
    ApiJson(body): ApiJson<CreateDocumentBody>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    let document = state
        .service
        .create_document(&body.title, &body.reference, Some(caller.user_id()))
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn get_document(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let document = state.service.get_document(&id).await?;
    let uploader = document.uploaded_by.as_deref().unwrap_or_default();
    caller.require_or_owner(STAFF, uploader)?;
    Ok(Json(document))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachBody {
    document_id: String,
}

async fn attach_document(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AttachBody>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let nc = state.service.get_nc(&id).await?;
    caller.require_or_owner(STAFF, &nc.assigned_to)?;
    let documents = state
        .service
        .attach_document(&id, &body.document_id, Some(caller.user_id()))
        .await?;
    Ok(Json(documents))
}

async fn list_nc_documents(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let nc = state.service.get_nc(&id).await?;
    caller.require_or_owner(STAFF, &nc.assigned_to)?;
    Ok(Json(state.service.list_nc_documents(&id).await?))
}
