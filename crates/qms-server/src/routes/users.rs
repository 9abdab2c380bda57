use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use qms_core::entities::User;
use qms_core::enums::Role;
use qms_db::repos::user::NewUser;

use crate::auth::{ADMIN, Authenticated, STAFF};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route("/users/:id", get(get_user))
}

#[derive(Debug, Deserialize)]
struct CreateUserBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    department: Option<String>,
    #[serde(default)]
    roles: Vec<Role>,
}

async fn create_user(
    State(state): State<AppState>,
    caller: Authenticated,
    ApiJson(body): ApiJson<CreateUserBody>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    caller.require(ADMIN)?;
    let user = state
        .service
        .create_user(&NewUser {
            name: &body.name,
            email: &body.email,
            department: body.department.as_deref(),
            roles: &body.roles,
        })
        .await?;
    tracing::info!(user_id = %user.id, by = caller.user_id(), "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<u32>,
}

async fn list_users(
    State(state): State<AppState>,
    caller: Authenticated,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    caller.require(ADMIN)?;
    let limit = query.limit.unwrap_or(state.config.general.default_limit);
    Ok(Json(state.service.list_users(limit).await?))
}

/// Staff can look anyone up; everyone else only themselves.
async fn get_user(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    caller.require_or_owner(STAFF, &id)?;
    Ok(Json(state.service.get_user(&id).await?))
}
