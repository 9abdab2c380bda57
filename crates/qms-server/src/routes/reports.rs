//! Printable text reports.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use qms_core::entities::User;
use qms_report::{PageLayout, render_audit_report, render_nc_report};

use crate::auth::{Authenticated, STAFF};
use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/nc/:id/report", get(nc_report))
        .route("/audits/:id/report", get(audit_report))
}

/// Optional page geometry; defaults to 80x60.
#[derive(Debug, Deserialize)]
struct LayoutQuery {
    width: Option<usize>,
    height: Option<usize>,
}

impl LayoutQuery {
    fn layout(&self) -> PageLayout {
        let default = PageLayout::default();
        PageLayout::new(
            self.width.unwrap_or(default.width),
            self.height.unwrap_or(default.height),
        )
    }
}

fn text_response(body: Vec<u8>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body)
}

async fn nc_report(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<LayoutQuery>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(STAFF)?;
    let view = state.service.get_nc_view(&id).await?;

    let mut user_ids: Vec<&str> = vec![view.nc.assigned_to.as_str()];
    user_ids.extend(view.nc.created_by.as_deref());
    for action in &view.actions {
        user_ids.push(&action.responsible_id);
        if let Some(review) = &action.review {
            user_ids.push(&review.reviewer_id);
        }
    }
    user_ids.sort_unstable();
    user_ids.dedup();

    let mut users: Vec<User> = Vec::with_capacity(user_ids.len());
    for user_id in user_ids {
        match state.service.get_user(user_id).await {
            Ok(user) => users.push(user),
            Err(err) => tracing::debug!(user_id, error = %err, "user not resolvable for report"),
        }
    }

    let body = render_nc_report(&view, &users, query.layout())?;
    Ok(text_response(body))
}

async fn audit_report(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<LayoutQuery>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(STAFF)?;
    let audit = state.service.get_audit(&id).await?;
    let progress = state.service.get_audit_progress(&id).await?;
    let ncs = state.service.list_ncs_for_audit(&id).await?;
    let body = render_audit_report(&audit, &progress, &ncs, query.layout())?;
    Ok(text_response(body))
}
