//! API error type and its HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use qms_db::error::DatabaseError;
use qms_report::ReportError;

/// Error returned by every handler.
///
/// Rendered as `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_failed", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "internal server error",
        )
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, "not_found", err.to_string())
            }
            DatabaseError::Validation(msg) => Self::bad_request(msg),
            DatabaseError::Conflict(msg) => Self::new(StatusCode::CONFLICT, "conflict", msg),
            other => {
                tracing::error!(error = %other, "request failed");
                Self::internal()
            }
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::InvalidLayout(msg) => Self::bad_request(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        }));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qms_core::enums::EntityType;
    use rstest::rstest;

    #[rstest]
    #[case(DatabaseError::not_found(EntityType::NonConformity, "ncr-1"), StatusCode::NOT_FOUND)]
    #[case(DatabaseError::Validation("blank".into()), StatusCode::BAD_REQUEST)]
    #[case(DatabaseError::Conflict("closed".into()), StatusCode::CONFLICT)]
    #[case(DatabaseError::NoResult, StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(DatabaseError::Query("boom".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn database_errors_map_to_status(#[case] err: DatabaseError, #[case] status: StatusCode) {
        assert_eq!(ApiError::from(err).status, status);
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ApiError::from(DatabaseError::Query("SELECT secret".into()));
        assert!(!err.message.contains("secret"));
    }
}
