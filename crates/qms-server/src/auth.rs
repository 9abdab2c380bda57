//! Caller identity from the authentication proxy, and role checks.
//!
//! Authentication happens upstream; requests arrive with the verified user id
//! in `X-User-Id` and a comma-separated role list in `X-User-Roles`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use qms_core::enums::Role;
use qms_core::identity::Caller;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ROLES_HEADER: &str = "x-user-roles";

/// Roles that may read across all NCs and audits.
pub const STAFF: &[Role] = &[Role::Admin, Role::Auditor, Role::Reviewer];
/// Roles that may raise and manage NCs and audits.
pub const AUDIT_MANAGERS: &[Role] = &[Role::Admin, Role::Auditor];
/// Roles that may judge corrective actions and close NCs.
pub const REVIEWERS: &[Role] = &[Role::Admin, Role::Reviewer];
pub const ADMIN: &[Role] = &[Role::Admin];

/// Extractor for the authenticated caller. Rejects with 401 when the user id
/// header is missing or blank.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Caller);

impl Authenticated {
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.0.user_id
    }

    /// # Errors
    ///
    /// Returns 403 unless the caller holds one of `roles`.
    pub fn require(&self, roles: &[Role]) -> Result<(), ApiError> {
        if self.0.has_any_role(roles) {
            Ok(())
        } else {
            Err(forbidden(roles))
        }
    }

    /// Like [`Self::require`], but also lets `owner` through.
    ///
    /// # Errors
    ///
    /// Returns 403 when the caller is neither `owner` nor holds one of `roles`.
    pub fn require_or_owner(&self, roles: &[Role], owner: &str) -> Result<(), ApiError> {
        if self.0.user_id == owner {
            return Ok(());
        }
        self.require(roles)
    }
}

fn forbidden(roles: &[Role]) -> ApiError {
    let names: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
    ApiError::forbidden(format!("requires one of: {}", names.join(", ")))
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| ApiError::unauthorized("missing X-User-Id header"))?;
        let roles = header(parts, ROLES_HEADER).map(Role::parse_list).unwrap_or_default();
        Ok(Self(Caller {
            user_id: user_id.to_string(),
            roles,
        }))
    }
}
