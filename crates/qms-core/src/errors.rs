//! Cross-cutting error types.
//!
//! `CoreError` is the domain taxonomy every crate agrees on. Crate-specific
//! errors (`DatabaseError`, `NotifyError`, `ConfigError`) live in their crates
//! and convert into or out of it at the seams.

use thiserror::Error;

use crate::enums::EntityType;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced entity id does not resolve.
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: EntityType, id: String },

    /// Missing, blank, or out-of-range input, or an unmet precondition.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An illegal state transition was attempted.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    pub fn not_found(entity_type: EntityType, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }
}
