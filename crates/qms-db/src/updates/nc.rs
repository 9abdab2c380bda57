//! Non-conformity update builder.
//!
//! Covers descriptive fields only. Status goes through `update_nc_status` and
//! `close_nc`, evidence through `close_nc`.

use serde::Serialize;

use qms_core::enums::Severity;

#[derive(Debug, Clone, Default, Serialize)]
pub struct NcUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
}

impl NcUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.severity.is_none()
            && self.assigned_to.is_none()
    }
}

pub struct NcUpdateBuilder(NcUpdate);

impl Default for NcUpdateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NcUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(NcUpdate::default())
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.0.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.0.description = Some(description.into());
        self
    }

    #[must_use]
    pub const fn severity(mut self, severity: Severity) -> Self {
        self.0.severity = Some(severity);
        self
    }

    #[must_use]
    pub fn assigned_to(mut self, user_id: impl Into<String>) -> Self {
        self.0.assigned_to = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn build(self) -> NcUpdate {
        self.0
    }
}
