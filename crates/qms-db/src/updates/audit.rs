//! Audit update builder.

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Option<NaiveDate>>,
}

impl AuditUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.scope.is_none()
            && self.department.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
    }
}

pub struct AuditUpdateBuilder(AuditUpdate);

impl Default for AuditUpdateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(AuditUpdate::default())
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.0.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.0.scope = Some(scope.into());
        self
    }

    #[must_use]
    pub fn department(mut self, department: Option<String>) -> Self {
        self.0.department = Some(department);
        self
    }

    #[must_use]
    pub const fn start_date(mut self, start_date: Option<NaiveDate>) -> Self {
        self.0.start_date = Some(start_date);
        self
    }

    #[must_use]
    pub const fn end_date(mut self, end_date: Option<NaiveDate>) -> Self {
        self.0.end_date = Some(end_date);
        self
    }

    #[must_use]
    pub fn build(self) -> AuditUpdate {
        self.0
    }
}
