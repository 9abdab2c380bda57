//! API response types.
//!
//! These structs define the JSON shape returned by the REST surface and are
//! also the inputs of the report renderer.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::{CorrectiveAction, Document, NonConformity, RcaStep};

/// Label → count mapping. Labels are enum names, or `UNKNOWN` for null keys.
pub type Breakdown = BTreeMap<String, u64>;

/// Label used when a grouping key is null.
pub const UNKNOWN_LABEL: &str = "UNKNOWN";

/// A non-conformity together with everything it owns.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct NcView {
    #[serde(flatten)]
    pub nc: NonConformity,
    pub actions: Vec<CorrectiveAction>,
    /// Ordered by step number.
    pub rca_steps: Vec<RcaStep>,
    pub documents: Vec<Document>,
}

/// Evaluation progress of one audit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditProgress {
    pub total_clauses: u64,
    pub evaluated_clauses: u64,
    pub completion_percentage: f64,
}

/// Compliance scores, overall and per department, as percentages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub overall_score: f64,
    pub per_department_score: BTreeMap<String, f64>,
}

/// One bucket of the monthly NC trend.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct TrendPoint {
    /// Calendar month as `YYYY-MM`.
    pub period: String,
    pub count: u64,
}

/// Everything the admin dashboard shows.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_audits: u64,
    pub audits_by_status: Breakdown,
    pub audits_by_department: Breakdown,
    pub total_ncs: u64,
    pub open_ncs: u64,
    pub ncs_by_status: Breakdown,
    pub ncs_by_severity: Breakdown,
    pub overdue_actions: u64,
    pub compliance: ComplianceReport,
    pub nc_monthly_trend: Vec<TrendPoint>,
}

/// Outcome of one reminder sweep.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SweepReport {
    /// Open actions inspected.
    pub candidates: u32,
    pub sent: u32,
    pub failed: u32,
}
