//! Compliance scoring over audits, checklists, and checklist items.

use std::collections::{BTreeMap, HashMap};

use qms_core::enums::ConformityStatus;
use qms_core::responses::{ComplianceReport, UNKNOWN_LABEL};

use crate::percentage;

/// The slice of an audit the scorer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub id: String,
    pub department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistRecord {
    pub id: String,
    pub audit_id: String,
}

/// A checklist item with the conformity status of its evaluation, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub checklist_id: String,
    pub status: Option<ConformityStatus>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    compliant: u64,
    total: u64,
}

impl Tally {
    fn add(&mut self, status: Option<ConformityStatus>) {
        self.total += 1;
        if status == Some(ConformityStatus::Compliant) {
            self.compliant += 1;
        }
    }

    fn score(self) -> f64 {
        percentage(self.compliant, self.total)
    }
}

/// Score every audit → checklist → item, globally and per audit department.
///
/// Every item counts toward the total whatever its status, including items
/// not yet evaluated; only `COMPLIANT` counts toward the numerator.
/// Departments without items still appear, with a score of `0.0`.
/// Items whose checklist is not in `checklists` (or whose checklist's audit is
/// not in `audits`) are ignored.
#[must_use]
pub fn compute_compliance(
    audits: &[AuditRecord],
    checklists: &[ChecklistRecord],
    items: &[ItemRecord],
) -> ComplianceReport {
    let mut items_by_checklist: HashMap<&str, Vec<Option<ConformityStatus>>> = HashMap::new();
    for item in items {
        items_by_checklist
            .entry(item.checklist_id.as_str())
            .or_default()
            .push(item.status);
    }

    let mut checklists_by_audit: HashMap<&str, Vec<&str>> = HashMap::new();
    for checklist in checklists {
        checklists_by_audit
            .entry(checklist.audit_id.as_str())
            .or_default()
            .push(checklist.id.as_str());
    }

    let mut overall = Tally::default();
    let mut per_department: BTreeMap<String, Tally> = BTreeMap::new();

    for audit in audits {
        let department = audit
            .department
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(UNKNOWN_LABEL);
        let tally = per_department.entry(department.to_string()).or_default();

        let Some(checklist_ids) = checklists_by_audit.get(audit.id.as_str()) else {
            continue;
        };
        for checklist_id in checklist_ids {
            let Some(statuses) = items_by_checklist.get(checklist_id) else {
                continue;
            };
            for status in statuses {
                overall.add(*status);
                tally.add(*status);
            }
        }
    }

    ComplianceReport {
        overall_score: overall.score(),
        per_department_score: per_department
            .into_iter()
            .map(|(department, tally)| (department, tally.score()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConformityStatus::{Compliant, NonCompliant, NotApplicable, PartiallyCompliant};

    fn audit(id: &str, department: Option<&str>) -> AuditRecord {
        AuditRecord {
            id: id.into(),
            department: department.map(String::from),
        }
    }

    fn checklist(id: &str, audit_id: &str) -> ChecklistRecord {
        ChecklistRecord {
            id: id.into(),
            audit_id: audit_id.into(),
        }
    }

    fn item(checklist_id: &str, status: Option<ConformityStatus>) -> ItemRecord {
        ItemRecord {
            checklist_id: checklist_id.into(),
            status,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_input_scores_zero() {
        let report = compute_compliance(&[], &[], &[]);
        assert!(approx(report.overall_score, 0.0));
        assert!(report.per_department_score.is_empty());
    }

    #[test]
    fn scores_overall_and_per_department() {
        let audits = [audit("a1", Some("Production")), audit("a2", Some("Quality"))];
        let checklists = [checklist("c1", "a1"), checklist("c2", "a1"), checklist("c3", "a2")];
        let items = [
            item("c1", Some(Compliant)),
            item("c1", Some(NonCompliant)),
            item("c2", Some(Compliant)),
            item("c2", Some(Compliant)),
            item("c3", Some(PartiallyCompliant)),
            item("c3", Some(Compliant)),
        ];

        let report = compute_compliance(&audits, &checklists, &items);
        assert!(approx(report.overall_score, 4.0 / 6.0 * 100.0));
        assert!(approx(report.per_department_score["Production"], 75.0));
        assert!(approx(report.per_department_score["Quality"], 50.0));
    }

    #[test]
    fn missing_department_groups_as_unknown() {
        let audits = [audit("a1", None), audit("a2", Some("  "))];
        let checklists = [checklist("c1", "a1"), checklist("c2", "a2")];
        let items = [item("c1", Some(Compliant)), item("c2", Some(NonCompliant))];

        let report = compute_compliance(&audits, &checklists, &items);
        assert_eq!(report.per_department_score.len(), 1);
        assert!(approx(report.per_department_score[UNKNOWN_LABEL], 50.0));
    }

    #[test]
    fn every_item_enters_the_denominator() {
        let audits = [audit("a1", Some("Ops"))];
        let checklists = [checklist("c1", "a1")];
        let items = [
            item("c1", None),
            item("c1", Some(NotApplicable)),
            item("c1", Some(ConformityStatus::PendingEvaluation)),
            item("c1", Some(Compliant)),
        ];

        let report = compute_compliance(&audits, &checklists, &items);
        assert!(approx(report.overall_score, 25.0));
        assert!(approx(report.per_department_score["Ops"], 25.0));
    }

    #[test]
    fn department_without_items_scores_zero() {
        let audits = [audit("a1", Some("Legal"))];
        let report = compute_compliance(&audits, &[], &[]);
        assert!(approx(report.per_department_score["Legal"], 0.0));
    }

    #[test]
    fn orphan_items_are_ignored() {
        let audits = [audit("a1", Some("Ops"))];
        let checklists = [checklist("c1", "a1"), checklist("c9", "a-missing")];
        let items = [item("c1", Some(Compliant)), item("c9", Some(NonCompliant)), item("cx", Some(NonCompliant))];

        let report = compute_compliance(&audits, &checklists, &items);
        assert!(approx(report.overall_score, 100.0));
    }
}
