//! Rendering tests for the NC and audit reports.

use chrono::{NaiveDate, TimeZone, Utc};
use pretty_assertions::assert_eq;
use rstest::rstest;

use qms_core::entities::{
    ActionReview, Audit, CorrectiveAction, Document, NonConformity, RcaStep, User,
};
use qms_core::enums::{ActionStatus, AuditStatus, NcStatus, Role, Severity};
use qms_core::responses::{AuditProgress, NcView};
use qms_report::{PAGE_BREAK, PageLayout, render_audit_report, render_nc_report};

fn at(day: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, 9, 30, 0).unwrap()
}

fn user(id: &str, name: &str) -> User {
    User {
        id: id.into(),
        name: name.into(),
        email: format!("{}@example.com", name.to_lowercase()),
        department: None,
        roles: vec![Role::Auditee],
        active: true,
        created_at: at(1),
    }
}

fn nc(id: &str, severity: Severity, status: NcStatus) -> NonConformity {
    NonConformity {
        id: id.into(),
        audit_id: "adt-0000aaaa".into(),
        instance_id: None,
        clause_id: Some("cls-0000bbbb".into()),
        title: "Calibration overdue on gauge G-12".into(),
        description: "The torque gauge used on station 4 was last calibrated fourteen months ago, beyond the twelve month interval required by the procedure.".into(),
        severity,
        status,
        created_by: Some("usr-auditor".into()),
        assigned_to: "usr-owner".into(),
        evidence: vec!["EV-100".into()],
        created_at: at(2),
        updated_at: at(5),
    }
}

fn view() -> NcView {
    NcView {
        nc: nc("ncr-1234abcd", Severity::High, NcStatus::Completed),
        actions: vec![CorrectiveAction {
            id: "cap-1".into(),
            nc_id: "ncr-1234abcd".into(),
            description: "Recalibrate gauge and add it to the calibration schedule".into(),
            responsible_id: "usr-owner".into(),
            due_date: NaiveDate::from_ymd_opt(2026, 3, 20),
            status: ActionStatus::Completed,
            review: Some(ActionReview {
                reviewer_id: "usr-reviewer".into(),
                approved: true,
                comments: Some("Certificate checked.".into()),
                reviewed_at: at(4),
            }),
            created_at: at(2),
            updated_at: at(4),
        }],
        rca_steps: (1..=3)
            .map(|n| RcaStep {
                id: format!("rca-{n}"),
                nc_id: "ncr-1234abcd".into(),
                step_number: n,
                why_text: format!("Reason number {n}"),
                created_at: at(3),
            })
            .collect(),
        documents: vec![Document {
            id: "doc-1".into(),
            title: "Calibration certificate".into(),
            reference: "dms://cal/G-12.pdf".into(),
            uploaded_by: None,
            created_at: at(4),
        }],
    }
}

fn users() -> Vec<User> {
    vec![
        user("usr-owner", "Olga"),
        user("usr-auditor", "Arun"),
        user("usr-reviewer", "Rita"),
    ]
}

#[test]
fn nc_report_contains_every_section() {
    let bytes = render_nc_report(&view(), &users(), PageLayout::default()).unwrap();
    let text = String::from_utf8(bytes).unwrap();

    assert!(text.starts_with("Non-Conformity Report: ncr-1234abcd\n"));
    for needle in [
        "Summary",
        "Severity:         HIGH",
        "Assigned to:      Olga <olga@example.com>",
        "Raised by:        Arun <arun@example.com>",
        "Corrective Actions",
        "Action 1 approved by Rita on 2026-03-04 09:30 UTC. Certificate checked.",
        "Why 1:            Reason number 1",
        "- EV-100",
        "- Calibration certificate (dms://cal/G-12.pdf)",
        "Page 1 of 1",
    ] {
        assert!(text.contains(needle), "missing {needle:?} in:\n{text}");
    }
}

#[test]
fn unknown_users_fall_back_to_ids() {
    let text = String::from_utf8(render_nc_report(&view(), &[], PageLayout::default()).unwrap())
        .unwrap();
    assert!(text.contains("Assigned to:      usr-owner"));
}

#[rstest]
#[case(PageLayout::new(40, 10))]
#[case(PageLayout::new(60, 20))]
#[case(PageLayout::default())]
fn nc_report_respects_layout(#[case] layout: PageLayout) {
    let text = String::from_utf8(render_nc_report(&view(), &users(), layout).unwrap()).unwrap();
    let pages: Vec<&str> = text.split(PAGE_BREAK).collect();
    let total = pages.len();
    for (idx, page) in pages.iter().enumerate() {
        assert_eq!(page.lines().count(), layout.height);
        assert!(page.lines().all(|l| l.chars().count() <= layout.width));
        assert!(page.trim_end().ends_with(&format!("Page {} of {total}", idx + 1)));
    }
}

#[test]
fn layout_too_small_is_an_error() {
    assert!(render_nc_report(&view(), &users(), PageLayout::new(10, 10)).is_err());
}

#[test]
fn audit_report_summarises_ncs() {
    let audit = Audit {
        id: "adt-0000aaaa".into(),
        title: "Line 4 process audit".into(),
        scope: "Assembly and final test".into(),
        department: Some("Production".into()),
        start_date: NaiveDate::from_ymd_opt(2026, 3, 1),
        end_date: NaiveDate::from_ymd_opt(2026, 3, 3),
        status: AuditStatus::Completed,
        created_by: None,
        auditor_ids: vec!["usr-auditor".into()],
        created_at: at(1),
        updated_at: at(3),
    };
    let progress = AuditProgress {
        total_clauses: 8,
        evaluated_clauses: 6,
        completion_percentage: 75.0,
    };
    let ncs = [
        nc("ncr-1", Severity::High, NcStatus::Completed),
        nc("ncr-2", Severity::Low, NcStatus::InProgress),
    ];

    let text = String::from_utf8(
        render_audit_report(&audit, &progress, &ncs, PageLayout::default()).unwrap(),
    )
    .unwrap();
    for needle in [
        "Audit Report: Line 4 process audit",
        "Period:           2026-03-01 to 2026-03-03",
        "Evaluated:        6 of 8",
        "Completion:       75.0%",
        "Open:             1",
        "HIGH:             1",
        "MEDIUM:           0",
        "1 of 2 completed.",
    ] {
        assert!(text.contains(needle), "missing {needle:?} in:\n{text}");
    }
}

#[test]
fn audit_report_without_ncs_has_no_table() {
    let audit = Audit {
        id: "adt-1".into(),
        title: "Empty".into(),
        scope: "Nothing".into(),
        department: None,
        start_date: None,
        end_date: None,
        status: AuditStatus::Planned,
        created_by: None,
        auditor_ids: Vec::new(),
        created_at: at(1),
        updated_at: at(1),
    };
    let progress = AuditProgress {
        total_clauses: 0,
        evaluated_clauses: 0,
        completion_percentage: 0.0,
    };
    let text =
        String::from_utf8(render_audit_report(&audit, &progress, &[], PageLayout::default()).unwrap())
            .unwrap();
    assert!(text.contains("Period:           not scheduled"));
    assert!(!text.contains("Severity  Status"));
}
