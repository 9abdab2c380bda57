//! Audit summary report.

use qms_core::entities::{Audit, NonConformity};
use qms_core::enums::{NcStatus, Severity};
use qms_core::responses::AuditProgress;

use crate::error::ReportError;
use crate::layout::PageLayout;
use crate::nc::timestamp;
use crate::writer::ReportWriter;

/// Render an audit's header data, evaluation progress, and its NCs.
///
/// # Errors
///
/// Returns `ReportError::InvalidLayout` when the page is too small.
pub fn render_audit_report(
    audit: &Audit,
    progress: &AuditProgress,
    ncs: &[NonConformity],
    layout: PageLayout,
) -> Result<Vec<u8>, ReportError> {
    let mut report = ReportWriter::new(format!("Audit Report: {}", audit.title), layout)?;

    report.heading("Audit");
    report.field("ID", &audit.id);
    report.field("Scope", &audit.scope);
    report.field("Department", audit.department.as_deref().unwrap_or("-"));
    report.field("Status", audit.status.as_str());
    let period = match (audit.start_date, audit.end_date) {
        (Some(start), Some(end)) => format!("{start} to {end}"),
        (Some(start), None) => format!("from {start}"),
        (None, Some(end)) => format!("until {end}"),
        (None, None) => "not scheduled".to_string(),
    };
    report.field("Period", &period);
    report.field("Auditors", &audit.auditor_ids.len().to_string());
    report.field("Created", &timestamp(&audit.created_at));

    report.heading("Evaluation Progress");
    report.field(
        "Evaluated",
        &format!("{} of {}", progress.evaluated_clauses, progress.total_clauses),
    );
    report.field("Completion", &format!("{:.1}%", progress.completion_percentage));

    report.heading("Non-Conformities");
    let open = ncs.iter().filter(|nc| !nc.status.is_terminal()).count();
    report.field("Total", &ncs.len().to_string());
    report.field("Open", &open.to_string());
    for severity in Severity::ALL {
        let count = ncs.iter().filter(|nc| nc.severity == severity).count();
        report.field(severity.as_str(), &count.to_string());
    }

    if !ncs.is_empty() {
        report.blank();
        let rows: Vec<Vec<String>> = ncs
            .iter()
            .map(|nc| {
                vec![
                    nc.id.clone(),
                    nc.title.clone(),
                    nc.severity.as_str().to_string(),
                    nc.status.as_str().to_string(),
                ]
            })
            .collect();
        report.table(&["ID", "Title", "Severity", "Status"], &rows);

        let closed = ncs.iter().filter(|nc| nc.status == NcStatus::Completed).count();
        report.blank();
        report.paragraph(&format!("{closed} of {} completed.", ncs.len()), 0);
    }

    Ok(report.finish())
}
