//! Non-conformity report.

use chrono::{DateTime, Utc};

use qms_core::entities::User;
use qms_core::responses::NcView;

use crate::error::ReportError;
use crate::layout::PageLayout;
use crate::writer::ReportWriter;

pub(crate) fn timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// `Name <email>` for a known user, the raw id otherwise.
pub(crate) fn display_user(users: &[User], id: &str) -> String {
    users
        .iter()
        .find(|u| u.id == id)
        .map_or_else(|| id.to_string(), |u| format!("{} <{}>", u.name, u.email))
}

fn display_name(users: &[User], id: &str) -> String {
    users
        .iter()
        .find(|u| u.id == id)
        .map_or_else(|| id.to_string(), |u| u.name.clone())
}

/// Render one NC with its actions, RCA, and evidence.
///
/// `users` resolves ids to names; unknown ids are printed as-is.
///
/// # Errors
///
/// Returns `ReportError::InvalidLayout` when the page is too small.
pub fn render_nc_report(
    view: &NcView,
    users: &[User],
    layout: PageLayout,
) -> Result<Vec<u8>, ReportError> {
    let nc = &view.nc;
    let mut report = ReportWriter::new(format!("Non-Conformity Report: {}", nc.id), layout)?;

    report.heading("Summary");
    report.field("Title", &nc.title);
    report.field("Status", nc.status.as_str());
    report.field("Severity", nc.severity.as_str());
    report.field("Audit", &nc.audit_id);
    if let Some(clause) = &nc.clause_id {
        report.field("Clause", clause);
    }
    if let Some(instance) = &nc.instance_id {
        report.field("Instance", instance);
    }
    report.field("Assigned to", &display_user(users, &nc.assigned_to));
    if let Some(creator) = &nc.created_by {
        report.field("Raised by", &display_user(users, creator));
    }
    report.field("Created", &timestamp(&nc.created_at));
    report.field("Last updated", &timestamp(&nc.updated_at));

    report.heading("Description");
    report.paragraph(&nc.description, 0);

    report.heading("Corrective Actions");
    if view.actions.is_empty() {
        report.paragraph("None recorded.", 0);
    } else {
        let rows: Vec<Vec<String>> = view
            .actions
            .iter()
            .enumerate()
            .map(|(idx, action)| {
                vec![
                    (idx + 1).to_string(),
                    action.description.clone(),
                    display_name(users, &action.responsible_id),
                    action
                        .due_date
                        .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string()),
                    action.status.as_str().to_string(),
                ]
            })
            .collect();
        report.table(&["#", "Description", "Responsible", "Due", "Status"], &rows);

        for (idx, action) in view.actions.iter().enumerate() {
            if let Some(review) = &action.review {
                let verdict = if review.approved { "approved" } else { "returned for rework" };
                let comments = review
                    .comments
                    .as_deref()
                    .map(|c| format!(" {c}"))
                    .unwrap_or_default();
                let line = format!(
                    "Action {} {verdict} by {} on {}.{comments}",
                    idx + 1,
                    display_name(users, &review.reviewer_id),
                    timestamp(&review.reviewed_at)
                );
                report.blank();
                report.paragraph(&line, 0);
            }
        }
    }

    report.heading("Root-Cause Analysis");
    if view.rca_steps.is_empty() {
        report.paragraph("No analysis submitted.", 0);
    } else {
        for step in &view.rca_steps {
            report.field(&format!("Why {}", step.step_number), &step.why_text);
        }
    }

    report.heading("Evidence");
    if nc.evidence.is_empty() && view.documents.is_empty() {
        report.paragraph("No evidence attached.", 0);
    }
    for evidence in &nc.evidence {
        report.paragraph(&format!("- {evidence}"), 0);
    }
    for document in &view.documents {
        report.paragraph(&format!("- {} ({})", document.title, document.reference), 0);
    }

    Ok(report.finish())
}
