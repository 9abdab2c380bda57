//! Notification messages and their templates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Why a message is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NcAssigned,
    ActionAssigned,
    ActionDueSoon,
    ActionOverdue,
}

/// A message addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    #[must_use]
    pub fn nc_assigned(to: &str, nc_id: &str, nc_title: &str, severity: &str) -> Self {
        Self {
            kind: NotificationKind::NcAssigned,
            to: to.to_string(),
            subject: format!("[QMS] Non-conformity assigned: {nc_title}"),
            body: format!(
                "You have been assigned non-conformity {nc_id} \"{nc_title}\" (severity {severity})."
            ),
        }
    }

    #[must_use]
    pub fn action_assigned(
        to: &str,
        nc_id: &str,
        description: &str,
        due_date: Option<NaiveDate>,
    ) -> Self {
        let due = due_date.map_or_else(|| "no due date".to_string(), |d| format!("due {d}"));
        Self {
            kind: NotificationKind::ActionAssigned,
            to: to.to_string(),
            subject: "[QMS] Corrective action assigned".to_string(),
            body: format!(
                "A corrective action on non-conformity {nc_id} was assigned to you ({due}):\n\n{description}"
            ),
        }
    }

    #[must_use]
    pub fn action_due_soon(
        to: &str,
        nc_title: &str,
        description: &str,
        due_date: NaiveDate,
        days_left: i64,
    ) -> Self {
        let when = match days_left {
            0 => "today".to_string(),
            1 => "tomorrow".to_string(),
            n => format!("in {n} days"),
        };
        Self {
            kind: NotificationKind::ActionDueSoon,
            to: to.to_string(),
            subject: format!("[QMS] Corrective action due {when}"),
            body: format!(
                "The corrective action \"{description}\" for \"{nc_title}\" is due on {due_date}."
            ),
        }
    }

    #[must_use]
    pub fn action_overdue(
        to: &str,
        nc_title: &str,
        description: &str,
        due_date: NaiveDate,
        days_late: i64,
    ) -> Self {
        Self {
            kind: NotificationKind::ActionOverdue,
            to: to.to_string(),
            subject: "[QMS] Corrective action overdue".to_string(),
            body: format!(
                "The corrective action \"{description}\" for \"{nc_title}\" was due on {due_date} and is {days_late} day(s) overdue."
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_soon_wording() {
        let due = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let n = Notification::action_due_soon("a@example.com", "NC", "Fix", due, 1);
        assert_eq!(n.subject, "[QMS] Corrective action due tomorrow");
        assert!(n.body.contains("2026-10-17"));
    }

    #[test]
    fn action_assigned_without_due_date() {
        let n = Notification::action_assigned("a@example.com", "ncr-1", "Fix X", None);
        assert!(n.body.contains("no due date"));
        assert_eq!(n.kind, NotificationKind::ActionAssigned);
    }
}
