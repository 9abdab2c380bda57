//! Notification rules and the pure reminder evaluation.
//!
//! `evaluate_reminders` decides *what* to send for a given day. It touches no
//! I/O so the sweep can be tested against fixed dates.

use chrono::NaiveDate;

use qms_config::NotificationsConfig;
use qms_core::enums::ActionStatus;

use crate::message::Notification;

/// Which events produce messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationRules {
    pub enabled: bool,
    pub on_nc_assigned: bool,
    pub on_action_assigned: bool,
    pub reminder_days_before_due: u32,
    pub notify_overdue: bool,
}

impl Default for NotificationRules {
    fn default() -> Self {
        Self::from(&NotificationsConfig::default())
    }
}

impl From<&NotificationsConfig> for NotificationRules {
    fn from(config: &NotificationsConfig) -> Self {
        Self {
            enabled: config.enabled,
            on_nc_assigned: config.on_nc_assigned,
            on_action_assigned: config.on_action_assigned,
            reminder_days_before_due: config.reminder_days_before_due,
            notify_overdue: config.notify_overdue,
        }
    }
}

impl NotificationRules {
    /// Rules with everything switched off.
    #[must_use]
    pub const fn silent() -> Self {
        Self {
            enabled: false,
            on_nc_assigned: false,
            on_action_assigned: false,
            reminder_days_before_due: 0,
            notify_overdue: false,
        }
    }

    #[must_use]
    pub const fn nc_assigned(&self) -> bool {
        self.enabled && self.on_nc_assigned
    }

    #[must_use]
    pub const fn action_assigned(&self) -> bool {
        self.enabled && self.on_action_assigned
    }
}

/// An open corrective action as seen by the reminder sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderCandidate {
    pub action_id: String,
    pub nc_id: String,
    pub nc_title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub status: ActionStatus,
    /// `None` when the responsible user has no usable address.
    pub responsible_email: Option<String>,
}

/// Reminder classification of one action on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderKind {
    /// Due within the reminder window, `days_left` in `0..=window`.
    DueSoon { days_left: i64 },
    /// Past due by `days_late` (at least 1).
    Overdue { days_late: i64 },
}

/// Classify an action's due date against `today`.
///
/// Returns `None` for completed actions, actions without a due date, and due
/// dates beyond the reminder window.
#[must_use]
pub fn classify(
    rules: &NotificationRules,
    status: ActionStatus,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<ReminderKind> {
    if !status.is_open() {
        return None;
    }
    let days = (due_date? - today).num_days();
    if days < 0 {
        rules
            .notify_overdue
            .then_some(ReminderKind::Overdue { days_late: -days })
    } else if days <= i64::from(rules.reminder_days_before_due) {
        Some(ReminderKind::DueSoon { days_left: days })
    } else {
        None
    }
}

/// Messages the sweep should send today. Candidates without an address are
/// skipped.
#[must_use]
pub fn evaluate_reminders(
    rules: &NotificationRules,
    candidates: &[ReminderCandidate],
    today: NaiveDate,
) -> Vec<Notification> {
    if !rules.enabled {
        return Vec::new();
    }
    candidates
        .iter()
        .filter_map(|candidate| {
            let to = candidate.responsible_email.as_deref()?.trim();
            if to.is_empty() {
                return None;
            }
            let due = candidate.due_date?;
            let kind = classify(rules, candidate.status, candidate.due_date, today)?;
            Some(match kind {
                ReminderKind::DueSoon { days_left } => Notification::action_due_soon(
                    to,
                    &candidate.nc_title,
                    &candidate.description,
                    due,
                    days_left,
                ),
                ReminderKind::Overdue { days_late } => Notification::action_overdue(
                    to,
                    &candidate.nc_title,
                    &candidate.description,
                    due,
                    days_late,
                ),
            })
        })
        .collect()
}
