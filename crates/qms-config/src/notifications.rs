//! Notification rule configuration.

use serde::{Deserialize, Serialize};

const fn default_true() -> bool {
    true
}

/// Days before the due date at which a reminder starts going out.
const fn default_reminder_days() -> u32 {
    3
}

const fn default_sweep_interval_hours() -> u64 {
    24
}

const fn default_queue_capacity() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationsConfig {
    /// Master switch; when off nothing is queued or sent.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Notify the assignee when an NC is created.
    #[serde(default = "default_true")]
    pub on_nc_assigned: bool,

    /// Notify the responsible user when a corrective action is added.
    #[serde(default = "default_true")]
    pub on_action_assigned: bool,

    #[serde(default = "default_reminder_days")]
    pub reminder_days_before_due: u32,

    /// Remind responsible users about actions past their due date.
    #[serde(default = "default_true")]
    pub notify_overdue: bool,

    /// Run the reminder sweep on an in-process timer.
    #[serde(default = "default_true")]
    pub sweep_enabled: bool,

    #[serde(default = "default_sweep_interval_hours")]
    pub sweep_interval_hours: u64,

    /// Bound of the dispatch queue; enqueueing into a full queue drops the message.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            on_nc_assigned: true,
            on_action_assigned: true,
            reminder_days_before_due: default_reminder_days(),
            notify_overdue: true,
            sweep_enabled: true,
            sweep_interval_hours: default_sweep_interval_hours(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = NotificationsConfig::default();
        assert!(config.enabled);
        assert!(config.on_action_assigned);
        assert_eq!(config.reminder_days_before_due, 3);
        assert_eq!(config.sweep_interval_hours, 24);
        assert_eq!(config.queue_capacity, 256);
    }
}
