//! Daily reminder sweep over open corrective actions.
//!
//! Read-only with respect to domain state: it loads candidates, lets the
//! rules decide what to send, and delivers synchronously so it can report
//! how many messages went out.

use chrono::NaiveDate;

use qms_core::responses::SweepReport;
use qms_notify::{ReminderCandidate, evaluate_reminders};

use crate::error::DatabaseError;
use crate::helpers::{get_opt_string, parse_enum, parse_optional_date};
use crate::service::QmsService;

impl QmsService {
    /// Open actions joined with their NC title and the responsible user's
    /// address. Inactive users yield no address.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn reminder_candidates(&self) -> Result<Vec<ReminderCandidate>, DatabaseError> {
        let _read = self.read_guard().await;
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT a.id, a.nc_id, n.title, a.description, a.due_date, a.status,
                        CASE WHEN u.active = 1 THEN u.email END
                 FROM corrective_actions a
                 JOIN non_conformities n ON n.id = a.nc_id
                 LEFT JOIN users u ON u.id = a.responsible_id
                 WHERE a.status != 'COMPLETED'
                 ORDER BY a.due_date IS NULL, a.due_date, a.id",
                (),
            )
            .await?;
        let mut candidates = Vec::new();
        while let Some(row) = rows.next().await? {
            candidates.push(ReminderCandidate {
                action_id: row.get(0)?,
                nc_id: row.get(1)?,
                nc_title: row.get(2)?,
                description: row.get(3)?,
                due_date: parse_optional_date(get_opt_string(&row, 4)?.as_deref())?,
                status: parse_enum(&row.get::<String>(5)?)?,
                responsible_email: get_opt_string(&row, 6)?,
            });
        }
        Ok(candidates)
    }

    /// Send due-soon and overdue reminders for `today`.
    ///
    /// Delivery failures are counted, never returned. With notifications
    /// disabled nothing is sent and nothing counts as failed.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` only if the candidate query fails.
    pub async fn run_reminder_sweep(&self, today: NaiveDate) -> Result<SweepReport, DatabaseError> {
        let candidates = self.reminder_candidates().await?;
        let mut report = SweepReport {
            candidates: u32::try_from(candidates.len()).unwrap_or(u32::MAX),
            ..SweepReport::default()
        };

        if !self.notifier().is_enabled() {
            tracing::info!(%today, candidates = report.candidates, "reminder sweep skipped: notifications disabled");
            return Ok(report);
        }

        for message in evaluate_reminders(self.rules(), &candidates, today) {
            match self.notifier().send_now(&message).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(to = %message.to, kind = ?message.kind, "reminder not delivered: {e}");
                }
            }
        }

        tracing::info!(
            %today,
            candidates = report.candidates,
            sent = report.sent,
            failed = report.failed,
            "reminder sweep finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::nc::NewNc;
    use crate::test_support::helpers::{seed_audit, seed_user, test_service, test_service_with_mailer};
    use pretty_assertions::assert_eq;
    use qms_core::enums::{ActionStatus, Role, Severity};
    use qms_notify::NotificationKind;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn nc_with_actions(svc: &QmsService, dues: &[Option<NaiveDate>]) -> Vec<String> {
        let audit = seed_audit(svc, None).await;
        let owner = seed_user(svc, "Owner", &[Role::Auditee]).await;
        let nc = svc
            .create_nc(
                &NewNc {
                    audit_id: &audit.id,
                    title: "Missing MSDS",
                    description: "Safety data sheets absent at paint booth",
                    severity: Some(Severity::Medium),
                    assigned_to: &owner.id,
                    ..NewNc::default()
                },
                None,
            )
            .await
            .unwrap();
        let mut ids = Vec::new();
        for due in dues {
            let view = svc
                .add_corrective_action(&nc.id, "Post MSDS binder", &owner.id, *due, None)
                .await
                .unwrap();
            ids.push(view.actions.last().unwrap().id.clone());
        }
        ids
    }

    #[tokio::test]
    async fn sweep_sends_due_soon_and_overdue() {
        let (svc, mailer) = test_service_with_mailer().await;
        let today = day(2026, 10, 16);
        let ids = nc_with_actions(
            &svc,
            &[
                Some(day(2026, 10, 18)),
                Some(day(2026, 10, 10)),
                Some(day(2026, 12, 1)),
                None,
            ],
        )
        .await;
        let before = mailer.sent().len();

        let report = svc.run_reminder_sweep(today).await.unwrap();
        assert_eq!(report, SweepReport { candidates: 4, sent: 2, failed: 0 });

        let kinds: Vec<NotificationKind> = mailer.sent()[before..].iter().map(|n| n.kind).collect();
        assert_eq!(kinds, [NotificationKind::ActionOverdue, NotificationKind::ActionDueSoon]);

        svc.update_action_status(&ids[1], ActionStatus::Completed, None).await.unwrap();
        let report = svc.run_reminder_sweep(today).await.unwrap();
        assert_eq!(report, SweepReport { candidates: 3, sent: 1, failed: 0 });
    }

    #[tokio::test]
    async fn sweep_is_stable_for_the_same_day() {
        let (svc, _mailer) = test_service_with_mailer().await;
        let today = day(2026, 10, 16);
        nc_with_actions(&svc, &[Some(day(2026, 10, 16))]).await;

        let first = svc.run_reminder_sweep(today).await.unwrap();
        let second = svc.run_reminder_sweep(today).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.sent, 1);
    }

    #[tokio::test]
    async fn disabled_notifier_sends_nothing() {
        let svc = test_service().await;
        nc_with_actions(&svc, &[Some(day(2020, 1, 1))]).await;
        let report = svc.run_reminder_sweep(day(2026, 10, 16)).await.unwrap();
        assert_eq!(report, SweepReport { candidates: 1, sent: 0, failed: 0 });
    }
}
