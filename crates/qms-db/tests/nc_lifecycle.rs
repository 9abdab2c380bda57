//! End-to-end NC lifecycle tests against an in-memory database.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Days, Utc};
use pretty_assertions::assert_eq;
use rstest::rstest;

use qms_core::entities::{RcaStepInput, User};
use qms_core::enums::{ActionStatus, NcStatus, Role, Severity};
use qms_db::error::DatabaseError;
use qms_db::repos::audit::NewAudit;
use qms_db::repos::nc::NewNc;
use qms_db::repos::user::NewUser;
use qms_db::service::QmsService;
use qms_notify::{Mailer, MemoryMailer, Notification, NotificationRules, Notifier, NotifyError};

/// Mailer whose transport is always down.
struct UnreachableMailer;

#[async_trait]
impl Mailer for UnreachableMailer {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("connection refused".into()))
    }
}

struct Fixture {
    svc: QmsService,
    audit_id: String,
    owner: User,
}

async fn fixture_with(notifier: Notifier, rules: NotificationRules) -> Fixture {
    let svc = QmsService::new_local(":memory:", notifier, rules).await.unwrap();
    let owner = svc
        .create_user(&NewUser {
            name: "Uma Owner",
            email: "uma@example.com",
            department: Some("Production"),
            roles: &[Role::Auditee],
        })
        .await
        .unwrap();
    let audit = svc
        .create_audit(
            &NewAudit {
                title: "Annual production audit",
                scope: "Assembly lines 1-3",
                department: Some("Production"),
                start_date: None,
                end_date: None,
                created_by: None,
            },
            None,
        )
        .await
        .unwrap();
    Fixture {
        svc,
        audit_id: audit.id,
        owner,
    }
}

async fn fixture() -> Fixture {
    fixture_with(Notifier::disabled(), NotificationRules::silent()).await
}

impl Fixture {
    async fn nc(&self, severity: Severity) -> String {
        self.svc
            .create_nc(
                &NewNc {
                    audit_id: &self.audit_id,
                    title: "Torque values not recorded",
                    description: "Station 4 torque log missing for week 12",
                    severity: Some(severity),
                    assigned_to: &self.owner.id,
                    ..NewNc::default()
                },
                None,
            )
            .await
            .unwrap()
            .id
    }

    async fn action(&self, nc_id: &str) -> String {
        let view = self
            .svc
            .add_corrective_action(nc_id, "Fix X", &self.owner.id, None, None)
            .await
            .unwrap();
        view.actions.last().unwrap().id.clone()
    }
}

fn whys(numbers: &[u32]) -> Vec<RcaStepInput> {
    numbers
        .iter()
        .map(|n| RcaStepInput::new(*n, format!("because of cause {n}")))
        .collect()
}

#[tokio::test]
async fn closing_twice_conflicts_and_leaves_state_unchanged() {
    let f = fixture().await;
    let nc_id = f.nc(Severity::Low).await;

    let first = f
        .svc
        .close_nc(&nc_id, &["EV-1".to_string()], None, None)
        .await
        .unwrap();
    let err = f
        .svc
        .close_nc(&nc_id, &["EV-2".to_string()], None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Conflict(_)));
    assert_eq!(f.svc.get_nc_view(&nc_id).await.unwrap(), first);
}

#[tokio::test]
async fn non_sequential_rca_keeps_existing_steps() {
    let f = fixture().await;
    let nc_id = f.nc(Severity::High).await;
    let before = f.svc.submit_rca(&nc_id, &whys(&[1, 2, 3, 4]), None).await.unwrap();

    let err = f.svc.submit_rca(&nc_id, &whys(&[1, 3, 2]), None).await.unwrap_err();
    assert!(matches!(err, DatabaseError::Validation(_)));
    assert_eq!(f.svc.list_rca_steps(&nc_id).await.unwrap(), before.rca_steps);
}

#[rstest]
#[case(&[1, 2])]
#[case(&[1, 2, 3, 4, 5, 6])]
#[tokio::test]
async fn rca_step_count_out_of_range(#[case] numbers: &[u32]) {
    let f = fixture().await;
    let nc_id = f.nc(Severity::Medium).await;
    let err = f.svc.submit_rca(&nc_id, &whys(numbers), None).await.unwrap_err();
    assert!(matches!(err, DatabaseError::Validation(_)));
}

#[tokio::test]
async fn high_severity_closure_needs_three_rca_steps() {
    let f = fixture().await;
    let nc_id = f.nc(Severity::High).await;
    let action = f.action(&nc_id).await;
    f.svc
        .update_action_status(&action, ActionStatus::Completed, None)
        .await
        .unwrap();

    // Submissions below three steps are rejected outright, so the NC starts
    // without any analysis.
    assert!(matches!(
        f.svc.submit_rca(&nc_id, &whys(&[1, 2]), None).await,
        Err(DatabaseError::Validation(_))
    ));
    assert!(matches!(
        f.svc.close_nc(&nc_id, &[], None, None).await,
        Err(DatabaseError::Validation(_))
    ));

    f.svc.submit_rca(&nc_id, &whys(&[1, 2, 3]), None).await.unwrap();
    let view = f.svc.close_nc(&nc_id, &[], None, None).await.unwrap();
    assert_eq!(view.nc.status, NcStatus::Completed);
}

#[rstest]
#[case(Severity::Low, 0)]
#[case(Severity::High, 3)]
#[case(Severity::High, 5)]
#[tokio::test]
async fn open_action_blocks_closure(#[case] severity: Severity, #[case] rca_steps: u32) {
    let f = fixture().await;
    let nc_id = f.nc(severity).await;
    let action = f.action(&nc_id).await;
    f.svc
        .update_action_status(&action, ActionStatus::InProgress, None)
        .await
        .unwrap();
    if rca_steps > 0 {
        let numbers: Vec<u32> = (1..=rca_steps).collect();
        f.svc.submit_rca(&nc_id, &whys(&numbers), None).await.unwrap();
    }

    let err = f.svc.close_nc(&nc_id, &[], None, None).await.unwrap_err();
    assert!(matches!(err, DatabaseError::Validation(_)));
    assert_eq!(f.svc.get_nc(&nc_id).await.unwrap().status, NcStatus::InProgress);
}

#[tokio::test]
async fn empty_audit_progress_is_zero() {
    let f = fixture().await;
    let progress = f.svc.get_audit_progress(&f.audit_id).await.unwrap();
    assert_eq!(progress.total_clauses, 0);
    assert!(progress.completion_percentage.abs() < f64::EPSILON);
}

#[tokio::test]
async fn empty_trend_has_six_zero_months_in_order() {
    let f = fixture().await;
    let trend = f.svc.nc_monthly_trend(Utc::now().date_naive(), 6).await.unwrap();
    assert_eq!(trend.len(), 6);
    assert!(trend.iter().all(|p| p.count == 0));
    assert!(trend.windows(2).all(|w| w[0].period < w[1].period));
}

#[tokio::test]
async fn only_first_action_changes_status() {
    let f = fixture().await;
    let nc_id = f.nc(Severity::Medium).await;
    f.action(&nc_id).await;
    assert_eq!(f.svc.get_nc(&nc_id).await.unwrap().status, NcStatus::InProgress);
    f.action(&nc_id).await;
    assert_eq!(f.svc.get_nc(&nc_id).await.unwrap().status, NcStatus::InProgress);

    let status_changes = f
        .svc
        .query_activity(&qms_db::repos::activity::ActivityFilter {
            entity_id: Some(nc_id.clone()),
            action: Some(qms_core::enums::ActivityAction::StatusChanged),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(status_changes.len(), 1);
}

#[rstest]
#[case(NcStatus::Pending)]
#[case(NcStatus::InProgress)]
#[case(NcStatus::Closed)]
#[tokio::test]
async fn completed_nc_only_accepts_completed(#[case] target: NcStatus) {
    let f = fixture().await;
    let nc_id = f.nc(Severity::Low).await;
    f.svc.close_nc(&nc_id, &[], None, None).await.unwrap();

    let err = f.svc.update_nc_status(&nc_id, target, None).await.unwrap_err();
    assert!(matches!(err, DatabaseError::Conflict(_)));
    let same = f
        .svc
        .update_nc_status(&nc_id, NcStatus::Completed, None)
        .await
        .unwrap();
    assert_eq!(same.nc.status, NcStatus::Completed);
}

#[tokio::test]
async fn end_to_end_high_severity_nc() {
    let mailer = MemoryMailer::new();
    let f = fixture_with(
        Notifier::inline(Arc::new(mailer.clone())),
        NotificationRules::default(),
    )
    .await;
    let nc_id = f.nc(Severity::High).await;

    let due = Utc::now().date_naive().checked_add_days(Days::new(7));
    let view = f
        .svc
        .add_corrective_action(&nc_id, "Fix X", &f.owner.id, due, None)
        .await
        .unwrap();
    assert_eq!(view.nc.status, NcStatus::InProgress);
    let action_id = view.actions[0].id.clone();

    f.svc.submit_rca(&nc_id, &whys(&[1, 2, 3]), None).await.unwrap();
    f.svc
        .update_action_status(&action_id, ActionStatus::Completed, None)
        .await
        .unwrap();
    let closed = f
        .svc
        .close_nc(
            &nc_id,
            &["EV-100".to_string(), "EV-101".to_string()],
            Some("Verified during follow-up"),
            None,
        )
        .await
        .unwrap();

    assert_eq!(closed.nc.status, NcStatus::Completed);
    assert_eq!(closed.nc.evidence, vec!["EV-100", "EV-101"]);
    assert_eq!(closed.rca_steps.len(), 3);
    assert_eq!(mailer.sent().len(), 2);
}

#[tokio::test]
async fn notification_failure_does_not_fail_the_operation() {
    let f = fixture_with(
        Notifier::inline(Arc::new(UnreachableMailer)),
        NotificationRules::default(),
    )
    .await;
    let nc_id = f.nc(Severity::Low).await;
    let view = f
        .svc
        .add_corrective_action(&nc_id, "Fix X", &f.owner.id, None, None)
        .await
        .unwrap();

    assert_eq!(view.actions.len(), 1);
    let stats = f.svc.notifier().stats();
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.sent, 0);
}

#[tokio::test]
async fn sweep_counts_failed_deliveries() {
    let f = fixture_with(
        Notifier::inline(Arc::new(UnreachableMailer)),
        NotificationRules::default(),
    )
    .await;
    let nc_id = f.nc(Severity::Low).await;
    let yesterday = Utc::now().date_naive().checked_sub_days(Days::new(1));
    f.svc
        .add_corrective_action(&nc_id, "Fix X", &f.owner.id, yesterday, None)
        .await
        .unwrap();

    let report = f.svc.run_reminder_sweep(Utc::now().date_naive()).await.unwrap();
    assert_eq!(report.candidates, 1);
    assert_eq!(report.sent, 0);
    assert_eq!(report.failed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_readers_never_see_a_half_replaced_rca() {
    let f = fixture().await;
    let nc_id = f.nc(Severity::High).await;
    f.svc.submit_rca(&nc_id, &whys(&[1, 2, 3, 4, 5]), None).await.unwrap();
    let svc = Arc::new(f.svc);

    let writers: Vec<_> = (0..3)
        .map(|_| {
            let svc = Arc::clone(&svc);
            let nc_id = nc_id.clone();
            tokio::spawn(async move {
                for _ in 0..40 {
                    svc.submit_rca(&nc_id, &whys(&[1, 2, 3, 4, 5]), None)
                        .await
                        .unwrap();
                }
            })
        })
        .collect();
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let svc = Arc::clone(&svc);
            let nc_id = nc_id.clone();
            tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..100 {
                    seen.push(svc.list_rca_steps(&nc_id).await.unwrap().len());
                    seen.push(svc.get_nc_view(&nc_id).await.unwrap().rca_steps.len());
                    tokio::task::yield_now().await;
                }
                seen
            })
        })
        .collect();

    for writer in writers {
        writer.await.unwrap();
    }
    for reader in readers {
        let seen = reader.await.unwrap();
        assert!(seen.iter().all(|&n| n == 5), "partial RCA observed: {seen:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_closes_serialise_and_readers_see_whole_states() {
    let f = fixture().await;
    let nc_id = f.nc(Severity::Low).await;
    let svc = Arc::new(f.svc);
    let evidence: Vec<String> = ["EV-1", "EV-2", "EV-3"].map(String::from).to_vec();

    let closers: Vec<_> = (0..4)
        .map(|_| {
            let svc = Arc::clone(&svc);
            let nc_id = nc_id.clone();
            let evidence = evidence.clone();
            tokio::spawn(async move { svc.close_nc(&nc_id, &evidence, None, None).await })
        })
        .collect();
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let svc = Arc::clone(&svc);
            let nc_id = nc_id.clone();
            tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..50 {
                    let nc = svc.get_nc(&nc_id).await.unwrap();
                    seen.push((nc.status, nc.evidence.len()));
                    tokio::task::yield_now().await;
                }
                seen
            })
        })
        .collect();

    let mut closed = 0;
    for closer in closers {
        match closer.await.unwrap() {
            Ok(view) => {
                closed += 1;
                assert_eq!(view.nc.evidence, evidence);
            }
            Err(err) => assert!(matches!(err, DatabaseError::Conflict(_)), "{err}"),
        }
    }
    assert_eq!(closed, 1);

    for reader in readers {
        for state in reader.await.unwrap() {
            assert!(
                matches!(state, (NcStatus::Pending, 0) | (NcStatus::Completed, 3)),
                "partial close observed: {state:?}"
            );
        }
    }
    assert_eq!(svc.get_nc(&nc_id).await.unwrap().evidence, evidence);
}
