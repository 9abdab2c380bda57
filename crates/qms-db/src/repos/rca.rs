//! Root-cause analysis (five-whys) steps.

use chrono::Utc;

use qms_core::activity_detail::RcaSubmittedDetail;
use qms_core::entities::{RcaStep, RcaStepInput};
use qms_core::enums::{ActivityAction, EntityType};
use qms_core::ids::PREFIX_RCA;
use qms_core::lifecycle::validate_rca_steps;
use qms_core::responses::NcView;

use crate::error::DatabaseError;
use crate::helpers::{finish_tx, generate_id, get_count, parse_datetime};
use crate::repos::activity::{append_activity, detail};
use crate::repos::nc::{load_nc, load_nc_view};
use crate::service::QmsService;

fn row_to_step(row: &libsql::Row) -> Result<RcaStep, DatabaseError> {
    let step_number: i64 = row.get(2)?;
    Ok(RcaStep {
        id: row.get(0)?,
        nc_id: row.get(1)?,
        step_number: u32::try_from(step_number)
            .map_err(|_| DatabaseError::InvalidState(format!("bad RCA step number {step_number}")))?,
        why_text: row.get(3)?,
        created_at: parse_datetime(&row.get::<String>(4)?)?,
    })
}

pub(crate) async fn load_rca_steps(
    conn: &libsql::Connection,
    nc_id: &str,
) -> Result<Vec<RcaStep>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT id, nc_id, step_number, why_text, created_at
             FROM rca_steps WHERE nc_id = ?1 ORDER BY step_number",
            [nc_id],
        )
        .await?;
    let mut steps = Vec::new();
    while let Some(row) = rows.next().await? {
        steps.push(row_to_step(&row)?);
    }
    Ok(steps)
}

pub(crate) async fn count_rca_steps(
    conn: &libsql::Connection,
    nc_id: &str,
) -> Result<usize, DatabaseError> {
    let mut rows = conn
        .query("SELECT COUNT(*) FROM rca_steps WHERE nc_id = ?1", [nc_id])
        .await?;
    let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
    usize::try_from(get_count(&row, 0)?)
        .map_err(|_| DatabaseError::InvalidState("RCA step count overflow".into()))
}

impl QmsService {
    /// Replace the whole RCA of an NC with `steps`.
    ///
    /// All-or-nothing: the old set is deleted and the new one inserted in one
    /// transaction, after the submission as a whole has been validated.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad step count, numbering, or blank why-text;
    /// `NotFound` for an unknown NC; `Conflict` when the NC is already closed.
    pub async fn submit_rca(
        &self,
        nc_id: &str,
        steps: &[RcaStepInput],
        actor: Option<&str>,
    ) -> Result<NcView, DatabaseError> {
        let steps = validate_rca_steps(steps)?;

        let guard = self.write_guard().await;
        let conn = self.db().conn();
        let nc = load_nc(conn, nc_id).await?;
        if nc.status.is_terminal() {
            return Err(DatabaseError::Conflict(format!(
                "non-conformity {nc_id} is {}; its RCA can no longer change",
                nc.status
            )));
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.begin().await?;
        let result = async {
            let replaced = tx
                .execute("DELETE FROM rca_steps WHERE nc_id = ?1", [nc_id])
                .await?;
            for step in &steps {
                let id = generate_id(&tx, PREFIX_RCA).await?;
                tx.execute(
                    "INSERT INTO rca_steps (id, nc_id, step_number, why_text, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    libsql::params![
                        id.as_str(),
                        nc_id,
                        i64::from(step.step_number),
                        step.why_text.as_str(),
                        now.as_str()
                    ],
                )
                .await?;
            }
            tx.execute(
                "UPDATE non_conformities SET updated_at = ?1 WHERE id = ?2",
                libsql::params![now.as_str(), nc_id],
            )
            .await?;
            append_activity(
                &tx,
                EntityType::NonConformity,
                nc_id,
                ActivityAction::RcaSubmitted,
                actor,
                detail(&RcaSubmittedDetail {
                    replaced: u32::try_from(replaced).unwrap_or(u32::MAX),
                    steps: u32::try_from(steps.len()).unwrap_or(u32::MAX),
                })?,
            )
            .await?;
            Ok::<_, DatabaseError>(())
        }
        .await;
        finish_tx(tx, result).await?;
        let view = load_nc_view(conn, nc_id).await?;
        drop(guard);

        tracing::info!(%nc_id, steps = steps.len(), "RCA submitted");
        Ok(view)
    }

    /// Steps of one NC ordered by step number.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_rca_steps(&self, nc_id: &str) -> Result<Vec<RcaStep>, DatabaseError> {
        let _read = self.read_guard().await;
        load_rca_steps(self.db().conn(), nc_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::repos::nc::NewNc;
    use crate::test_support::helpers::{seed_audit, seed_user, test_service};
    use pretty_assertions::assert_eq;
    use qms_core::enums::{Role, Severity};

    fn whys(n: u32, prefix: &str) -> Vec<RcaStepInput> {
        (1..=n).map(|i| RcaStepInput::new(i, format!("{prefix} why {i}"))).collect()
    }

    async fn high_nc(svc: &QmsService) -> String {
        let audit = seed_audit(svc, None).await;
        let owner = seed_user(svc, "Owner", &[Role::Auditee]).await;
        svc.create_nc(
            &NewNc {
                audit_id: &audit.id,
                title: "Batch released without inspection",
                description: "Lot 4471 shipped before final inspection",
                severity: Some(Severity::High),
                assigned_to: &owner.id,
                ..NewNc::default()
            },
            None,
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn submission_replaces_previous_steps() {
        let svc = test_service().await;
        let nc_id = high_nc(&svc).await;

        svc.submit_rca(&nc_id, &whys(5, "first"), None).await.unwrap();
        let view = svc.submit_rca(&nc_id, &whys(3, "second"), None).await.unwrap();

        let texts: Vec<&str> = view.rca_steps.iter().map(|s| s.why_text.as_str()).collect();
        assert_eq!(texts, ["second why 1", "second why 2", "second why 3"]);
    }

    #[tokio::test]
    async fn invalid_submission_keeps_existing_steps() {
        let svc = test_service().await;
        let nc_id = high_nc(&svc).await;
        svc.submit_rca(&nc_id, &whys(4, "kept"), None).await.unwrap();

        let mut bad = whys(3, "bad");
        bad[2].step_number = 4;
        assert!(matches!(
            svc.submit_rca(&nc_id, &bad, None).await,
            Err(DatabaseError::Validation(_))
        ));
        assert!(matches!(
            svc.submit_rca(&nc_id, &whys(2, "short"), None).await,
            Err(DatabaseError::Validation(_))
        ));

        let steps = svc.list_rca_steps(&nc_id).await.unwrap();
        assert_eq!(steps.len(), 4);
        assert!(steps.iter().all(|s| s.why_text.starts_with("kept")));
    }

    #[tokio::test]
    async fn readers_wait_for_an_open_transaction() {
        let svc = test_service().await;
        let nc_id = high_nc(&svc).await;
        svc.submit_rca(&nc_id, &whys(3, "committed"), None).await.unwrap();

        let guard = svc.write_guard().await;
        let tx = svc.begin().await.unwrap();
        tx.execute("DELETE FROM rca_steps WHERE nc_id = ?1", [nc_id.as_str()])
            .await
            .unwrap();

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), svc.list_rca_steps(&nc_id)).await;
        assert!(blocked.is_err(), "read ran inside an open transaction");

        tx.rollback().await.unwrap();
        drop(guard);
        assert_eq!(svc.list_rca_steps(&nc_id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn validation_precedes_lookup() {
        let svc = test_service().await;
        assert!(matches!(
            svc.submit_rca("ncr-missing", &whys(2, "x"), None).await,
            Err(DatabaseError::Validation(_))
        ));
        assert!(matches!(
            svc.submit_rca("ncr-missing", &whys(3, "x"), None).await,
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn rca_unlocks_high_severity_closure() {
        let svc = test_service().await;
        let nc_id = high_nc(&svc).await;

        assert!(matches!(
            svc.close_nc(&nc_id, &[], None, None).await,
            Err(DatabaseError::Validation(_))
        ));
        svc.submit_rca(&nc_id, &whys(3, "cause"), None).await.unwrap();
        assert_eq!(count_rca_steps(svc.db().conn(), &nc_id).await.unwrap(), 3);
        svc.close_nc(&nc_id, &[], None, None).await.unwrap();

        assert!(matches!(
            svc.submit_rca(&nc_id, &whys(3, "late"), None).await,
            Err(DatabaseError::Conflict(_))
        ));
    }
}
