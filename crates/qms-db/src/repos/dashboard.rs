//! Read-only aggregation queries behind the dashboards.
//!
//! SQL does the grouping; the shaping (zero-filled labels, dense trend
//! windows, percentages) is done by `qms_metrics`.

use chrono::NaiveDate;

use qms_core::enums::{AuditStatus, EntityType, NcStatus, Severity};
use qms_core::responses::{AuditProgress, Breakdown, ComplianceReport, DashboardMetrics, TrendPoint};
use qms_metrics::breakdown::seeded_breakdown;
use qms_metrics::compliance::{AuditRecord, ChecklistRecord, ItemRecord};
use qms_metrics::progress::audit_progress;
use qms_metrics::trend::{clamp_months, dense_monthly_trend, window_start};

use crate::error::DatabaseError;
use crate::helpers::{ensure_exists, format_date, get_count, get_opt_string, parse_optional_enum};
use crate::service::QmsService;

async fn grouped_counts(
    conn: &libsql::Connection,
    sql: &str,
    params: impl libsql::params::IntoParams,
) -> Result<Vec<(Option<String>, u64)>, DatabaseError> {
    let mut rows = conn.query(sql, params).await?;
    let mut counts = Vec::new();
    while let Some(row) = rows.next().await? {
        counts.push((get_opt_string(&row, 0)?, get_count(&row, 1)?));
    }
    Ok(counts)
}

async fn compliance(conn: &libsql::Connection) -> Result<ComplianceReport, DatabaseError> {
    let mut audits = Vec::new();
    let mut rows = conn.query("SELECT id, department FROM audits", ()).await?;
    while let Some(row) = rows.next().await? {
        audits.push(AuditRecord {
            id: row.get(0)?,
            department: get_opt_string(&row, 1)?,
        });
    }

    let mut checklists = Vec::new();
    let mut rows = conn.query("SELECT id, audit_id FROM checklists", ()).await?;
    while let Some(row) = rows.next().await? {
        checklists.push(ChecklistRecord {
            id: row.get(0)?,
            audit_id: row.get(1)?,
        });
    }

    let mut items = Vec::new();
    let mut rows = conn
        .query(
            "SELECT ci.checklist_id, i.conformity_status
             FROM checklist_items ci
             LEFT JOIN instances i ON i.checklist_item_id = ci.id",
            (),
        )
        .await?;
    while let Some(row) = rows.next().await? {
        items.push(ItemRecord {
            checklist_id: row.get(0)?,
            status: parse_optional_enum(get_opt_string(&row, 1)?.as_deref())?,
        });
    }

    tracing::debug!(
        audits = audits.len(),
        checklists = checklists.len(),
        items = items.len(),
        "computing compliance"
    );
    Ok(qms_metrics::compliance::compute_compliance(&audits, &checklists, &items))
}

async fn monthly_trend(
    conn: &libsql::Connection,
    today: NaiveDate,
    months: i64,
) -> Result<Vec<TrendPoint>, DatabaseError> {
    let start = window_start(today, clamp_months(months));
    let observed = grouped_counts(
        conn,
        "SELECT substr(created_at, 1, 7), COUNT(*) FROM non_conformities
         WHERE created_at >= ?1 GROUP BY 1",
        [format_date(start)],
    )
    .await?;
    Ok(dense_monthly_trend(
        today,
        months,
        observed
            .into_iter()
            .filter_map(|(period, count)| period.map(|p| (p, count))),
    ))
}

async fn nc_status_breakdown(conn: &libsql::Connection) -> Result<Breakdown, DatabaseError> {
    let rows = grouped_counts(
        conn,
        "SELECT status, COUNT(*) FROM non_conformities GROUP BY status",
        (),
    )
    .await?;
    Ok(seeded_breakdown(&NcStatus::ALL.map(NcStatus::as_str), rows))
}

async fn nc_severity_breakdown(conn: &libsql::Connection) -> Result<Breakdown, DatabaseError> {
    let rows = grouped_counts(
        conn,
        "SELECT severity, COUNT(*) FROM non_conformities GROUP BY severity",
        (),
    )
    .await?;
    Ok(seeded_breakdown(&Severity::ALL.map(Severity::as_str), rows))
}

async fn audit_status_breakdown(conn: &libsql::Connection) -> Result<Breakdown, DatabaseError> {
    let rows = grouped_counts(conn, "SELECT status, COUNT(*) FROM audits GROUP BY status", ()).await?;
    Ok(seeded_breakdown(&AuditStatus::ALL.map(AuditStatus::as_str), rows))
}

async fn audit_department_breakdown(conn: &libsql::Connection) -> Result<Breakdown, DatabaseError> {
    let rows = grouped_counts(
        conn,
        "SELECT NULLIF(TRIM(department), ''), COUNT(*) FROM audits GROUP BY 1",
        (),
    )
    .await?;
    Ok(seeded_breakdown(&[], rows))
}

async fn overdue_action_count(
    conn: &libsql::Connection,
    today: NaiveDate,
) -> Result<u64, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM corrective_actions
             WHERE status != 'COMPLETED' AND due_date IS NOT NULL AND due_date < ?1",
            [format_date(today)],
        )
        .await?;
    let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
    get_count(&row, 0)
}

impl QmsService {
    /// Evaluation progress of one audit.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown audit.
    pub async fn get_audit_progress(&self, audit_id: &str) -> Result<AuditProgress, DatabaseError> {
        let _read = self.read_guard().await;
        let conn = self.db().conn();
        ensure_exists(conn, EntityType::Audit, audit_id).await?;

        let mut rows = conn
            .query(
                "SELECT conformity_status FROM instances WHERE audit_id = ?1",
                [audit_id],
            )
            .await?;
        let mut statuses = Vec::new();
        while let Some(row) = rows.next().await? {
            statuses.push(parse_optional_enum(get_opt_string(&row, 0)?.as_deref())?);
        }
        Ok(audit_progress(statuses))
    }

    /// Compliance over every audit, recomputed from scratch.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a query fails or a stored status is unknown.
    pub async fn compute_compliance(&self) -> Result<ComplianceReport, DatabaseError> {
        let _read = self.read_guard().await;
        compliance(self.db().conn()).await
    }

    /// NCs created per calendar month over the trailing window ending with
    /// `today`'s month. `months` is clamped to 1..=36; empty months read 0.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn nc_monthly_trend(
        &self,
        today: NaiveDate,
        months: i64,
    ) -> Result<Vec<TrendPoint>, DatabaseError> {
        let _read = self.read_guard().await;
        monthly_trend(self.db().conn(), today, months).await
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn ncs_by_status(&self) -> Result<Breakdown, DatabaseError> {
        let _read = self.read_guard().await;
        nc_status_breakdown(self.db().conn()).await
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn ncs_by_severity(&self) -> Result<Breakdown, DatabaseError> {
        let _read = self.read_guard().await;
        nc_severity_breakdown(self.db().conn()).await
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn audits_by_status(&self) -> Result<Breakdown, DatabaseError> {
        let _read = self.read_guard().await;
        audit_status_breakdown(self.db().conn()).await
    }

    /// Audits grouped by department; blank or missing departments count as `UNKNOWN`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn audits_by_department(&self) -> Result<Breakdown, DatabaseError> {
        let _read = self.read_guard().await;
        audit_department_breakdown(self.db().conn()).await
    }

    /// Open corrective actions due strictly before `today`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn count_overdue_actions(&self, today: NaiveDate) -> Result<u64, DatabaseError> {
        let _read = self.read_guard().await;
        overdue_action_count(self.db().conn(), today).await
    }

    /// Everything the admin dashboard shows, in one call and from one
    /// committed state.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if any underlying query fails.
    pub async fn admin_metrics(
        &self,
        today: NaiveDate,
        trend_months: i64,
    ) -> Result<DashboardMetrics, DatabaseError> {
        let _read = self.read_guard().await;
        let conn = self.db().conn();
        let audits_by_status = audit_status_breakdown(conn).await?;
        let ncs_by_status = nc_status_breakdown(conn).await?;
        let open_ncs = ncs_by_status
            .iter()
            .filter(|(label, _)| {
                label.as_str() == NcStatus::Pending.as_str()
                    || label.as_str() == NcStatus::InProgress.as_str()
            })
            .map(|(_, count)| count)
            .sum();

        Ok(DashboardMetrics {
            total_audits: audits_by_status.values().sum(),
            audits_by_department: audit_department_breakdown(conn).await?,
            audits_by_status,
            total_ncs: ncs_by_status.values().sum(),
            open_ncs,
            ncs_by_severity: nc_severity_breakdown(conn).await?,
            ncs_by_status,
            overdue_actions: overdue_action_count(conn, today).await?,
            compliance: compliance(conn).await?,
            nc_monthly_trend: monthly_trend(conn, today, trend_months).await?,
        })
    }
}
