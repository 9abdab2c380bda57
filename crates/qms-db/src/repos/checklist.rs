//! Checklists, checklist items, and per-audit evaluation instances.

use chrono::Utc;
use serde::Serialize;

use qms_core::activity_detail::EvaluatedDetail;
use qms_core::entities::{Checklist, ChecklistItem, Instance};
use qms_core::enums::{ActivityAction, ConformityStatus, EntityType, Severity};
use qms_core::ids::{PREFIX_CHECKLIST, PREFIX_INSTANCE, PREFIX_ITEM};
use qms_core::lifecycle::{normalize_optional, require_non_blank};

use crate::error::DatabaseError;
use crate::helpers::{
    ensure_exists, finish_tx, generate_id, get_opt_string, parse_datetime, parse_optional_enum,
};
use crate::repos::activity::{append_activity, detail};
use crate::service::QmsService;

const INSTANCE_COLS: &str = "id, audit_id, checklist_item_id, clause_id, conformity_status, severity, comments, created_at, updated_at";

fn row_to_instance(row: &libsql::Row) -> Result<Instance, DatabaseError> {
    Ok(Instance {
        id: row.get(0)?,
        audit_id: row.get(1)?,
        checklist_item_id: row.get(2)?,
        clause_id: row.get(3)?,
        conformity_status: parse_optional_enum(get_opt_string(row, 4)?.as_deref())?,
        severity: parse_optional_enum(get_opt_string(row, 5)?.as_deref())?,
        comments: get_opt_string(row, 6)?,
        created_at: parse_datetime(&row.get::<String>(7)?)?,
        updated_at: parse_datetime(&row.get::<String>(8)?)?,
    })
}

fn row_to_item(row: &libsql::Row) -> Result<ChecklistItem, DatabaseError> {
    let position = row.get::<i64>(4)?;
    Ok(ChecklistItem {
        id: row.get(0)?,
        checklist_id: row.get(1)?,
        clause_id: row.get(2)?,
        question: row.get(3)?,
        position: u32::try_from(position)
            .map_err(|_| DatabaseError::InvalidState(format!("bad item position {position}")))?,
    })
}

/// One line of a new checklist.
#[derive(Debug, Clone)]
pub struct NewChecklistItem {
    pub clause_id: String,
    pub question: String,
}

/// A checklist with its items, as returned by `create_checklist`.
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistWithItems {
    pub checklist: Checklist,
    pub items: Vec<ChecklistItem>,
    pub instances: Vec<Instance>,
}

pub(crate) async fn load_instance(
    conn: &libsql::Connection,
    id: &str,
) -> Result<Instance, DatabaseError> {
    let mut rows = conn
        .query(&format!("SELECT {INSTANCE_COLS} FROM instances WHERE id = ?1"), [id])
        .await?;
    let row = rows
        .next()
        .await?
        .ok_or_else(|| DatabaseError::not_found(EntityType::Instance, id))?;
    row_to_instance(&row)
}

impl QmsService {
    /// Create a checklist for an audit together with its items and one
    /// unevaluated instance per item, all in one transaction.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank name, no items, or a blank question;
    /// `NotFound` for an unknown audit or clause.
    pub async fn create_checklist(
        &self,
        audit_id: &str,
        name: &str,
        items: &[NewChecklistItem],
        actor: Option<&str>,
    ) -> Result<ChecklistWithItems, DatabaseError> {
        let name = require_non_blank("name", name)?;
        if items.is_empty() {
            return Err(DatabaseError::Validation("a checklist needs at least one item".into()));
        }
        let questions = items
            .iter()
            .enumerate()
            .map(|(i, item)| require_non_blank(&format!("question of item {}", i + 1), &item.question))
            .collect::<Result<Vec<_>, _>>()?;

        let _guard = self.write_guard().await;
        let conn = self.db().conn();
        ensure_exists(conn, EntityType::Audit, audit_id).await?;
        for item in items {
            ensure_exists(conn, EntityType::Clause, &item.clause_id).await?;
        }

        let now = Utc::now();
        let tx = self.begin().await?;
        let result = async {
            let checklist_id = generate_id(&tx, PREFIX_CHECKLIST).await?;
            tx.execute(
                "INSERT INTO checklists (id, audit_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
                libsql::params![checklist_id.as_str(), audit_id, name.as_str(), now.to_rfc3339()],
            )
            .await?;

            let mut created_items = Vec::with_capacity(items.len());
            let mut instances = Vec::with_capacity(items.len());
            for ((position, item), question) in (1u32..).zip(items).zip(&questions) {
                let item_id = generate_id(&tx, PREFIX_ITEM).await?;
                tx.execute(
                    "INSERT INTO checklist_items (id, checklist_id, clause_id, question, position)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    libsql::params![
                        item_id.as_str(),
                        checklist_id.as_str(),
                        item.clause_id.as_str(),
                        question.as_str(),
                        i64::from(position)
                    ],
                )
                .await?;

                let instance_id = generate_id(&tx, PREFIX_INSTANCE).await?;
                tx.execute(
                    "INSERT INTO instances (id, audit_id, checklist_item_id, clause_id, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    libsql::params![
                        instance_id.as_str(),
                        audit_id,
                        item_id.as_str(),
                        item.clause_id.as_str(),
                        now.to_rfc3339(),
                        now.to_rfc3339()
                    ],
                )
                .await?;

                instances.push(Instance {
                    id: instance_id,
                    audit_id: audit_id.to_string(),
                    checklist_item_id: item_id.clone(),
                    clause_id: item.clause_id.clone(),
                    conformity_status: None,
                    severity: None,
                    comments: None,
                    created_at: now,
                    updated_at: now,
                });
                created_items.push(ChecklistItem {
                    id: item_id,
                    checklist_id: checklist_id.clone(),
                    clause_id: item.clause_id.clone(),
                    question: question.clone(),
                    position,
                });
            }

            append_activity(
                &tx,
                EntityType::Checklist,
                &checklist_id,
                ActivityAction::Created,
                actor,
                Some(serde_json::json!({ "audit_id": audit_id, "items": created_items.len() })),
            )
            .await?;
            Ok::<_, DatabaseError>((checklist_id, created_items, instances))
        }
        .await;
        let (checklist_id, created_items, instances) = finish_tx(tx, result).await?;

        Ok(ChecklistWithItems {
            checklist: Checklist {
                id: checklist_id,
                audit_id: audit_id.to_string(),
                name,
                created_at: now,
            },
            items: created_items,
            instances,
        })
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_checklists(&self, audit_id: &str) -> Result<Vec<Checklist>, DatabaseError> {
        let _read = self.read_guard().await;
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT id, audit_id, name, created_at FROM checklists WHERE audit_id = ?1 ORDER BY created_at, id",
                [audit_id],
            )
            .await?;
        let mut checklists = Vec::new();
        while let Some(row) = rows.next().await? {
            checklists.push(Checklist {
                id: row.get(0)?,
                audit_id: row.get(1)?,
                name: row.get(2)?,
                created_at: parse_datetime(&row.get::<String>(3)?)?,
            });
        }
        Ok(checklists)
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_checklist_items(
        &self,
        checklist_id: &str,
    ) -> Result<Vec<ChecklistItem>, DatabaseError> {
        let _read = self.read_guard().await;
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT id, checklist_id, clause_id, question, position
                 FROM checklist_items WHERE checklist_id = ?1 ORDER BY position",
                [checklist_id],
            )
            .await?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(row_to_item(&row)?);
        }
        Ok(items)
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if no instance has this id.
    pub async fn get_instance(&self, id: &str) -> Result<Instance, DatabaseError> {
        let _read = self.read_guard().await;
        load_instance(self.db().conn(), id).await
    }

    /// Evaluation instances of an audit, in checklist item order.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_instances(&self, audit_id: &str) -> Result<Vec<Instance>, DatabaseError> {
        let _read = self.read_guard().await;
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT i.id, i.audit_id, i.checklist_item_id, i.clause_id, i.conformity_status,
                        i.severity, i.comments, i.created_at, i.updated_at
                 FROM instances i
                 JOIN checklist_items ci ON ci.id = i.checklist_item_id
                 WHERE i.audit_id = ?1
                 ORDER BY ci.checklist_id, ci.position",
                [audit_id],
            )
            .await?;
        let mut instances = Vec::new();
        while let Some(row) = rows.next().await? {
            instances.push(row_to_instance(&row)?);
        }
        Ok(instances)
    }

    /// Record the outcome of evaluating one checklist clause.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown instance.
    pub async fn evaluate_instance(
        &self,
        instance_id: &str,
        status: ConformityStatus,
        severity: Option<Severity>,
        comments: Option<&str>,
        actor: Option<&str>,
    ) -> Result<Instance, DatabaseError> {
        let comments = normalize_optional(comments);

        let _guard = self.write_guard().await;
        let current = load_instance(self.db().conn(), instance_id).await?;

        let now = Utc::now();
        let tx = self.begin().await?;
        let result = async {
            tx.execute(
                "UPDATE instances SET conformity_status = ?1, severity = ?2, comments = ?3, updated_at = ?4
                 WHERE id = ?5",
                libsql::params![
                    status.as_str(),
                    severity.map(Severity::as_str),
                    comments.as_deref(),
                    now.to_rfc3339(),
                    instance_id
                ],
            )
            .await?;
            append_activity(
                &tx,
                EntityType::Instance,
                instance_id,
                ActivityAction::Evaluated,
                actor,
                detail(&EvaluatedDetail {
                    from: current.conformity_status.map(|s| s.as_str().to_string()),
                    to: status.as_str().to_string(),
                })?,
            )
            .await?;
            Ok::<_, DatabaseError>(())
        }
        .await;
        finish_tx(tx, result).await?;

        Ok(Instance {
            conformity_status: Some(status),
            severity,
            comments,
            updated_at: now,
            ..current
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{seed_audit, test_service};
    use pretty_assertions::assert_eq;

    async fn clause(svc: &QmsService) -> String {
        let std = svc.create_standard("ISO 9001", "Quality").await.unwrap();
        svc.create_clause(&std.id, "8.5.1", "Control of production", None)
            .await
            .unwrap()
            .id
    }

    fn item(clause_id: &str, question: &str) -> NewChecklistItem {
        NewChecklistItem {
            clause_id: clause_id.into(),
            question: question.into(),
        }
    }

    #[tokio::test]
    async fn checklist_creates_items_and_instances() {
        let svc = test_service().await;
        let audit = seed_audit(&svc, None).await;
        let clause_id = clause(&svc).await;

        let created = svc
            .create_checklist(
                &audit.id,
                "Production",
                &[item(&clause_id, "Work instructions available?"), item(&clause_id, "Gauges calibrated?")],
                None,
            )
            .await
            .unwrap();
        assert_eq!(created.items.len(), 2);
        assert_eq!(created.items[1].position, 2);

        let instances = svc.list_instances(&audit.id).await.unwrap();
        assert_eq!(instances.len(), 2);
        assert!(instances.iter().all(|i| i.conformity_status.is_none()));
        assert_eq!(instances[0].checklist_item_id, created.items[0].id);
    }

    #[tokio::test]
    async fn unknown_clause_leaves_nothing_behind() {
        let svc = test_service().await;
        let audit = seed_audit(&svc, None).await;
        let clause_id = clause(&svc).await;

        let err = svc
            .create_checklist(
                &audit.id,
                "Mixed",
                &[item(&clause_id, "ok?"), item("cls-missing", "broken?")],
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { entity_type: EntityType::Clause, .. }));
        assert!(svc.list_checklists(&audit.id).await.unwrap().is_empty());
        assert!(svc.list_instances(&audit.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn evaluation_sets_status_and_logs_transition() {
        let svc = test_service().await;
        let audit = seed_audit(&svc, None).await;
        let clause_id = clause(&svc).await;
        let created = svc
            .create_checklist(&audit.id, "C", &[item(&clause_id, "q?")], None)
            .await
            .unwrap();
        let instance_id = &created.instances[0].id;

        let evaluated = svc
            .evaluate_instance(
                instance_id,
                ConformityStatus::NonCompliant,
                Some(Severity::Medium),
                Some(" gauge G-12 overdue "),
                Some("usr-1"),
            )
            .await
            .unwrap();
        assert_eq!(evaluated.conformity_status, Some(ConformityStatus::NonCompliant));
        assert_eq!(evaluated.comments.as_deref(), Some("gauge G-12 overdue"));

        let stored = svc.get_instance(instance_id).await.unwrap();
        assert_eq!(stored.severity, Some(Severity::Medium));
    }

    #[tokio::test]
    async fn empty_checklist_is_rejected() {
        let svc = test_service().await;
        let audit = seed_audit(&svc, None).await;
        let err = svc.create_checklist(&audit.id, "Empty", &[], None).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Validation(_)));
    }
}
