//! Clause catalog repository: standards, clauses, and cross-standard mappings.

use chrono::Utc;

use qms_core::entities::{Clause, ClauseMapping, Standard};
use qms_core::enums::{ActivityAction, EntityType, MappingRelation};
use qms_core::ids::{PREFIX_CLAUSE, PREFIX_MAPPING, PREFIX_STANDARD};
use qms_core::lifecycle::{normalize_optional, require_non_blank};

use crate::error::DatabaseError;
use crate::helpers::{ensure_exists, finish_tx, generate_id, get_opt_string, parse_datetime, parse_enum};
use crate::repos::activity::append_activity;
use crate::service::QmsService;

const CLAUSE_COLS: &str = "id, standard_id, number, title, description, created_at";

fn row_to_standard(row: &libsql::Row) -> Result<Standard, DatabaseError> {
    Ok(Standard {
        id: row.get(0)?,
        code: row.get(1)?,
        title: row.get(2)?,
        created_at: parse_datetime(&row.get::<String>(3)?)?,
    })
}

fn row_to_clause(row: &libsql::Row) -> Result<Clause, DatabaseError> {
    Ok(Clause {
        id: row.get(0)?,
        standard_id: row.get(1)?,
        number: row.get(2)?,
        title: row.get(3)?,
        description: get_opt_string(row, 4)?,
        created_at: parse_datetime(&row.get::<String>(5)?)?,
    })
}

fn row_to_mapping(row: &libsql::Row) -> Result<ClauseMapping, DatabaseError> {
    Ok(ClauseMapping {
        id: row.get(0)?,
        source_clause_id: row.get(1)?,
        target_clause_id: row.get(2)?,
        relation: parse_enum(&row.get::<String>(3)?)?,
        created_at: parse_datetime(&row.get::<String>(4)?)?,
    })
}

impl QmsService {
    /// Register a standard such as `ISO 9001:2015`.
    ///
    /// # Errors
    ///
    /// `Validation` for blank fields, `Conflict` if the code already exists.
    pub async fn create_standard(&self, code: &str, title: &str) -> Result<Standard, DatabaseError> {
        let code = require_non_blank("code", code)?;
        let title = require_non_blank("title", title)?;

        let _guard = self.write_guard().await;
        let mut rows = self
            .db()
            .conn()
            .query("SELECT 1 FROM standards WHERE code = ?1", [code.as_str()])
            .await?;
        if rows.next().await?.is_some() {
            return Err(DatabaseError::Conflict(format!("standard already exists: {code}")));
        }

        let now = Utc::now();
        let tx = self.begin().await?;
        let result = async {
            let id = generate_id(&tx, PREFIX_STANDARD).await?;
            tx.execute(
                "INSERT INTO standards (id, code, title, created_at) VALUES (?1, ?2, ?3, ?4)",
                libsql::params![id.as_str(), code.as_str(), title.as_str(), now.to_rfc3339()],
            )
            .await?;
            append_activity(&tx, EntityType::Standard, &id, ActivityAction::Created, None, None)
                .await?;
            Ok::<_, DatabaseError>(id)
        }
        .await;
        let id = finish_tx(tx, result).await?;

        Ok(Standard {
            id,
            code,
            title,
            created_at: now,
        })
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_standards(&self) -> Result<Vec<Standard>, DatabaseError> {
        let _read = self.read_guard().await;
        let mut rows = self
            .db()
            .conn()
            .query("SELECT id, code, title, created_at FROM standards ORDER BY code", ())
            .await?;
        let mut standards = Vec::new();
        while let Some(row) = rows.next().await? {
            standards.push(row_to_standard(&row)?);
        }
        Ok(standards)
    }

    /// # Errors
    ///
    /// `Validation` for blank fields, `NotFound` for an unknown standard,
    /// `Conflict` if the number already exists in that standard.
    pub async fn create_clause(
        &self,
        standard_id: &str,
        number: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<Clause, DatabaseError> {
        let number = require_non_blank("number", number)?;
        let title = require_non_blank("title", title)?;
        let description = normalize_optional(description);

        let _guard = self.write_guard().await;
        ensure_exists(self.db().conn(), EntityType::Standard, standard_id).await?;
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT 1 FROM clauses WHERE standard_id = ?1 AND number = ?2",
                [standard_id, number.as_str()],
            )
            .await?;
        if rows.next().await?.is_some() {
            return Err(DatabaseError::Conflict(format!(
                "clause {number} already exists in standard {standard_id}"
            )));
        }

        let now = Utc::now();
        let tx = self.begin().await?;
        let result = async {
            let id = generate_id(&tx, PREFIX_CLAUSE).await?;
            tx.execute(
                "INSERT INTO clauses (id, standard_id, number, title, description, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                libsql::params![
                    id.as_str(),
                    standard_id,
                    number.as_str(),
                    title.as_str(),
                    description.as_deref(),
                    now.to_rfc3339()
                ],
            )
            .await?;
            append_activity(&tx, EntityType::Clause, &id, ActivityAction::Created, None, None)
                .await?;
            Ok::<_, DatabaseError>(id)
        }
        .await;
        let id = finish_tx(tx, result).await?;

        Ok(Clause {
            id,
            standard_id: standard_id.to_string(),
            number,
            title,
            description,
            created_at: now,
        })
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if no clause has this id.
    pub async fn get_clause(&self, id: &str) -> Result<Clause, DatabaseError> {
        let _read = self.read_guard().await;
        let mut rows = self
            .db()
            .conn()
            .query(&format!("SELECT {CLAUSE_COLS} FROM clauses WHERE id = ?1"), [id])
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| DatabaseError::not_found(EntityType::Clause, id))?;
        row_to_clause(&row)
    }

    /// Clauses of one standard, or of all standards, ordered by number.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_clauses(&self, standard_id: Option<&str>) -> Result<Vec<Clause>, DatabaseError> {
        let _read = self.read_guard().await;
        let mut rows = match standard_id {
            Some(sid) => {
                self.db()
                    .conn()
                    .query(
                        &format!(
                            "SELECT {CLAUSE_COLS} FROM clauses WHERE standard_id = ?1 ORDER BY number"
                        ),
                        [sid],
                    )
                    .await?
            }
            None => {
                self.db()
                    .conn()
                    .query(
                        &format!("SELECT {CLAUSE_COLS} FROM clauses ORDER BY standard_id, number"),
                        (),
                    )
                    .await?
            }
        };
        let mut clauses = Vec::new();
        while let Some(row) = rows.next().await? {
            clauses.push(row_to_clause(&row)?);
        }
        Ok(clauses)
    }

    /// Record that `source` corresponds to `target` in another standard.
    ///
    /// # Errors
    ///
    /// `Validation` for a self-mapping, `NotFound` for unknown clauses,
    /// `Conflict` if the pair is already mapped.
    pub async fn map_clauses(
        &self,
        source_clause_id: &str,
        target_clause_id: &str,
        relation: MappingRelation,
    ) -> Result<ClauseMapping, DatabaseError> {
        if source_clause_id == target_clause_id {
            return Err(DatabaseError::Validation("a clause cannot map to itself".into()));
        }

        let _guard = self.write_guard().await;
        let conn = self.db().conn();
        ensure_exists(conn, EntityType::Clause, source_clause_id).await?;
        ensure_exists(conn, EntityType::Clause, target_clause_id).await?;
        let mut rows = conn
            .query(
                "SELECT 1 FROM clause_mappings WHERE source_clause_id = ?1 AND target_clause_id = ?2",
                [source_clause_id, target_clause_id],
            )
            .await?;
        if rows.next().await?.is_some() {
            return Err(DatabaseError::Conflict(format!(
                "clauses {source_clause_id} and {target_clause_id} are already mapped"
            )));
        }

        let now = Utc::now();
        let tx = self.begin().await?;
        let result = async {
            let id = generate_id(&tx, PREFIX_MAPPING).await?;
            tx.execute(
                "INSERT INTO clause_mappings (id, source_clause_id, target_clause_id, relation, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                libsql::params![
                    id.as_str(),
                    source_clause_id,
                    target_clause_id,
                    relation.as_str(),
                    now.to_rfc3339()
                ],
            )
            .await?;
            append_activity(&tx, EntityType::ClauseMapping, &id, ActivityAction::Linked, None, None)
                .await?;
            Ok::<_, DatabaseError>(id)
        }
        .await;
        let id = finish_tx(tx, result).await?;

        Ok(ClauseMapping {
            id,
            source_clause_id: source_clause_id.to_string(),
            target_clause_id: target_clause_id.to_string(),
            relation,
            created_at: now,
        })
    }

    /// Mappings touching `clause_id` in either direction.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_clause_mappings(
        &self,
        clause_id: &str,
    ) -> Result<Vec<ClauseMapping>, DatabaseError> {
        let _read = self.read_guard().await;
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT id, source_clause_id, target_clause_id, relation, created_at
                 FROM clause_mappings
                 WHERE source_clause_id = ?1 OR target_clause_id = ?1
                 ORDER BY created_at",
                [clause_id],
            )
            .await?;
        let mut mappings = Vec::new();
        while let Some(row) = rows.next().await? {
            mappings.push(row_to_mapping(&row)?);
        }
        Ok(mappings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::test_service;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn standards_and_clauses() {
        let svc = test_service().await;
        let iso = svc.create_standard("ISO 9001:2015", "Quality management").await.unwrap();
        svc.create_clause(&iso.id, "8.5", "Production", None).await.unwrap();
        svc.create_clause(&iso.id, "7.1", "Resources", Some("  ")).await.unwrap();

        let clauses = svc.list_clauses(Some(&iso.id)).await.unwrap();
        let numbers: Vec<&str> = clauses.iter().map(|c| c.number.as_str()).collect();
        assert_eq!(numbers, ["7.1", "8.5"]);
        assert_eq!(clauses[0].description, None);

        let dup = svc.create_clause(&iso.id, "8.5", "Again", None).await;
        assert!(matches!(dup, Err(DatabaseError::Conflict(_))));
    }

    #[tokio::test]
    async fn clause_for_unknown_standard_is_not_found() {
        let svc = test_service().await;
        let err = svc.create_clause("std-nope", "1", "x", None).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { entity_type: EntityType::Standard, .. }));
    }

    #[tokio::test]
    async fn mappings_are_visible_from_both_sides() {
        let svc = test_service().await;
        let a = svc.create_standard("ISO 9001", "Quality").await.unwrap();
        let b = svc.create_standard("ISO 14001", "Environment").await.unwrap();
        let qa = svc.create_clause(&a.id, "7.5", "Documented information", None).await.unwrap();
        let env = svc.create_clause(&b.id, "7.5", "Documented information", None).await.unwrap();

        svc.map_clauses(&qa.id, &env.id, MappingRelation::Equivalent).await.unwrap();
        assert_eq!(svc.list_clause_mappings(&env.id).await.unwrap().len(), 1);
        assert!(matches!(
            svc.map_clauses(&qa.id, &env.id, MappingRelation::Partial).await,
            Err(DatabaseError::Conflict(_))
        ));
        assert!(matches!(
            svc.map_clauses(&qa.id, &qa.id, MappingRelation::Related).await,
            Err(DatabaseError::Validation(_))
        ));
    }
}
