//! # qms-db
//!
//! libSQL persistence for the QMS backend, and the engine built on it.
//!
//! Handles all relational state: users, the clause catalog, audits,
//! checklists and evaluations, non-conformities with their corrective actions
//! and RCA steps, documents, and the activity log. Domain operations are
//! methods on [`service::QmsService`]; each runs in one transaction and
//! dispatches notifications only after it commits.

pub mod error;
pub mod helpers;
mod migrations;
pub mod repos;
pub mod service;
pub mod test_support;
pub mod updates;

use error::DatabaseError;
use libsql::Builder;

/// Central database handle.
///
/// Wraps a libSQL database and connection and provides ID generation.
pub struct QmsDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
}

impl QmsDb {
    /// Open a local database at the given path, or `":memory:"`.
    ///
    /// Runs migrations automatically on open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        // Enable foreign keys (must be per-connection in SQLite)
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;

        let qms_db = Self { db, conn };
        qms_db.run_migrations().await?;
        tracing::debug!(path, "database opened");
        Ok(qms_db)
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Generate a prefixed ID via libSQL. Returns e.g., `"ncr-a3f8b2c1"`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or returns no rows.
    pub async fn generate_id(&self, prefix: &str) -> Result<String, DatabaseError> {
        helpers::generate_id(&self.conn, prefix).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    async fn test_db() -> QmsDb {
        QmsDb::open_local(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn open_local_creates_schema() {
        let db = test_db().await;

        let tables = [
            "users",
            "standards",
            "clauses",
            "clause_mappings",
            "audits",
            "audit_auditors",
            "checklists",
            "checklist_items",
            "instances",
            "non_conformities",
            "nc_evidence",
            "corrective_actions",
            "rca_steps",
            "documents",
            "nc_documents",
            "activity_log",
        ];
        for table in &tables {
            let mut rows = db
                .conn()
                .query(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
                    [*table],
                )
                .await
                .unwrap();
            let row = rows.next().await.unwrap();
            assert!(row.is_some(), "table '{table}' should exist");
        }
    }

    #[tokio::test]
    async fn generate_id_correct_format() {
        let db = test_db().await;
        let id = db.generate_id("ncr").await.unwrap();
        assert!(id.starts_with("ncr-"), "ID should start with 'ncr-': {id}");
        assert_eq!(id.len(), 12, "ID should be 12 chars: {id}");
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn generate_id_all_prefixes() {
        let db = test_db().await;
        for prefix in qms_core::ids::ALL_PREFIXES {
            let id = db.generate_id(prefix).await.unwrap();
            assert!(id.starts_with(&format!("{prefix}-")));
        }
    }

    #[tokio::test]
    async fn generate_id_uniqueness() {
        let db = test_db().await;
        let mut ids = HashSet::new();
        for _ in 0..100 {
            let id = db.generate_id("tst").await.unwrap();
            assert!(ids.insert(id.clone()), "Duplicate ID generated: {id}");
        }
    }

    #[tokio::test]
    async fn idempotent_migrations() {
        let db = test_db().await;
        db.run_migrations().await.unwrap();
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let db = test_db().await;
        let result = db
            .conn()
            .execute(
                "INSERT INTO corrective_actions (id, nc_id, description, responsible_id) VALUES ('cap-1', 'ncr-missing', 'x', 'usr-missing')",
                (),
            )
            .await;
        assert!(result.is_err(), "dangling action should be rejected");
    }

    #[tokio::test]
    async fn deleting_nc_cascades_to_actions_and_rca() {
        let db = test_db().await;
        let conn = db.conn();
        conn.execute_batch(
            "INSERT INTO users (id, name, email) VALUES ('usr-1', 'U', 'u@example.com');
             INSERT INTO audits (id, title, scope) VALUES ('adt-1', 'A', 'S');
             INSERT INTO non_conformities (id, audit_id, title, description, severity, assigned_to)
                 VALUES ('ncr-1', 'adt-1', 't', 'd', 'LOW', 'usr-1');
             INSERT INTO corrective_actions (id, nc_id, description, responsible_id)
                 VALUES ('cap-1', 'ncr-1', 'fix', 'usr-1');
             INSERT INTO rca_steps (id, nc_id, step_number, why_text) VALUES ('rca-1', 'ncr-1', 1, 'why');
             DELETE FROM non_conformities WHERE id = 'ncr-1';",
        )
        .await
        .unwrap();

        for table in ["corrective_actions", "rca_steps"] {
            let mut rows = conn
                .query(&format!("SELECT COUNT(*) FROM {table}"), ())
                .await
                .unwrap();
            let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
            assert_eq!(count, 0, "{table} should be emptied by cascade");
        }
    }

    #[tokio::test]
    async fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qms.db");
        let path = path.to_str().unwrap();

        {
            let db = QmsDb::open_local(path).await.unwrap();
            db.conn()
                .execute(
                    "INSERT INTO users (id, name, email) VALUES ('usr-1', 'U', 'u@example.com')",
                    (),
                )
                .await
                .unwrap();
        }

        let db = QmsDb::open_local(path).await.unwrap();
        let mut rows = db
            .conn()
            .query("SELECT name FROM users WHERE id = 'usr-1'", ())
            .await
            .unwrap();
        let name: String = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(name, "U");
    }
}
