//! Document repository and NC evidence links.

use chrono::Utc;

use qms_core::entities::Document;
use qms_core::enums::{ActivityAction, EntityType};
use qms_core::ids::PREFIX_DOCUMENT;
use qms_core::lifecycle::require_non_blank;

use crate::error::DatabaseError;
use crate::helpers::{ensure_exists, finish_tx, generate_id, get_opt_string, parse_datetime};
use crate::repos::activity::append_activity;
use crate::service::QmsService;

const SELECT_COLS: &str = "id, title, reference, uploaded_by, created_at";

fn row_to_document(row: &libsql::Row) -> Result<Document, DatabaseError> {
    Ok(Document {
        id: row.get(0)?,
        title: row.get(1)?,
        reference: row.get(2)?,
        uploaded_by: get_opt_string(row, 3)?,
        created_at: parse_datetime(&row.get::<String>(4)?)?,
    })
}

pub(crate) async fn load_nc_documents(
    conn: &libsql::Connection,
    nc_id: &str,
) -> Result<Vec<Document>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT d.id, d.title, d.reference, d.uploaded_by, d.created_at
             FROM nc_documents nd
             JOIN documents d ON d.id = nd.document_id
             WHERE nd.nc_id = ?1
             ORDER BY nd.linked_at, d.id",
            [nc_id],
        )
        .await?;
    let mut documents = Vec::new();
    while let Some(row) = rows.next().await? {
        documents.push(row_to_document(&row)?);
    }
    Ok(documents)
}

impl QmsService {
    /// Register a document by reference. Storage of the bytes is external.
    ///
    /// # Errors
    ///
    /// `Validation` for blank fields, `NotFound` for an unknown uploader.
    pub async fn create_document(
        &self,
        title: &str,
        reference: &str,
        uploaded_by: Option<&str>,
    ) -> Result<Document, DatabaseError> {
        let title = require_non_blank("title", title)?;
        let reference = require_non_blank("reference", reference)?;

        let _guard = self.write_guard().await;
        if let Some(user) = uploaded_by {
            ensure_exists(self.db().conn(), EntityType::User, user).await?;
        }

        let now = Utc::now();
        let tx = self.begin().await?;
        let result = async {
            let id = generate_id(&tx, PREFIX_DOCUMENT).await?;
            tx.execute(
                "INSERT INTO documents (id, title, reference, uploaded_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                libsql::params![
                    id.as_str(),
                    title.as_str(),
                    reference.as_str(),
                    uploaded_by,
                    now.to_rfc3339()
                ],
            )
            .await?;
            append_activity(&tx, EntityType::Document, &id, ActivityAction::Created, uploaded_by, None)
                .await?;
            Ok::<_, DatabaseError>(id)
        }
        .await;
        let id = finish_tx(tx, result).await?;

        Ok(Document {
            id,
            title,
            reference,
            uploaded_by: uploaded_by.map(String::from),
            created_at: now,
        })
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if no document has this id.
    pub async fn get_document(&self, id: &str) -> Result<Document, DatabaseError> {
        let _read = self.read_guard().await;
        let mut rows = self
            .db()
            .conn()
            .query(&format!("SELECT {SELECT_COLS} FROM documents WHERE id = ?1"), [id])
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| DatabaseError::not_found(EntityType::Document, id))?;
        row_to_document(&row)
    }

    /// Link a document to an NC as evidence. Linking twice is a no-op.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown NC or document.
    pub async fn attach_document(
        &self,
        nc_id: &str,
        document_id: &str,
        actor: Option<&str>,
    ) -> Result<Vec<Document>, DatabaseError> {
        let _guard = self.write_guard().await;
        let conn = self.db().conn();
        ensure_exists(conn, EntityType::NonConformity, nc_id).await?;
        ensure_exists(conn, EntityType::Document, document_id).await?;

        let tx = self.begin().await?;
        let result = async {
            let inserted = tx
                .execute(
                    "INSERT OR IGNORE INTO nc_documents (nc_id, document_id, linked_at) VALUES (?1, ?2, ?3)",
                    libsql::params![nc_id, document_id, Utc::now().to_rfc3339()],
                )
                .await?;
            if inserted > 0 {
                append_activity(
                    &tx,
                    EntityType::NonConformity,
                    nc_id,
                    ActivityAction::Linked,
                    actor,
                    Some(serde_json::json!({ "document_id": document_id })),
                )
                .await?;
            }
            Ok::<_, DatabaseError>(())
        }
        .await;
        finish_tx(tx, result).await?;

        load_nc_documents(conn, nc_id).await
    }

    /// Documents linked to an NC, in link order.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_nc_documents(&self, nc_id: &str) -> Result<Vec<Document>, DatabaseError> {
        let _read = self.read_guard().await;
        load_nc_documents(self.db().conn(), nc_id).await
    }
}
