//! User repository.

use chrono::Utc;

use qms_core::entities::User;
use qms_core::enums::{ActivityAction, EntityType, Role};
use qms_core::ids::PREFIX_USER;
use qms_core::lifecycle::{normalize_optional, require_non_blank};

use crate::error::DatabaseError;
use crate::helpers::{finish_tx, generate_id, get_opt_string, join_roles, parse_datetime};
use crate::repos::activity::append_activity;
use crate::service::QmsService;

const SELECT_COLS: &str = "id, name, email, department, roles, active, created_at";

fn row_to_user(row: &libsql::Row) -> Result<User, DatabaseError> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        department: get_opt_string(row, 3)?,
        roles: Role::parse_list(&row.get::<String>(4)?),
        active: row.get::<i64>(5)? != 0,
        created_at: parse_datetime(&row.get::<String>(6)?)?,
    })
}

pub(crate) async fn load_user(conn: &libsql::Connection, id: &str) -> Result<User, DatabaseError> {
    let mut rows = conn
        .query(&format!("SELECT {SELECT_COLS} FROM users WHERE id = ?1"), [id])
        .await?;
    let row = rows
        .next()
        .await?
        .ok_or_else(|| DatabaseError::not_found(EntityType::User, id))?;
    row_to_user(&row)
}

#[derive(Debug, Clone, Copy)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub department: Option<&'a str>,
    pub roles: &'a [Role],
}

impl QmsService {
    /// # Errors
    ///
    /// Returns `DatabaseError::Validation` for a blank name or malformed email,
    /// `DatabaseError::Conflict` if the email is already registered.
    pub async fn create_user(&self, input: &NewUser<'_>) -> Result<User, DatabaseError> {
        let name = require_non_blank("name", input.name)?;
        let email = require_non_blank("email", input.email)?.to_lowercase();
        if !email.contains('@') {
            return Err(DatabaseError::Validation(format!("invalid email address: {email}")));
        }
        let department = normalize_optional(input.department);
        let mut roles = input.roles.to_vec();
        roles.sort_unstable();
        roles.dedup();

        let _guard = self.write_guard().await;
        let mut rows = self
            .db()
            .conn()
            .query("SELECT id FROM users WHERE email = ?1", [email.as_str()])
            .await?;
        if rows.next().await?.is_some() {
            return Err(DatabaseError::Conflict(format!("email already registered: {email}")));
        }

        let now = Utc::now();
        let tx = self.begin().await?;
        let result = async {
            let id = generate_id(&tx, PREFIX_USER).await?;
            tx.execute(
                "INSERT INTO users (id, name, email, department, roles, active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
                libsql::params![
                    id.as_str(),
                    name.as_str(),
                    email.as_str(),
                    department.as_deref(),
                    join_roles(&roles),
                    now.to_rfc3339()
                ],
            )
            .await?;
            append_activity(&tx, EntityType::User, &id, ActivityAction::Created, None, None).await?;
            Ok::<_, DatabaseError>(id)
        }
        .await;
        let id = finish_tx(tx, result).await?;

        Ok(User {
            id,
            name,
            email,
            department,
            roles,
            active: true,
            created_at: now,
        })
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if no user has this id.
    pub async fn get_user(&self, id: &str) -> Result<User, DatabaseError> {
        let _read = self.read_guard().await;
        load_user(self.db().conn(), id).await
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_users(&self, limit: u32) -> Result<Vec<User>, DatabaseError> {
        let _read = self.read_guard().await;
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM users ORDER BY name LIMIT {limit}"),
                (),
            )
            .await?;
        let mut users = Vec::new();
        while let Some(row) = rows.next().await? {
            users.push(row_to_user(&row)?);
        }
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::test_service;
    use pretty_assertions::assert_eq;

    fn new_user<'a>(name: &'a str, email: &'a str, roles: &'a [Role]) -> NewUser<'a> {
        NewUser {
            name,
            email,
            department: Some("  Quality "),
            roles,
        }
    }

    #[tokio::test]
    async fn create_and_get_user() {
        let svc = test_service().await;
        let created = svc
            .create_user(&new_user(
                "Dana",
                "Dana@Example.com",
                &[Role::Reviewer, Role::Auditor, Role::Reviewer],
            ))
            .await
            .unwrap();
        assert!(created.id.starts_with("usr-"));
        assert_eq!(created.email, "dana@example.com");
        assert_eq!(created.department.as_deref(), Some("Quality"));

        let fetched = svc.get_user(&created.id).await.unwrap();
        assert_eq!(fetched.roles, vec![Role::Auditor, Role::Reviewer]);
        assert!(fetched.active);
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let svc = test_service().await;
        svc.create_user(&new_user("A", "a@example.com", &[])).await.unwrap();
        let err = svc
            .create_user(&new_user("B", "A@example.com", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
    }

    #[tokio::test]
    async fn blank_name_and_bad_email_are_rejected() {
        let svc = test_service().await;
        assert!(matches!(
            svc.create_user(&new_user("  ", "a@example.com", &[])).await,
            Err(DatabaseError::Validation(_))
        ));
        assert!(matches!(
            svc.create_user(&new_user("A", "not-an-email", &[])).await,
            Err(DatabaseError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let svc = test_service().await;
        assert!(matches!(
            svc.get_user("usr-nope").await,
            Err(DatabaseError::NotFound { entity_type: EntityType::User, .. })
        ));
    }
}
