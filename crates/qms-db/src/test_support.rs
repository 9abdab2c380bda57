//! Shared test utilities for qms-db unit tests.

#[cfg(test)]
pub(crate) mod helpers {
    use std::sync::Arc;

    use qms_core::entities::{Audit, User};
    use qms_core::enums::Role;
    use qms_notify::{MemoryMailer, NotificationRules, Notifier};

    use crate::QmsDb;
    use crate::repos::audit::NewAudit;
    use crate::repos::user::NewUser;
    use crate::service::QmsService;

    /// In-memory service with notifications disabled (for pure DB tests).
    pub async fn test_service() -> QmsService {
        let db = QmsDb::open_local(":memory:").await.unwrap();
        QmsService::from_db(db, Notifier::disabled(), NotificationRules::silent())
    }

    /// In-memory service that delivers notifications inline to a `MemoryMailer`.
    pub async fn test_service_with_mailer() -> (QmsService, MemoryMailer) {
        let db = QmsDb::open_local(":memory:").await.unwrap();
        let mailer = MemoryMailer::new();
        let notifier = Notifier::inline(Arc::new(mailer.clone()));
        (
            QmsService::from_db(db, notifier, NotificationRules::default()),
            mailer,
        )
    }

    pub async fn seed_user(svc: &QmsService, name: &str, roles: &[Role]) -> User {
        let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
        svc.create_user(&NewUser {
            name,
            email: &email,
            department: None,
            roles,
        })
        .await
        .unwrap()
    }

    pub async fn seed_audit(svc: &QmsService, department: Option<&str>) -> Audit {
        svc.create_audit(
            &NewAudit {
                title: "Internal audit",
                scope: "Production floor",
                department,
                start_date: None,
                end_date: None,
                created_by: None,
            },
            None,
        )
        .await
        .unwrap()
    }
}
