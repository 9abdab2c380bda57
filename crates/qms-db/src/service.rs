//! Service layer orchestrating database mutations with the activity log and
//! notifications.
//!
//! `QmsService` wraps `QmsDb` (raw database access) and a `Notifier`. All repo
//! methods are implemented as `impl QmsService` blocks in [`crate::repos`].

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use qms_config::QmsConfig;
use qms_notify::{Notification, NotificationRules, Notifier};

use crate::QmsDb;
use crate::error::DatabaseError;

/// Orchestrates database mutations with activity log and notifications.
///
/// Every mutation method follows this protocol:
/// 1. Take the write lock
/// 2. Load the aggregate and check the lifecycle rules
/// 3. Begin transaction, execute SQL, append activity entry
/// 4. Commit (or roll back on any failure)
/// 5. Release the lock, then hand notifications to the `Notifier`
///
/// The write side of `gate` serialises read-check-write sequences, so two
/// requests against the same NC cannot both pass a precondition check.
/// Every public read holds the shared side for its whole duration. A
/// transaction only ever exists while the write side is held, so readers on
/// the shared connection never observe uncommitted or partially replaced
/// state.
///
/// Inside a write, use the connection-level loaders of each repo module
/// rather than the public read methods: the gate is not reentrant.
pub struct QmsService {
    db: QmsDb,
    notifier: Notifier,
    rules: NotificationRules,
    gate: RwLock<()>,
}

impl QmsService {
    /// Create a new service wrapping a local database.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the libSQL database file, or `":memory:"` for tests.
    /// * `notifier` - Where post-commit notifications go.
    /// * `rules` - Which events produce notifications.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new_local(
        db_path: &str,
        notifier: Notifier,
        rules: NotificationRules,
    ) -> Result<Self, DatabaseError> {
        let db = QmsDb::open_local(db_path).await?;
        Ok(Self::from_db(db, notifier, rules))
    }

    /// Open the configured database with rules taken from `[notifications]`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn from_config(config: &QmsConfig, notifier: Notifier) -> Result<Self, DatabaseError> {
        tracing::debug!(path = %config.database.path, "opening database");
        Self::new_local(
            &config.database.path,
            notifier,
            NotificationRules::from(&config.notifications),
        )
        .await
    }

    /// Create from an existing `QmsDb`.
    #[must_use]
    pub fn from_db(db: QmsDb, notifier: Notifier, rules: NotificationRules) -> Self {
        Self {
            db,
            notifier,
            rules,
            gate: RwLock::new(()),
        }
    }

    /// Access the underlying database handle.
    ///
    /// Queries issued through it bypass the read gate.
    #[must_use]
    pub const fn db(&self) -> &QmsDb {
        &self.db
    }

    #[must_use]
    pub const fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    #[must_use]
    pub const fn rules(&self) -> &NotificationRules {
        &self.rules
    }

    /// Serialise a read-check-write sequence and exclude readers from it.
    pub(crate) async fn write_guard(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().await
    }

    /// Shared side of the gate. Hold it across every query of one read so the
    /// result reflects a single committed state.
    pub(crate) async fn read_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read().await
    }

    /// Begin a transaction on the shared connection. Only call this while
    /// holding [`Self::write_guard`].
    pub(crate) async fn begin(&self) -> Result<libsql::Transaction, DatabaseError> {
        Ok(self.db.conn().transaction().await?)
    }

    /// Hand a message to the notifier. Never fails.
    pub(crate) async fn dispatch(&self, notification: Option<Notification>) {
        if let Some(notification) = notification {
            self.notifier.notify(notification).await;
        }
    }
}
