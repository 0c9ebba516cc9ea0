//! # Snapshot Store
//!
//! The persistence seam of the runtime. The runtime only ever loads a whole
//! session, saves a whole session, and asks for the current revision.
//!
//! ```text
//! AuditRuntime ──► dyn SnapshotStore
//!                     ├── recount_db::Database          (SQLite)
//!                     ├── recount_db::SessionRepository (SQLite)
//!                     └── MemoryStore                   (tests)
//! ```

use async_trait::async_trait;
use recount_db::{AuditSession, Database, SessionRepository};

use crate::error::{SyncError, SyncResult};

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Loads the full session. `SessionNotFound` if it does not exist.
    async fn load(&self, session_id: &str) -> SyncResult<AuditSession>;

    /// Writes the full session and returns the new stored revision.
    async fn save(&self, session: &AuditSession) -> SyncResult<i64>;

    /// Stored revision without the snapshot, `None` if the session is gone.
    async fn revision(&self, session_id: &str) -> SyncResult<Option<i64>>;
}

#[async_trait]
impl SnapshotStore for SessionRepository {
    async fn load(&self, session_id: &str) -> SyncResult<AuditSession> {
        self.get_by_id(session_id)
            .await?
            .ok_or_else(|| SyncError::SessionNotFound(session_id.to_string()))
    }

    async fn save(&self, session: &AuditSession) -> SyncResult<i64> {
        Ok(SessionRepository::save(self, session).await?)
    }

    async fn revision(&self, session_id: &str) -> SyncResult<Option<i64>> {
        Ok(SessionRepository::revision(self, session_id).await?)
    }
}

#[async_trait]
impl SnapshotStore for Database {
    async fn load(&self, session_id: &str) -> SyncResult<AuditSession> {
        SnapshotStore::load(&self.sessions(), session_id).await
    }

    async fn save(&self, session: &AuditSession) -> SyncResult<i64> {
        SnapshotStore::save(&self.sessions(), session).await
    }

    async fn revision(&self, session_id: &str) -> SyncResult<Option<i64>> {
        SnapshotStore::revision(&self.sessions(), session_id).await
    }
}

// =============================================================================
// In-memory double
// =============================================================================

#[cfg(test)]
pub(crate) use memory::MemoryStore;


#[cfg(test)]
mod tests {
    use super::*;
    use recount_core::{AuditSnapshot, SessionStatus};
    use recount_db::DbConfig;

    async fn database() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_store_round_trip() {
        let db = database().await;
        let snapshot = AuditSnapshot {
            branch: "12".into(),
            inventory_number: "2026-0012-0001".into(),
            ..AuditSnapshot::default()
        };
        let mut session = db.sessions().create("12", 1, snapshot).await.unwrap();

        let store: &dyn SnapshotStore = &db;
        let loaded = store.load(&session.id).await.unwrap();
        assert_eq!(loaded.snapshot, session.snapshot);
        assert_eq!(store.revision(&session.id).await.unwrap(), Some(1));

        session.status = SessionStatus::Completed;
        assert_eq!(store.save(&session).await.unwrap(), 2);
        assert_eq!(store.load(&session.id).await.unwrap().status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_missing_session() {
        let db = database().await;
        let store: &dyn SnapshotStore = &db;

        assert!(matches!(
            store.load("nope").await,
            Err(SyncError::SessionNotFound(ref id)) if id == "nope"
        ));
        assert_eq!(store.revision("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_failures() {
        let db = database().await;
        let session = db.sessions().create("3", 1, AuditSnapshot::default()).await.unwrap();
        let store = MemoryStore::with_session(session.clone());

        store.fail_saves(true);
        let err = store.save(&session).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.save_count(), 0);

        store.fail_saves(false);
        assert_eq!(store.save(&session).await.unwrap(), 2);
        assert_eq!(store.save_count(), 1);
    }
}
