//! # Audit Session Repository
//!
//! Stores one row per audit session holding the whole snapshot as JSON.
//!
//! ## Revision Counter
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Device A                      audit_sessions                Device B   │
//! │                                                                         │
//! │  save(snapshot) ──────────► revision 7 → 8                             │
//! │                                   │                                     │
//! │                                   │        revision(id) = 8 ◄── poll    │
//! │                                   │        (B holds 7: reload whole)    │
//! │                                                                         │
//! │  Last full snapshot wins. No merging happens here.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use recount_core::{completion_progress, AuditSnapshot, SessionStatus};

// =============================================================================
// Session Types
// =============================================================================

/// A persisted audit session.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditSession {
    pub id: String,
    pub branch: String,
    pub audit_number: u32,
    pub status: SessionStatus,
    pub snapshot: AuditSnapshot,
    /// Done SKU percentage at the last save.
    pub progress: f64,
    /// Bumped by every save.
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing row without the (large) snapshot.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SessionSummary {
    pub id: String,
    pub audit_number: i64,
    pub status: SessionStatus,
    pub progress: f64,
    pub revision: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    branch: String,
    audit_number: i64,
    status: SessionStatus,
    data: String,
    progress: f64,
    revision: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for AuditSession {
    type Error = DbError;

    fn try_from(row: SessionRow) -> DbResult<Self> {
        let mut snapshot: AuditSnapshot = serde_json::from_str(&row.data)?;
        // Rows written before totals were recomputed on every mutation.
        snapshot.recompute_totals();

        Ok(AuditSession {
            id: row.id,
            branch: row.branch,
            audit_number: u32::try_from(row.audit_number)
                .map_err(|_| DbError::Internal(format!("audit number out of range: {}", row.audit_number)))?,
            status: row.status,
            snapshot,
            progress: row.progress,
            revision: row.revision,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_SESSION: &str = r#"
    SELECT id, branch, audit_number, status, data, progress, revision, created_at, updated_at
    FROM audit_sessions
"#;

// =============================================================================
// Repository
// =============================================================================

/// Repository for audit session operations.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    /// Creates a new SessionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    /// Inserts a new open session at revision 1.
    ///
    /// ## Errors
    /// `UniqueViolation` when the branch already has that audit number.
    pub async fn create(&self, branch: &str, audit_number: u32, snapshot: AuditSnapshot) -> DbResult<AuditSession> {
        let now = Utc::now();
        let session = AuditSession {
            id: Uuid::new_v4().to_string(),
            branch: branch.trim().to_string(),
            audit_number,
            status: SessionStatus::Open,
            progress: completion_progress(&snapshot),
            snapshot,
            revision: 1,
            created_at: now,
            updated_at: now,
        };
        let data = serde_json::to_string(&session.snapshot)?;

        sqlx::query(
            r#"
            INSERT INTO audit_sessions (
                id, branch, audit_number, status, data,
                progress, revision, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&session.id)
        .bind(&session.branch)
        .bind(i64::from(session.audit_number))
        .bind(session.status)
        .bind(&data)
        .bind(session.progress)
        .bind(session.revision)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: format!("{}/{}", session.branch, audit_number),
            },
            other => other,
        })?;

        info!(
            session_id = %session.id,
            branch = %session.branch,
            audit_number,
            "Audit session created"
        );
        Ok(session)
    }

    /// Gets a session by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<AuditSession>> {
        let row: Option<SessionRow> = sqlx::query_as(&format!("{SELECT_SESSION} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(AuditSession::try_from).transpose()
    }

    /// Gets a session by id, failing with `NotFound` when absent.
    pub async fn get(&self, id: &str) -> DbResult<AuditSession> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Audit session", id))
    }

    /// The branch's session with the highest audit number.
    pub async fn fetch_latest(&self, branch: &str) -> DbResult<Option<AuditSession>> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "{SELECT_SESSION} WHERE branch = ?1 ORDER BY audit_number DESC LIMIT 1"
        ))
        .bind(branch.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(AuditSession::try_from).transpose()
    }

    /// `(audit_number, status)` of the branch's latest session, for numbering.
    pub async fn latest_number(&self, branch: &str) -> DbResult<Option<(u32, SessionStatus)>> {
        let row: Option<(i64, SessionStatus)> = sqlx::query_as(
            "SELECT audit_number, status FROM audit_sessions
             WHERE branch = ?1 ORDER BY audit_number DESC LIMIT 1",
        )
        .bind(branch.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(n, status)| u32::try_from(n).ok().map(|n| (n, status))))
    }

    /// Writes the whole session (upsert) and returns the new revision.
    ///
    /// The stored revision is always incremented by one, whatever revision
    /// the caller holds: last full snapshot wins.
    pub async fn save(&self, session: &AuditSession) -> DbResult<i64> {
        let data = serde_json::to_string(&session.snapshot)?;
        let progress = completion_progress(&session.snapshot);
        let now = Utc::now();

        let revision: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO audit_sessions (
                id, branch, audit_number, status, data,
                progress, revision, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                data = excluded.data,
                progress = excluded.progress,
                revision = audit_sessions.revision + 1,
                updated_at = excluded.updated_at
            RETURNING revision
            "#,
        )
        .bind(&session.id)
        .bind(&session.branch)
        .bind(i64::from(session.audit_number))
        .bind(session.status)
        .bind(&data)
        .bind(progress)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        debug!(
            session_id = %session.id,
            revision,
            progress,
            bytes = data.len(),
            "Audit session saved"
        );
        Ok(revision)
    }

    /// Current stored revision, without loading the snapshot.
    pub async fn revision(&self, id: &str) -> DbResult<Option<i64>> {
        let revision: Option<i64> = sqlx::query_scalar("SELECT revision FROM audit_sessions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(revision)
    }

    /// Every session of a branch, newest audit first.
    pub async fn list_for_branch(&self, branch: &str) -> DbResult<Vec<SessionSummary>> {
        let rows = sqlx::query_as::<_, SessionSummary>(
            r#"
            SELECT id, audit_number, status, progress, revision, updated_at
            FROM audit_sessions
            WHERE branch = ?1
            ORDER BY audit_number DESC
            "#,
        )
        .bind(branch.trim())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
