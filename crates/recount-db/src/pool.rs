//! # Audit Database
//!
//! Opens the local SQLite file that holds audit sessions and hands out the
//! session repository.
//!
//! ```text
//!   seed / recount-watch / AuditRuntime
//!                │
//!                ▼
//!   Database::new(DbConfig) ── WAL, busy timeout, migrations
//!                │
//!                ▼
//!   db.sessions() ──► SessionRepository ──► audit_sessions
//! ```
//!
//! Several clients on one device (the watcher, the seed tool, a UI) may hold
//! the same file open. WAL keeps a reader from blocking the whole-snapshot
//! save of another client, and the busy timeout makes a writer wait for the
//! lock instead of failing at once.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::session::SessionRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Where the audit database lives and how many connections it may use.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,

    /// Default: 4. A session runtime needs one for saves and one for the
    /// revision check of the refresh loop.
    pub max_connections: u32,

    /// How long a write waits for another client's lock. Default: 5 seconds.
    pub busy_timeout: Duration,
}

impl DbConfig {
    /// File-backed database, created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: Some(path.into()),
            max_connections: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// In-memory database for tests. Every connection would get its own
    /// empty database, so the pool is pinned to one.
    pub fn in_memory() -> Self {
        DbConfig {
            path: None,
            max_connections: 1,
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = match &self.path {
            Some(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal),
            None => SqliteConnectOptions::new().in_memory(true),
        };
        options
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout)
            .foreign_keys(true)
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the audit database. Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (or creates) the database and brings its schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let location = config
            .path
            .as_ref()
            .map_or_else(|| ":memory:".to_string(), |p| p.display().to_string());

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(config.connect_options())
            .await
            .map_err(|e| DbError::ConnectionFailed(format!("{location}: {e}")))?;

        migrations::run_migrations(&pool).await?;

        info!(
            path = %location,
            max_connections = config.max_connections,
            "Audit database ready"
        );
        Ok(Database { pool })
    }

    /// Raw pool, for diagnostics such as [`migrations::migration_status`].
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn sessions(&self) -> SessionRepository {
        SessionRepository::new(self.pool.clone())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
