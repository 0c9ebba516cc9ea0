//! # Runtime Error Types
//!
//! Error types for the session runtime.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Runtime Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Persistence   │  │     Domain              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Persistence-   │  │  Core(CoreError)        │ │
//! │  │  MissingDeviceId│  │    Failed       │  │   PermissionDenied      │ │
//! │  │  ConfigLoad/Save│  │  SessionNotFound│  │   AuditIncomplete ...   │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Persistence failures never roll back the in-memory snapshot.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use recount_core::CoreError;
use recount_db::DbError;
use thiserror::Error;

/// Result type alias for runtime operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Device ID not configured. Run initial setup first.")]
    MissingDeviceId,

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    /// Saving or loading through the snapshot store failed.
    #[error("Persistence failed: {message}")]
    PersistenceFailed { message: String, retryable: bool },

    #[error("Audit session not found: {0}")]
    SessionNotFound(String),

    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// A transition refused (permission, incomplete audit, ...).
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Audit runtime is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { id, .. } => SyncError::SessionNotFound(id),
            other => SyncError::PersistenceFailed {
                retryable: other.is_transient(),
                message: other.to_string(),
            },
        }
    }
}

impl From<recount_core::ValidationError> for SyncError {
    fn from(err: recount_core::ValidationError) -> Self {
        SyncError::InvalidConfig(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if retrying the same call may succeed.
    ///
    /// Only transient persistence failures qualify. Domain refusals and
    /// configuration problems need a different input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::PersistenceFailed { retryable: true, .. })
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::MissingDeviceId
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// Returns true if the in-memory snapshot is ahead of the store.
    pub fn is_persistence_error(&self) -> bool {
        matches!(self, SyncError::PersistenceFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        let busy = SyncError::from(DbError::PoolExhausted);
        assert!(busy.is_retryable());
        assert!(busy.is_persistence_error());

        let broken = SyncError::from(DbError::Serialization("bad json".into()));
        assert!(!broken.is_retryable());
        assert!(broken.is_persistence_error());

        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
        assert!(!SyncError::MissingDeviceId.is_retryable());
    }

    #[test]
    fn test_not_found_maps_to_session_not_found() {
        let err = SyncError::from(DbError::not_found("AuditSession", "abc-123"));
        assert!(matches!(err, SyncError::SessionNotFound(ref id) if id == "abc-123"));
    }

    #[test]
    fn test_core_errors_pass_through() {
        let err = SyncError::from(CoreError::PermissionDenied {
            action: "reopen a category".into(),
        });
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Permission denied: only the master can reopen a category");
    }

    #[test]
    fn test_config_errors() {
        assert!(SyncError::MissingDeviceId.is_config_error());
        assert!(SyncError::ConfigSaveFailed("disk full".into()).is_config_error());
        assert!(!SyncError::ShuttingDown.is_config_error());
    }
}
