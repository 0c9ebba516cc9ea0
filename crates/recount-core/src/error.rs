//! # Error Types
//!
//! Domain-specific error types for recount-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  recount-core errors (this file)                                       │
//! │  ├── CoreError        - Refused transitions                            │
//! │  └── ValidationError  - Malformed input / snapshot                     │
//! │                                                                         │
//! │  recount-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  recount-sync errors (separate crate)                                  │
//! │  └── SyncError        - Runtime / config / persistence failures        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → caller                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An operation over a scope with zero leaf categories is NOT an error. It
//! is a successful no-op and never shows up here.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Refusals raised by audit transitions.
///
/// Transitions never panic for data reasons; every refusal is one of these.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A master-only action was attempted by a non-master actor.
    ///
    /// ## When This Occurs
    /// - `finalize_all_active`, `reset_history`, `reopen_scope`,
    ///   `finish_audit` called by an operator
    #[error("Permission denied: only the master can {action}")]
    PermissionDenied { action: String },

    /// Finalize was requested for a scope where nothing was ever started.
    ///
    /// ## User Workflow
    /// ```text
    /// Operator taps "Finish" on Group 1
    ///      │
    ///      ▼
    /// every leaf of Group 1 is Pending
    ///      │
    ///      ▼
    /// NotStarted { scope: "1||" }
    ///      │
    ///      ▼
    /// UI shows: "Start the count before finishing it"
    /// ```
    #[error("Scope {scope} has not been started")]
    NotStarted { scope: String },

    /// The whole audit cannot be closed until every SKU is counted.
    #[error("Audit is incomplete: {progress:.1}% of SKUs counted")]
    AuditIncomplete { progress: f64 },

    /// The snapshot (or an input to it) failed structural validation.
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(#[from] ValidationError),

    /// A serialized term scope key could not be parsed.
    #[error("Invalid term key: {0}")]
    InvalidTermKey(String),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation of ingested snapshots and user-entered values.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value must not be negative.
    #[error("{field} must not be negative (got {value})")]
    Negative { field: String, value: i64 },

    /// Invalid format (e.g., non-numeric branch code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate identifier within one parent.
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::NotStarted {
            scope: "1|10|".to_string(),
        };
        assert_eq!(err.to_string(), "Scope 1|10| has not been started");

        let err = CoreError::PermissionDenied {
            action: "reset history".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Permission denied: only the master can reset history"
        );

        let err = CoreError::AuditIncomplete { progress: 87.5 };
        assert_eq!(err.to_string(), "Audit is incomplete: 87.5% of SKUs counted");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "branch".to_string(),
        };
        assert_eq!(err.to_string(), "branch is required");

        let err = ValidationError::Duplicate {
            field: "group id".to_string(),
            value: "7".to_string(),
        };
        assert_eq!(err.to_string(), "group id '7' already exists");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "branch".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::InvalidSnapshot(_)));
    }
}
