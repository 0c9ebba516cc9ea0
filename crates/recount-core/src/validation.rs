//! # Validation Module
//!
//! Structural checks for ingested snapshots and user-entered values.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Ingestion adapter                                            │
//! │  ├── Column mapping, spreadsheet parsing                               │
//! │  └── Produces an AuditSnapshot                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Unique ids per parent                                             │
//! │  ├── Branch present and numeric                                        │
//! │  └── No negative quantities                                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  └── UNIQUE (branch, audit_number), CHECK on status                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use recount_core::validation::{validate_branch, validate_product_code};
//!
//! validate_branch("12").unwrap();
//! validate_product_code("7891000100103").unwrap();
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::types::AuditSnapshot;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted product code.
pub const MAX_CODE_LENGTH: usize = 64;

/// Longest accepted branch code.
pub const MAX_BRANCH_LENGTH: usize = 8;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a branch code.
///
/// ## Rules
/// - Must not be empty
/// - Digits only, at most 8
///
/// ## Example
/// ```rust
/// use recount_core::validation::validate_branch;
///
/// assert!(validate_branch("12").is_ok());
/// assert!(validate_branch(" ").is_err());
/// assert!(validate_branch("12A").is_err());
/// ```
pub fn validate_branch(branch: &str) -> ValidationResult<()> {
    let branch = branch.trim();

    if branch.is_empty() {
        return Err(ValidationError::Required {
            field: "branch".to_string(),
        });
    }

    if branch.len() > MAX_BRANCH_LENGTH {
        return Err(ValidationError::TooLong {
            field: "branch".to_string(),
            max: MAX_BRANCH_LENGTH,
        });
    }

    if !branch.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "branch".to_string(),
            reason: "must contain only digits".to_string(),
        });
    }

    Ok(())
}

/// Validates a product code.
pub fn validate_product_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "product code".to_string(),
        });
    }

    if code.len() > MAX_CODE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "product code".to_string(),
            max: MAX_CODE_LENGTH,
        });
    }

    Ok(())
}

/// Quantities may be zero but never negative.
pub fn validate_quantity(field: &str, quantity: i64) -> ValidationResult<()> {
    if quantity < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
            value: quantity,
        });
    }
    Ok(())
}

fn check_unique<'a>(field: &str, ids: impl Iterator<Item = &'a str>) -> ValidationResult<()> {
    let mut seen = HashSet::new();
    for id in ids {
        let id = id.trim();
        if !seen.insert(id) {
            return Err(ValidationError::Duplicate {
                field: field.to_string(),
                value: id.to_string(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Snapshot Validator
// =============================================================================

/// Rejects snapshots the state machine cannot reason about.
///
/// Checks, in order: branch, unique group ids, unique department ids per
/// group, unique category ids per department, non-negative quantities.
pub fn validate_snapshot(snapshot: &AuditSnapshot) -> ValidationResult<()> {
    validate_branch(&snapshot.branch)?;
    check_unique("group id", snapshot.groups.iter().map(|g| g.id.as_str()))?;

    for group in &snapshot.groups {
        check_unique(
            "department id",
            group.departments.iter().map(|d| d.id.as_str()),
        )?;
        for department in &group.departments {
            check_unique(
                "category id",
                department.categories.iter().map(|c| c.id.as_str()),
            )?;
            for category in &department.categories {
                for product in &category.products {
                    validate_quantity(&format!("quantity of {}", product.code), product.quantity)?;
                }
            }
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
