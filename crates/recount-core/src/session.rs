//! # Audit Session Lifecycle
//!
//! Numbering and closing of a whole audit.
//!
//! ```text
//!   branch 12, 2026                latest session        next number
//!   ─────────────────────────      ──────────────        ───────────
//!   first audit ever               none                  1
//!   audit 3 still open             (3, Open)             3  (resume)
//!   audit 3 finished               (3, Completed)        4
//!
//!   inventory_number(2026, "12", 4) = "2026-0012-0004"
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::metrics::aggregate;
use crate::scope::ScopeRef;
use crate::types::{Actor, AuditSnapshot};

/// Persisted state of an audit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Open,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Completed => "completed",
        }
    }
}

/// `YYYY-BBBB-NNNN`, branch and number zero-padded to four digits.
///
/// ## Example
/// ```rust
/// use recount_core::session::inventory_number;
///
/// assert_eq!(inventory_number(2026, "12", 4), "2026-0012-0004");
/// ```
pub fn inventory_number(year: i32, branch: &str, audit_number: u32) -> String {
    format!("{}-{:0>4}-{:04}", year, branch.trim(), audit_number)
}

/// Number for the next audit of a branch, given its latest session.
pub fn next_audit_number(latest: Option<(u32, SessionStatus)>) -> u32 {
    match latest {
        None => 1,
        Some((number, SessionStatus::Open)) => number.max(1),
        Some((number, SessionStatus::Completed)) => number.saturating_add(1),
    }
}

/// Share of SKUs already in Done categories (0..=100).
pub fn completion_progress(snapshot: &AuditSnapshot) -> f64 {
    aggregate(snapshot, &ScopeRef::branch()).progress_skus()
}

/// Master-only: checks that the audit can be closed.
///
/// Returns the final progress (always 100) on success. An audit with no SKUs
/// at all cannot be closed.
pub fn finish_audit(snapshot: &AuditSnapshot, actor: &Actor) -> CoreResult<f64> {
    if !actor.is_master() {
        return Err(CoreError::PermissionDenied {
            action: "finish the audit".to_string(),
        });
    }
    let metrics = aggregate(snapshot, &ScopeRef::branch());
    if metrics.skus == 0 || metrics.done_skus < metrics.skus {
        return Err(CoreError::AuditIncomplete {
            progress: metrics.progress_skus(),
        });
    }
    Ok(metrics.progress_skus())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_snapshot;
    use crate::types::AuditStatus;

    #[test]
    fn test_inventory_number_padding() {
        assert_eq!(inventory_number(2026, "12", 4), "2026-0012-0004");
        assert_eq!(inventory_number(2026, " 3 ", 123), "2026-0003-0123");
        assert_eq!(inventory_number(2026, "12345", 10000), "2026-12345-10000");
    }

    #[test]
    fn test_next_audit_number() {
        assert_eq!(next_audit_number(None), 1);
        assert_eq!(next_audit_number(Some((3, SessionStatus::Open))), 3);
        assert_eq!(next_audit_number(Some((3, SessionStatus::Completed))), 4);
    }

    #[test]
    fn test_finish_audit_requires_full_progress() {
        let mut snapshot = sample_snapshot();
        let master = Actor::master("Ana");

        let err = finish_audit(&snapshot, &master).unwrap_err();
        assert!(matches!(err, CoreError::AuditIncomplete { progress } if progress == 0.0));

        snapshot.for_each_category_mut(|_, c| c.status = AuditStatus::Done);
        assert_eq!(completion_progress(&snapshot), 100.0);
        assert!(finish_audit(&snapshot, &Actor::operator("Rui")).is_err());
        assert_eq!(finish_audit(&snapshot, &master).unwrap(), 100.0);
    }

    #[test]
    fn test_empty_audit_cannot_finish() {
        let snapshot = AuditSnapshot::default();
        assert!(matches!(
            finish_audit(&snapshot, &Actor::master("Ana")),
            Err(CoreError::AuditIncomplete { .. })
        ));
    }
}
