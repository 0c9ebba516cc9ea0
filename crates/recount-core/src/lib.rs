//! # recount-core: Pure Audit Logic
//!
//! This crate is the **heart** of Recount. It holds every rule of a branch
//! inventory audit as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Recount Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Audit screens (frontend)                     │   │
//! │  │   Tree view ──► Start / Finish ──► History ──► Certificate     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                recount-sync (AuditRuntime)                      │   │
//! │  │   apply transition ─► persist ─► poll refresh ─► midnight      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ recount-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  scope  │ │ status  │ │ ledger  │ │ metrics │ │  merge  │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌─────────┐             │   │
//! │  │   │  term   │ │ session │ │validation│ │  money  │             │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └─────────┘             │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  recount-db (Database Layer)                    │   │
//! │  │          SQLite audit sessions, whole-snapshot JSON             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - The audit tree and [`AuditSnapshot`]
//! - [`scope`] - Scope references, leaf keys, start normalization
//! - [`status`] - Start / pause / finalize / reopen / expire / reset
//! - [`ledger`] - Batch ids and the completion history
//! - [`metrics`] - SKU, unit and cost rollups
//! - [`merge`] - Stock balance merge that protects Done categories
//! - [`term`] - Certificate keys, drafts and scope projection
//! - [`session`] - Audit numbering and closing
//! - [`validation`] - Snapshot structural checks
//! - [`money`] - Integer-cent money
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Whole snapshots**: every transition takes `&AuditSnapshot` and returns
//!    a new one inside a [`Transition`]; the input is never modified
//! 2. **Time is an argument**: `now` is passed in, the clock lives in the runtime
//! 3. **Integer Money**: costs are cents (i64)
//! 4. **Explicit Errors**: refusals are typed; an empty scope is a no-op, not an error
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use recount_core::{start_partial, finalize_scope, Actor, AuditSnapshot, ScopeRef};
//!
//! let snapshot = AuditSnapshot::default();
//! let scope = ScopeRef::group("2000");
//!
//! // Nothing under group 2000 yet: both calls are no-ops.
//! let started = start_partial(&snapshot, &scope, Utc::now());
//! let finished = finalize_scope(&started.snapshot, &scope, &Actor::operator("Rui"), Utc::now()).unwrap();
//! assert!(!finished.outcome.is_change());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod merge;
pub mod metrics;
pub mod money;
pub mod scope;
pub mod session;
pub mod status;
pub mod term;
pub mod types;
pub mod validation;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use recount_core::ScopeRef` instead of
// `use recount_core::scope::ScopeRef`

pub use error::{CoreError, CoreResult, ValidationError};
pub use ledger::{dedup_completed, entries_for_batch, group_by_batch, latest_batch_id, BatchId, BatchSummary};
pub use merge::{merge_balances, normalize_code, BalanceRow, MergeReport};
pub use metrics::{aggregate, branch_metrics, partial_percent, productivity, BranchMetrics, Productivity, ScopeMetrics};
pub use money::Money;
pub use scope::{expand_to_leaves, normalize_starts, resolve_scope, CategoryKey, ScopeRef, ScopedCategory};
pub use session::{completion_progress, finish_audit, inventory_number, next_audit_number, SessionStatus};
pub use status::{
    expire_stale_partials, finalize_all_active, finalize_scope, finalize_scope_with, next_local_midnight,
    reopen_scope, reset_history, start_partial, ExpiryPolicy, Outcome, Transition,
};
pub use term::{term_draft_or_default, term_scope_info, update_term_draft, TermDraft, TermScopeKey};
pub use types::*;
pub use validation::validate_snapshot;
