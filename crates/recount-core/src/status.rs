//! # Status State Machine
//!
//! Every audit transition, as a pure function from one snapshot to the next.
//!
//! ## Transitions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  start_partial(scope)        toggle: start the non-Done leaves, or     │
//! │                              pause them if they are all active         │
//! │                                                                         │
//! │  finalize_scope(scope)       all Done     ─► reopen (master)           │
//! │                              all Pending  ─► NotStarted                │
//! │                              otherwise    ─► Done + one batch          │
//! │                                                                         │
//! │  finalize_all_active()       master: finalize every active leaf        │
//! │  reopen_scope(scope)         master: Done ─► Pending                   │
//! │  expire_stale_partials(now)  drop starts from another calendar day     │
//! │  reset_history()             master: everything back to Pending        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Callers hand in `now`; nothing in here reads the clock. The input snapshot
//! is never modified. A scope that matches no leaf yields
//! [`Outcome::Unchanged`], never an error.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CoreError, CoreResult};
use crate::ledger::{dedup_completed, latest_batch_id, BatchId};
use crate::scope::{active_leaves, expand_to_leaves, normalize_starts, CategoryKey, ScopeRef};
use crate::term::TermScopeKey;
use crate::types::{Actor, AuditSnapshot, AuditStatus, PartialCompleted, PartialStart};

// =============================================================================
// Transition Result
// =============================================================================

/// What a transition did. Runtimes log it and decide whether to persist.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing to do (empty scope, nothing active, ...).
    Unchanged,
    Started { leaves: Vec<CategoryKey> },
    Paused { leaves: Vec<CategoryKey> },
    Finalized { batch_id: BatchId, leaves: Vec<CategoryKey> },
    Reopened { leaves: Vec<CategoryKey> },
    Expired { removed: usize },
    HistoryReset,
    DraftSaved { key: String },
}

impl Outcome {
    pub fn is_change(&self) -> bool {
        !matches!(self, Outcome::Unchanged | Outcome::Expired { removed: 0 })
    }
}

/// A new snapshot plus the outcome that produced it.
#[derive(Debug, Clone)]
pub struct Transition {
    pub snapshot: AuditSnapshot,
    pub outcome: Outcome,
}

impl Transition {
    fn unchanged(snapshot: &AuditSnapshot) -> Self {
        Self {
            snapshot: snapshot.clone(),
            outcome: Outcome::Unchanged,
        }
    }
}

// =============================================================================
// Expiry Policy
// =============================================================================

/// How stale partial starts are recognised.
///
/// With the default (zero grace) a start dated on any other local calendar
/// day is stale. A non-zero grace keeps starts younger than the window alive
/// across midnight, for shifts that straddle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExpiryPolicy {
    pub grace_minutes: u32,
}

impl ExpiryPolicy {
    pub fn strict() -> Self {
        Self::default()
    }

    pub fn with_grace_minutes(grace_minutes: u32) -> Self {
        Self { grace_minutes }
    }

    fn grace(&self) -> Duration {
        Duration::minutes(i64::from(self.grace_minutes))
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn require_master(actor: &Actor, action: &str) -> CoreResult<()> {
    if actor.is_master() {
        Ok(())
    } else {
        Err(CoreError::PermissionDenied {
            action: action.to_string(),
        })
    }
}

/// Rewrites `partial_starts` to one entry per non-Done leaf.
fn normalize_in_place(snapshot: &mut AuditSnapshot) {
    let starts = normalize_starts(snapshot, &snapshot.partial_starts);
    snapshot.partial_starts = starts;
}

/// Non-Done categories become InProgress when active, Pending otherwise.
fn refresh_statuses(snapshot: &mut AuditSnapshot) {
    let active = active_leaves(snapshot);
    snapshot.for_each_category_mut(|key, category| {
        if category.is_done() {
            return;
        }
        category.status = if active.contains(key) {
            AuditStatus::InProgress
        } else {
            AuditStatus::Pending
        };
    });
}

fn leaf_statuses(snapshot: &AuditSnapshot, leaves: &BTreeSet<CategoryKey>) -> Vec<AuditStatus> {
    snapshot
        .categories()
        .filter(|sc| leaves.contains(&sc.key()))
        .map(|sc| sc.category.status)
        .collect()
}

fn set_status(snapshot: &mut AuditSnapshot, leaves: &BTreeSet<CategoryKey>, status: AuditStatus) {
    snapshot.for_each_category_mut(|key, category| {
        if leaves.contains(key) {
            category.status = status;
        }
    });
}

fn finalize_leaves(
    snapshot: &mut AuditSnapshot,
    leaves: &BTreeSet<CategoryKey>,
    now: DateTime<Utc>,
    batch_id: BatchId,
) {
    let started: BTreeMap<CategoryKey, DateTime<Utc>> = snapshot
        .partial_starts
        .iter()
        .filter_map(|s| {
            let key = CategoryKey::new(s.group_id.as_deref()?, s.dept_id.as_deref()?, s.cat_id.as_deref()?);
            Some((key, s.started_at))
        })
        .collect();

    snapshot
        .partial_starts
        .retain(|s| !leaves.iter().any(|k| s.scope().covers(k)));
    set_status(snapshot, leaves, AuditStatus::Done);

    let mut history = std::mem::take(&mut snapshot.partial_completed);
    history.extend(leaves.iter().map(|key| PartialCompleted {
        started_at: started.get(key).copied(),
        completed_at: Some(now),
        batch_id: batch_id.clone(),
        group_id: Some(key.group.clone()),
        dept_id: Some(key.department.clone()),
        cat_id: Some(key.category.clone()),
    }));
    snapshot.partial_completed = dedup_completed(&history);
    snapshot.last_partial_batch_id = Some(batch_id);
}

fn reopen_leaves(snapshot: &mut AuditSnapshot, leaves: &BTreeSet<CategoryKey>) {
    set_status(snapshot, leaves, AuditStatus::Pending);
    snapshot
        .partial_starts
        .retain(|s| !leaves.iter().any(|k| s.scope().covers(k)));

    let history = std::mem::take(&mut snapshot.partial_completed);
    let kept: Vec<PartialCompleted> = history
        .into_iter()
        .filter(|record| {
            let covered = expand_to_leaves(snapshot, &record.scope());
            covered.is_empty() || !covered.is_subset(leaves)
        })
        .collect();
    snapshot.partial_completed = kept;
    snapshot.last_partial_batch_id = latest_batch_id(&snapshot.partial_completed);
}

// =============================================================================
// Start / Pause
// =============================================================================

/// Toggles the non-Done leaves of `scope`.
///
/// If every one of them is already active the call pauses them; otherwise
/// the missing ones start at `now` and the already-active ones keep their
/// original `started_at`.
pub fn start_partial(snapshot: &AuditSnapshot, scope: &ScopeRef, now: DateTime<Utc>) -> Transition {
    let mut next = snapshot.clone();
    normalize_in_place(&mut next);

    let leaves: BTreeSet<CategoryKey> = expand_to_leaves(&next, scope)
        .into_iter()
        .filter(|key| next.category(key).is_some_and(|c| !c.is_done()))
        .collect();
    if leaves.is_empty() {
        return Transition::unchanged(snapshot);
    }

    let active = active_leaves(&next);
    let outcome = if leaves.is_subset(&active) {
        next.partial_starts
            .retain(|s| !leaves.iter().any(|k| s.scope().covers(k)));
        Outcome::Paused {
            leaves: leaves.into_iter().collect(),
        }
    } else {
        let missing: Vec<CategoryKey> = leaves.difference(&active).cloned().collect();
        next.partial_starts
            .extend(missing.iter().map(|key| PartialStart::for_leaf(key, now)));
        normalize_in_place(&mut next);
        Outcome::Started { leaves: missing }
    };

    refresh_statuses(&mut next);
    Transition {
        snapshot: next,
        outcome,
    }
}

// =============================================================================
// Finalize / Reopen
// =============================================================================

/// Finalizes (or reopens) `scope` with a freshly generated batch id.
pub fn finalize_scope(
    snapshot: &AuditSnapshot,
    scope: &ScopeRef,
    actor: &Actor,
    now: DateTime<Utc>,
) -> CoreResult<Transition> {
    finalize_scope_with(snapshot, scope, actor, now, BatchId::generate())
}

/// [`finalize_scope`] with a caller-supplied batch id.
///
/// ## Decision Table
/// ```text
///   leaves in scope     │ result
///   ────────────────────┼──────────────────────────────────────────────
///   none                │ Unchanged
///   all Done            │ Reopened (history for those leaves removed),
///                       │ Err(PermissionDenied) unless the actor is master
///   all Pending         │ Err(NotStarted)
///   anything else       │ Finalized: every leaf Done, one record each
/// ```
pub fn finalize_scope_with(
    snapshot: &AuditSnapshot,
    scope: &ScopeRef,
    actor: &Actor,
    now: DateTime<Utc>,
    batch_id: BatchId,
) -> CoreResult<Transition> {
    let mut next = snapshot.clone();
    normalize_in_place(&mut next);
    refresh_statuses(&mut next);

    let leaves = expand_to_leaves(&next, scope);
    if leaves.is_empty() {
        return Ok(Transition::unchanged(snapshot));
    }

    let statuses = leaf_statuses(&next, &leaves);
    if statuses.iter().all(|s| s.is_done()) {
        require_master(actor, "reopen a finished scope")?;
        reopen_leaves(&mut next, &leaves);
        return Ok(Transition {
            snapshot: next,
            outcome: Outcome::Reopened {
                leaves: leaves.into_iter().collect(),
            },
        });
    }

    if statuses.iter().all(|s| *s == AuditStatus::Pending) {
        return Err(CoreError::NotStarted {
            scope: scope.to_string(),
        });
    }

    finalize_leaves(&mut next, &leaves, now, batch_id.clone());
    refresh_statuses(&mut next);
    Ok(Transition {
        snapshot: next,
        outcome: Outcome::Finalized {
            batch_id,
            leaves: leaves.into_iter().collect(),
        },
    })
}

/// Master-only: finalizes every active leaf under one batch id.
pub fn finalize_all_active(snapshot: &AuditSnapshot, actor: &Actor, now: DateTime<Utc>) -> CoreResult<Transition> {
    require_master(actor, "finalize all active scopes")?;

    let mut next = snapshot.clone();
    normalize_in_place(&mut next);
    let active = active_leaves(&next);
    if active.is_empty() {
        return Ok(Transition::unchanged(snapshot));
    }

    let batch_id = BatchId::generate();
    finalize_leaves(&mut next, &active, now, batch_id.clone());
    refresh_statuses(&mut next);
    Ok(Transition {
        snapshot: next,
        outcome: Outcome::Finalized {
            batch_id,
            leaves: active.into_iter().collect(),
        },
    })
}

/// Master-only: returns the Done leaves of `scope` to Pending and drops
/// their history records. Non-Done leaves are left alone.
pub fn reopen_scope(snapshot: &AuditSnapshot, scope: &ScopeRef, actor: &Actor) -> CoreResult<Transition> {
    require_master(actor, "reopen a finished scope")?;

    let leaves: BTreeSet<CategoryKey> = expand_to_leaves(snapshot, scope)
        .into_iter()
        .filter(|key| snapshot.category(key).is_some_and(|c| c.is_done()))
        .collect();
    if leaves.is_empty() {
        return Ok(Transition::unchanged(snapshot));
    }

    let mut next = snapshot.clone();
    normalize_in_place(&mut next);
    reopen_leaves(&mut next, &leaves);
    refresh_statuses(&mut next);
    Ok(Transition {
        snapshot: next,
        outcome: Outcome::Reopened {
            leaves: leaves.into_iter().collect(),
        },
    })
}

// =============================================================================
// Expiry
// =============================================================================

/// Drops partial starts that belong to another local calendar day.
///
/// "Local" is the timezone of `now`. Affected categories go back to Pending.
/// Done categories and the history are never touched.
pub fn expire_stale_partials<Tz: TimeZone>(
    snapshot: &AuditSnapshot,
    now: &DateTime<Tz>,
    policy: &ExpiryPolicy,
) -> Transition {
    let today = now.date_naive();
    let now_utc = now.with_timezone(&Utc);
    let grace = policy.grace();

    let mut next = snapshot.clone();
    let before = next.partial_starts.len();
    next.partial_starts.retain(|s| {
        let same_day = s.started_at.with_timezone(&now.timezone()).date_naive() == today;
        let within_grace = policy.grace_minutes > 0 && now_utc - s.started_at <= grace;
        same_day || within_grace
    });
    let removed = before - next.partial_starts.len();
    if removed == 0 {
        return Transition {
            snapshot: next,
            outcome: Outcome::Expired { removed: 0 },
        };
    }

    refresh_statuses(&mut next);
    Transition {
        snapshot: next,
        outcome: Outcome::Expired { removed },
    }
}

/// The next local midnight after `now`, in `now`'s timezone.
///
/// When midnight does not exist locally (a DST gap) the first valid instant
/// of the new day within the following hour is used.
pub fn next_local_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tomorrow = now.date_naive().succ_opt()?;
    let tz = now.timezone();
    tz.from_local_datetime(&tomorrow.and_hms_opt(0, 0, 0)?)
        .earliest()
        .or_else(|| tz.from_local_datetime(&tomorrow.and_hms_opt(1, 0, 0)?).earliest())
}

// =============================================================================
// Reset
// =============================================================================

/// Master-only: every category back to Pending, history wiped.
///
/// Batch certificate drafts (`custom|…`) are dropped because their batches no
/// longer exist; single-scope drafts survive.
pub fn reset_history(snapshot: &AuditSnapshot, actor: &Actor) -> CoreResult<Transition> {
    require_master(actor, "reset the audit history")?;

    let mut next = snapshot.clone();
    next.for_each_category_mut(|_, category| category.status = AuditStatus::Pending);
    next.partial_starts.clear();
    next.partial_completed.clear();
    next.last_partial_batch_id = None;
    next.term_drafts
        .retain(|key, _| !TermScopeKey::is_custom_storage_key(key));

    Ok(Transition {
        snapshot: next,
        outcome: Outcome::HistoryReset,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
