//! # Audit Runtime
//!
//! Keeps one audit session live: applies core transitions, persists after
//! every change, and runs the background refresh and midnight-expiry loop.
//!
//! ## Runtime Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        AuditRuntime Architecture                        │
//! │                                                                         │
//! │  caller ── start_partial / finalize_scope / reopen_scope / ...         │
//! │                │                                                        │
//! │                ▼                                                        │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  apply(f)                                                        │  │
//! │  │   1. write-lock the session                                      │  │
//! │  │   2. f(&snapshot) → Transition   (pure, recount-core)            │  │
//! │  │   3. swap in the new snapshot    (kept even if step 4 fails)     │  │
//! │  │   4. store.save(session)         → new revision                  │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  BACKGROUND (spawn_background):                                        │
//! │  ────────────────────────────                                          │
//! │  every refresh_interval   store.revision() != local? → reload          │
//! │  next local midnight      expire_stale_partials                        │
//! │  shutdown channel         flush, stop, reject further transitions      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transitions are serialized by the write lock, which is held across the
//! save so that a concurrent refresh never interleaves with a commit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Utc};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use recount_core::{
    branch_metrics, completion_progress, expire_stale_partials, finalize_all_active, finalize_scope, finish_audit,
    merge_balances, next_local_midnight, reopen_scope, reset_history, start_partial, update_term_draft, Actor,
    AuditSnapshot, BalanceRow, BranchMetrics, CoreResult, ExpiryPolicy, MergeReport, Outcome, ScopeRef,
    SessionStatus, TermDraft, TermScopeKey, Transition,
};
use recount_db::AuditSession;

use crate::config::RecountConfig;
use crate::error::{SyncError, SyncResult};
use crate::store::SnapshotStore;

/// Used when the next local midnight cannot be computed.
const MIDNIGHT_FALLBACK: Duration = Duration::from_secs(3600);

// =============================================================================
// Runtime Status
// =============================================================================

/// Current runtime status for external queries.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeStatus {
    pub session_id: String,

    /// Revision of the locally held session.
    pub revision: i64,

    /// Done SKU percentage of the local snapshot.
    pub progress: f64,

    /// Local snapshot has changes the store does not.
    pub dirty: bool,

    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_refreshed_at: Option<DateTime<Utc>>,

    /// Last persistence or refresh error (cleared by a successful save).
    pub last_error: Option<String>,
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives runtime events (implemented by the UI integration).
pub trait AuditEventEmitter: Send + Sync {
    /// A transition changed the snapshot.
    fn emit_outcome(&self, outcome: &Outcome, snapshot: &AuditSnapshot);

    /// The local copy was replaced by a newer stored revision.
    fn emit_refreshed(&self, revision: i64);

    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter for testing.
pub struct NoOpEmitter;

impl AuditEventEmitter for NoOpEmitter {
    fn emit_outcome(&self, _outcome: &Outcome, _snapshot: &AuditSnapshot) {}
    fn emit_refreshed(&self, _revision: i64) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Audit Runtime
// =============================================================================

struct RuntimeState {
    session: AuditSession,
    dirty: bool,
    last_saved_at: Option<DateTime<Utc>>,
    last_refreshed_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// Owns the live session of one client. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AuditRuntime {
    store: Arc<dyn SnapshotStore>,
    state: Arc<RwLock<RuntimeState>>,
    emitter: Arc<dyn AuditEventEmitter>,
    actor: Actor,
    policy: ExpiryPolicy,
    refresh_interval: Duration,
    shutting_down: Arc<AtomicBool>,
}

impl AuditRuntime {
    /// Loads `session_id` from the store and, if configured, expires stale
    /// partial starts right away.
    pub async fn open(config: &RecountConfig, store: Arc<dyn SnapshotStore>, session_id: &str) -> SyncResult<Self> {
        Self::open_with_emitter(config, store, session_id, Arc::new(NoOpEmitter)).await
    }

    pub async fn open_with_emitter(
        config: &RecountConfig,
        store: Arc<dyn SnapshotStore>,
        session_id: &str,
        emitter: Arc<dyn AuditEventEmitter>,
    ) -> SyncResult<Self> {
        config.validate()?;
        let session = store.load(session_id).await?;

        info!(
            session_id = %session.id,
            branch = %session.branch,
            audit_number = session.audit_number,
            revision = session.revision,
            operator = %config.device.operator_name,
            role = %config.device.role,
            "Audit session opened"
        );

        let runtime = AuditRuntime {
            store,
            state: Arc::new(RwLock::new(RuntimeState {
                session,
                dirty: false,
                last_saved_at: None,
                last_refreshed_at: None,
                last_error: None,
            })),
            emitter,
            actor: config.actor(),
            policy: config.expiry_policy(),
            refresh_interval: config.refresh_interval(),
            shutting_down: Arc::new(AtomicBool::new(false)),
        };

        if config.audit.run_expiry_on_load {
            // A failed save here leaves the runtime dirty; the next commit carries it.
            if let Err(e) = runtime.expire_stale(Local::now()).await {
                warn!(error = %e, "Expiry on load could not be persisted");
            }
        }

        Ok(runtime)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn snapshot(&self) -> AuditSnapshot {
        self.state.read().await.session.snapshot.clone()
    }

    pub async fn session(&self) -> AuditSession {
        self.state.read().await.session.clone()
    }

    pub async fn metrics(&self) -> BranchMetrics {
        branch_metrics(&self.state.read().await.session.snapshot)
    }

    pub async fn status(&self) -> RuntimeStatus {
        let state = self.state.read().await;
        RuntimeStatus {
            session_id: state.session.id.clone(),
            revision: state.session.revision,
            progress: completion_progress(&state.session.snapshot),
            dirty: state.dirty,
            last_saved_at: state.last_saved_at,
            last_refreshed_at: state.last_refreshed_at,
            last_error: state.last_error.clone(),
        }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Runs a pure transition against the current snapshot and persists the
    /// result when it changed anything.
    ///
    /// On a persistence failure the new snapshot stays in memory, the runtime
    /// is marked dirty, and the error is returned.
    pub async fn apply<F>(&self, f: F) -> SyncResult<Outcome>
    where
        F: FnOnce(&AuditSnapshot) -> CoreResult<Transition>,
    {
        self.ensure_running()?;
        let mut state = self.state.write().await;

        let Transition { snapshot, outcome } = f(&state.session.snapshot)?;
        if !outcome.is_change() {
            debug!(?outcome, "Transition changed nothing");
            return Ok(outcome);
        }

        info!(session_id = %state.session.id, ?outcome, "Applying transition");
        state.session.snapshot = snapshot;
        state.dirty = true;
        self.emitter.emit_outcome(&outcome, &state.session.snapshot);

        self.persist_locked(&mut state).await?;
        Ok(outcome)
    }

    /// Toggles partial counting of `scope`.
    pub async fn start_partial(&self, scope: &ScopeRef) -> SyncResult<Outcome> {
        self.apply(|s| Ok(start_partial(s, scope, Utc::now()))).await
    }

    pub async fn finalize_scope(&self, scope: &ScopeRef) -> SyncResult<Outcome> {
        let actor = &self.actor;
        self.apply(|s| finalize_scope(s, scope, actor, Utc::now())).await
    }

    pub async fn finalize_all_active(&self) -> SyncResult<Outcome> {
        let actor = &self.actor;
        self.apply(|s| finalize_all_active(s, actor, Utc::now())).await
    }

    pub async fn reopen_scope(&self, scope: &ScopeRef) -> SyncResult<Outcome> {
        let actor = &self.actor;
        self.apply(|s| reopen_scope(s, scope, actor)).await
    }

    pub async fn reset_history(&self) -> SyncResult<Outcome> {
        let actor = &self.actor;
        self.apply(|s| reset_history(s, actor)).await
    }

    pub async fn save_term_draft(&self, key: &TermScopeKey, draft: TermDraft) -> SyncResult<Outcome> {
        self.apply(|s| Ok(update_term_draft(s, key, draft))).await
    }

    /// Drops partial starts that are stale relative to `now`'s local day.
    pub async fn expire_stale<Tz: TimeZone>(&self, now: DateTime<Tz>) -> SyncResult<Outcome> {
        let policy = self.policy;
        self.apply(|s| Ok(expire_stale_partials(s, &now, &policy))).await
    }

    /// Applies a stock balance; Done categories are left alone.
    pub async fn merge_balances(&self, rows: &[BalanceRow]) -> SyncResult<MergeReport> {
        self.ensure_running()?;
        let mut state = self.state.write().await;

        let (snapshot, report) = merge_balances(&state.session.snapshot, rows);
        info!(
            updated_categories = report.updated_categories,
            skipped_done = report.skipped_done,
            unmatched_products = report.unmatched_products,
            "Stock balance merged"
        );
        if report.updated_categories == 0 {
            return Ok(report);
        }

        state.session.snapshot = snapshot;
        state.dirty = true;
        self.persist_locked(&mut state).await?;
        Ok(report)
    }

    /// Master-only: closes the audit once every SKU is counted.
    pub async fn finish_audit(&self) -> SyncResult<f64> {
        self.ensure_running()?;
        let mut state = self.state.write().await;

        let progress = finish_audit(&state.session.snapshot, &self.actor)?;
        state.session.status = SessionStatus::Completed;
        state.dirty = true;
        self.persist_locked(&mut state).await?;

        info!(
            session_id = %state.session.id,
            audit_number = state.session.audit_number,
            progress,
            "Audit finished"
        );
        Ok(progress)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Persists pending local changes. Returns whether a save happened.
    pub async fn flush(&self) -> SyncResult<bool> {
        let mut state = self.state.write().await;
        if !state.dirty {
            return Ok(false);
        }
        self.persist_locked(&mut state).await?;
        Ok(true)
    }

    /// Reloads the session when the stored revision differs from ours.
    ///
    /// The stored copy wins wholesale; unsaved local changes are dropped.
    pub async fn refresh(&self) -> SyncResult<bool> {
        let mut state = self.state.write().await;
        let session_id = state.session.id.clone();

        let remote = match self.store.revision(&session_id).await {
            Ok(Some(revision)) => revision,
            Ok(None) => {
                warn!(session_id = %session_id, "Audit session no longer stored");
                return Ok(false);
            }
            Err(e) => {
                state.last_error = Some(e.to_string());
                return Err(e);
            }
        };
        if remote == state.session.revision {
            return Ok(false);
        }

        let session = self.store.load(&session_id).await?;
        if state.dirty {
            warn!(
                session_id = %session_id,
                local_revision = state.session.revision,
                remote_revision = session.revision,
                "Discarding unsaved local changes for newer stored revision"
            );
        }
        info!(
            session_id = %session_id,
            from = state.session.revision,
            to = session.revision,
            "Audit session refreshed"
        );

        let revision = session.revision;
        state.session = session;
        state.dirty = false;
        state.last_refreshed_at = Some(Utc::now());
        state.last_error = None;
        self.emitter.emit_refreshed(revision);
        Ok(true)
    }

    async fn persist_locked(&self, state: &mut RuntimeState) -> SyncResult<()> {
        match self.store.save(&state.session).await {
            Ok(revision) => {
                state.session.revision = revision;
                state.dirty = false;
                state.last_saved_at = Some(Utc::now());
                state.last_error = None;
                debug!(session_id = %state.session.id, revision, "Audit session persisted");
                Ok(())
            }
            Err(e) => {
                warn!(
                    session_id = %state.session.id,
                    error = %e,
                    "Persisting audit session failed, keeping local state"
                );
                state.last_error = Some(e.to_string());
                self.emitter.emit_error(&e.to_string(), e.is_retryable());
                Err(e)
            }
        }
    }

    fn ensure_running(&self) -> SyncResult<()> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(SyncError::ShuttingDown);
        }
        Ok(())
    }

    // =========================================================================
    // Background Loop
    // =========================================================================

    /// Spawns the refresh and midnight-expiry loop.
    pub fn spawn_background(&self) -> RuntimeHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(self.clone().run_background(shutdown_rx));
        RuntimeHandle { shutdown_tx, task }
    }

    async fn run_background(self, mut shutdown_rx: mpsc::Receiver<()>) {
        let mut refresh = tokio::time::interval_at(Instant::now() + self.refresh_interval, self.refresh_interval);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            refresh_interval_secs = self.refresh_interval.as_secs(),
            grace_minutes = self.policy.grace_minutes,
            "Audit runtime background loop started"
        );

        loop {
            let until_midnight = until_next_midnight(&Local::now());

            tokio::select! {
                _ = refresh.tick() => {
                    if let Err(e) = self.refresh().await {
                        warn!(error = %e, "Refresh failed");
                        self.emitter.emit_error(&e.to_string(), e.is_retryable());
                    }
                }

                _ = tokio::time::sleep(until_midnight) => {
                    match self.expire_stale(Local::now()).await {
                        Ok(Outcome::Expired { removed }) if removed > 0 => {
                            info!(removed, "Stale partial starts expired at midnight");
                        }
                        Ok(_) => debug!("Midnight expiry found nothing stale"),
                        Err(e) => warn!(error = %e, "Midnight expiry failed"),
                    }
                }

                _ = shutdown_rx.recv() => {
                    info!("Audit runtime received shutdown");
                    break;
                }
            }
        }

        self.shutting_down.store(true, Ordering::SeqCst);
        match self.flush().await {
            Ok(true) => info!("Pending changes flushed on shutdown"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Could not flush pending changes on shutdown"),
        }
        info!("Audit runtime stopped");
    }
}

/// Time left until just after the next local midnight.
fn until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    next_local_midnight(now)
        .and_then(|midnight| (midnight - now.clone()).to_std().ok())
        .map(|d| d + Duration::from_secs(1))
        .unwrap_or(MIDNIGHT_FALLBACK)
}

// =============================================================================
// Runtime Handle (for external control)
// =============================================================================

/// Controls a running background loop.
pub struct RuntimeHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl RuntimeHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the loop, flushing pending changes, and waits for it to end.
    pub async fn shutdown(self) -> SyncResult<()> {
        let _ = self.shutdown_tx.send(()).await;
        self.task.await.map_err(|e| SyncError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{Duration as ChronoDuration, FixedOffset};
    use recount_core::{
        AuditStatus, Category, CategoryKey, CoreError, Department, Group, Money, PartialStart, Product, Role,
    };

    fn product(code: &str, quantity: i64) -> Product {
        Product {
            code: code.to_string(),
            reduced_code: None,
            name: code.to_string(),
            quantity,
            unit_cost: Money::from_cents(100),
        }
    }

    fn category(id: &str, products: Vec<Product>) -> Category {
        let mut c = Category {
            id: id.to_string(),
            numeric_id: None,
            name: id.to_string(),
            items_count: 0,
            total_quantity: 0,
            total_cost: Money::zero(),
            status: AuditStatus::Pending,
            products,
        };
        c.recompute_totals();
        c
    }

    fn snapshot() -> AuditSnapshot {
        AuditSnapshot {
            groups: vec![Group {
                id: "1".into(),
                name: "Medicines".into(),
                departments: vec![Department {
                    id: "10".into(),
                    numeric_id: Some("10".into()),
                    name: "Pain relief".into(),
                    categories: vec![
                        category("100", vec![product("1001", 5), product("1002", 3)]),
                        category("101", vec![product("1003", 2)]),
                    ],
                }],
            }],
            branch: "12".into(),
            inventory_number: "2026-0012-0001".into(),
            ..AuditSnapshot::default()
        }
    }

    fn session(snapshot: AuditSnapshot) -> AuditSession {
        let now = Utc::now();
        AuditSession {
            id: "session-1".into(),
            branch: "12".into(),
            audit_number: 1,
            status: SessionStatus::Open,
            progress: 0.0,
            snapshot,
            revision: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn config(role: Role) -> RecountConfig {
        let mut config = RecountConfig::default();
        config.device.operator_name = "Ana".into();
        config.device.role = role;
        config.store.branch = "12".into();
        config.audit.refresh_interval_secs = 1;
        config
    }

    async fn open(role: Role, snapshot: AuditSnapshot) -> (AuditRuntime, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_session(session(snapshot)));
        let runtime = AuditRuntime::open(&config(role), store.clone(), "session-1").await.unwrap();
        (runtime, store)
    }

    fn leaf_100() -> ScopeRef {
        ScopeRef::category("1", "10", "100")
    }

    #[tokio::test]
    async fn test_transition_persists_and_bumps_revision() {
        let (runtime, store) = open(Role::Operator, snapshot()).await;

        let outcome = runtime.start_partial(&leaf_100()).await.unwrap();
        assert!(matches!(outcome, Outcome::Started { ref leaves } if leaves.len() == 1));

        let status = runtime.status().await;
        assert_eq!(status.revision, 2);
        assert!(!status.dirty);
        assert!(status.last_saved_at.is_some());

        let stored = store.stored("session-1").unwrap();
        assert_eq!(stored.snapshot.partial_starts.len(), 1);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_outcome_is_not_saved() {
        let (runtime, store) = open(Role::Master, snapshot()).await;

        let outcome = runtime.finalize_all_active().await.unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_local_state() {
        let (runtime, store) = open(Role::Operator, snapshot()).await;
        store.fail_saves(true);

        let err = runtime.start_partial(&leaf_100()).await.unwrap_err();
        assert!(err.is_persistence_error());

        let status = runtime.status().await;
        assert!(status.dirty);
        assert!(status.last_error.is_some());
        assert_eq!(runtime.snapshot().await.partial_starts.len(), 1);
        assert!(store.stored("session-1").unwrap().snapshot.partial_starts.is_empty());

        store.fail_saves(false);
        assert!(runtime.flush().await.unwrap());
        assert_eq!(store.stored("session-1").unwrap().snapshot.partial_starts.len(), 1);
        assert!(runtime.status().await.last_error.is_none());
        assert!(!runtime.flush().await.unwrap());
    }

    #[tokio::test]
    async fn test_operator_cannot_reopen() {
        let (runtime, store) = open(Role::Operator, snapshot()).await;

        let err = runtime.reopen_scope(&leaf_100()).await.unwrap_err();
        assert!(matches!(err, SyncError::Core(CoreError::PermissionDenied { .. })));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_operator_cannot_reopen_by_finalizing_twice() {
        let (runtime, store) = open(Role::Operator, snapshot()).await;
        runtime.start_partial(&leaf_100()).await.unwrap();
        runtime.finalize_scope(&leaf_100()).await.unwrap();

        let err = runtime.finalize_scope(&leaf_100()).await.unwrap_err();
        assert!(matches!(err, SyncError::Core(CoreError::PermissionDenied { .. })));
        assert_eq!(store.save_count(), 2);
        let category = runtime.snapshot().await.category(&CategoryKey::new("1", "10", "100")).cloned();
        assert_eq!(category.map(|c| c.status), Some(AuditStatus::Done));
    }

    #[tokio::test]
    async fn test_open_rejects_zero_refresh_interval() {
        let store = Arc::new(MemoryStore::with_session(session(snapshot())));
        let mut config = config(Role::Operator);
        config.audit.refresh_interval_secs = 0;

        let err = AuditRuntime::open(&config, store.clone(), "session-1").await.err();
        assert!(matches!(err, Some(SyncError::InvalidConfig(_))));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_replaces_only_on_revision_change() {
        let (runtime, store) = open(Role::Operator, snapshot()).await;
        assert!(!runtime.refresh().await.unwrap());

        let mut remote = store.stored("session-1").unwrap();
        remote.snapshot.company = "Changed elsewhere".into();
        let revision = store.write_remote(remote);

        assert!(runtime.refresh().await.unwrap());
        assert_eq!(runtime.snapshot().await.company, "Changed elsewhere");
        assert_eq!(runtime.status().await.revision, revision);
        assert!(runtime.status().await.last_refreshed_at.is_some());

        assert!(!runtime.refresh().await.unwrap());
    }

    #[tokio::test]
    async fn test_expiry_runs_on_load() {
        let mut snap = snapshot();
        let key = CategoryKey::new("1", "10", "100");
        let long_ago = Utc::now() - ChronoDuration::days(400);
        snap.partial_starts.push(PartialStart::for_leaf(&key, long_ago));
        snap.for_each_category_mut(|k, c| {
            if *k == key {
                c.status = AuditStatus::InProgress;
            }
        });

        let (runtime, store) = open(Role::Operator, snap).await;

        let current = runtime.snapshot().await;
        assert!(current.partial_starts.is_empty());
        assert_eq!(current.category(&key).unwrap().status, AuditStatus::Pending);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_finish_audit() {
        let (runtime, store) = open(Role::Master, snapshot()).await;

        let err = runtime.finish_audit().await.unwrap_err();
        assert!(matches!(err, SyncError::Core(CoreError::AuditIncomplete { .. })));

        runtime.start_partial(&ScopeRef::branch()).await.unwrap();
        runtime.finalize_scope(&ScopeRef::branch()).await.unwrap();
        assert_eq!(runtime.metrics().await.done_categories, 2);

        let progress = runtime.finish_audit().await.unwrap();
        assert_eq!(progress, 100.0);
        assert_eq!(store.stored("session-1").unwrap().status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_merge_skips_done_and_persists() {
        let (runtime, store) = open(Role::Master, snapshot()).await;
        runtime.start_partial(&leaf_100()).await.unwrap();
        runtime.finalize_scope(&leaf_100()).await.unwrap();
        let saves = store.save_count();

        let rows = vec![
            BalanceRow { code: "1001".into(), quantity: 50, unit_cost: Money::from_cents(100) },
            BalanceRow { code: "1003".into(), quantity: 9, unit_cost: Money::from_cents(100) },
        ];
        let report = runtime.merge_balances(&rows).await.unwrap();

        assert_eq!(report.updated_categories, 1);
        assert_eq!(report.skipped_done, 1);
        assert_eq!(store.save_count(), saves + 1);
        let stored = store.stored("session-1").unwrap();
        let done = stored.snapshot.category(&CategoryKey::new("1", "10", "100")).unwrap();
        assert_eq!(done.total_quantity, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_refresh_and_shutdown() {
        let (runtime, store) = open(Role::Operator, snapshot()).await;
        let handle = runtime.spawn_background();

        let mut remote = store.stored("session-1").unwrap();
        remote.snapshot.company = "Remote".into();
        store.write_remote(remote);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runtime.snapshot().await.company, "Remote");

        handle.shutdown().await.unwrap();
        assert!(matches!(
            runtime.start_partial(&leaf_100()).await,
            Err(SyncError::ShuttingDown)
        ));
    }

    #[test]
    fn test_until_next_midnight() {
        let tz = FixedOffset::west_opt(3 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2026, 10, 16, 23, 30, 0).unwrap();
        assert_eq!(until_next_midnight(&now), Duration::from_secs(30 * 60 + 1));
    }
}
