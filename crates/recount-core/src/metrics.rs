//! # Metrics Aggregator
//!
//! SKU / unit / cost rollups at any level of the tree.
//!
//! ```text
//!   Category  cached totals (items_count, total_quantity, total_cost)
//!      │  Σ
//!   Department / Group / Branch   computed on read, never stored
//! ```
//!
//! Percentages are 0..=100 and are 0 when their denominator is 0.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use ts_rs::TS;

use crate::money::Money;
use crate::scope::{active_leaves, resolve_scope, ScopeRef};
use crate::types::AuditSnapshot;

/// Working hours in one audit day, for the ETA estimate.
pub const WORKING_HOURS_PER_DAY: f64 = 8.0;

/// Lower bound on elapsed time so the first minutes don't report absurd speeds.
pub const MIN_ELAPSED_HOURS: f64 = 0.05;

fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

// =============================================================================
// Scope Metrics
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ScopeMetrics {
    pub skus: usize,
    pub units: i64,
    pub cost: Money,
    pub done_skus: usize,
    pub done_units: i64,
    pub done_cost: Money,
}

impl ScopeMetrics {
    pub fn progress_skus(&self) -> f64 {
        percent(self.done_skus as f64, self.skus as f64)
    }

    pub fn progress_units(&self) -> f64 {
        percent(self.done_units as f64, self.units as f64)
    }

    pub fn progress_cost(&self) -> f64 {
        self.done_cost.ratio_of(self.cost) * 100.0
    }

    pub fn pending_skus(&self) -> usize {
        self.skus.saturating_sub(self.done_skus)
    }

    pub fn pending_units(&self) -> i64 {
        self.units - self.done_units
    }

    pub fn pending_cost(&self) -> Money {
        self.cost - self.done_cost
    }
}

impl std::ops::Add for ScopeMetrics {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            skus: self.skus.saturating_add(other.skus),
            units: self.units.saturating_add(other.units),
            cost: self.cost + other.cost,
            done_skus: self.done_skus.saturating_add(other.done_skus),
            done_units: self.done_units.saturating_add(other.done_units),
            done_cost: self.done_cost + other.done_cost,
        }
    }
}

/// Sums the cached category totals under `scope`.
pub fn aggregate(snapshot: &AuditSnapshot, scope: &ScopeRef) -> ScopeMetrics {
    resolve_scope(snapshot, scope)
        .into_iter()
        .fold(ScopeMetrics::default(), |mut m, sc| {
            let c = sc.category;
            m.skus += c.items_count;
            m.units = m.units.saturating_add(c.total_quantity);
            m.cost += c.total_cost;
            if c.is_done() {
                m.done_skus += c.items_count;
                m.done_units = m.done_units.saturating_add(c.total_quantity);
                m.done_cost += c.total_cost;
            }
            m
        })
}

/// Share of the scope's SKUs currently being counted (active, not Done).
pub fn partial_percent(snapshot: &AuditSnapshot, scope: &ScopeRef) -> f64 {
    let active = active_leaves(snapshot);
    let (in_progress, total) = resolve_scope(snapshot, scope)
        .into_iter()
        .fold((0usize, 0usize), |(part, total), sc| {
            let counted = !sc.category.is_done() && active.contains(&sc.key());
            let items = sc.category.items_count;
            (if counted { part + items } else { part }, total + items)
        });
    percent(in_progress as f64, total as f64)
}

pub fn group_metrics(snapshot: &AuditSnapshot, group_id: &str) -> ScopeMetrics {
    aggregate(snapshot, &ScopeRef::group(group_id))
}

pub fn department_metrics(snapshot: &AuditSnapshot, group_id: &str, dept_id: &str) -> ScopeMetrics {
    aggregate(snapshot, &ScopeRef::department(group_id, dept_id))
}

pub fn category_metrics(snapshot: &AuditSnapshot, group_id: &str, dept_id: &str, cat_id: &str) -> ScopeMetrics {
    aggregate(snapshot, &ScopeRef::category(group_id, dept_id, cat_id))
}

// =============================================================================
// Branch Metrics
// =============================================================================

/// Whole-branch figures for the dashboard header.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BranchMetrics {
    #[serde(flatten)]
    pub totals: ScopeMetrics,
    pub total_categories: usize,
    pub done_categories: usize,
}

pub fn branch_metrics(snapshot: &AuditSnapshot) -> BranchMetrics {
    BranchMetrics {
        totals: aggregate(snapshot, &ScopeRef::branch()),
        total_categories: snapshot.categories().count(),
        done_categories: snapshot.categories().filter(|sc| sc.category.is_done()).count(),
    }
}

// =============================================================================
// Productivity
// =============================================================================

/// Counting speed for the current session and a rough finish estimate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Productivity {
    pub counted_this_session: i64,
    pub speed_per_hour: f64,
    pub eta_days: f64,
}

/// Units counted since the session opened, per hour, and days to finish.
///
/// ```text
/// speed = counted / max(0.05 h, elapsed)
/// eta   = pending / max(1, speed) / 8 h
/// ```
pub fn productivity(done_now: i64, done_at_session_start: i64, pending_units: i64, elapsed: Duration) -> Productivity {
    let counted = (done_now - done_at_session_start).max(0);
    let hours = (elapsed.as_secs_f64() / 3600.0).max(MIN_ELAPSED_HOURS);
    let speed = counted as f64 / hours;
    let eta_days = pending_units.max(0) as f64 / speed.max(1.0) / WORKING_HOURS_PER_DAY;

    Productivity {
        counted_this_session: counted,
        speed_per_hour: speed,
        eta_days,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_snapshot;
    use crate::types::AuditStatus;

    #[test]
    fn test_aggregate_branch() {
        let snapshot = sample_snapshot();
        let m = aggregate(&snapshot, &ScopeRef::branch());
        assert_eq!(m.skus, 6);
        assert_eq!(m.units, 28);
        assert_eq!(m.cost.cents(), 4900);
        assert_eq!(m.done_skus, 0);
        assert_eq!(m.progress_skus(), 0.0);
    }

    #[test]
    fn test_group_equals_sum_of_departments() {
        let snapshot = sample_snapshot();
        let group = group_metrics(&snapshot, "1");
        let sum = department_metrics(&snapshot, "1", "10") + department_metrics(&snapshot, "1", "11");
        assert_eq!(group, sum);
    }

    #[test]
    fn test_done_figures_and_progress() {
        let mut snapshot = sample_snapshot();
        snapshot.groups[0].departments[0].categories[0].status = AuditStatus::Done;

        let m = group_metrics(&snapshot, "1");
        assert_eq!(m.skus, 5);
        assert_eq!(m.done_skus, 2);
        assert_eq!(m.done_units, 15);
        assert_eq!(m.done_cost.cents(), 2000);
        assert_eq!(m.pending_skus(), 3);
        assert_eq!(m.pending_units(), 6);
        assert!((m.progress_skus() - 40.0).abs() < 1e-9);
        assert!((m.progress_cost() - 2000.0 / 4200.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_scope_has_zero_progress() {
        let snapshot = sample_snapshot();
        let m = category_metrics(&snapshot, "9", "9", "9");
        assert_eq!(m, ScopeMetrics::default());
        assert_eq!(m.progress_units(), 0.0);
        assert_eq!(partial_percent(&snapshot, &ScopeRef::group("9")), 0.0);
    }

    #[test]
    fn test_partial_percent_counts_active_leaves() {
        let mut snapshot = sample_snapshot();
        snapshot.partial_starts = vec![crate::types::PartialStart {
            started_at: crate::testing::ts(9, 0),
            group_id: Some("1".to_string()),
            dept_id: Some("10".to_string()),
            cat_id: None,
        }];
        // 3 of the 5 SKUs in group 1 sit under department 10.
        assert!((partial_percent(&snapshot, &ScopeRef::group("1")) - 60.0).abs() < 1e-9);

        snapshot.groups[0].departments[0].categories[0].status = AuditStatus::Done;
        assert!((partial_percent(&snapshot, &ScopeRef::group("1")) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_branch_metrics_category_counts() {
        let mut snapshot = sample_snapshot();
        snapshot.groups[1].departments[0].categories[0].status = AuditStatus::Done;
        let b = branch_metrics(&snapshot);
        assert_eq!(b.total_categories, 4);
        assert_eq!(b.done_categories, 1);
        assert_eq!(b.totals.done_units, 7);
    }

    #[test]
    fn test_productivity() {
        let p = productivity(500, 100, 1600, Duration::from_secs(2 * 3600));
        assert_eq!(p.counted_this_session, 400);
        assert!((p.speed_per_hour - 200.0).abs() < 1e-9);
        assert!((p.eta_days - 1.0).abs() < 1e-9);

        // Nothing counted yet: speed floors at 1 unit/hour for the ETA.
        let p = productivity(100, 100, 80, Duration::from_secs(0));
        assert_eq!(p.speed_per_hour, 0.0);
        assert!((p.eta_days - 10.0).abs() < 1e-9);
    }
}
