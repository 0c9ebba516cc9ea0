//! # Scope Model
//!
//! Canonical scope references, leaf keys, and the partial-scope normalizer.
//!
//! ## Scopes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ScopeRef { group_id, dept_id, cat_id }   (None = wildcard)             │
//! │                                                                         │
//! │   branch()            ─► every category                                │
//! │   group(g)            ─► every category under g                        │
//! │   department(g, d)    ─► every category under g/d                      │
//! │   category(g, d, c)   ─► exactly one leaf                              │
//! │                                                                         │
//! │  expand_to_leaves(snapshot, scope) ─► BTreeSet<CategoryKey>            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identifier Equality
//! Ids are compared after trimming. An id that trims to empty is a wildcard
//! in a `ScopeRef` and the empty string in a `CategoryKey`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use ts_rs::TS;

use crate::types::{AuditSnapshot, Category, Department, Group, PartialStart};

/// Separator used by every `|`-joined key form.
pub const KEY_SEPARATOR: char = '|';

/// Trims an id; empty means "not given".
pub fn normalize_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[inline]
fn ids_equal(a: &str, b: &str) -> bool {
    a.trim() == b.trim()
}

// =============================================================================
// Category Key
// =============================================================================

/// Composite identity of a leaf category.
///
/// Ordering is lexicographic on `(group, department, category)`, which is what
/// makes every leaf set deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryKey {
    pub group: String,
    pub department: String,
    pub category: String,
}

impl CategoryKey {
    pub fn new(group: &str, department: &str, category: &str) -> Self {
        Self {
            group: group.trim().to_string(),
            department: department.trim().to_string(),
            category: category.trim().to_string(),
        }
    }

    /// The single-leaf scope for this key.
    pub fn to_scope(&self) -> ScopeRef {
        ScopeRef::category(&self.group, &self.department, &self.category)
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.group,
            self.department,
            self.category,
            sep = KEY_SEPARATOR
        )
    }
}

// =============================================================================
// Scope Reference
// =============================================================================

/// A filter over the tree. Each `None` is a wildcard scoped to its parent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ScopeRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dept_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cat_id: Option<String>,
}

impl ScopeRef {
    /// The whole branch.
    pub fn branch() -> Self {
        Self::default()
    }

    pub fn group(group_id: &str) -> Self {
        Self::from_parts(Some(group_id), None, None)
    }

    pub fn department(group_id: &str, dept_id: &str) -> Self {
        Self::from_parts(Some(group_id), Some(dept_id), None)
    }

    pub fn category(group_id: &str, dept_id: &str, cat_id: &str) -> Self {
        Self::from_parts(Some(group_id), Some(dept_id), Some(cat_id))
    }

    /// Builds a scope from raw (possibly blank) ids.
    pub fn from_parts(group_id: Option<&str>, dept_id: Option<&str>, cat_id: Option<&str>) -> Self {
        Self {
            group_id: group_id.and_then(normalize_id),
            dept_id: dept_id.and_then(normalize_id),
            cat_id: cat_id.and_then(normalize_id),
        }
    }

    /// Whether this is the whole-branch scope.
    pub fn is_branch(&self) -> bool {
        self.group_id.is_none() && self.dept_id.is_none() && self.cat_id.is_none()
    }

    /// Whether `key` falls inside this scope.
    pub fn covers(&self, key: &CategoryKey) -> bool {
        fn field_matches(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().map_or(true, |f| ids_equal(f, value))
        }
        field_matches(&self.group_id, &key.group)
            && field_matches(&self.dept_id, &key.department)
            && field_matches(&self.cat_id, &key.category)
    }
}

impl fmt::Display for ScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.group_id.as_deref().unwrap_or(""),
            self.dept_id.as_deref().unwrap_or(""),
            self.cat_id.as_deref().unwrap_or(""),
            sep = KEY_SEPARATOR
        )
    }
}

/// A category together with its ancestors.
#[derive(Debug, Clone, Copy)]
pub struct ScopedCategory<'a> {
    pub group: &'a Group,
    pub department: &'a Department,
    pub category: &'a Category,
}

impl ScopedCategory<'_> {
    pub fn key(&self) -> CategoryKey {
        CategoryKey::new(&self.group.id, &self.department.id, &self.category.id)
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Every category matched by `scope`, in tree order. Empty when nothing matches.
pub fn resolve_scope<'a>(snapshot: &'a AuditSnapshot, scope: &ScopeRef) -> Vec<ScopedCategory<'a>> {
    snapshot
        .categories()
        .filter(|sc| scope.covers(&sc.key()))
        .collect()
}

/// The leaf keys covered by `scope`.
pub fn expand_to_leaves(snapshot: &AuditSnapshot, scope: &ScopeRef) -> BTreeSet<CategoryKey> {
    snapshot
        .categories()
        .map(|sc| sc.key())
        .filter(|key| scope.covers(key))
        .collect()
}

/// Union of the leaves covered by every active declaration.
pub fn active_leaves(snapshot: &AuditSnapshot) -> BTreeSet<CategoryKey> {
    let scopes: Vec<ScopeRef> = snapshot.partial_starts.iter().map(PartialStart::scope).collect();
    snapshot
        .categories()
        .map(|sc| sc.key())
        .filter(|key| scopes.iter().any(|scope| scope.covers(key)))
        .collect()
}

/// Explodes declarations into one entry per leaf.
///
/// Entries that match nothing disappear, `Done` leaves are never kept and a
/// leaf covered more than once keeps its earliest `started_at`. Output is
/// ordered by key.
pub fn normalize_starts(snapshot: &AuditSnapshot, starts: &[PartialStart]) -> Vec<PartialStart> {
    let mut earliest: BTreeMap<CategoryKey, DateTime<Utc>> = BTreeMap::new();

    for start in starts {
        let scope = start.scope();
        for sc in snapshot.categories() {
            if sc.category.is_done() {
                continue;
            }
            let key = sc.key();
            if !scope.covers(&key) {
                continue;
            }
            earliest
                .entry(key)
                .and_modify(|at| {
                    if start.started_at < *at {
                        *at = start.started_at;
                    }
                })
                .or_insert(start.started_at);
        }
    }

    earliest
        .into_iter()
        .map(|(key, at)| PartialStart::for_leaf(&key, at))
        .collect()
}

// =============================================================================
// Coarse Matching (display)
// =============================================================================

/// Whether a stored reference covers the requested group as a whole or in part.
///
/// A branch-wide reference covers every group.
pub fn group_scope_matches(stored: &ScopeRef, group_id: &str) -> bool {
    stored
        .group_id
        .as_deref()
        .map_or(true, |g| ids_equal(g, group_id))
}

/// Whether a stored reference covers the requested department.
pub fn dept_scope_matches(stored: &ScopeRef, group_id: &str, dept_id: &str) -> bool {
    group_scope_matches(stored, group_id)
        && stored
            .dept_id
            .as_deref()
            .map_or(true, |d| ids_equal(d, dept_id))
}

/// Regroups leaf keys into the coarsest scopes that are fully covered.
///
/// A group whose every leaf is present becomes `group(g)`; otherwise a fully
/// covered department becomes `department(g, d)`; the rest stay single
/// categories. Keys not in the tree are kept as single categories.
pub fn group_leaves_for_display(snapshot: &AuditSnapshot, keys: &BTreeSet<CategoryKey>) -> Vec<ScopeRef> {
    let mut scopes = Vec::new();
    let mut placed: BTreeSet<&CategoryKey> = BTreeSet::new();

    for group in &snapshot.groups {
        let group_scope = ScopeRef::group(&group.id);
        let group_leaves = expand_to_leaves(snapshot, &group_scope);
        if !group_leaves.is_empty() && group_leaves.iter().all(|k| keys.contains(k)) {
            scopes.push(group_scope);
            placed.extend(keys.iter().filter(|k| group_leaves.contains(*k)));
            continue;
        }

        for department in &group.departments {
            let dept_scope = ScopeRef::department(&group.id, &department.id);
            let dept_leaves = expand_to_leaves(snapshot, &dept_scope);
            if !dept_leaves.is_empty() && dept_leaves.iter().all(|k| keys.contains(k)) {
                scopes.push(dept_scope);
                placed.extend(keys.iter().filter(|k| dept_leaves.contains(*k)));
            }
        }
    }

    scopes.extend(
        keys.iter()
            .filter(|k| !placed.contains(k))
            .map(CategoryKey::to_scope),
    );
    scopes
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_snapshot, ts};
    use crate::types::AuditStatus;

    #[test]
    fn test_scope_normalizes_blank_ids() {
        let scope = ScopeRef::from_parts(Some(" 1 "), Some("  "), None);
        assert_eq!(scope, ScopeRef::group("1"));
        assert_eq!(scope.to_string(), "1||");
        assert!(ScopeRef::from_parts(Some(""), None, Some(" ")).is_branch());
    }

    #[test]
    fn test_expand_group_and_department() {
        let snapshot = sample_snapshot();

        let leaves = expand_to_leaves(&snapshot, &ScopeRef::group("1"));
        assert_eq!(leaves.len(), 3);

        let leaves = expand_to_leaves(&snapshot, &ScopeRef::department("1", "10"));
        let keys: Vec<String> = leaves.iter().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["1|10|100", "1|10|101"]);

        assert_eq!(expand_to_leaves(&snapshot, &ScopeRef::branch()).len(), 4);
        assert!(expand_to_leaves(&snapshot, &ScopeRef::group("99")).is_empty());
    }

    #[test]
    fn test_resolve_scope_returns_ancestors() {
        let snapshot = sample_snapshot();
        let resolved = resolve_scope(&snapshot, &ScopeRef::category("1", "11", "110"));
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].group.id, "1");
        assert_eq!(resolved[0].department.id, "11");
    }

    #[test]
    fn test_wildcard_department_is_scoped_by_group() {
        let snapshot = sample_snapshot();
        // Department 10 exists only under group 1.
        let scope = ScopeRef::from_parts(Some("2"), Some("10"), None);
        assert!(expand_to_leaves(&snapshot, &scope).is_empty());
    }

    #[test]
    fn test_normalize_starts_explodes_and_keeps_earliest() {
        let snapshot = sample_snapshot();
        let starts = vec![
            PartialStart {
                started_at: ts(10, 0),
                group_id: Some("1".to_string()),
                dept_id: None,
                cat_id: None,
            },
            PartialStart::for_leaf(&CategoryKey::new("1", "10", "100"), ts(9, 0)),
            PartialStart {
                started_at: ts(8, 0),
                group_id: Some("77".to_string()),
                dept_id: None,
                cat_id: None,
            },
        ];

        let normalized = normalize_starts(&snapshot, &starts);
        assert_eq!(normalized.len(), 3);
        assert_eq!(normalized[0].scope().to_string(), "1|10|100");
        assert_eq!(normalized[0].started_at, ts(9, 0));
        assert_eq!(normalized[1].started_at, ts(10, 0));
    }

    #[test]
    fn test_normalize_starts_drops_done_leaves() {
        let mut snapshot = sample_snapshot();
        snapshot.groups[0].departments[0].categories[0].status = AuditStatus::Done;
        let starts = vec![PartialStart {
            started_at: ts(10, 0),
            group_id: Some("1".to_string()),
            dept_id: Some("10".to_string()),
            cat_id: None,
        }];
        let normalized = normalize_starts(&snapshot, &starts);
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].scope().to_string(), "1|10|101");
    }

    #[test]
    fn test_coarse_matching() {
        let branch = ScopeRef::branch();
        let group = ScopeRef::group("1");
        let dept = ScopeRef::department("1", "10");

        assert!(group_scope_matches(&branch, "2"));
        assert!(group_scope_matches(&group, " 1"));
        assert!(!group_scope_matches(&group, "2"));

        assert!(dept_scope_matches(&group, "1", "11"));
        assert!(dept_scope_matches(&dept, "1", "10"));
        assert!(!dept_scope_matches(&dept, "1", "11"));
    }

    #[test]
    fn test_group_leaves_for_display() {
        let snapshot = sample_snapshot();
        let mut keys = expand_to_leaves(&snapshot, &ScopeRef::department("1", "10"));
        keys.insert(CategoryKey::new("1", "11", "110"));
        keys.insert(CategoryKey::new("2", "20", "200"));

        let scopes = group_leaves_for_display(&snapshot, &keys);
        let rendered: Vec<String> = scopes.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["1||", "2||"]);

        let keys: BTreeSet<CategoryKey> = [CategoryKey::new("1", "10", "100")].into_iter().collect();
        let rendered: Vec<String> = group_leaves_for_display(&snapshot, &keys)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(rendered, vec!["1|10|100"]);
    }
}
