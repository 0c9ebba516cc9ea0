//! # Domain Types
//!
//! The audit tree and the snapshot that carries it.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         AuditSnapshot                                   │
//! │                                                                         │
//! │  groups[] ──► Group ──► Department ──► Category ──► Product             │
//! │                 id          id            id          code              │
//! │                 name        name          status      quantity          │
//! │                                           totals      unit_cost         │
//! │                                                                         │
//! │  partial_starts[]      active declarations (one per leaf)               │
//! │  partial_completed[]   immutable finalize records (batch_id)            │
//! │  last_partial_batch_id most recent batch                                │
//! │  term_drafts{}         certificate forms keyed by term scope key        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Totals Rule
//! `Category` caches `items_count/total_quantity/total_cost`. They are only
//! ever written by [`Category::recompute_totals`]. Department, group and
//! branch figures are computed on read (see [`crate::metrics`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::ledger::BatchId;
use crate::money::Money;
use crate::scope::{CategoryKey, ScopeRef, ScopedCategory};
use crate::term::TermDraft;

// =============================================================================
// Audit Status
// =============================================================================

/// Per-category audit status.
///
/// ## State Machine
/// ```text
///  Pending ──start──► InProgress ──finalize──► Done
///     ▲                   │                      │
///     └──pause / expire───┘                      │
///     └──────────────reopen (master)─────────────┘
/// ```
///
/// Older snapshots stored the Portuguese labels; they are still accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    #[default]
    #[serde(alias = "pendente")]
    Pending,
    #[serde(alias = "iniciado")]
    InProgress,
    #[serde(alias = "concluido")]
    Done,
}

impl AuditStatus {
    pub fn is_done(self) -> bool {
        self == AuditStatus::Done
    }
}

// =============================================================================
// Product
// =============================================================================

/// A counted item. Leaf of the audit tree.
///
/// Older snapshots carry `cost` in major units instead of `unitCost` in
/// cents; both are read.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Barcode / business code. Matched against balance rows.
    pub code: String,

    /// Short internal code printed on shelf labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduced_code: Option<String>,

    pub name: String,

    /// Units on hand.
    #[serde(default)]
    pub quantity: i64,

    /// Cost of one unit.
    #[serde(default)]
    pub unit_cost: Money,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductRecord {
    code: String,
    #[serde(default)]
    reduced_code: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    quantity: i64,
    #[serde(default)]
    unit_cost: Option<Money>,
    #[serde(default)]
    cost: Option<f64>,
}

impl<'de> Deserialize<'de> for Product {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = ProductRecord::deserialize(deserializer)?;
        let unit_cost = match (record.unit_cost, record.cost) {
            (Some(cents), _) => cents,
            // `as` saturates and maps NaN to zero.
            (None, Some(major)) => Money::from_cents((major * 100.0).round() as i64),
            (None, None) => Money::zero(),
        };
        Ok(Product {
            code: record.code,
            reduced_code: record.reduced_code,
            name: record.name,
            quantity: record.quantity,
            unit_cost,
        })
    }
}

/// Reads a `numericId` stored either as text or as a number. Blank is `None`.
fn id_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Text(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Some(RawId::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

impl Product {
    /// `unit_cost × quantity`.
    #[inline]
    pub fn line_cost(&self) -> Money {
        self.unit_cost.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Category / Department / Group
// =============================================================================

/// The leaf scope: the unit that carries a status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,

    /// Code used by the ERP, kept as text (`"0042"` stays `"0042"`).
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "id_text")]
    pub numeric_id: Option<String>,

    pub name: String,

    /// Number of products (cached).
    #[serde(default)]
    pub items_count: usize,

    /// Σ product quantity (cached).
    #[serde(default)]
    pub total_quantity: i64,

    /// Σ product line cost (cached).
    #[serde(default)]
    pub total_cost: Money,

    #[serde(default)]
    pub status: AuditStatus,

    #[serde(default)]
    pub products: Vec<Product>,
}

impl Category {
    /// Rewrites the cached totals from `products`.
    pub fn recompute_totals(&mut self) {
        self.items_count = self.products.len();
        self.total_quantity = sum_quantities(&self.products);
        self.total_cost = self.products.iter().map(Product::line_cost).sum();
    }

    /// Whether the cached totals agree with the products.
    pub fn totals_consistent(&self) -> bool {
        self.items_count == self.products.len()
            && self.total_quantity == sum_quantities(&self.products)
            && self.total_cost == self.products.iter().map(Product::line_cost).sum::<Money>()
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.status.is_done()
    }
}

fn sum_quantities(products: &[Product]) -> i64 {
    products.iter().fold(0i64, |acc, p| acc.saturating_add(p.quantity))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "id_text")]
    pub numeric_id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub departments: Vec<Department>,
}

// =============================================================================
// Partial Declarations
// =============================================================================

/// An active "we are counting this" declaration.
///
/// May arrive coarse (group-wide) from older snapshots; every transition
/// normalizes to one entry per leaf before touching the list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PartialStart {
    #[ts(as = "String")]
    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dept_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cat_id: Option<String>,
}

impl PartialStart {
    /// One entry pinned to a single leaf category.
    pub fn for_leaf(key: &CategoryKey, started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            group_id: Some(key.group.clone()),
            dept_id: Some(key.department.clone()),
            cat_id: Some(key.category.clone()),
        }
    }

    /// The scope this declaration covers.
    pub fn scope(&self) -> ScopeRef {
        ScopeRef::from_parts(
            self.group_id.as_deref(),
            self.dept_id.as_deref(),
            self.cat_id.as_deref(),
        )
    }
}

/// Immutable record of a finalized scope.
///
/// `completed_at` is optional only so that legacy records without it still
/// load; new records always carry it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PartialCompleted {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(as = "Option<String>")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,

    pub batch_id: BatchId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dept_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cat_id: Option<String>,
}

impl PartialCompleted {
    pub fn scope(&self) -> ScopeRef {
        ScopeRef::from_parts(
            self.group_id.as_deref(),
            self.dept_id.as_deref(),
            self.cat_id.as_deref(),
        )
    }

    /// `completed_at`, falling back to `started_at`.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.completed_at.or(self.started_at)
    }

    /// Dedup key: `(batch_id, normalized scope key)`.
    pub fn dedup_key(&self) -> (BatchId, String) {
        (self.batch_id.clone(), self.scope().to_string())
    }
}

// =============================================================================
// Audit Snapshot
// =============================================================================

/// The unit of persistence. Every transition returns a whole new one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AuditSnapshot {
    #[serde(default)]
    pub groups: Vec<Group>,

    #[serde(default, alias = "empresa")]
    pub company: String,

    #[serde(default, alias = "filial")]
    pub branch: String,

    #[serde(default)]
    pub inventory_number: String,

    #[serde(default)]
    pub partial_starts: Vec<PartialStart>,

    #[serde(default)]
    pub partial_completed: Vec<PartialCompleted>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_partial_batch_id: Option<BatchId>,

    #[serde(default)]
    pub term_drafts: BTreeMap<String, TermDraft>,
}

impl AuditSnapshot {
    /// Every category in tree order, with its ancestors.
    pub fn categories(&self) -> impl Iterator<Item = ScopedCategory<'_>> {
        self.groups.iter().flat_map(|group| {
            group.departments.iter().flat_map(move |department| {
                department.categories.iter().map(move |category| ScopedCategory {
                    group,
                    department,
                    category,
                })
            })
        })
    }

    /// Looks up a single category by its composite key.
    pub fn category(&self, key: &CategoryKey) -> Option<&Category> {
        self.categories()
            .find(|sc| sc.key() == *key)
            .map(|sc| sc.category)
    }

    /// Visits every category mutably together with its key.
    pub fn for_each_category_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&CategoryKey, &mut Category),
    {
        for group in &mut self.groups {
            for department in &mut group.departments {
                for category in &mut department.categories {
                    let key = CategoryKey::new(&group.id, &department.id, &category.id);
                    f(&key, category);
                }
            }
        }
    }

    /// Bottom-up totals recomputation over the whole tree.
    ///
    /// Used by every tree-mutating operation and as a repair step when an
    /// older snapshot is loaded.
    pub fn recompute_totals(&mut self) {
        self.for_each_category_mut(|_, category| category.recompute_totals());
    }

    /// Number of categories whose cached totals disagree with their products.
    pub fn inconsistent_totals(&self) -> usize {
        self.categories()
            .filter(|sc| !sc.category.totals_consistent())
            .count()
    }
}

// =============================================================================
// Roles
// =============================================================================

/// Who is acting. Resolved outside the core and passed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    #[default]
    Operator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Master => write!(f, "master"),
            Role::Operator => write!(f, "operator"),
        }
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "master" => Ok(Role::Master),
            "operator" => Ok(Role::Operator),
            _ => Err(ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: vec!["master".to_string(), "operator".to_string()],
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn master(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: Role::Master,
        }
    }

    pub fn operator(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: Role::Operator,
        }
    }

    #[inline]
    pub fn is_master(&self) -> bool {
        self.role == Role::Master
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(code: &str, quantity: i64, unit_cost: i64) -> Product {
        Product {
            code: code.to_string(),
            reduced_code: None,
            name: format!("Product {code}"),
            quantity,
            unit_cost: Money::from_cents(unit_cost),
        }
    }

    #[test]
    fn test_category_recompute_totals() {
        let mut category = Category {
            id: "100".to_string(),
            numeric_id: None,
            name: "Analgesics".to_string(),
            items_count: 0,
            total_quantity: 0,
            total_cost: Money::zero(),
            status: AuditStatus::Pending,
            products: vec![product("1", 3, 250), product("2", 2, 1000)],
        };
        assert!(!category.totals_consistent());

        category.recompute_totals();
        assert_eq!(category.items_count, 2);
        assert_eq!(category.total_quantity, 5);
        assert_eq!(category.total_cost.cents(), 2750);
        assert!(category.totals_consistent());
    }

    #[test]
    fn test_status_accepts_legacy_labels() {
        let s: AuditStatus = serde_json::from_str("\"iniciado\"").unwrap();
        assert_eq!(s, AuditStatus::InProgress);
        let s: AuditStatus = serde_json::from_str("\"concluido\"").unwrap();
        assert_eq!(s, AuditStatus::Done);
        let s: AuditStatus = serde_json::from_str("\"pendente\"").unwrap();
        assert_eq!(s, AuditStatus::Pending);

        assert_eq!(
            serde_json::to_string(&AuditStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
    }

    #[test]
    fn test_snapshot_defaults_missing_lists() {
        let json = r#"{"groups":[],"branch":"12"}"#;
        let snapshot: AuditSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.branch, "12");
        assert!(snapshot.partial_starts.is_empty());
        assert!(snapshot.term_drafts.is_empty());
        assert!(snapshot.last_partial_batch_id.is_none());
    }

    #[test]
    fn test_legacy_snapshot_layout() {
        let json = r#"{
            "empresa": "Drogaria Centro",
            "filial": "12",
            "groups": [{
                "id": "1",
                "name": "Medicines",
                "departments": [{
                    "id": "Pain relief",
                    "numericId": "0042",
                    "name": "Pain relief",
                    "categories": [{
                        "id": "Analgesics",
                        "numericId": 7,
                        "name": "Analgesics",
                        "status": "concluido",
                        "products": [{"code": "789", "name": "Dipyrone", "quantity": 3, "cost": 12.5}]
                    }, {
                        "id": "Antacids",
                        "numericId": "",
                        "name": "Antacids",
                        "status": "iniciado",
                        "products": []
                    }]
                }]
            }]
        }"#;
        let snapshot: AuditSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.company, "Drogaria Centro");
        assert_eq!(snapshot.branch, "12");

        let department = &snapshot.groups[0].departments[0];
        assert_eq!(department.numeric_id.as_deref(), Some("0042"));
        assert_eq!(department.categories[0].numeric_id.as_deref(), Some("7"));
        assert_eq!(department.categories[1].numeric_id, None);
        assert_eq!(department.categories[0].status, AuditStatus::Done);
        assert_eq!(department.categories[1].status, AuditStatus::InProgress);

        let product = &department.categories[0].products[0];
        assert_eq!(product.unit_cost, Money::from_cents(1250));
        assert_eq!(product.line_cost(), Money::from_cents(3750));

        // Written back in the current layout.
        let out = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(out["branch"], "12");
        assert_eq!(out["groups"][0]["departments"][0]["numericId"], "0042");
        assert_eq!(out["groups"][0]["departments"][0]["categories"][0]["products"][0]["unitCost"], 1250);
    }

    #[test]
    fn test_product_prefers_unit_cost_cents() {
        let product: Product =
            serde_json::from_str(r#"{"code":"1","name":"x","quantity":2,"unitCost":199,"cost":9.99}"#).unwrap();
        assert_eq!(product.unit_cost, Money::from_cents(199));
    }

    #[test]
    fn test_legacy_completed_without_timestamp() {
        let json = r#"{"batchId":"b1","groupId":"1","startedAt":"2026-10-16T12:00:00Z"}"#;
        let record: PartialCompleted = serde_json::from_str(json).unwrap();
        assert!(record.completed_at.is_none());
        assert_eq!(record.timestamp(), record.started_at);
        assert_eq!(record.scope().to_string(), "1||");
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Master".parse::<Role>().unwrap(), Role::Master);
        assert_eq!(" operator ".parse::<Role>().unwrap(), Role::Operator);
        assert!("admin".parse::<Role>().is_err());
        assert!(Actor::master("Ana").is_master());
        assert!(!Actor::operator("Rui").is_master());
    }
}
