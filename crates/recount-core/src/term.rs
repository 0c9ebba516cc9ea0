//! # Certificate Terms
//!
//! Keys, drafts and the read-only projection behind a signed count
//! certificate ("termo de contagem").
//!
//! ## Term Scope Keys
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Single scope        group|1||            department|1|10|             │
//! │                      category|1|10|100                                 │
//! │                                                                         │
//! │  Batch certificate   custom|<batch>|1|10|100,1|10|101                  │
//! │                      (scopes sorted, deduplicated, comma-joined)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Inside the crate keys are always [`TermScopeKey`]; the `|`-joined form only
//! exists as the `term_drafts` map key in the persisted snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::ledger::BatchId;
use crate::money::Money;
use crate::scope::{CategoryKey, ScopeRef, KEY_SEPARATOR};
use crate::status::{Outcome, Transition};
use crate::types::AuditSnapshot;

/// Rows pre-filled in a fresh certificate form.
pub const DEFAULT_COLLABORATOR_ROWS: usize = 10;

const CUSTOM_PREFIX: &str = "custom";
const SCOPE_LIST_SEPARATOR: char = ',';

// =============================================================================
// Term Scope Key
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TermScopeKind {
    Group,
    Department,
    Category,
}

impl TermScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TermScopeKind::Group => "group",
            TermScopeKind::Department => "department",
            TermScopeKind::Category => "category",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "group" => Some(TermScopeKind::Group),
            "department" => Some(TermScopeKind::Department),
            "category" => Some(TermScopeKind::Category),
            _ => None,
        }
    }
}

/// Identity of one certificate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermScopeKey {
    Single { kind: TermScopeKind, scope: ScopeRef },
    Custom { batch_id: BatchId, scopes: Vec<ScopeRef> },
}

impl TermScopeKey {
    /// Key for a single group, department or category scope.
    ///
    /// The kind follows the deepest id present. A whole-branch scope has no
    /// certificate of its own.
    pub fn for_scope(scope: ScopeRef) -> CoreResult<Self> {
        let kind = if scope.cat_id.is_some() {
            TermScopeKind::Category
        } else if scope.dept_id.is_some() {
            TermScopeKind::Department
        } else if scope.group_id.is_some() {
            TermScopeKind::Group
        } else {
            return Err(CoreError::InvalidTermKey(
                "a certificate needs at least a group".to_string(),
            ));
        };
        Ok(TermScopeKey::Single { kind, scope })
    }

    /// Key for a combined certificate over one finalize batch.
    pub fn for_batch(batch_id: BatchId, scopes: impl IntoIterator<Item = ScopeRef>) -> Self {
        let scopes: BTreeSet<ScopeRef> = scopes.into_iter().collect();
        TermScopeKey::Custom {
            batch_id,
            scopes: scopes.into_iter().collect(),
        }
    }

    /// The scopes this certificate covers.
    pub fn scopes(&self) -> Vec<ScopeRef> {
        match self {
            TermScopeKey::Single { scope, .. } => vec![scope.clone()],
            TermScopeKey::Custom { scopes, .. } => scopes.clone(),
        }
    }

    pub fn as_storage_key(&self) -> String {
        self.to_string()
    }

    pub fn is_custom_storage_key(key: &str) -> bool {
        key.split(KEY_SEPARATOR).next() == Some(CUSTOM_PREFIX)
    }

    pub fn parse(key: &str) -> CoreResult<Self> {
        let invalid = || CoreError::InvalidTermKey(key.to_string());

        let (head, rest) = key.split_once(KEY_SEPARATOR).ok_or_else(invalid)?;
        if head == CUSTOM_PREFIX {
            let (batch, joined) = rest.split_once(KEY_SEPARATOR).ok_or_else(invalid)?;
            if batch.trim().is_empty() {
                return Err(invalid());
            }
            let scopes = joined
                .split(SCOPE_LIST_SEPARATOR)
                .filter(|s| !s.is_empty())
                .map(|s| parse_scope(s).ok_or_else(invalid))
                .collect::<CoreResult<Vec<_>>>()?;
            return Ok(Self::for_batch(BatchId::new(batch), scopes));
        }

        let kind = TermScopeKind::parse(head).ok_or_else(invalid)?;
        let scope = parse_scope(rest).ok_or_else(invalid)?;
        Ok(TermScopeKey::Single { kind, scope })
    }
}

fn parse_scope(s: &str) -> Option<ScopeRef> {
    let mut parts = s.split(KEY_SEPARATOR);
    let group = parts.next()?;
    let dept = parts.next().unwrap_or("");
    let cat = parts.next().unwrap_or("");
    if parts.next().is_some() {
        return None;
    }
    Some(ScopeRef::from_parts(Some(group), Some(dept), Some(cat)))
}

impl fmt::Display for TermScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermScopeKey::Single { kind, scope } => {
                write!(f, "{}{}{}", kind.as_str(), KEY_SEPARATOR, scope)
            }
            TermScopeKey::Custom { batch_id, scopes } => {
                write!(f, "{}{sep}{}{sep}", CUSTOM_PREFIX, batch_id, sep = KEY_SEPARATOR)?;
                for (i, scope) in scopes.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", SCOPE_LIST_SEPARATOR)?;
                    }
                    write!(f, "{}", scope)?;
                }
                Ok(())
            }
        }
    }
}

// =============================================================================
// Term Draft
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TermCollaborator {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cpf: String,
    /// Data URL of the captured signature, empty when unsigned.
    #[serde(default)]
    pub signature: String,
}

/// The editable certificate form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", default)]
pub struct TermDraft {
    pub inventory_number: String,
    pub date: String,
    pub manager_name: String,
    pub manager_cpf: String,
    pub manager_signature: String,
    #[serde(alias = "managerName2")]
    pub second_manager_name: String,
    #[serde(alias = "managerCpf2")]
    pub second_manager_cpf: String,
    #[serde(alias = "managerSignature2")]
    pub second_manager_signature: String,
    pub collaborators: Vec<TermCollaborator>,
}

impl TermDraft {
    /// A fresh form with [`DEFAULT_COLLABORATOR_ROWS`] empty rows.
    pub fn blank(inventory_number: &str, date: &str) -> Self {
        Self {
            inventory_number: inventory_number.to_string(),
            date: date.to_string(),
            collaborators: vec![TermCollaborator::default(); DEFAULT_COLLABORATOR_ROWS],
            ..Self::default()
        }
    }
}

/// Stores `draft` under `key`, replacing any previous one.
pub fn update_term_draft(snapshot: &AuditSnapshot, key: &TermScopeKey, draft: TermDraft) -> Transition {
    let mut next = snapshot.clone();
    let key = key.as_storage_key();
    next.term_drafts.insert(key.clone(), draft);
    Transition {
        snapshot: next,
        outcome: Outcome::DraftSaved { key },
    }
}

/// The stored draft for `key`, or a fresh form.
///
/// An empty inventory number is back-filled from `inventory_number`, falling
/// back to the snapshot's own.
pub fn term_draft_or_default(
    snapshot: &AuditSnapshot,
    key: &TermScopeKey,
    inventory_number: &str,
    date: &str,
) -> TermDraft {
    let number = if inventory_number.trim().is_empty() {
        snapshot.inventory_number.as_str()
    } else {
        inventory_number
    };

    match snapshot.term_drafts.get(&key.as_storage_key()) {
        Some(draft) if draft.inventory_number.is_empty() => TermDraft {
            inventory_number: number.to_string(),
            ..draft.clone()
        },
        Some(draft) => draft.clone(),
        None => TermDraft::blank(number, date),
    }
}

// =============================================================================
// Scope Projection
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TermNode {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TermProductLine {
    pub group_name: String,
    pub dept_name: String,
    pub cat_name: String,
    pub code: String,
    pub name: String,
    pub quantity: i64,
    pub unit_cost: Money,
}

/// What the certificate renderer prints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TermScopeInfo {
    pub groups: Vec<TermNode>,
    pub departments: Vec<TermNode>,
    pub categories: Vec<TermNode>,
    pub products: Vec<TermProductLine>,
}

/// Read-only projection of the tree under `key`, in tree order.
///
/// `None` when the key covers no category.
pub fn term_scope_info(snapshot: &AuditSnapshot, key: &TermScopeKey) -> Option<TermScopeInfo> {
    let scopes = key.scopes();
    let mut info = TermScopeInfo {
        groups: Vec::new(),
        departments: Vec::new(),
        categories: Vec::new(),
        products: Vec::new(),
    };
    let mut seen_groups: BTreeSet<&str> = BTreeSet::new();
    let mut seen_departments: BTreeSet<(&str, &str)> = BTreeSet::new();
    let mut seen_categories: BTreeSet<CategoryKey> = BTreeSet::new();

    for sc in snapshot.categories() {
        let leaf = sc.key();
        if !scopes.iter().any(|s| s.covers(&leaf)) || !seen_categories.insert(leaf) {
            continue;
        }
        if seen_groups.insert(sc.group.id.as_str()) {
            info.groups.push(TermNode {
                id: sc.group.id.clone(),
                name: sc.group.name.clone(),
            });
        }
        if seen_departments.insert((sc.group.id.as_str(), sc.department.id.as_str())) {
            info.departments.push(TermNode {
                id: sc.department.id.clone(),
                name: sc.department.name.clone(),
            });
        }
        info.categories.push(TermNode {
            id: sc.category.id.clone(),
            name: sc.category.name.clone(),
        });
        info.products.extend(sc.category.products.iter().map(|p| TermProductLine {
            group_name: sc.group.name.clone(),
            dept_name: sc.department.name.clone(),
            cat_name: sc.category.name.clone(),
            code: p.code.clone(),
            name: p.name.clone(),
            quantity: p.quantity,
            unit_cost: p.unit_cost,
        }));
    }

    if info.categories.is_empty() {
        None
    } else {
        Some(info)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_snapshot;

    #[test]
    fn test_single_key_format() {
        let key = TermScopeKey::for_scope(ScopeRef::department("1", "10")).unwrap();
        assert_eq!(key.as_storage_key(), "department|1|10|");
        assert_eq!(TermScopeKey::parse("department|1|10|").unwrap(), key);

        let key = TermScopeKey::for_scope(ScopeRef::group("1")).unwrap();
        assert_eq!(key.as_storage_key(), "group|1||");

        assert!(TermScopeKey::for_scope(ScopeRef::branch()).is_err());
    }

    #[test]
    fn test_custom_key_sorted_and_deduplicated() {
        let key = TermScopeKey::for_batch(
            BatchId::from("b1"),
            vec![
                ScopeRef::category("1", "10", "101"),
                ScopeRef::category("1", "10", "100"),
                ScopeRef::category("1", "10", "101"),
            ],
        );
        let stored = key.as_storage_key();
        assert_eq!(stored, "custom|b1|1|10|100,1|10|101");
        assert!(TermScopeKey::is_custom_storage_key(&stored));
        assert!(!TermScopeKey::is_custom_storage_key("category|1|10|100"));
        assert_eq!(TermScopeKey::parse(&stored).unwrap(), key);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(TermScopeKey::parse("nonsense").is_err());
        assert!(TermScopeKey::parse("shelf|1||").is_err());
        assert!(TermScopeKey::parse("custom||1|10|100").is_err());
        assert!(TermScopeKey::parse("group|1|2|3|4").is_err());
    }

    #[test]
    fn test_draft_default_and_backfill() {
        let snapshot = sample_snapshot();
        let key = TermScopeKey::for_scope(ScopeRef::group("1")).unwrap();

        let fresh = term_draft_or_default(&snapshot, &key, "", "16/10/2026");
        assert_eq!(fresh.inventory_number, "2026-0012-0001");
        assert_eq!(fresh.collaborators.len(), DEFAULT_COLLABORATOR_ROWS);

        let mut draft = fresh.clone();
        draft.inventory_number.clear();
        draft.manager_name = "Ana".to_string();
        let saved = update_term_draft(&snapshot, &key, draft);
        assert_eq!(saved.outcome, Outcome::DraftSaved { key: "group|1||".to_string() });

        let loaded = term_draft_or_default(&saved.snapshot, &key, "2026-0012-0002", "17/10/2026");
        assert_eq!(loaded.inventory_number, "2026-0012-0002");
        assert_eq!(loaded.manager_name, "Ana");
        assert_eq!(loaded.date, "16/10/2026");
    }

    #[test]
    fn test_draft_accepts_legacy_field_names() {
        let json = r#"{"inventoryNumber":"1","managerName2":"Bia","collaborators":[]}"#;
        let draft: TermDraft = serde_json::from_str(json).unwrap();
        assert_eq!(draft.second_manager_name, "Bia");
        assert!(draft.date.is_empty());
    }

    #[test]
    fn test_term_scope_info() {
        let snapshot = sample_snapshot();

        let key = TermScopeKey::for_scope(ScopeRef::group("1")).unwrap();
        let info = term_scope_info(&snapshot, &key).unwrap();
        assert_eq!(info.groups.len(), 1);
        assert_eq!(info.departments.len(), 2);
        assert_eq!(info.categories.len(), 3);
        assert_eq!(info.products.len(), 5);
        assert_eq!(info.products[0].dept_name, "Pain relief");

        let key = TermScopeKey::for_batch(
            BatchId::from("b"),
            vec![ScopeRef::category("1", "10", "101"), ScopeRef::category("2", "20", "200")],
        );
        let info = term_scope_info(&snapshot, &key).unwrap();
        assert_eq!(info.groups.len(), 2);
        assert_eq!(info.products.len(), 2);

        let key = TermScopeKey::for_scope(ScopeRef::group("9")).unwrap();
        assert!(term_scope_info(&snapshot, &key).is_none());
    }
}
