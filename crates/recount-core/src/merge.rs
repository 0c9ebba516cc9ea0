//! # Stock-Merge Guard
//!
//! Re-applies a freshly uploaded balance file without disturbing certified
//! figures.
//!
//! ```text
//!   balance rows ──► normalize_code ──► index (last row wins)
//!                                          │
//!   for each Category:                     ▼
//!     Done      ──► untouched (skipped_done += 1)
//!     otherwise ──► every product: quantity / unit_cost from its row
//!                   (no row ⇒ 0 / 0), then recompute totals
//! ```
//!
//! The tree shape never changes: no product, category or status is added or
//! removed here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::AuditSnapshot;

/// One line of a stock balance file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BalanceRow {
    pub code: String,
    pub quantity: i64,
    pub unit_cost: Money,
}

/// What a merge changed, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub updated_categories: usize,
    pub skipped_done: usize,
    pub unmatched_products: usize,
}

/// Barcode normalization: digits only, leading zeros stripped.
///
/// A code with no significant digits falls back to its trimmed text so that
/// alphanumeric codes still match themselves.
///
/// ## Example
/// ```rust
/// use recount_core::merge::normalize_code;
///
/// assert_eq!(normalize_code(" 0007891-0 "), "78910");
/// assert_eq!(normalize_code("ABC"), "ABC");
/// ```
pub fn normalize_code(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        raw.trim().to_string()
    } else {
        significant.to_string()
    }
}

/// Overwrites quantities and costs of every non-Done category from `rows`.
pub fn merge_balances(snapshot: &AuditSnapshot, rows: &[BalanceRow]) -> (AuditSnapshot, MergeReport) {
    let index: HashMap<String, &BalanceRow> = rows
        .iter()
        .map(|row| (normalize_code(&row.code), row))
        .collect();

    let mut next = snapshot.clone();
    let mut report = MergeReport::default();

    next.for_each_category_mut(|_, category| {
        if category.is_done() {
            report.skipped_done += 1;
            return;
        }
        for product in &mut category.products {
            match index.get(&normalize_code(&product.code)) {
                Some(row) => {
                    product.quantity = row.quantity;
                    product.unit_cost = row.unit_cost;
                }
                None => {
                    product.quantity = 0;
                    product.unit_cost = Money::zero();
                    report.unmatched_products += 1;
                }
            }
        }
        category.recompute_totals();
        report.updated_categories += 1;
    });

    (next, report)
}

// =============================================================================
// Unit Tests
// =============================================================================
