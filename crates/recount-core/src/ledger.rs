//! # Batch & History Ledger
//!
//! Batch identity and the `partial_completed` history.
//!
//! ```text
//! finalize_scope(Group 1)  ──►  batch b-7f3…
//!                                 ├── PartialCompleted 1|10|100
//!                                 ├── PartialCompleted 1|10|101
//!                                 └── PartialCompleted 1|11|110
//! ```
//!
//! Every finalize call produces exactly one batch id shared by all the leaf
//! records it writes. A certificate can later be issued for a whole batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

use crate::types::PartialCompleted;

// =============================================================================
// Batch Id
// =============================================================================

/// Identifier shared by every record written by one finalize call.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    /// Fresh random id (UUID v4). Collisions are treated as impossible.
    pub fn generate() -> Self {
        BatchId(Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        BatchId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BatchId {
    fn from(s: &str) -> Self {
        BatchId(s.to_string())
    }
}

// =============================================================================
// History Operations
// =============================================================================

/// Deduplicates on `(batch_id, leaf key)`.
///
/// The last occurrence wins; the output keeps the position of each key's
/// first appearance. Applying it twice gives the same list.
pub fn dedup_completed(list: &[PartialCompleted]) -> Vec<PartialCompleted> {
    let mut index: HashMap<(BatchId, String), usize> = HashMap::new();
    let mut out: Vec<PartialCompleted> = Vec::with_capacity(list.len());

    for record in list {
        match index.get(&record.dedup_key()) {
            Some(&pos) => out[pos] = record.clone(),
            None => {
                index.insert(record.dedup_key(), out.len());
                out.push(record.clone());
            }
        }
    }
    out
}

/// One row of the history screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub batch_id: BatchId,
    pub count: usize,
    #[ts(as = "Option<String>")]
    pub last_timestamp: Option<DateTime<Utc>>,
}

/// Groups the history by batch, most recent batch first.
///
/// Batches without any timestamp sort last; ties keep first-appearance order.
pub fn group_by_batch(list: &[PartialCompleted]) -> Vec<BatchSummary> {
    let mut summaries: Vec<BatchSummary> = Vec::new();
    let mut index: HashMap<&BatchId, usize> = HashMap::new();

    for record in list {
        let pos = *index.entry(&record.batch_id).or_insert_with(|| {
            summaries.push(BatchSummary {
                batch_id: record.batch_id.clone(),
                count: 0,
                last_timestamp: None,
            });
            summaries.len() - 1
        });
        let summary = &mut summaries[pos];
        summary.count += 1;
        summary.last_timestamp = summary.last_timestamp.max(record.timestamp());
    }

    // Option<T> orders None first, so reversing puts undated batches last.
    summaries.sort_by(|a, b| b.last_timestamp.cmp(&a.last_timestamp));
    summaries
}

/// Batch of the most recent record (by `completed_at`, else `started_at`).
pub fn latest_batch_id(list: &[PartialCompleted]) -> Option<BatchId> {
    list.iter()
        .filter_map(|r| r.timestamp().map(|at| (at, r)))
        .max_by_key(|(at, _)| *at)
        .map(|(_, r)| r.batch_id.clone())
}

/// Records belonging to one batch, in history order.
pub fn entries_for_batch<'a>(list: &'a [PartialCompleted], batch_id: &BatchId) -> Vec<&'a PartialCompleted> {
    list.iter().filter(|r| &r.batch_id == batch_id).collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
