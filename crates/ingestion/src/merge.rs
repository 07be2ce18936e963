//! Merge of incoming timestep records into an existing series.
//!
//! Incoming records whose time index is already present are dropped, never
//! overwritten, and the result is sorted by time index. The sort is what keeps
//! the series ordered no matter which order batches arrive in.

use std::collections::HashSet;
use std::sync::Arc;

use forecast_common::TimestepRecord;

/// Counts from one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Records added to the series
    pub inserted: usize,
    /// Incoming records dropped because their time index already existed
    pub duplicates: usize,
    /// Series length after the merge
    pub total: usize,
}

/// Merge `incoming` into `existing`, returning the new series.
pub fn merge_time_series(
    existing: &[Arc<TimestepRecord>],
    incoming: Vec<TimestepRecord>,
) -> (Vec<Arc<TimestepRecord>>, MergeStats) {
    let mut present: HashSet<i64> = existing.iter().map(|r| r.time).collect();
    let incoming_len = incoming.len();

    let mut merged: Vec<Arc<TimestepRecord>> = Vec::with_capacity(existing.len() + incoming_len);
    merged.extend(existing.iter().cloned());

    // `insert` returning false also catches duplicates within `incoming`.
    merged.extend(
        incoming
            .into_iter()
            .filter(|record| present.insert(record.time))
            .map(Arc::new),
    );

    let inserted = merged.len() - existing.len();
    merged.sort_by_key(|record| record.time);

    let stats = MergeStats {
        inserted,
        duplicates: incoming_len - inserted,
        total: merged.len(),
    };
    (merged, stats)
}
