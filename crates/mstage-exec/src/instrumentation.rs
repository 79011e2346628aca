//! Hash-join observability counters.
//!
//! Process-local totals aggregated across every join instance. Per-instance
//! numbers live in [`HashJoinStats`](crate::hash_join::HashJoinStats).

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Snapshot of hash-join counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HashJoinMetricsSnapshot {
    /// Right-side rows inserted into broadcast tables.
    pub mstage_hash_join_build_rows_total: u64,
    /// Left-side rows probed against broadcast tables.
    pub mstage_hash_join_probe_rows_total: u64,
    /// Joined rows emitted, including null-padded rows.
    pub mstage_hash_join_output_rows_total: u64,
    /// Unmatched right rows emitted by the final sweep.
    pub mstage_hash_join_unmatched_right_rows_total: u64,
    /// Join instances that ended in an error block.
    pub mstage_hash_join_errors_total: u64,
}

static BUILD_ROWS_TOTAL: AtomicU64 = AtomicU64::new(0);
static PROBE_ROWS_TOTAL: AtomicU64 = AtomicU64::new(0);
static OUTPUT_ROWS_TOTAL: AtomicU64 = AtomicU64::new(0);
static UNMATCHED_RIGHT_ROWS_TOTAL: AtomicU64 = AtomicU64::new(0);
static ERRORS_TOTAL: AtomicU64 = AtomicU64::new(0);

fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

pub(crate) fn record_build_rows(n: usize) {
    BUILD_ROWS_TOTAL.fetch_add(to_u64(n), Ordering::Relaxed);
}

pub(crate) fn record_probe_rows(n: usize) {
    PROBE_ROWS_TOTAL.fetch_add(to_u64(n), Ordering::Relaxed);
}

pub(crate) fn record_output_rows(n: usize) {
    OUTPUT_ROWS_TOTAL.fetch_add(to_u64(n), Ordering::Relaxed);
}

pub(crate) fn record_unmatched_right_rows(n: usize) {
    UNMATCHED_RIGHT_ROWS_TOTAL.fetch_add(to_u64(n), Ordering::Relaxed);
}

pub(crate) fn record_error() {
    ERRORS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

#[must_use]
pub fn hash_join_metrics_snapshot() -> HashJoinMetricsSnapshot {
    HashJoinMetricsSnapshot {
        mstage_hash_join_build_rows_total: BUILD_ROWS_TOTAL.load(Ordering::Relaxed),
        mstage_hash_join_probe_rows_total: PROBE_ROWS_TOTAL.load(Ordering::Relaxed),
        mstage_hash_join_output_rows_total: OUTPUT_ROWS_TOTAL.load(Ordering::Relaxed),
        mstage_hash_join_unmatched_right_rows_total: UNMATCHED_RIGHT_ROWS_TOTAL
            .load(Ordering::Relaxed),
        mstage_hash_join_errors_total: ERRORS_TOTAL.load(Ordering::Relaxed),
    }
}

/// Reset all counters. Intended for tests and benchmarks.
pub fn reset_hash_join_metrics() {
    BUILD_ROWS_TOTAL.store(0, Ordering::Relaxed);
    PROBE_ROWS_TOTAL.store(0, Ordering::Relaxed);
    OUTPUT_ROWS_TOTAL.store(0, Ordering::Relaxed);
    UNMATCHED_RIGHT_ROWS_TOTAL.store(0, Ordering::Relaxed);
    ERRORS_TOTAL.store(0, Ordering::Relaxed);
}
