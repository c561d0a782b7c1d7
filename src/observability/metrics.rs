//! Evaluation metrics
//!
//! - Counters only, monotonic
//! - Shared across queries through `Arc`, lock-free
//! - Passive: nothing reads them to make decisions

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for predicate evaluation.
///
/// All counters use Relaxed atomics; exact totals are only meaningful once the
/// evaluating threads have been joined.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    index_only_evals: AtomicU64,
    hybrid_evals: AtomicU64,
    raw_scan_evals: AtomicU64,
    rows_evaluated: AtomicU64,
    windows_scanned: AtomicU64,
    index_lookups: AtomicU64,
    cache_hits: AtomicU64,
    eval_failures: AtomicU64,
    segments_filtered: AtomicU64,
}

impl MetricsRegistry {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment index-only evaluations
    pub fn increment_index_only(&self) {
        self.index_only_evals.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment hybrid evaluations
    pub fn increment_hybrid(&self) {
        self.hybrid_evals.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment raw-scan evaluations
    pub fn increment_raw_scan(&self) {
        self.raw_scan_evals.fetch_add(1, Ordering::Relaxed);
    }

    /// Add rows evaluated by leaf operators
    pub fn add_rows_evaluated(&self, rows: u64) {
        self.rows_evaluated.fetch_add(rows, Ordering::Relaxed);
    }

    /// Increment raw-scan windows
    pub fn increment_windows_scanned(&self) {
        self.windows_scanned.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment index lookups
    pub fn increment_index_lookups(&self) {
        self.index_lookups.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment result-cache hits
    pub fn increment_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment failed evaluations
    pub fn increment_eval_failures(&self) {
        self.eval_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment completed whole-segment evaluations
    pub fn increment_segments_filtered(&self) {
        self.segments_filtered.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            index_only_evals: self.index_only_evals.load(Ordering::Relaxed),
            hybrid_evals: self.hybrid_evals.load(Ordering::Relaxed),
            raw_scan_evals: self.raw_scan_evals.load(Ordering::Relaxed),
            rows_evaluated: self.rows_evaluated.load(Ordering::Relaxed),
            windows_scanned: self.windows_scanned.load(Ordering::Relaxed),
            index_lookups: self.index_lookups.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            eval_failures: self.eval_failures.load(Ordering::Relaxed),
            segments_filtered: self.segments_filtered.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of the registry counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub index_only_evals: u64,
    pub hybrid_evals: u64,
    pub raw_scan_evals: u64,
    pub rows_evaluated: u64,
    pub windows_scanned: u64,
    pub index_lookups: u64,
    pub cache_hits: u64,
    pub eval_failures: u64,
    pub segments_filtered: u64,
}
