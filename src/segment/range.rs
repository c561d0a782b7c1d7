//! Half-open row ranges and batch windows

use std::fmt;

use crate::exec::{EvalResult, EvaluationError};

/// Rows `[start, end)` of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn with_len(start: usize, len: usize) -> Self {
        Self {
            start,
            end: start + len,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overlap of two ranges; empty (at `self.start`) when disjoint
    pub fn intersect(&self, other: RowRange) -> RowRange {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start >= end {
            RowRange::new(self.start, self.start)
        } else {
            RowRange::new(start, end)
        }
    }

    /// Split into `[start, at)` and `[at, end)`, clamping `at` into the range
    pub fn split_at(&self, at: usize) -> (RowRange, RowRange) {
        let at = at.clamp(self.start, self.end.max(self.start));
        (RowRange::new(self.start, at), RowRange::new(at, self.end))
    }

    /// Fail unless `start <= end <= limit`
    pub fn check_within(&self, limit: usize) -> EvalResult<()> {
        if self.start > self.end || self.end > limit {
            return Err(EvaluationError::range(self.start, self.end, limit));
        }
        Ok(())
    }

    /// Consecutive windows of at most `batch_size` rows covering this range.
    ///
    /// # Panics
    ///
    /// Panics if `batch_size == 0`.
    pub fn windows(&self, batch_size: usize) -> BatchWindows {
        assert!(batch_size > 0, "batch_size must be positive");
        BatchWindows {
            next: self.start,
            end: self.end,
            batch_size,
        }
    }
}

impl fmt::Display for RowRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Iterator over batch-sized windows; the last window may be shorter
#[derive(Debug, Clone)]
pub struct BatchWindows {
    next: usize,
    end: usize,
    batch_size: usize,
}

impl Iterator for BatchWindows {
    type Item = RowRange;

    fn next(&mut self) -> Option<RowRange> {
        if self.next >= self.end {
            return None;
        }
        let start = self.next;
        let end = (start + self.batch_size).min(self.end);
        self.next = end;
        Some(RowRange::new(start, end))
    }
}
