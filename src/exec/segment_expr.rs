//! Segment-bound operator base
//!
//! Shared by every leaf that reads one field of one segment. Owns the field
//! reference and segment handle, fixes `active_count` for the query, picks an
//! evaluation strategy once and drives the batch loop.
//!
//! # Strategy selection (first applicable wins)
//!
//! 1. IndexOnly: a usable index covers all `active_count` rows
//! 2. Hybrid: a usable index covers a prefix `[0, k)`; the tail is scanned
//! 3. RawScan: everything else, or indexes disabled
//!
//! # Invariants
//!
//! - The strategy never changes during evaluation
//! - Raw scan windows hold at most `batch_size` rows, without gaps or overlap
//! - No row at or beyond `active_count` is ever read

use std::fmt;
use std::sync::Arc;

use crate::bitmap::{Bitmap, BitmapView};
use crate::config::EvalConfig;
use crate::observability::{Logger, MetricsRegistry};
use crate::schema::{ColumnInfo, DataType};
use crate::segment::{ColumnSlice, ConsistencyLevel, FieldIndex, RowRange, Segment};

use super::errors::{EvalResult, EvaluationError};

/// How a segment-bound operator answers a range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalStrategy {
    IndexOnly,
    /// Rows `[0, indexed_rows)` from the index, the rest by raw scan
    Hybrid { indexed_rows: usize },
    RawScan,
}

impl fmt::Display for EvalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalStrategy::IndexOnly => f.write_str("index_only"),
            EvalStrategy::Hybrid { indexed_rows } => write!(f, "hybrid({})", indexed_rows),
            EvalStrategy::RawScan => f.write_str("raw_scan"),
        }
    }
}

/// Everything a leaf needs to bind to one segment for one query
#[derive(Clone)]
pub struct SegmentBinding {
    pub segment: Arc<dyn Segment>,
    /// Rows visible under the query's consistency snapshot
    pub active_count: usize,
    pub consistency_level: ConsistencyLevel,
    pub config: EvalConfig,
}

impl SegmentBinding {
    /// Bind to all rows of `segment` with the default configuration
    pub fn new(segment: Arc<dyn Segment>) -> Self {
        let active_count = segment.row_count();
        Self {
            segment,
            active_count,
            consistency_level: ConsistencyLevel::default(),
            config: EvalConfig::default(),
        }
    }

    pub fn with_active_count(mut self, active_count: usize) -> Self {
        self.active_count = active_count;
        self
    }

    pub fn with_consistency_level(mut self, level: ConsistencyLevel) -> Self {
        self.consistency_level = level;
        self
    }

    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }
}

impl fmt::Debug for SegmentBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentBinding")
            .field("segment_id", &self.segment.segment_id())
            .field("segment_kind", &self.segment.kind())
            .field("active_count", &self.active_count)
            .field("consistency_level", &self.consistency_level)
            .field("config", &self.config)
            .finish()
    }
}

pub struct SegmentExpr {
    column: ColumnInfo,
    segment: Arc<dyn Segment>,
    active_count: usize,
    batch_size: usize,
    consistency_level: ConsistencyLevel,
    index_usable: bool,
    index_coverage: usize,
    strategy: EvalStrategy,
}

impl SegmentExpr {
    /// Bind `column` to the segment and select a strategy.
    ///
    /// `index_usable` decides whether the field's index can answer this
    /// operator at all; coverage is checked here.
    pub fn new(
        column: ColumnInfo,
        binding: &SegmentBinding,
        index_usable: impl Fn(&dyn FieldIndex) -> bool,
    ) -> EvalResult<Self> {
        if binding.config.batch_size == 0 {
            return Err(EvaluationError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        let row_count = binding.segment.row_count();
        if binding.active_count > row_count {
            return Err(EvaluationError::range(0, binding.active_count, row_count));
        }

        let index = binding
            .segment
            .index(column.field_id)
            .filter(|index| index_usable(*index));
        let index_coverage = index
            .map(|index| index.covered_rows().min(binding.active_count))
            .unwrap_or(0);

        let mut expr = Self {
            column,
            segment: Arc::clone(&binding.segment),
            active_count: binding.active_count,
            batch_size: binding.config.batch_size,
            consistency_level: binding.consistency_level,
            index_usable: index.is_some(),
            index_coverage,
            strategy: EvalStrategy::RawScan,
        };
        if binding.config.use_index {
            expr.strategy = expr.select_strategy();
        }
        expr.log_bound();
        Ok(expr)
    }

    fn select_strategy(&self) -> EvalStrategy {
        if !self.index_usable {
            EvalStrategy::RawScan
        } else if self.index_coverage == self.active_count {
            EvalStrategy::IndexOnly
        } else if self.index_coverage > 0 {
            EvalStrategy::Hybrid {
                indexed_rows: self.index_coverage,
            }
        } else {
            EvalStrategy::RawScan
        }
    }

    fn log_bound(&self) {
        let active = self.active_count.to_string();
        let batch = self.batch_size.to_string();
        let segment = self.segment.segment_id().to_string();
        let kind = self.segment.kind().to_string();
        let consistency = self.consistency_level.to_string();
        let column = self.column.to_string();
        let strategy = self.strategy.to_string();
        Logger::trace(
            "SEGMENT_EXPR_BOUND",
            &[
                ("active_count", &active),
                ("batch_size", &batch),
                ("column", &column),
                ("consistency_level", &consistency),
                ("segment_id", &segment),
                ("segment_kind", &kind),
                ("strategy", &strategy),
            ],
        );
    }

    /// Override the selected strategy.
    ///
    /// Index strategies fail with `IndexUnavailable` unless a usable index
    /// covers the rows they would answer.
    pub fn force_strategy(&mut self, strategy: EvalStrategy) -> EvalResult<()> {
        let covered = match strategy {
            EvalStrategy::RawScan => true,
            EvalStrategy::IndexOnly => self.index_usable && self.index_coverage == self.active_count,
            EvalStrategy::Hybrid { indexed_rows } => {
                self.index_usable && indexed_rows <= self.index_coverage
            }
        };
        if !covered {
            return Err(EvaluationError::IndexUnavailable {
                field: self.column.field_id,
                reason: format!(
                    "{} needs index coverage the segment does not have ({} of {} rows)",
                    strategy, self.index_coverage, self.active_count
                ),
            });
        }
        self.strategy = strategy;
        Ok(())
    }

    pub fn strategy(&self) -> EvalStrategy {
        self.strategy
    }

    pub fn column(&self) -> &ColumnInfo {
        &self.column
    }

    pub fn segment(&self) -> &dyn Segment {
        self.segment.as_ref()
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn consistency_level(&self) -> ConsistencyLevel {
        self.consistency_level
    }

    /// Rows `[0, n)` a usable index can answer, capped at `active_count`
    pub fn index_coverage(&self) -> usize {
        self.index_coverage
    }

    /// Fail unless `range` lies inside `[0, active_count)`
    pub fn check_range(&self, range: RowRange) -> EvalResult<()> {
        range.check_within(self.active_count)
    }

    /// Schema type of the field, which must match the compiled type
    pub fn check_field(&self) -> EvalResult<DataType> {
        let actual = self.segment.schema_type(self.column.field_id)?;
        if actual != self.column.data_type {
            return Err(EvaluationError::TypeMismatch {
                expected: self.column.data_type,
                actual: actual.to_string(),
            });
        }
        Ok(actual)
    }

    /// Evaluate `range` with the bound strategy.
    ///
    /// `index_fn` answers an indexed sub-range as a whole; `scan_fn` writes
    /// one physical slice of a raw-scan window into its view.
    pub fn eval_with<I, S>(
        &self,
        metrics: &MetricsRegistry,
        range: RowRange,
        mut index_fn: I,
        mut scan_fn: S,
    ) -> EvalResult<Bitmap>
    where
        I: FnMut(RowRange) -> EvalResult<Bitmap>,
        S: FnMut(&ColumnSlice<'_>, &mut BitmapView<'_>) -> EvalResult<()>,
    {
        self.check_range(range)?;

        let boundary = match self.strategy {
            EvalStrategy::IndexOnly => range.end,
            EvalStrategy::Hybrid { indexed_rows } => indexed_rows,
            EvalStrategy::RawScan => range.start,
        };
        let (indexed, tail) = range.split_at(boundary);
        let mut out = Bitmap::new(range.len());

        if !indexed.is_empty() {
            metrics.increment_index_lookups();
            let bits = index_fn(indexed)?;
            out.view_mut(0, indexed.len())?.copy_from(&bits)?;
        }

        for window in tail.windows(self.batch_size) {
            metrics.increment_windows_scanned();
            let column = self.segment.get_chunk(self.column.field_id, window)?;
            let window_offset = window.start - range.start;
            for piece in column.pieces() {
                let mut view = out.view_mut(window_offset + piece.offset, piece.slice.len())?;
                scan_fn(&piece.slice, &mut view)?;
            }
        }

        match (indexed.is_empty(), tail.is_empty()) {
            (false, true) => metrics.increment_index_only(),
            (false, false) => metrics.increment_hybrid(),
            (true, false) => metrics.increment_raw_scan(),
            (true, true) => {}
        }
        metrics.add_rows_evaluated(range.len() as u64);
        Ok(out)
    }
}

impl fmt::Debug for SegmentExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentExpr")
            .field("column", &self.column)
            .field("segment_id", &self.segment.segment_id())
            .field("active_count", &self.active_count)
            .field("batch_size", &self.batch_size)
            .field("consistency_level", &self.consistency_level)
            .field("strategy", &self.strategy)
            .finish()
    }
}
