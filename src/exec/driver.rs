//! Scheduler-side segment evaluation
//!
//! Drives a compiled tree over `[0, active_count)` in batch windows and
//! concatenates the window bitmaps in row order.

use crate::bitmap::Bitmap;
use crate::observability::{Logger, ObservationScope};
use crate::segment::RowRange;

use super::context::EvalContext;
use super::errors::{EvalResult, EvaluationError};
use super::expr::PhysicalExpr;

/// Evaluate `root` over every visible row of its segment.
///
/// Either the complete bitmap or the first error is returned.
pub fn evaluate_segment(
    root: &dyn PhysicalExpr,
    ctx: &mut EvalContext,
    active_count: usize,
    batch_size: usize,
) -> EvalResult<Bitmap> {
    if batch_size == 0 {
        return Err(EvaluationError::InvalidConfig(
            "batch_size must be positive".to_string(),
        ));
    }

    let expr = root.to_string();
    let query_id = ctx.query_id().to_string();
    let active = active_count.to_string();
    let scope = ObservationScope::with_fields(
        "SEGMENT_FILTER",
        &[("active_count", &active), ("expr", &expr), ("query_id", &query_id)],
    );

    // Windows are disjoint and never re-requested, so nothing is cached
    let outcome = ctx.without_cache(|ctx| -> Result<Bitmap, (RowRange, EvaluationError)> {
        let mut result = Bitmap::new(0);
        for window in RowRange::new(0, active_count).windows(batch_size) {
            ctx.set_current_range(window);
            let bits = root.eval(ctx, window).map_err(|err| (window, err))?;
            result.append(&bits);
        }
        Ok(result)
    });

    let result = match outcome {
        Ok(result) => result,
        Err((window, err)) => {
            ctx.metrics().increment_eval_failures();
            let range = window.to_string();
            let message = err.to_string();
            Logger::error(
                "EXPR_EVAL_FAILED",
                &[
                    ("code", err.code()),
                    ("error", &message),
                    ("query_id", &query_id),
                    ("range", &range),
                ],
            );
            scope.fail(err.code());
            return Err(err);
        }
    };

    ctx.metrics().increment_segments_filtered();
    let matched = result.count_ones().to_string();
    scope.complete_with_fields(&[("matched", &matched)]);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{compile, ExprPtr, SegmentBinding};
    use crate::plan::{ExistsExpr, LogicalExpr};
    use crate::schema::{ColumnInfo, DataType, FieldId};
    use crate::segment::{ColumnChunk, InMemorySegment, SegmentKind, TypedChunk};
    use std::sync::Arc;

    fn root(field: i64) -> ExprPtr {
        let segment = InMemorySegment::builder(41, SegmentKind::Growing)
            .field(
                FieldId(100),
                DataType::Bool,
                vec![
                    ColumnChunk::Bool(TypedChunk::from_options(vec![Some(true), None, Some(false)])),
                    ColumnChunk::Bool(TypedChunk::from_options(vec![None, Some(true)])),
                ],
            )
            .build()
            .unwrap();
        let plan = LogicalExpr::Exists(ExistsExpr::new(
            ColumnInfo::new(FieldId(field), DataType::Bool),
            DataType::None,
        ));
        compile(&plan, &SegmentBinding::new(Arc::new(segment))).unwrap()
    }

    #[test]
    fn test_windows_concatenate_in_order() {
        let mut ctx = EvalContext::new();
        let bits = evaluate_segment(root(100).as_ref(), &mut ctx, 5, 2).unwrap();
        assert_eq!(bits.to_bools(), vec![true, false, true, false, true]);
        assert_eq!(ctx.current_range(), Some(RowRange::new(4, 5)));
        assert_eq!(ctx.cached_entries(), 0);

        let snapshot = ctx.metrics().snapshot();
        assert_eq!(snapshot.segments_filtered, 1);
        assert_eq!(snapshot.rows_evaluated, 5);
    }

    #[test]
    fn test_segment_pass_leaves_cache_untouched() {
        let root = root(100);
        let mut ctx = EvalContext::new();
        root.eval(&mut ctx, RowRange::new(0, 2)).unwrap();
        assert_eq!(ctx.cached_entries(), 1);

        evaluate_segment(root.as_ref(), &mut ctx, 5, 1).unwrap();
        assert_eq!(ctx.cached_entries(), 1);

        // caching resumes afterwards
        root.eval(&mut ctx, RowRange::new(2, 5)).unwrap();
        assert_eq!(ctx.cached_entries(), 2);
    }

    #[test]
    fn test_failure_counted_and_returned() {
        let mut ctx = EvalContext::new();
        let err = evaluate_segment(root(7).as_ref(), &mut ctx, 5, 2).unwrap_err();
        assert_eq!(err.code(), "EVAL_MISSING_FIELD");
        assert_eq!(ctx.metrics().snapshot().eval_failures, 1);
        assert_eq!(ctx.metrics().snapshot().segments_filtered, 0);
    }

    #[test]
    fn test_zero_batch_rejected() {
        let err = evaluate_segment(root(100).as_ref(), &mut EvalContext::new(), 5, 0).unwrap_err();
        assert!(matches!(err, EvaluationError::InvalidConfig(_)));
    }

    #[test]
    fn test_empty_segment() {
        let bits = evaluate_segment(root(100).as_ref(), &mut EvalContext::new(), 0, 4).unwrap();
        assert!(bits.is_empty());
    }
}
