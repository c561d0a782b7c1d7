//! Scalar comparison predicate
//!
//! `column <op> operand` over a plain scalar column. The operand is a literal
//! fixed at compile time or a parameter bound in the evaluation context.
//! Null rows never match. Always evaluated by raw scan: existence indexes
//! cannot answer comparisons.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::bitmap::Bitmap;
use crate::plan::{CompareExpr, CompareOp, Operand};
use crate::schema::ColumnInfo;
use crate::segment::RowRange;

use super::context::EvalContext;
use super::errors::{EvalResult, EvaluationError};
use super::expr::{ExprId, PhysicalExpr};
use super::functor::{dispatch, ColumnValue, ElementFunc, ElementKernel, KernelFactory, TypedKernel};
use super::segment_expr::{EvalStrategy, SegmentBinding, SegmentExpr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareElementFunc {
    op: CompareOp,
}

impl CompareElementFunc {
    pub fn new(op: CompareOp) -> Self {
        Self { op }
    }
}

impl<T: ColumnValue> ElementFunc<T> for CompareElementFunc {
    fn apply(&self, value: Option<&T>, reference: Option<&T>) -> bool {
        match (value, reference) {
            (Some(value), Some(reference)) => value
                .compare(reference)
                .map_or(false, |ordering| self.op.matches(ordering)),
            _ => false,
        }
    }
}

struct CompareKernels(CompareElementFunc);

impl KernelFactory for CompareKernels {
    fn operation(&self) -> &'static str {
        "compare"
    }

    fn build<T: ColumnValue>(&self) -> Option<Arc<dyn ElementKernel>> {
        if !T::DATA_TYPE.is_scalar() {
            return None;
        }
        Some(Arc::new(TypedKernel::<T, _>::new(self.0)))
    }
}

/// Physical comparison filter over one scalar field of one segment
#[derive(Debug)]
pub struct PhyCompareFilterExpr {
    id: ExprId,
    expr: Arc<CompareExpr>,
    base: SegmentExpr,
    kernel: Result<Arc<dyn ElementKernel>, EvaluationError>,
}

impl PhyCompareFilterExpr {
    pub fn new(expr: Arc<CompareExpr>, binding: &SegmentBinding) -> EvalResult<Self> {
        let mut base = SegmentExpr::new(expr.column.clone(), binding, |_| false)?;
        base.force_strategy(EvalStrategy::RawScan)?;
        let kernel = bind_kernel(&base, &expr);
        Ok(Self {
            id: ExprId::new(),
            expr,
            base,
            kernel,
        })
    }

    pub fn expr(&self) -> &CompareExpr {
        &self.expr
    }

    fn resolve_operand(&self, ctx: &EvalContext) -> EvalResult<Value> {
        match &self.expr.operand {
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Param(name) => ctx
                .param(name)
                .cloned()
                .ok_or_else(|| EvaluationError::UnboundParameter(name.clone())),
        }
    }

    fn eval_range(&self, ctx: &mut EvalContext, range: RowRange) -> EvalResult<Bitmap> {
        let kernel = self.kernel.as_ref().map_err(Clone::clone)?;
        self.base.check_field()?;
        let reference = self.resolve_operand(ctx)?;
        kernel.check_reference(&reference)?;
        let cacheable = self.is_cacheable();
        if cacheable {
            if let Some(hit) = ctx.cached_result(self.id, range) {
                return Ok(hit);
            }
        }

        let field = self.expr.column.field_id;
        let result = self.base.eval_with(
            ctx.metrics(),
            range,
            |_| {
                Err(EvaluationError::IndexUnavailable {
                    field,
                    reason: "comparisons are answered by raw scan".to_string(),
                })
            },
            |slice, out| kernel.run(slice, Some(&reference), out),
        )?;

        if cacheable {
            ctx.store_result(self.id, range, &result);
        }
        Ok(result)
    }
}

fn bind_kernel(base: &SegmentExpr, expr: &CompareExpr) -> EvalResult<Arc<dyn ElementKernel>> {
    let data_type = base.check_field()?;
    let kernel = dispatch(data_type, &CompareKernels(CompareElementFunc::new(expr.op)))?;
    if let Operand::Literal(value) = &expr.operand {
        kernel.check_reference(value)?;
    }
    Ok(kernel)
}

impl PhysicalExpr for PhyCompareFilterExpr {
    fn id(&self) -> ExprId {
        self.id
    }

    fn name(&self) -> &str {
        "compare"
    }

    fn eval(&self, ctx: &mut EvalContext, range: RowRange) -> EvalResult<Bitmap> {
        self.eval_range(ctx, range)
            .map_err(|err| err.in_expr(self.to_string()))
    }

    fn is_source(&self) -> bool {
        true
    }

    fn column_info(&self) -> Option<&ColumnInfo> {
        Some(self.base.column())
    }

    /// Parameters may be rebound between calls
    fn is_cacheable(&self) -> bool {
        matches!(self.expr.operand, Operand::Literal(_))
    }

    fn strategy(&self) -> Option<EvalStrategy> {
        Some(self.base.strategy())
    }
}

impl fmt::Display for PhyCompareFilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{ExprPtr, PhyLogicalExpr, PhyNotExpr};
    use crate::plan::LogicalOp;
    use crate::schema::{DataType, FieldId};
    use crate::segment::{ColumnChunk, InMemorySegment, Segment, SegmentKind, TypedChunk};
    use serde_json::json;

    fn segment() -> Arc<dyn Segment> {
        Arc::new(
            InMemorySegment::builder(21, SegmentKind::Sealed)
                .field(
                    FieldId(100),
                    DataType::Int32,
                    vec![ColumnChunk::Int32(TypedChunk::from_options(vec![
                        Some(1),
                        None,
                        Some(3),
                        Some(4),
                    ]))],
                )
                .field(
                    FieldId(103),
                    DataType::Double,
                    vec![ColumnChunk::Double(TypedChunk::new(vec![0.5, f64::NAN, 2.5, -1.0]))],
                )
                .presence_index(FieldId(100), 4)
                .build()
                .unwrap(),
        )
    }

    fn compare(field: i64, data_type: DataType, op: CompareOp, operand: Operand) -> PhyCompareFilterExpr {
        PhyCompareFilterExpr::new(
            Arc::new(CompareExpr::new(ColumnInfo::new(FieldId(field), data_type), op, operand)),
            &SegmentBinding::new(segment()),
        )
        .unwrap()
    }

    #[test]
    fn test_literal_comparisons() {
        let mut ctx = EvalContext::new();
        let cases = [
            (CompareOp::Eq, vec![false, false, true, false]),
            (CompareOp::Ne, vec![true, false, false, true]),
            (CompareOp::Lt, vec![true, false, false, false]),
            (CompareOp::Le, vec![true, false, true, false]),
            (CompareOp::Gt, vec![false, false, false, true]),
            (CompareOp::Ge, vec![false, false, true, true]),
        ];
        for (op, expected) in cases {
            let expr = compare(100, DataType::Int32, op, Operand::Literal(json!(3)));
            assert_eq!(expr.strategy(), Some(EvalStrategy::RawScan));
            let bits = expr.eval(&mut ctx, RowRange::new(0, 4)).unwrap();
            assert_eq!(bits.to_bools(), expected, "{}", op);
        }
    }

    #[test]
    fn test_nan_never_matches() {
        let expr = compare(103, DataType::Double, CompareOp::Ne, Operand::Literal(json!(0)));
        let bits = expr.eval(&mut EvalContext::new(), RowRange::new(0, 4)).unwrap();
        assert_eq!(bits.to_bools(), vec![true, false, true, true]);
    }

    #[test]
    fn test_param_operand() {
        let expr = compare(100, DataType::Int32, CompareOp::Gt, Operand::Param("min".into()));
        let mut ctx = EvalContext::new();
        let err = expr.eval(&mut ctx, RowRange::new(0, 4)).unwrap_err();
        assert_eq!(err.root(), &EvaluationError::UnboundParameter("min".into()));

        ctx.bind_param("min", json!(1));
        assert_eq!(
            expr.eval(&mut ctx, RowRange::new(0, 4)).unwrap().to_bools(),
            vec![false, false, true, true]
        );
        ctx.bind_param("min", json!(3));
        assert_eq!(
            expr.eval(&mut ctx, RowRange::new(0, 4)).unwrap().to_bools(),
            vec![false, false, false, true]
        );

        ctx.bind_param("min", json!("three"));
        assert_eq!(
            expr.eval(&mut ctx, RowRange::new(0, 4)).unwrap_err().code(),
            "EVAL_TYPE_MISMATCH"
        );
    }

    #[test]
    fn test_param_rebind_reaches_composites() {
        let param: ExprPtr = Arc::new(compare(
            100,
            DataType::Int32,
            CompareOp::Gt,
            Operand::Param("min".into()),
        ));
        let literal: ExprPtr = Arc::new(compare(
            100,
            DataType::Int32,
            CompareOp::Ge,
            Operand::Literal(json!(0)),
        ));
        let not = PhyNotExpr::new(Arc::clone(&param));
        let and = PhyLogicalExpr::new(LogicalOp::And, vec![literal.clone(), param]).unwrap();
        assert!(literal.is_cacheable());
        assert!(!not.is_cacheable());
        assert!(!and.is_cacheable());

        let all = RowRange::new(0, 4);
        let mut ctx = EvalContext::new();
        ctx.bind_param("min", json!(1));
        assert_eq!(not.eval(&mut ctx, all).unwrap().to_bools(), vec![true, true, false, false]);
        assert_eq!(and.eval(&mut ctx, all).unwrap().to_bools(), vec![false, false, true, true]);

        ctx.bind_param("min", json!(3));
        assert_eq!(not.eval(&mut ctx, all).unwrap().to_bools(), vec![true, true, true, false]);
        assert_eq!(and.eval(&mut ctx, all).unwrap().to_bools(), vec![false, false, false, true]);

        // Only the literal leaf is cached
        assert_eq!(ctx.cached_entries(), 1);
    }

    #[test]
    fn test_literal_out_of_range() {
        let expr = compare(100, DataType::Int32, CompareOp::Eq, Operand::Literal(json!(i64::MAX)));
        let err = expr.eval(&mut EvalContext::new(), RowRange::new(0, 1)).unwrap_err();
        assert!(matches!(err.root(), EvaluationError::TypeMismatch { .. }));
    }

    #[test]
    fn test_force_index_rejected() {
        let mut base = compare(100, DataType::Int32, CompareOp::Eq, Operand::Literal(json!(1))).base;
        assert!(matches!(
            base.force_strategy(EvalStrategy::IndexOnly),
            Err(EvaluationError::IndexUnavailable { .. })
        ));
    }
}
