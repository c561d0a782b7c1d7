//! Existence predicate
//!
//! `exists(column[path])` is true for a row when the (possibly nested) value
//! is present and compatible with the expected type:
//!
//! - scalar column: the row is non-null (a nested path never resolves)
//! - array column: non-null and non-empty, or element `path[0]` exists and
//!   the rest of the path resolves inside it
//! - JSON column: the path resolves in the row's document
//!
//! Explicit JSON `null` at the path counts as absent unless
//! `null_is_present` is configured. Documents that fail to parse answer
//! false for their row only.

use std::fmt;
use std::sync::Arc;

use crate::bitmap::Bitmap;
use crate::plan::ExistsExpr;
use crate::schema::{ColumnInfo, DataType, NestedPath, ValueKind};
use crate::segment::RowRange;

use super::context::EvalContext;
use super::errors::{EvalResult, EvaluationError};
use super::expr::{ExprId, PhysicalExpr};
use super::functor::{
    dispatch, ColumnValue, ElementFunc, ElementKernel, KernelFactory, Probe, TypedKernel,
};
use super::segment_expr::{EvalStrategy, SegmentBinding, SegmentExpr};

/// Per-row existence decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistsElementFunc {
    path: NestedPath,
    expected: DataType,
    null_is_present: bool,
}

impl ExistsElementFunc {
    pub fn new(path: NestedPath, expected: DataType, null_is_present: bool) -> Self {
        Self {
            path,
            expected,
            null_is_present,
        }
    }

    /// Whether a navigation outcome counts as "exists"
    pub fn admits(&self, probe: Probe) -> bool {
        match probe {
            Probe::Found(ValueKind::Null) => {
                self.null_is_present && matches!(self.expected, DataType::None | DataType::Json)
            }
            Probe::Found(kind) => self.expected.accepts(kind),
            Probe::Absent | Probe::Malformed => false,
        }
    }

    /// Value kinds that satisfy the predicate when found at the path
    pub fn admitted_kinds(&self) -> Vec<ValueKind> {
        ValueKind::ALL
            .iter()
            .copied()
            .filter(|kind| self.admits(Probe::Found(*kind)))
            .collect()
    }

    /// Whether plain presence bits would disagree with `admits` for a column
    /// of `data_type`, so an index must record value kinds to answer.
    fn needs_kind_tags(&self, data_type: DataType) -> bool {
        match data_type {
            DataType::Json => {
                self.null_is_present || !matches!(self.expected, DataType::None | DataType::Json)
            }
            DataType::Array => !matches!(self.expected, DataType::None | DataType::Array),
            _ => false,
        }
    }
}

impl<T: ColumnValue> ElementFunc<T> for ExistsElementFunc {
    fn apply(&self, value: Option<&T>, _reference: Option<&T>) -> bool {
        match value {
            Some(value) => self.admits(value.probe(&self.path)),
            None => false,
        }
    }
}

struct ExistsKernels<'a>(&'a ExistsElementFunc);

impl KernelFactory for ExistsKernels<'_> {
    fn operation(&self) -> &'static str {
        "exists"
    }

    fn build<T: ColumnValue>(&self) -> Option<Arc<dyn ElementKernel>> {
        Some(Arc::new(TypedKernel::<T, _>::new(self.0.clone())))
    }
}

/// Physical existence filter over one field of one segment
#[derive(Debug)]
pub struct PhyExistsFilterExpr {
    id: ExprId,
    expr: Arc<ExistsExpr>,
    base: SegmentExpr,
    func: ExistsElementFunc,
    use_kind_tags: bool,
    kernel: Result<Arc<dyn ElementKernel>, EvaluationError>,
}

impl PhyExistsFilterExpr {
    /// Bind `expr` to a segment.
    ///
    /// Field and type problems do not fail construction; they are reported
    /// by every `eval` call.
    pub fn new(expr: Arc<ExistsExpr>, binding: &SegmentBinding) -> EvalResult<Self> {
        let column = expr.column.clone();
        let func = ExistsElementFunc::new(
            column.nested_path.clone(),
            expr.expected_type,
            binding.config.null_is_present,
        );
        let use_kind_tags = func.needs_kind_tags(column.data_type);
        let path = column.nested_path.clone();
        let base = SegmentExpr::new(column, binding, |index| {
            index.supports(&path) && (!use_kind_tags || index.tracks_kinds())
        })?;
        let kernel = bind_kernel(&base, &func);

        Ok(Self {
            id: ExprId::new(),
            expr,
            base,
            func,
            use_kind_tags,
            kernel,
        })
    }

    pub fn expr(&self) -> &ExistsExpr {
        &self.expr
    }

    pub fn func(&self) -> &ExistsElementFunc {
        &self.func
    }

    /// See [`SegmentExpr::force_strategy`]
    pub fn force_strategy(&mut self, strategy: EvalStrategy) -> EvalResult<()> {
        self.base.force_strategy(strategy)
    }

    fn eval_range(&self, ctx: &mut EvalContext, range: RowRange) -> EvalResult<Bitmap> {
        let kernel = self.kernel.as_ref().map_err(Clone::clone)?;
        self.base.check_field()?;
        if let Some(hit) = ctx.cached_result(self.id, range) {
            return Ok(hit);
        }

        let segment = self.base.segment();
        let column = self.base.column();
        let kinds = self.func.admitted_kinds();
        let result = self.base.eval_with(
            ctx.metrics(),
            range,
            |indexed| {
                if self.use_kind_tags {
                    segment.index_lookup_kinds(column.field_id, &column.nested_path, &kinds, indexed)
                } else {
                    segment.index_lookup_exists(column.field_id, &column.nested_path, indexed)
                }
            },
            |slice, out| kernel.run(slice, None, out),
        )?;

        ctx.store_result(self.id, range, &result);
        Ok(result)
    }
}

/// Resolve the kernel for the field's schema type, checking that the
/// expected type can ever match.
fn bind_kernel(
    base: &SegmentExpr,
    func: &ExistsElementFunc,
) -> EvalResult<Arc<dyn ElementKernel>> {
    let data_type = base.check_field()?;
    if func.expected.is_vector() {
        return Err(EvaluationError::UnsupportedType {
            data_type: func.expected,
            operation: "exists",
        });
    }
    if let Some(kind) = data_type.scalar_kind() {
        let untyped = matches!(func.expected, DataType::None | DataType::Json);
        if !untyped && !func.expected.accepts(kind) {
            return Err(EvaluationError::TypeMismatch {
                expected: func.expected,
                actual: data_type.to_string(),
            });
        }
    }
    dispatch(data_type, &ExistsKernels(func))
}

impl PhysicalExpr for PhyExistsFilterExpr {
    fn id(&self) -> ExprId {
        self.id
    }

    fn name(&self) -> &str {
        "exists"
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

    fn strategy(&self) -> Option<EvalStrategy> {
        Some(self.base.strategy())
    }
}

impl fmt::Display for PhyExistsFilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}
