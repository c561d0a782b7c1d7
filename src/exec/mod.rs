//! Physical expression evaluation
//!
//! Compiles a logical predicate into a tree of physical operators bound to
//! one segment, and evaluates it into per-row bitmaps.
//!
//! # Evaluation flow
//!
//! 1. `compile` binds every leaf to its field, resolves the elementwise
//!    kernel from the schema type and fixes a strategy
//! 2. The scheduler calls `eval` on the root for successive row ranges
//! 3. Leaves answer from the index, by raw scan, or both (hybrid)
//! 4. Composite operators combine child bitmaps
//!
//! # Invariants
//!
//! - `eval(ctx, r)` returns exactly `r.len()` bits, in row order
//! - Rows at or beyond `active_count` are never read
//! - Failed calls return no bitmap

mod compare;
mod compiler;
mod context;
mod driver;
mod errors;
mod exists;
mod expr;
mod functor;
mod logical;
mod segment_expr;

pub use compare::{CompareElementFunc, PhyCompareFilterExpr};
pub use compiler::compile;
pub use context::EvalContext;
pub use driver::evaluate_segment;
pub use errors::{EvalResult, EvaluationError};
pub use exists::{ExistsElementFunc, PhyExistsFilterExpr};
pub use expr::{explain, ExprId, ExprPtr, PhysicalExpr};
pub use functor::{
    dispatch, ColumnValue, ElementFunc, ElementKernel, KernelFactory, Probe, TypedKernel,
};
pub use logical::{PhyLogicalExpr, PhyNotExpr};
pub use segment_expr::{EvalStrategy, SegmentBinding, SegmentExpr};
