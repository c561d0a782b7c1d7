//! Logical plan to physical operator tree

use std::sync::Arc;

use crate::plan::{LogicalExpr, LogicalOp};

use super::compare::PhyCompareFilterExpr;
use super::errors::EvalResult;
use super::exists::PhyExistsFilterExpr;
use super::expr::ExprPtr;
use super::logical::{PhyLogicalExpr, PhyNotExpr};
use super::segment_expr::SegmentBinding;

/// Compile `logical` against one segment.
///
/// Runs once per query and segment. Leaves bind their field and strategy
/// here; field errors surface on the first `eval`.
pub fn compile(logical: &LogicalExpr, binding: &SegmentBinding) -> EvalResult<ExprPtr> {
    let expr: ExprPtr = match logical {
        LogicalExpr::Exists(exists) => {
            Arc::new(PhyExistsFilterExpr::new(Arc::new(exists.clone()), binding)?)
        }
        LogicalExpr::Compare(compare) => {
            Arc::new(PhyCompareFilterExpr::new(Arc::new(compare.clone()), binding)?)
        }
        LogicalExpr::And(inputs) => Arc::new(PhyLogicalExpr::new(
            LogicalOp::And,
            compile_all(inputs, binding)?,
        )?),
        LogicalExpr::Or(inputs) => Arc::new(PhyLogicalExpr::new(
            LogicalOp::Or,
            compile_all(inputs, binding)?,
        )?),
        LogicalExpr::Not(input) => Arc::new(PhyNotExpr::new(compile(input, binding)?)),
    };
    Ok(expr)
}

fn compile_all(inputs: &[LogicalExpr], binding: &SegmentBinding) -> EvalResult<Vec<ExprPtr>> {
    inputs.iter().map(|input| compile(input, binding)).collect()
}
