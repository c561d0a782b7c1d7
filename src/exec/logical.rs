//! Composite operators combining child bitmaps

use std::fmt;

use crate::bitmap::Bitmap;
use crate::plan::LogicalOp;
use crate::schema::ColumnInfo;
use crate::segment::RowRange;

use super::context::EvalContext;
use super::errors::{EvalResult, EvaluationError};
use super::expr::{ExprId, ExprPtr, PhysicalExpr};

/// N-ary AND / OR.
///
/// Every child is evaluated over the full range; there is no short-circuit.
#[derive(Debug)]
pub struct PhyLogicalExpr {
    id: ExprId,
    op: LogicalOp,
    inputs: Vec<ExprPtr>,
}

impl PhyLogicalExpr {
    pub fn new(op: LogicalOp, inputs: Vec<ExprPtr>) -> EvalResult<Self> {
        if inputs.is_empty() {
            return Err(EvaluationError::InvalidConfig(format!(
                "{} needs at least one input",
                op
            )));
        }
        Ok(Self {
            id: ExprId::new(),
            op,
            inputs,
        })
    }

    pub fn op(&self) -> LogicalOp {
        self.op
    }

    fn eval_range(&self, ctx: &mut EvalContext, range: RowRange) -> EvalResult<Bitmap> {
        let cacheable = self.is_cacheable();
        if cacheable {
            if let Some(hit) = ctx.cached_result(self.id, range) {
                return Ok(hit);
            }
        }

        let mut result: Option<Bitmap> = None;
        for input in &self.inputs {
            let bits = input.eval(ctx, range)?;
            match result.as_mut() {
                None => result = Some(bits),
                Some(acc) => match self.op {
                    LogicalOp::And => acc.and_assign(&bits)?,
                    LogicalOp::Or => acc.or_assign(&bits)?,
                },
            }
        }
        let result = result.unwrap_or_else(|| Bitmap::new(range.len()));

        if cacheable {
            ctx.store_result(self.id, range, &result);
        }
        Ok(result)
    }
}

impl PhysicalExpr for PhyLogicalExpr {
    fn id(&self) -> ExprId {
        self.id
    }

    fn name(&self) -> &str {
        match self.op {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
        }
    }

    fn eval(&self, ctx: &mut EvalContext, range: RowRange) -> EvalResult<Bitmap> {
        self.eval_range(ctx, range)
            .map_err(|err| err.in_expr(self.to_string()))
    }

    fn is_source(&self) -> bool {
        false
    }

    fn column_info(&self) -> Option<&ColumnInfo> {
        None
    }

    fn inputs(&self) -> &[ExprPtr] {
        &self.inputs
    }
}

impl fmt::Display for PhyLogicalExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.op)?;
        for (i, input) in self.inputs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", input)?;
        }
        f.write_str(")")
    }
}

/// Row-wise negation of one child
#[derive(Debug)]
pub struct PhyNotExpr {
    id: ExprId,
    inputs: [ExprPtr; 1],
}

impl PhyNotExpr {
    pub fn new(input: ExprPtr) -> Self {
        Self {
            id: ExprId::new(),
            inputs: [input],
        }
    }

    fn eval_range(&self, ctx: &mut EvalContext, range: RowRange) -> EvalResult<Bitmap> {
        let cacheable = self.is_cacheable();
        if cacheable {
            if let Some(hit) = ctx.cached_result(self.id, range) {
                return Ok(hit);
            }
        }
        let result = self.inputs[0].eval(ctx, range)?.not();
        if cacheable {
            ctx.store_result(self.id, range, &result);
        }
        Ok(result)
    }
}

impl PhysicalExpr for PhyNotExpr {
    fn id(&self) -> ExprId {
        self.id
    }

    fn name(&self) -> &str {
        "not"
    }

    fn eval(&self, ctx: &mut EvalContext, range: RowRange) -> EvalResult<Bitmap> {
        self.eval_range(ctx, range)
            .map_err(|err| err.in_expr(self.to_string()))
    }

    fn is_source(&self) -> bool {
        false
    }

    fn column_info(&self) -> Option<&ColumnInfo> {
        None
    }

    fn inputs(&self) -> &[ExprPtr] {
        &self.inputs
    }
}

impl fmt::Display for PhyNotExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not({})", self.inputs[0])
    }
}
