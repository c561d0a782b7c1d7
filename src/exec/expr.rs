//! Physical operator contract
//!
//! Every node of a compiled predicate tree implements [`PhysicalExpr`].
//! Composite nodes hold their children as [`ExprPtr`] and are traversed
//! through the same trait, never by downcasting.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bitmap::Bitmap;
use crate::schema::ColumnInfo;
use crate::segment::RowRange;

use super::context::EvalContext;
use super::errors::EvalResult;
use super::segment_expr::EvalStrategy;

/// Identity of one operator instance; keys the result cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExprId(Uuid);

impl ExprId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ExprId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared handle to a compiled operator
pub type ExprPtr = Arc<dyn PhysicalExpr>;

/// Evaluation contract of a physical operator
pub trait PhysicalExpr: fmt::Display + fmt::Debug + Send + Sync {
    fn id(&self) -> ExprId;

    /// Operator kind, e.g. `exists`
    fn name(&self) -> &str;

    /// Bits for exactly the rows of `range`, in row order.
    ///
    /// May be called repeatedly over successive ranges. Either the full
    /// bitmap or an error is returned.
    fn eval(&self, ctx: &mut EvalContext, range: RowRange) -> EvalResult<Bitmap>;

    /// True for leaves reading segment storage directly
    fn is_source(&self) -> bool;

    /// Field reference of a source operator
    fn column_info(&self) -> Option<&ColumnInfo>;

    fn inputs(&self) -> &[ExprPtr] {
        &[]
    }

    /// Whether results may be reused from the context cache.
    ///
    /// Results depending on bind parameters are not; composites inherit
    /// from their inputs.
    fn is_cacheable(&self) -> bool {
        self.inputs().iter().all(|input| input.is_cacheable())
    }

    /// Strategy bound at construction, for source operators
    fn strategy(&self) -> Option<EvalStrategy> {
        None
    }
}

/// Indented rendering of an operator tree, one node per line
pub fn explain(expr: &dyn PhysicalExpr) -> String {
    let mut output = String::new();
    explain_into(expr, 0, &mut output);
    output
}

fn explain_into(expr: &dyn PhysicalExpr, depth: usize, output: &mut String) {
    for _ in 0..depth {
        output.push_str("  ");
    }
    match expr.strategy() {
        Some(strategy) => output.push_str(&format!("{} [{}]\n", expr, strategy)),
        None => output.push_str(&format!("{}\n", expr.name())),
    }
    for input in expr.inputs() {
        explain_into(input.as_ref(), depth + 1, output);
    }
}
