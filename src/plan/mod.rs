//! Logical plan interface
//!
//! The subset of the logical predicate language this engine compiles:
//! existence tests, scalar comparisons and boolean connectives.

mod expr;

pub use expr::{CompareExpr, CompareOp, ExistsExpr, LogicalExpr, LogicalOp, Operand};
