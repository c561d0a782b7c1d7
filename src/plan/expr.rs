//! Logical predicate nodes
//!
//! Produced by the optimizer, consumed once by `exec::compile`. Physical
//! operators keep a shared read-only reference to the node they implement.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{ColumnInfo, DataType};

fn untyped() -> DataType {
    DataType::None
}

/// `exists(column[path])`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistsExpr {
    pub column: ColumnInfo,
    /// Type the value at the path must have; `None` accepts any value
    #[serde(default = "untyped")]
    pub expected_type: DataType,
}

impl ExistsExpr {
    pub fn new(column: ColumnInfo, expected_type: DataType) -> Self {
        Self {
            column,
            expected_type,
        }
    }
}

impl fmt::Display for ExistsExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expected_type {
            DataType::None => write!(f, "exists({})", self.column),
            expected => write!(f, "exists({}, {})", self.column, expected),
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Whether `value.cmp(reference) == ordering` satisfies the operator
    pub fn matches(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Literal(Value),
    /// Bind variable resolved from the evaluation context
    Param(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(value) => write!(f, "{}", value),
            Operand::Param(name) => write!(f, "${}", name),
        }
    }
}

/// `column <op> operand`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareExpr {
    pub column: ColumnInfo,
    pub op: CompareOp,
    pub operand: Operand,
}

impl CompareExpr {
    pub fn new(column: ColumnInfo, op: CompareOp, operand: Operand) -> Self {
        Self {
            column,
            op,
            operand,
        }
    }
}

impl fmt::Display for CompareExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.op, self.operand)
    }
}

/// Connective of an n-ary composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => f.write_str("and"),
            LogicalOp::Or => f.write_str("or"),
        }
    }
}

/// Logical predicate tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalExpr {
    Exists(ExistsExpr),
    Compare(CompareExpr),
    And(Vec<LogicalExpr>),
    Or(Vec<LogicalExpr>),
    Not(Box<LogicalExpr>),
}

impl fmt::Display for LogicalExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (op, inputs) = match self {
            LogicalExpr::Exists(exists) => return write!(f, "{}", exists),
            LogicalExpr::Compare(compare) => return write!(f, "{}", compare),
            LogicalExpr::Not(input) => return write!(f, "not({})", input),
            LogicalExpr::And(inputs) => (LogicalOp::And, inputs),
            LogicalExpr::Or(inputs) => (LogicalOp::Or, inputs),
        };
        write!(f, "{}(", op)?;
        for (i, input) in inputs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", input)?;
        }
        f.write_str(")")
    }
}
