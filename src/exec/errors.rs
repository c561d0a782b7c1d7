//! Evaluation error types
//!
//! Error codes:
//! - EVAL_MISSING_FIELD (ERROR)
//! - EVAL_UNSUPPORTED_TYPE (ERROR)
//! - EVAL_TYPE_MISMATCH (ERROR)
//! - EVAL_SHAPE_MISMATCH (ERROR)
//! - EVAL_RANGE_OUT_OF_BOUNDS (ERROR)
//! - EVAL_MALFORMED_DOCUMENT (WARN, folded into a false bit for the row)
//! - EVAL_INDEX_UNAVAILABLE (ERROR)
//! - EVAL_UNBOUND_PARAMETER (ERROR)
//! - EVAL_INVALID_CONFIG (ERROR)

use thiserror::Error;

use crate::observability::Severity;
use crate::schema::{DataType, FieldId};

/// Result type for evaluation operations
pub type EvalResult<T> = Result<T, EvaluationError>;

/// Evaluation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    /// Field absent from the segment schema
    #[error("{field} is not part of the segment schema")]
    MissingField { field: FieldId },

    /// No elementwise routine exists for the type
    #[error("unsupported type {data_type} for {operation}")]
    UnsupportedType {
        data_type: DataType,
        operation: &'static str,
    },

    /// Runtime value or literal type differs from the compiled type
    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch { expected: DataType, actual: String },

    /// Bitmaps of different lengths combined
    #[error("bitmap shape mismatch: {left} vs {right} rows")]
    ShapeMismatch { left: usize, right: usize },

    /// Requested rows exceed the visible bound
    #[error("row range [{start}, {end}) out of bounds (limit {limit})")]
    RangeOutOfBounds {
        start: usize,
        end: usize,
        limit: usize,
    },

    /// Document could not be parsed or navigated
    #[error("malformed document: {reason}")]
    MalformedDocument { reason: String },

    /// Index strategy requested but no covering index exists
    #[error("index unavailable for {field}: {reason}")]
    IndexUnavailable { field: FieldId, reason: String },

    /// Bind variable missing from the evaluation context
    #[error("unbound parameter ${0}")]
    UnboundParameter(String),

    /// Operator constructed with invalid parameters
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure raised by a specific operator
    #[error("{expr}: {source}")]
    Expression {
        expr: String,
        #[source]
        source: Box<EvaluationError>,
    },
}

impl EvaluationError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            EvaluationError::MissingField { .. } => "EVAL_MISSING_FIELD",
            EvaluationError::UnsupportedType { .. } => "EVAL_UNSUPPORTED_TYPE",
            EvaluationError::TypeMismatch { .. } => "EVAL_TYPE_MISMATCH",
            EvaluationError::ShapeMismatch { .. } => "EVAL_SHAPE_MISMATCH",
            EvaluationError::RangeOutOfBounds { .. } => "EVAL_RANGE_OUT_OF_BOUNDS",
            EvaluationError::MalformedDocument { .. } => "EVAL_MALFORMED_DOCUMENT",
            EvaluationError::IndexUnavailable { .. } => "EVAL_INDEX_UNAVAILABLE",
            EvaluationError::UnboundParameter(_) => "EVAL_UNBOUND_PARAMETER",
            EvaluationError::InvalidConfig(_) => "EVAL_INVALID_CONFIG",
            EvaluationError::Expression { source, .. } => source.code(),
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        if self.is_recoverable() {
            Severity::Warn
        } else {
            Severity::Error
        }
    }

    /// Per-row document failures are folded into the bitmap; everything else
    /// aborts the query.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.root(), EvaluationError::MalformedDocument { .. })
    }

    /// Innermost error, unwrapping operator context
    pub fn root(&self) -> &EvaluationError {
        match self {
            EvaluationError::Expression { source, .. } => source.root(),
            other => other,
        }
    }

    /// Attach the rendering of the operator that raised this error.
    ///
    /// Only the innermost operator is recorded.
    pub fn in_expr(self, expr: impl Into<String>) -> Self {
        match self {
            wrapped @ EvaluationError::Expression { .. } => wrapped,
            other => EvaluationError::Expression {
                expr: expr.into(),
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn range(start: usize, end: usize, limit: usize) -> Self {
        EvaluationError::RangeOutOfBounds { start, end, limit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            EvaluationError::MissingField { field: FieldId(7) }.code(),
            "EVAL_MISSING_FIELD"
        );
        assert_eq!(
            EvaluationError::ShapeMismatch { left: 1, right: 2 }.code(),
            "EVAL_SHAPE_MISMATCH"
        );
        assert_eq!(
            EvaluationError::range(3, 9, 5).code(),
            "EVAL_RANGE_OUT_OF_BOUNDS"
        );
    }

    #[test]
    fn test_malformed_document_is_recoverable() {
        let err = EvaluationError::MalformedDocument {
            reason: "EOF while parsing".into(),
        };
        assert!(err.is_recoverable());
        assert_eq!(err.severity(), Severity::Warn);

        let err = EvaluationError::UnsupportedType {
            data_type: DataType::FloatVector,
            operation: "exists",
        };
        assert!(!err.is_recoverable());
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn test_in_expr_wraps_once() {
        let err = EvaluationError::MissingField { field: FieldId(101) }
            .in_expr("exists(field#101:json)")
            .in_expr("and(...)");

        match &err {
            EvaluationError::Expression { expr, .. } => assert_eq!(expr, "exists(field#101:json)"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(err.code(), "EVAL_MISSING_FIELD");
        assert_eq!(err.root(), &EvaluationError::MissingField { field: FieldId(101) });
    }

    #[test]
    fn test_display_names_field_and_expression() {
        let err = EvaluationError::MissingField { field: FieldId(42) }.in_expr("exists(field#42:int64)");
        let display = err.to_string();
        assert!(display.contains("exists(field#42:int64)"));
        assert!(display.contains("field#42 is not part of the segment schema"));
    }
}
