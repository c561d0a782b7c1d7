//! Elementwise functor dispatch
//!
//! The per-row loop is written once in [`TypedKernel`]. What varies per value
//! type lives in [`ColumnValue`]; what varies per predicate lives in an
//! [`ElementFunc`]. [`dispatch`] is the only place a runtime [`DataType`] is
//! matched against a concrete Rust type, and it runs once at operator
//! construction.
//!
//! # Invariants
//!
//! - A kernel writes exactly one bit per source row, in row order
//! - Types with no routine fail with `UnsupportedType`, never default to false

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use crate::bitmap::BitmapView;
use crate::schema::{DataType, NestedPath, ValueKind};
use crate::segment::{ArrayValue, ColumnSlice, JsonDocument, TypedSlice};

use super::errors::{EvalResult, EvaluationError};

/// Outcome of navigating a row value to a nested path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// A value of this kind sits at the path
    Found(ValueKind),
    /// The path does not resolve
    Absent,
    /// The row's document could not be parsed
    Malformed,
}

/// A storable column value type
pub trait ColumnValue: Sized + Send + Sync + 'static {
    const DATA_TYPE: DataType;

    /// Typed view of a type-erased slice; `None` if the slice holds another type
    fn downcast<'a>(slice: &ColumnSlice<'a>) -> Option<TypedSlice<'a, Self>>;

    /// Convert a literal or bind parameter; `None` if not representable
    fn from_literal(value: &Value) -> Option<Self>;

    /// Ordering used by comparison predicates
    fn compare(&self, _other: &Self) -> Option<Ordering> {
        None
    }

    /// Navigate this non-null value to `path`
    fn probe(&self, path: &NestedPath) -> Probe;
}

macro_rules! scalar_column_value {
    ($ty:ty, $variant:ident, $kind:expr, $literal:expr) => {
        impl ColumnValue for $ty {
            const DATA_TYPE: DataType = DataType::$variant;

            fn downcast<'a>(slice: &ColumnSlice<'a>) -> Option<TypedSlice<'a, Self>> {
                match slice {
                    ColumnSlice::$variant(values) => Some(*values),
                    _ => None,
                }
            }

            fn from_literal(value: &Value) -> Option<Self> {
                let convert: fn(&Value) -> Option<$ty> = $literal;
                convert(value)
            }

            fn compare(&self, other: &Self) -> Option<Ordering> {
                self.partial_cmp(other)
            }

            fn probe(&self, path: &NestedPath) -> Probe {
                // Scalars have no inner structure
                if path.is_empty() {
                    Probe::Found($kind)
                } else {
                    Probe::Absent
                }
            }
        }
    };
}

scalar_column_value!(bool, Bool, ValueKind::Bool, |v| v.as_bool());
scalar_column_value!(i8, Int8, ValueKind::Int, |v| v
    .as_i64()
    .and_then(|n| i8::try_from(n).ok()));
scalar_column_value!(i16, Int16, ValueKind::Int, |v| v
    .as_i64()
    .and_then(|n| i16::try_from(n).ok()));
scalar_column_value!(i32, Int32, ValueKind::Int, |v| v
    .as_i64()
    .and_then(|n| i32::try_from(n).ok()));
scalar_column_value!(i64, Int64, ValueKind::Int, |v| v.as_i64());
scalar_column_value!(f32, Float, ValueKind::Double, |v| v.as_f64().map(|n| n as f32));
scalar_column_value!(f64, Double, ValueKind::Double, |v| v.as_f64());
scalar_column_value!(String, VarChar, ValueKind::String, |v| v
    .as_str()
    .map(str::to_owned));

fn probe_value(value: &Value, path: &NestedPath) -> Probe {
    match value.pointer(&path.pointer()) {
        Some(found) => Probe::Found(ValueKind::of(found)),
        None => Probe::Absent,
    }
}

impl ColumnValue for ArrayValue {
    const DATA_TYPE: DataType = DataType::Array;

    fn downcast<'a>(slice: &ColumnSlice<'a>) -> Option<TypedSlice<'a, Self>> {
        match slice {
            ColumnSlice::Array(values) => Some(*values),
            _ => None,
        }
    }

    fn from_literal(value: &Value) -> Option<Self> {
        value.as_array().map(|items| ArrayValue(items.clone()))
    }

    fn probe(&self, path: &NestedPath) -> Probe {
        if path.is_empty() {
            return if self.is_empty() {
                Probe::Absent
            } else {
                Probe::Found(ValueKind::Array)
            };
        }
        match path.array_index().and_then(|i| self.0.get(i)) {
            Some(element) => probe_value(element, &path.tail()),
            None => Probe::Absent,
        }
    }
}

impl ColumnValue for JsonDocument {
    const DATA_TYPE: DataType = DataType::Json;

    fn downcast<'a>(slice: &ColumnSlice<'a>) -> Option<TypedSlice<'a, Self>> {
        match slice {
            ColumnSlice::Json(values) => Some(*values),
            _ => None,
        }
    }

    fn from_literal(value: &Value) -> Option<Self> {
        Some(JsonDocument::from_value(value))
    }

    fn probe(&self, path: &NestedPath) -> Probe {
        match self.parse() {
            Ok(document) => probe_value(&document, path),
            Err(_) => Probe::Malformed,
        }
    }
}

/// Per-row predicate over values of type `T`.
///
/// `value` is `None` for null rows. `reference` is the converted literal, or
/// `None` for predicates that do not compare.
pub trait ElementFunc<T>: Send + Sync {
    fn apply(&self, value: Option<&T>, reference: Option<&T>) -> bool;
}

/// Type-erased routine writing predicate bits for one slice
pub trait ElementKernel: fmt::Debug + Send + Sync {
    /// Column type this kernel was specialized for
    fn value_type(&self) -> DataType;

    /// Fail unless `reference` converts to the kernel's value type
    fn check_reference(&self, reference: &Value) -> EvalResult<()>;

    /// Evaluate every row of `src` into `out` (same length)
    fn run(
        &self,
        src: &ColumnSlice<'_>,
        reference: Option<&Value>,
        out: &mut BitmapView<'_>,
    ) -> EvalResult<()>;
}

/// Kernel for value type `T` applying `F` row by row
pub struct TypedKernel<T, F> {
    func: F,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> TypedKernel<T, F> {
    pub fn new(func: F) -> Self {
        Self {
            func,
            _marker: PhantomData,
        }
    }
}

impl<T: ColumnValue, F> fmt::Debug for TypedKernel<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedKernel")
            .field("value_type", &T::DATA_TYPE)
            .finish()
    }
}

fn convert_reference<T: ColumnValue>(reference: &Value) -> EvalResult<T> {
    T::from_literal(reference).ok_or_else(|| EvaluationError::TypeMismatch {
        expected: T::DATA_TYPE,
        actual: reference.to_string(),
    })
}

impl<T: ColumnValue, F: ElementFunc<T>> ElementKernel for TypedKernel<T, F> {
    fn value_type(&self) -> DataType {
        T::DATA_TYPE
    }

    fn check_reference(&self, reference: &Value) -> EvalResult<()> {
        convert_reference::<T>(reference).map(|_| ())
    }

    fn run(
        &self,
        src: &ColumnSlice<'_>,
        reference: Option<&Value>,
        out: &mut BitmapView<'_>,
    ) -> EvalResult<()> {
        let values = T::downcast(src).ok_or_else(|| EvaluationError::TypeMismatch {
            expected: T::DATA_TYPE,
            actual: src.data_type().to_string(),
        })?;
        if values.len() != out.len() {
            return Err(EvaluationError::ShapeMismatch {
                left: out.len(),
                right: values.len(),
            });
        }
        let reference = reference.map(convert_reference::<T>).transpose()?;

        for i in 0..values.len() {
            out.set(i, self.func.apply(values.get(i), reference.as_ref()));
        }
        Ok(())
    }
}

/// Builds the kernel of one predicate for a concrete value type
pub trait KernelFactory {
    /// Predicate name used in `UnsupportedType` errors
    fn operation(&self) -> &'static str;

    /// `None` when the predicate has no meaning for `T`
    fn build<T: ColumnValue>(&self) -> Option<Arc<dyn ElementKernel>>;
}

/// Resolve the kernel for `data_type`
pub fn dispatch<K: KernelFactory>(data_type: DataType, factory: &K) -> EvalResult<Arc<dyn ElementKernel>> {
    let kernel = match data_type {
        DataType::Bool => factory.build::<bool>(),
        DataType::Int8 => factory.build::<i8>(),
        DataType::Int16 => factory.build::<i16>(),
        DataType::Int32 => factory.build::<i32>(),
        DataType::Int64 => factory.build::<i64>(),
        DataType::Float => factory.build::<f32>(),
        DataType::Double => factory.build::<f64>(),
        DataType::VarChar => factory.build::<String>(),
        DataType::Array => factory.build::<ArrayValue>(),
        DataType::Json => factory.build::<JsonDocument>(),
        DataType::None | DataType::FloatVector | DataType::BinaryVector => None,
    };
    kernel.ok_or(EvaluationError::UnsupportedType {
        data_type,
        operation: factory.operation(),
    })
}
