//! Physical column chunks and borrowed slices over them
//!
//! A field's data is a sequence of chunks. Sealed segments usually hold one
//! chunk per field; growing segments append a new chunk per insert batch.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bitmap::Bitmap;
use crate::exec::{EvalResult, EvaluationError};
use crate::schema::DataType;

use super::RowRange;

/// Values of one chunk plus an optional validity bitmap (nullable columns)
#[derive(Debug, Clone, PartialEq)]
pub struct TypedChunk<T> {
    values: Vec<T>,
    validity: Option<Bitmap>,
}

impl<T> TypedChunk<T> {
    /// Non-nullable chunk: every row is valid
    pub fn new(values: Vec<T>) -> Self {
        Self {
            values,
            validity: None,
        }
    }

    /// Nullable chunk; `validity` bit `i` is false when row `i` is null
    pub fn with_validity(values: Vec<T>, validity: Bitmap) -> EvalResult<Self> {
        if validity.len() != values.len() {
            return Err(EvaluationError::ShapeMismatch {
                left: values.len(),
                right: validity.len(),
            });
        }
        Ok(Self {
            values,
            validity: Some(validity),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn validity(&self) -> Option<&Bitmap> {
        self.validity.as_ref()
    }

    /// Borrow rows `range` (chunk-local)
    pub fn slice(&self, range: RowRange) -> TypedSlice<'_, T> {
        TypedSlice {
            values: &self.values[range.start..range.end],
            validity: self.validity.as_ref(),
            validity_offset: range.start,
        }
    }
}

impl<T: Default> TypedChunk<T> {
    /// Nullable chunk from optional values; nulls store `T::default()`
    pub fn from_options(values: Vec<Option<T>>) -> Self {
        let validity: Bitmap = values.iter().map(Option::is_some).collect();
        let values = values.into_iter().map(Option::unwrap_or_default).collect();
        Self {
            values,
            validity: Some(validity),
        }
    }
}

/// Borrowed rows of a typed chunk
#[derive(Debug)]
pub struct TypedSlice<'a, T> {
    values: &'a [T],
    validity: Option<&'a Bitmap>,
    validity_offset: usize,
}

impl<T> Clone for TypedSlice<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TypedSlice<'_, T> {}

impl<'a, T> TypedSlice<'a, T> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Row `index`, or `None` when the row is null
    #[inline]
    pub fn get(&self, index: usize) -> Option<&'a T> {
        match self.validity {
            Some(validity) if !validity.get(self.validity_offset + index) => None,
            _ => Some(&self.values[index]),
        }
    }
}

/// Array cell: a sequence of scalar or document values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue(pub Vec<Value>);

impl ArrayValue {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Raw JSON text of one row, parsed on demand
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonDocument(Box<str>);

impl JsonDocument {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().into_boxed_str())
    }

    pub fn from_value(value: &Value) -> Self {
        Self::new(value.to_string())
    }

    pub fn raw(&self) -> &str {
        &self.0
    }

    pub fn parse(&self) -> EvalResult<Value> {
        serde_json::from_str(&self.0).map_err(|e| EvaluationError::MalformedDocument {
            reason: e.to_string(),
        })
    }
}

/// One physical chunk of a field
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnChunk {
    Bool(TypedChunk<bool>),
    Int8(TypedChunk<i8>),
    Int16(TypedChunk<i16>),
    Int32(TypedChunk<i32>),
    Int64(TypedChunk<i64>),
    Float(TypedChunk<f32>),
    Double(TypedChunk<f64>),
    VarChar(TypedChunk<String>),
    Array(TypedChunk<ArrayValue>),
    Json(TypedChunk<JsonDocument>),
    FloatVector(TypedChunk<Vec<f32>>),
}

/// Borrowed rows of one chunk, type-erased
#[derive(Debug, Clone, Copy)]
pub enum ColumnSlice<'a> {
    Bool(TypedSlice<'a, bool>),
    Int8(TypedSlice<'a, i8>),
    Int16(TypedSlice<'a, i16>),
    Int32(TypedSlice<'a, i32>),
    Int64(TypedSlice<'a, i64>),
    Float(TypedSlice<'a, f32>),
    Double(TypedSlice<'a, f64>),
    VarChar(TypedSlice<'a, String>),
    Array(TypedSlice<'a, ArrayValue>),
    Json(TypedSlice<'a, JsonDocument>),
    FloatVector(TypedSlice<'a, Vec<f32>>),
}

macro_rules! for_each_variant {
    ($value:expr, $enum:ident, $inner:ident => $body:expr) => {
        match $value {
            $enum::Bool($inner) => $body,
            $enum::Int8($inner) => $body,
            $enum::Int16($inner) => $body,
            $enum::Int32($inner) => $body,
            $enum::Int64($inner) => $body,
            $enum::Float($inner) => $body,
            $enum::Double($inner) => $body,
            $enum::VarChar($inner) => $body,
            $enum::Array($inner) => $body,
            $enum::Json($inner) => $body,
            $enum::FloatVector($inner) => $body,
        }
    };
}

macro_rules! slice_variants {
    ($chunk:expr, $range:expr, [$($variant:ident),*]) => {
        match $chunk {
            $(ColumnChunk::$variant(c) => ColumnSlice::$variant(c.slice($range)),)*
        }
    };
}

impl ColumnChunk {
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnChunk::Bool(_) => DataType::Bool,
            ColumnChunk::Int8(_) => DataType::Int8,
            ColumnChunk::Int16(_) => DataType::Int16,
            ColumnChunk::Int32(_) => DataType::Int32,
            ColumnChunk::Int64(_) => DataType::Int64,
            ColumnChunk::Float(_) => DataType::Float,
            ColumnChunk::Double(_) => DataType::Double,
            ColumnChunk::VarChar(_) => DataType::VarChar,
            ColumnChunk::Array(_) => DataType::Array,
            ColumnChunk::Json(_) => DataType::Json,
            ColumnChunk::FloatVector(_) => DataType::FloatVector,
        }
    }

    pub fn len(&self) -> usize {
        for_each_variant!(self, ColumnChunk, c => c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow chunk-local rows `range`
    pub fn slice(&self, range: RowRange) -> EvalResult<ColumnSlice<'_>> {
        range.check_within(self.len())?;
        Ok(slice_variants!(
            self,
            range,
            [Bool, Int8, Int16, Int32, Int64, Float, Double, VarChar, Array, Json, FloatVector]
        ))
    }

    /// Row validity (non-null) as a bitmap
    pub fn validity_bits(&self) -> Bitmap {
        for_each_variant!(self, ColumnChunk, c => match c.validity() {
            Some(validity) => validity.clone(),
            None => Bitmap::all_set(c.len()),
        })
    }
}

impl<'a> ColumnSlice<'a> {
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnSlice::Bool(_) => DataType::Bool,
            ColumnSlice::Int8(_) => DataType::Int8,
            ColumnSlice::Int16(_) => DataType::Int16,
            ColumnSlice::Int32(_) => DataType::Int32,
            ColumnSlice::Int64(_) => DataType::Int64,
            ColumnSlice::Float(_) => DataType::Float,
            ColumnSlice::Double(_) => DataType::Double,
            ColumnSlice::VarChar(_) => DataType::VarChar,
            ColumnSlice::Array(_) => DataType::Array,
            ColumnSlice::Json(_) => DataType::Json,
            ColumnSlice::FloatVector(_) => DataType::FloatVector,
        }
    }

    pub fn len(&self) -> usize {
        for_each_variant!(self, ColumnSlice, s => s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_options_tracks_nulls() {
        let chunk = TypedChunk::from_options(vec![Some(1i64), None, Some(3)]);
        let slice = chunk.slice(RowRange::new(0, 3));
        assert_eq!(slice.get(0), Some(&1));
        assert_eq!(slice.get(1), None);
        assert_eq!(slice.get(2), Some(&3));
    }

    #[test]
    fn test_slice_keeps_validity_offset() {
        let chunk = TypedChunk::from_options(vec![None, Some(true), None, Some(false)]);
        let slice = chunk.slice(RowRange::new(1, 4));
        assert_eq!(slice.len(), 3);
        assert_eq!(slice.get(0), Some(&true));
        assert_eq!(slice.get(1), None);
        assert_eq!(slice.get(2), Some(&false));
    }

    #[test]
    fn test_with_validity_length_checked() {
        let err = TypedChunk::with_validity(vec![1i32, 2], Bitmap::new(3)).unwrap_err();
        assert_eq!(err, EvaluationError::ShapeMismatch { left: 2, right: 3 });
    }

    #[test]
    fn test_chunk_slice_bounds() {
        let chunk = ColumnChunk::Int32(TypedChunk::new(vec![1, 2, 3]));
        assert_eq!(chunk.data_type(), DataType::Int32);
        assert_eq!(chunk.slice(RowRange::new(1, 3)).unwrap().len(), 2);
        assert!(chunk.slice(RowRange::new(2, 5)).is_err());
    }

    #[test]
    fn test_validity_bits() {
        let chunk = ColumnChunk::VarChar(TypedChunk::from_options(vec![
            Some("a".to_string()),
            None,
        ]));
        assert_eq!(chunk.validity_bits().to_bools(), vec![true, false]);
        let chunk = ColumnChunk::Double(TypedChunk::new(vec![1.0, 2.0]));
        assert_eq!(chunk.validity_bits().count_ones(), 2);
    }

    #[test]
    fn test_json_document_parse() {
        let doc = JsonDocument::from_value(&json!({"a": {"b": 1}}));
        assert_eq!(doc.parse().unwrap()["a"]["b"], 1);

        let broken = JsonDocument::new("{\"a\": ");
        assert!(matches!(
            broken.parse(),
            Err(EvaluationError::MalformedDocument { .. })
        ));
    }
}
