//! Segment collaborator interface
//!
//! A segment owns the chunked column data of a set of fields plus optional
//! per-field indexes. Evaluation only ever reads from it.
//!
//! # Invariants
//!
//! - A segment handle is immutable for the lifetime of an evaluation
//! - `get_chunk` never returns rows outside the requested range
//! - Windows over multiple physical chunks come back in row order

mod column;
mod index;
mod memory;
mod range;

pub use column::{ArrayValue, ColumnChunk, ColumnSlice, JsonDocument, TypedChunk, TypedSlice};
pub use index::{DocumentKeyIndex, FieldIndex, PresenceIndex};
pub use memory::{InMemorySegment, SegmentBuilder};
pub use range::{BatchWindows, RowRange};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bitmap::Bitmap;
use crate::exec::{EvalResult, EvaluationError};
use crate::schema::{DataType, FieldId, NestedPath, ValueKind};

/// Lifecycle state of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Still receiving inserts; indexes may lag behind the data
    Growing,
    /// Immutable; chunk layout and index builds are final
    Sealed,
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentKind::Growing => f.write_str("growing"),
            SegmentKind::Sealed => f.write_str("sealed"),
        }
    }
}

/// Read-consistency level the active row count was resolved under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyLevel {
    #[default]
    Strong,
    Session,
    Bounded,
    Eventually,
    Customized,
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsistencyLevel::Strong => "strong",
            ConsistencyLevel::Session => "session",
            ConsistencyLevel::Bounded => "bounded",
            ConsistencyLevel::Eventually => "eventually",
            ConsistencyLevel::Customized => "customized",
        };
        f.write_str(name)
    }
}

/// Piece of a logical window that lies inside one physical chunk
#[derive(Debug, Clone, Copy)]
pub struct WindowPiece<'a> {
    /// Offset of the first row of this piece inside the window
    pub offset: usize,
    pub slice: ColumnSlice<'a>,
}

/// Rows of a logical window, possibly spanning several chunks
#[derive(Debug, Clone)]
pub struct ColumnWindow<'a> {
    range: RowRange,
    pieces: Vec<WindowPiece<'a>>,
}

impl<'a> ColumnWindow<'a> {
    pub fn range(&self) -> RowRange {
        self.range
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn pieces(&self) -> &[WindowPiece<'a>] {
        &self.pieces
    }
}

/// Segment as seen by the evaluation layer
pub trait Segment: Send + Sync {
    fn segment_id(&self) -> i64;

    fn kind(&self) -> SegmentKind;

    /// Rows physically present, visible or not
    fn row_count(&self) -> usize;

    /// Column type of `field`, or `MissingField`
    fn schema_type(&self, field: FieldId) -> EvalResult<DataType>;

    fn num_chunks(&self, field: FieldId) -> EvalResult<usize>;

    fn chunk(&self, field: FieldId, chunk: usize) -> EvalResult<&ColumnChunk>;

    /// Index over `field`, if one was built
    fn index(&self, field: FieldId) -> Option<&dyn FieldIndex>;

    fn has_index(&self, field: FieldId) -> bool {
        self.index(field).is_some()
    }

    /// Row prefix covered by the field's index
    fn index_covers(&self, field: FieldId) -> Option<RowRange> {
        self.index(field)
            .map(|index| RowRange::new(0, index.covered_rows()))
    }

    /// Existence bits for `range` answered purely from the index
    fn index_lookup_exists(
        &self,
        field: FieldId,
        path: &NestedPath,
        range: RowRange,
    ) -> EvalResult<Bitmap> {
        match self.index(field) {
            Some(index) => index.lookup_exists(path, range),
            None => Err(EvaluationError::IndexUnavailable {
                field,
                reason: "no index built".to_string(),
            }),
        }
    }

    /// Rows in `range` whose value at `path` has any of `kinds`, answered
    /// from the index's type tags.
    fn index_lookup_kinds(
        &self,
        field: FieldId,
        path: &NestedPath,
        kinds: &[ValueKind],
        range: RowRange,
    ) -> EvalResult<Bitmap> {
        let index = self.index(field).ok_or_else(|| EvaluationError::IndexUnavailable {
            field,
            reason: "no index built".to_string(),
        })?;
        if !index.tracks_kinds() {
            return Err(EvaluationError::IndexUnavailable {
                field,
                reason: "index does not record value types".to_string(),
            });
        }
        let mut bits = Bitmap::new(range.len());
        for kind in kinds {
            bits.or_assign(&index.lookup_kind(path, *kind, range)?)?;
        }
        Ok(bits)
    }

    /// Column data for the logical rows `range`, split at physical chunk
    /// boundaries.
    fn get_chunk(&self, field: FieldId, range: RowRange) -> EvalResult<ColumnWindow<'_>> {
        let mut pieces = Vec::new();
        let mut chunk_start = 0;
        for chunk_idx in 0..self.num_chunks(field)? {
            if chunk_start >= range.end {
                break;
            }
            let chunk = self.chunk(field, chunk_idx)?;
            let chunk_range = RowRange::with_len(chunk_start, chunk.len());
            let overlap = chunk_range.intersect(range);
            if !overlap.is_empty() {
                let local = RowRange::new(overlap.start - chunk_start, overlap.end - chunk_start);
                pieces.push(WindowPiece {
                    offset: overlap.start - range.start,
                    slice: chunk.slice(local)?,
                });
            }
            chunk_start = chunk_range.end;
        }

        let covered: usize = pieces.iter().map(|p| p.slice.len()).sum();
        if covered != range.len() {
            return Err(EvaluationError::range(range.start, range.end, chunk_start));
        }
        Ok(ColumnWindow { range, pieces })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_chunk_segment() -> InMemorySegment {
        InMemorySegment::builder(1, SegmentKind::Growing)
            .field(
                FieldId(100),
                DataType::Int64,
                vec![
                    ColumnChunk::Int64(TypedChunk::new(vec![0, 1, 2])),
                    ColumnChunk::Int64(TypedChunk::new(vec![3, 4, 5, 6])),
                ],
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_get_chunk_spans_chunks() {
        let segment = two_chunk_segment();
        let window = segment.get_chunk(FieldId(100), RowRange::new(2, 5)).unwrap();

        assert_eq!(window.len(), 3);
        let pieces = window.pieces();
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].offset, 0);
        assert_eq!(pieces[0].slice.len(), 1);
        assert_eq!(pieces[1].offset, 1);
        assert_eq!(pieces[1].slice.len(), 2);
    }

    #[test]
    fn test_get_chunk_inside_one_chunk() {
        let segment = two_chunk_segment();
        let window = segment.get_chunk(FieldId(100), RowRange::new(4, 6)).unwrap();
        assert_eq!(window.pieces().len(), 1);
        match window.pieces()[0].slice {
            ColumnSlice::Int64(values) => {
                assert_eq!(values.get(0), Some(&4));
                assert_eq!(values.get(1), Some(&5));
            }
            other => panic!("unexpected slice {:?}", other),
        }
    }

    #[test]
    fn test_get_chunk_past_end() {
        let segment = two_chunk_segment();
        let err = segment
            .get_chunk(FieldId(100), RowRange::new(5, 9))
            .unwrap_err();
        assert_eq!(err, EvaluationError::range(5, 9, 7));
    }

    #[test]
    fn test_missing_field() {
        let segment = two_chunk_segment();
        assert_eq!(
            segment.schema_type(FieldId(999)),
            Err(EvaluationError::MissingField { field: FieldId(999) })
        );
        assert!(segment.get_chunk(FieldId(999), RowRange::new(0, 1)).is_err());
        assert!(!segment.has_index(FieldId(100)));
        assert!(segment.index_covers(FieldId(100)).is_none());
        assert!(matches!(
            segment.index_lookup_exists(FieldId(100), &NestedPath::root(), RowRange::new(0, 1)),
            Err(EvaluationError::IndexUnavailable { .. })
        ));
    }

    #[test]
    fn test_index_lookup_kinds_unions_tags() {
        let docs = [
            serde_json::json!({"a": 1}),
            serde_json::json!({"a": "x"}),
            serde_json::json!({"a": 1.5}),
            serde_json::json!({}),
        ];
        let segment = InMemorySegment::builder(2, SegmentKind::Sealed)
            .field(
                FieldId(101),
                DataType::Json,
                vec![ColumnChunk::Json(TypedChunk::new(
                    docs.iter().map(JsonDocument::from_value).collect(),
                ))],
            )
            .document_index(FieldId(101), 4)
            .build()
            .unwrap();

        let bits = segment
            .index_lookup_kinds(
                FieldId(101),
                &NestedPath::parse_dotted("a"),
                &[ValueKind::Int, ValueKind::Double],
                RowRange::new(0, 4),
            )
            .unwrap();
        assert_eq!(bits.to_bools(), vec![true, false, true, false]);
    }

    #[test]
    fn test_index_lookup_kinds_needs_type_tags() {
        let segment = InMemorySegment::builder(2, SegmentKind::Sealed)
            .field(
                FieldId(100),
                DataType::Int64,
                vec![ColumnChunk::Int64(TypedChunk::new(vec![1, 2]))],
            )
            .presence_index(FieldId(100), 2)
            .build()
            .unwrap();
        assert!(matches!(
            segment.index_lookup_kinds(
                FieldId(100),
                &NestedPath::root(),
                &[ValueKind::Int],
                RowRange::new(0, 2)
            ),
            Err(EvaluationError::IndexUnavailable { .. })
        ));
    }
}
