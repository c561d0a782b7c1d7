//! In-memory segment
//!
//! Holds already-materialized chunks and indexes. Used as the reference
//! collaborator for evaluation and in tests.

use std::collections::BTreeMap;

use crate::exec::{EvalResult, EvaluationError};
use crate::schema::{DataType, FieldId};

use super::column::ColumnChunk;
use super::index::{DocumentKeyIndex, FieldIndex, PresenceIndex};
use super::{Segment, SegmentKind};

#[derive(Debug)]
struct FieldData {
    data_type: DataType,
    chunks: Vec<ColumnChunk>,
    index: Option<Box<dyn FieldIndex>>,
}

/// Segment whose fields live entirely in memory
#[derive(Debug)]
pub struct InMemorySegment {
    id: i64,
    kind: SegmentKind,
    row_count: usize,
    fields: BTreeMap<FieldId, FieldData>,
}

impl InMemorySegment {
    pub fn builder(id: i64, kind: SegmentKind) -> SegmentBuilder {
        SegmentBuilder {
            id,
            kind,
            fields: Vec::new(),
            indexes: Vec::new(),
        }
    }

    fn field(&self, field: FieldId) -> EvalResult<&FieldData> {
        self.fields
            .get(&field)
            .ok_or(EvaluationError::MissingField { field })
    }
}

impl Segment for InMemorySegment {
    fn segment_id(&self) -> i64 {
        self.id
    }

    fn kind(&self) -> SegmentKind {
        self.kind
    }

    fn row_count(&self) -> usize {
        self.row_count
    }

    fn schema_type(&self, field: FieldId) -> EvalResult<DataType> {
        Ok(self.field(field)?.data_type)
    }

    fn num_chunks(&self, field: FieldId) -> EvalResult<usize> {
        Ok(self.field(field)?.chunks.len())
    }

    fn chunk(&self, field: FieldId, chunk: usize) -> EvalResult<&ColumnChunk> {
        let data = self.field(field)?;
        data.chunks
            .get(chunk)
            .ok_or_else(|| EvaluationError::range(chunk, chunk + 1, data.chunks.len()))
    }

    fn index(&self, field: FieldId) -> Option<&dyn FieldIndex> {
        self.fields
            .get(&field)
            .and_then(|data| data.index.as_deref())
    }
}

#[derive(Debug, Clone, Copy)]
enum IndexKind {
    Presence,
    DocumentKeys,
}

/// Builder validating that every field has the same row count and that
/// chunks match the declared type.
#[derive(Debug)]
pub struct SegmentBuilder {
    id: i64,
    kind: SegmentKind,
    fields: Vec<(FieldId, DataType, Vec<ColumnChunk>)>,
    indexes: Vec<(FieldId, IndexKind, usize)>,
}

impl SegmentBuilder {
    /// Add a field stored as `chunks`
    pub fn field(mut self, field: FieldId, data_type: DataType, chunks: Vec<ColumnChunk>) -> Self {
        self.fields.push((field, data_type, chunks));
        self
    }

    /// Build a presence index over the first `covered_rows` rows of a scalar
    /// or array field
    pub fn presence_index(mut self, field: FieldId, covered_rows: usize) -> Self {
        self.indexes.push((field, IndexKind::Presence, covered_rows));
        self
    }

    /// Build a key/type index over the first `covered_rows` rows of a JSON
    /// field
    pub fn document_index(mut self, field: FieldId, covered_rows: usize) -> Self {
        self.indexes
            .push((field, IndexKind::DocumentKeys, covered_rows));
        self
    }

    pub fn build(self) -> EvalResult<InMemorySegment> {
        let mut row_count = None;
        let mut fields = BTreeMap::new();

        for (field, data_type, chunks) in self.fields {
            for chunk in &chunks {
                if chunk.data_type() != data_type {
                    return Err(EvaluationError::TypeMismatch {
                        expected: data_type,
                        actual: chunk.data_type().to_string(),
                    });
                }
            }
            let rows: usize = chunks.iter().map(ColumnChunk::len).sum();
            match row_count {
                None => row_count = Some(rows),
                Some(expected) if expected != rows => {
                    return Err(EvaluationError::ShapeMismatch {
                        left: expected,
                        right: rows,
                    });
                }
                Some(_) => {}
            }
            fields.insert(
                field,
                FieldData {
                    data_type,
                    chunks,
                    index: None,
                },
            );
        }

        for (field, kind, covered_rows) in self.indexes {
            let data = fields
                .get_mut(&field)
                .ok_or(EvaluationError::MissingField { field })?;
            let index: Box<dyn FieldIndex> = match kind {
                IndexKind::Presence => {
                    if data.data_type == DataType::Json || data.data_type.is_vector() {
                        return Err(EvaluationError::UnsupportedType {
                            data_type: data.data_type,
                            operation: "presence index",
                        });
                    }
                    Box::new(PresenceIndex::build(field, &data.chunks, covered_rows)?)
                }
                IndexKind::DocumentKeys => {
                    if data.data_type != DataType::Json {
                        return Err(EvaluationError::UnsupportedType {
                            data_type: data.data_type,
                            operation: "document key index",
                        });
                    }
                    Box::new(DocumentKeyIndex::build(field, &data.chunks, covered_rows)?)
                }
            };
            data.index = Some(index);
        }

        Ok(InMemorySegment {
            id: self.id,
            kind: self.kind,
            row_count: row_count.unwrap_or(0),
            fields,
        })
    }
}
