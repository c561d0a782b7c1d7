//! Secondary indexes consumed by existence evaluation
//!
//! Indexes are derived from column chunks and cover a row prefix
//! `[0, covered_rows)`. Rows past the prefix (a growing tail) must be
//! answered by raw scan.
//!
//! - `PresenceIndex`: one bit per row, set when the value is non-null (and,
//!   for arrays, non-empty)
//! - `DocumentKeyIndex`: for every JSON pointer seen in a document field, the
//!   per-row `ValueKind` found there

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::bitmap::Bitmap;
use crate::exec::{EvalResult, EvaluationError};
use crate::schema::{escape_pointer_token, DataType, FieldId, NestedPath, ValueKind};

use super::column::ColumnChunk;
use super::RowRange;

/// Read-only index over one field
pub trait FieldIndex: fmt::Debug + Send + Sync {
    /// Rows `[0, covered_rows)` are indexed
    fn covered_rows(&self) -> usize;

    /// Whether lookups at `path` are answerable by this index
    fn supports(&self, path: &NestedPath) -> bool;

    /// Rows in `range` holding a non-null value at `path`
    fn lookup_exists(&self, path: &NestedPath, range: RowRange) -> EvalResult<Bitmap>;

    /// Whether per-row value kinds are recorded
    fn tracks_kinds(&self) -> bool {
        false
    }

    /// Rows in `range` whose value at `path` has runtime kind `kind`
    fn lookup_kind(&self, path: &NestedPath, kind: ValueKind, range: RowRange) -> EvalResult<Bitmap> {
        let _ = (path, kind, range);
        Err(EvaluationError::InvalidConfig(
            "index does not track value kinds".to_string(),
        ))
    }
}

fn check_covered(range: RowRange, covered: usize) -> EvalResult<()> {
    range.check_within(covered)
}

/// An index cannot cover more rows than the field holds
fn check_prefix(chunks: &[ColumnChunk], covered_rows: usize, field: FieldId) -> EvalResult<()> {
    let total: usize = chunks.iter().map(ColumnChunk::len).sum();
    if covered_rows > total {
        return Err(EvaluationError::IndexUnavailable {
            field,
            reason: format!("index covers {} rows but field holds {}", covered_rows, total),
        });
    }
    Ok(())
}

/// Presence bits for scalar and array fields
#[derive(Debug, Clone)]
pub struct PresenceIndex {
    present: Bitmap,
}

impl PresenceIndex {
    /// Index the first `covered_rows` rows of `chunks`
    pub fn build(field: FieldId, chunks: &[ColumnChunk], covered_rows: usize) -> EvalResult<Self> {
        check_prefix(chunks, covered_rows, field)?;

        let mut present = Bitmap::new(0);
        for chunk in chunks {
            if present.len() >= covered_rows {
                break;
            }
            let mut bits = chunk.validity_bits();
            if let ColumnChunk::Array(array) = chunk {
                for (i, value) in array.values().iter().enumerate() {
                    if value.is_empty() {
                        bits.set(i, false);
                    }
                }
            }
            let take = (covered_rows - present.len()).min(bits.len());
            present.append(&bits.slice(RowRange::new(0, take))?);
        }
        Ok(Self { present })
    }
}

impl FieldIndex for PresenceIndex {
    fn covered_rows(&self) -> usize {
        self.present.len()
    }

    fn supports(&self, path: &NestedPath) -> bool {
        path.is_empty()
    }

    fn lookup_exists(&self, path: &NestedPath, range: RowRange) -> EvalResult<Bitmap> {
        if !path.is_empty() {
            return Err(EvaluationError::InvalidConfig(format!(
                "presence index cannot resolve nested path {}",
                path
            )));
        }
        check_covered(range, self.covered_rows())?;
        self.present.slice(range)
    }
}

/// Per-pointer, per-row value kinds of a document field
#[derive(Debug, Clone)]
pub struct DocumentKeyIndex {
    covered: usize,
    kinds: BTreeMap<String, Vec<Option<ValueKind>>>,
}

impl DocumentKeyIndex {
    /// Index the first `covered_rows` documents of `chunks`.
    ///
    /// Null rows and documents that fail to parse contribute no keys.
    pub fn build(field: FieldId, chunks: &[ColumnChunk], covered_rows: usize) -> EvalResult<Self> {
        check_prefix(chunks, covered_rows, field)?;

        let mut index = Self {
            covered: covered_rows,
            kinds: BTreeMap::new(),
        };
        let mut row = 0;
        for chunk in chunks {
            let ColumnChunk::Json(docs) = chunk else {
                return Err(EvaluationError::TypeMismatch {
                    expected: DataType::Json,
                    actual: chunk.data_type().to_string(),
                });
            };
            let slice = docs.slice(RowRange::new(0, docs.len()));
            for i in 0..slice.len() {
                if row >= covered_rows {
                    return Ok(index);
                }
                if let Some(Ok(value)) = slice.get(i).map(|doc| doc.parse()) {
                    index.record(row, String::new(), &value);
                }
                row += 1;
            }
        }
        Ok(index)
    }

    fn record(&mut self, row: usize, pointer: String, value: &Value) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let child_pointer = format!("{}/{}", pointer, escape_pointer_token(key));
                    self.record(row, child_pointer, child);
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    self.record(row, format!("{}/{}", pointer, i), child);
                }
            }
            _ => {}
        }
        let covered = self.covered;
        let tags = self
            .kinds
            .entry(pointer)
            .or_insert_with(|| vec![None; covered]);
        tags[row] = Some(ValueKind::of(value));
    }

    /// Number of distinct pointers indexed
    pub fn key_count(&self) -> usize {
        self.kinds.len()
    }
}

impl FieldIndex for DocumentKeyIndex {
    fn covered_rows(&self) -> usize {
        self.covered
    }

    fn supports(&self, _path: &NestedPath) -> bool {
        true
    }

    fn lookup_exists(&self, path: &NestedPath, range: RowRange) -> EvalResult<Bitmap> {
        check_covered(range, self.covered)?;
        Ok(match self.kinds.get(&path.pointer()) {
            Some(tags) => tags[range.start..range.end]
                .iter()
                .map(|tag| matches!(tag, Some(kind) if *kind != ValueKind::Null))
                .collect(),
            None => Bitmap::new(range.len()),
        })
    }

    fn tracks_kinds(&self) -> bool {
        true
    }

    fn lookup_kind(&self, path: &NestedPath, kind: ValueKind, range: RowRange) -> EvalResult<Bitmap> {
        check_covered(range, self.covered)?;
        Ok(match self.kinds.get(&path.pointer()) {
            Some(tags) => tags[range.start..range.end]
                .iter()
                .map(|tag| *tag == Some(kind))
                .collect(),
            None => Bitmap::new(range.len()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::column::{ArrayValue, JsonDocument, TypedChunk};
    use serde_json::json;

    fn json_chunk(docs: &[Value]) -> ColumnChunk {
        ColumnChunk::Json(TypedChunk::new(docs.iter().map(JsonDocument::from_value).collect()))
    }

    #[test]
    fn test_presence_index_across_chunks() {
        let chunks = vec![
            ColumnChunk::Int64(TypedChunk::from_options(vec![Some(1), None])),
            ColumnChunk::Int64(TypedChunk::from_options(vec![Some(3), None, Some(5)])),
        ];
        let index = PresenceIndex::build(FieldId(100), &chunks, 4).unwrap();
        assert_eq!(index.covered_rows(), 4);

        let bits = index.lookup_exists(&NestedPath::root(), RowRange::new(0, 4)).unwrap();
        assert_eq!(bits.to_bools(), vec![true, false, true, false]);
        assert!(index.lookup_exists(&NestedPath::root(), RowRange::new(3, 5)).is_err());
    }

    #[test]
    fn test_presence_index_empty_arrays_absent() {
        let chunks = vec![ColumnChunk::Array(TypedChunk::new(vec![
            ArrayValue(vec![json!(1)]),
            ArrayValue(vec![]),
        ]))];
        let index = PresenceIndex::build(FieldId(100), &chunks, 2).unwrap();
        let bits = index.lookup_exists(&NestedPath::root(), RowRange::new(0, 2)).unwrap();
        assert_eq!(bits.to_bools(), vec![true, false]);
        assert!(!index.supports(&NestedPath::parse_dotted("0")));
    }

    #[test]
    fn test_presence_index_rejects_overlong_prefix() {
        let chunks = vec![ColumnChunk::Bool(TypedChunk::new(vec![true]))];
        assert!(matches!(
            PresenceIndex::build(FieldId(9), &chunks, 2),
            Err(EvaluationError::IndexUnavailable { .. })
        ));
    }

    #[test]
    fn test_document_index_kinds() {
        let chunks = vec![json_chunk(&[
            json!({"a": {"b": 1}}),
            json!({"a": {}}),
            json!({}),
            json!({"a": {"b": null}}),
            json!({"a": {"b": "x"}}),
        ])];
        let index = DocumentKeyIndex::build(FieldId(101), &chunks, 5).unwrap();
        let path = NestedPath::parse_dotted("a.b");
        let all = RowRange::new(0, 5);

        assert_eq!(
            index.lookup_exists(&path, all).unwrap().to_bools(),
            vec![true, false, false, false, true]
        );
        assert_eq!(
            index.lookup_kind(&path, ValueKind::Null, all).unwrap().to_bools(),
            vec![false, false, false, true, false]
        );
        assert_eq!(
            index.lookup_kind(&path, ValueKind::Int, all).unwrap().to_bools(),
            vec![true, false, false, false, false]
        );
        assert_eq!(
            index
                .lookup_exists(&NestedPath::parse_dotted("missing"), all)
                .unwrap()
                .count_ones(),
            0
        );
    }

    #[test]
    fn test_document_index_arrays_and_malformed() {
        let chunks = vec![ColumnChunk::Json(TypedChunk::new(vec![
            JsonDocument::from_value(&json!({"tags": ["x", "y"]})),
            JsonDocument::new("{broken"),
        ]))];
        let index = DocumentKeyIndex::build(FieldId(101), &chunks, 2).unwrap();
        let bits = index
            .lookup_exists(&NestedPath::parse_dotted("tags.1"), RowRange::new(0, 2))
            .unwrap();
        assert_eq!(bits.to_bools(), vec![true, false]);
        assert!(index.key_count() >= 3);
    }

    #[test]
    fn test_document_index_prefix_only() {
        let chunks = vec![
            json_chunk(&[json!({"a": 1})]),
            json_chunk(&[json!({"a": 2}), json!({"a": 3})]),
        ];
        let index = DocumentKeyIndex::build(FieldId(101), &chunks, 2).unwrap();
        assert_eq!(index.covered_rows(), 2);
        let path = NestedPath::parse_dotted("a");
        assert_eq!(index.lookup_exists(&path, RowRange::new(0, 2)).unwrap().count_ones(), 2);
        assert!(index.lookup_exists(&path, RowRange::new(0, 3)).is_err());
    }
}
