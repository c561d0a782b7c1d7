//! Schema type definitions
//!
//! Supported column types:
//! - bool, int8/16/32/64, float, double, varchar
//! - array: array of scalar or document values
//! - json: semi-structured document addressed by nested paths
//! - float/binary vectors: stored, but no predicate routines exist for them

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable column identifier within a collection schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub i64);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field#{}", self.0)
    }
}

/// Column value type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// No type constraint
    None,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    VarChar,
    Array,
    Json,
    FloatVector,
    BinaryVector,
}

impl DataType {
    /// Returns the type name for error messages and plan rendering
    pub fn type_name(&self) -> &'static str {
        match self {
            DataType::None => "none",
            DataType::Bool => "bool",
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::VarChar => "varchar",
            DataType::Array => "array",
            DataType::Json => "json",
            DataType::FloatVector => "float_vector",
            DataType::BinaryVector => "binary_vector",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, DataType::Float | DataType::Double)
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, DataType::FloatVector | DataType::BinaryVector)
    }

    /// True for plain scalar columns (one value per row, no nesting)
    pub fn is_scalar(&self) -> bool {
        matches!(self, DataType::Bool | DataType::VarChar) || self.is_integer() || self.is_floating()
    }

    /// Whether a runtime value of `kind` satisfies this expected type.
    ///
    /// `None` and `Json` accept any non-null value. Floating types accept
    /// integer values; integer types only accept integers.
    pub fn accepts(&self, kind: ValueKind) -> bool {
        match self {
            DataType::None | DataType::Json => kind != ValueKind::Null,
            DataType::Bool => kind == ValueKind::Bool,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
                kind == ValueKind::Int
            }
            DataType::Float | DataType::Double => {
                matches!(kind, ValueKind::Int | ValueKind::Double)
            }
            DataType::VarChar => kind == ValueKind::String,
            DataType::Array => kind == ValueKind::Array,
            DataType::FloatVector | DataType::BinaryVector => false,
        }
    }

    /// Runtime kind produced by a non-null scalar of this type
    pub fn scalar_kind(&self) -> Option<ValueKind> {
        match self {
            DataType::Bool => Some(ValueKind::Bool),
            t if t.is_integer() => Some(ValueKind::Int),
            t if t.is_floating() => Some(ValueKind::Double),
            DataType::VarChar => Some(ValueKind::String),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Runtime tag of a single (possibly nested) value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Double,
    String,
    Array,
    Object,
}

impl ValueKind {
    /// Every kind, in tag order
    pub const ALL: [ValueKind; 7] = [
        ValueKind::Null,
        ValueKind::Bool,
        ValueKind::Int,
        ValueKind::Double,
        ValueKind::String,
        ValueKind::Array,
        ValueKind::Object,
    ];

    /// Classify a document value
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(n) if n.is_i64() || n.is_u64() => ValueKind::Int,
            Value::Number(_) => ValueKind::Double,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }
}

/// Path into a nested value: object keys, or array indexes as decimal strings
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct NestedPath(Vec<String>);

impl NestedPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// The empty path (the column value itself)
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse `"a.b.0"` into `["a", "b", "0"]`. The empty string is the root.
    pub fn parse_dotted(path: &str) -> Self {
        if path.is_empty() {
            return Self::root();
        }
        Self::new(path.split('.'))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// First segment read as an array index.
    ///
    /// Same rule as a JSON pointer: ASCII digits, no sign, no leading zero.
    pub fn array_index(&self) -> Option<usize> {
        let token = self.0.first()?;
        let digits = !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit());
        if !digits || (token.len() > 1 && token.starts_with('0')) {
            return None;
        }
        token.parse().ok()
    }

    /// Path without its first segment
    pub fn tail(&self) -> NestedPath {
        Self(self.0.iter().skip(1).cloned().collect())
    }

    /// RFC 6901 JSON pointer for this path; the root path renders as `""`
    pub fn pointer(&self) -> String {
        let mut pointer = String::new();
        for segment in &self.0 {
            pointer.push('/');
            pointer.push_str(&escape_pointer_token(segment));
        }
        pointer
    }
}

impl fmt::Display for NestedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Escape one JSON pointer reference token (`~` -> `~0`, `/` -> `~1`)
pub fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Reference to a (possibly nested) column, as carried by plan nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub field_id: FieldId,
    pub data_type: DataType,
    #[serde(default)]
    pub nested_path: NestedPath,
}

impl ColumnInfo {
    pub fn new(field_id: FieldId, data_type: DataType) -> Self {
        Self {
            field_id,
            data_type,
            nested_path: NestedPath::root(),
        }
    }

    /// Same column addressed at a nested path
    pub fn with_path(mut self, path: NestedPath) -> Self {
        self.nested_path = path;
        self
    }
}

impl fmt::Display for ColumnInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field_id, self.data_type)?;
        for segment in self.nested_path.segments() {
            write!(f, "[\"{}\"]", segment)?;
        }
        Ok(())
    }
}
