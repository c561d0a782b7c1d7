//! Schema vocabulary shared by plans, segments and operators
//!
//! - `FieldId` / `ColumnInfo`: stable field references
//! - `DataType`: column value type tag
//! - `ValueKind`: runtime tag of a nested document value
//! - `NestedPath`: path into array or document columns

mod types;

pub use types::{escape_pointer_token, ColumnInfo, DataType, FieldId, NestedPath, ValueKind};
