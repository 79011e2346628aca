//! Row, schema and key model shared by mstage operators.
//!
//! Rows are fixed-width vectors of [`Value`]s whose width is defined by the
//! stream's [`Schema`]. SQL null is the explicit [`Value::Null`]; there is no
//! storage-level placeholder in this model.

pub mod key;
pub mod schema;
pub mod value;

pub use key::Key;
pub use schema::{ColumnSpec, DataType, Schema, SchemaRef};
pub use value::Value;

/// A single tuple. Its length is fixed by the owning stream's schema.
pub type Row = Vec<Value>;

/// A row of `width` nulls.
#[must_use]
pub fn null_row(width: usize) -> Row {
    vec![Value::Null; width]
}
