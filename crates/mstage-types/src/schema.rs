//! Column types and ordered schemas.

use std::fmt;
use std::sync::Arc;

use mstage_error::{ExecError, Result};
use serde::{Deserialize, Serialize};

/// Logical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Boolean,
    Int,
    Long,
    Float,
    Double,
    String,
    Bytes,
}

impl DataType {
    /// Stable label used in explain output and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::Int => "INT",
            Self::Long => "LONG",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::String => "STRING",
            Self::Bytes => "BYTES",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered sequence of columns describing every row of a stream.
///
/// Column names need not be unique: a join result carries both inputs'
/// columns, which commonly share names such as `id`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnSpec>,
}

/// Shared schema handle attached to data blocks.
pub type SchemaRef = Arc<Schema>;

impl Schema {
    /// Build a schema from its columns.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::InvalidSchema`] if any column name is empty.
    pub fn try_new(columns: Vec<ColumnSpec>) -> Result<Self> {
        if let Some(idx) = columns.iter().position(|c| c.name.is_empty()) {
            return Err(ExecError::InvalidSchema(format!(
                "column {idx} has an empty name"
            )));
        }
        Ok(Self { columns })
    }

    /// Convenience constructor from `(name, type)` pairs.
    ///
    /// # Errors
    ///
    /// Same as [`Schema::try_new`].
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, DataType)>) -> Result<Self> {
        Self::try_new(
            pairs
                .into_iter()
                .map(|(name, ty)| ColumnSpec::new(name, ty))
                .collect(),
        )
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, idx: usize) -> Option<&ColumnSpec> {
        self.columns.get(idx)
    }

    /// Left columns followed by right columns.
    #[must_use]
    pub fn join(&self, right: &Self) -> Self {
        let mut columns = Vec::with_capacity(self.width() + right.width());
        columns.extend_from_slice(&self.columns);
        columns.extend_from_slice(&right.columns);
        Self { columns }
    }

    #[must_use]
    pub fn into_ref(self) -> SchemaRef {
        Arc::new(self)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, col) in self.columns.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}:{}", col.name, col.data_type)?;
        }
        f.write_str("]")
    }
}
