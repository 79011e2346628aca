//! Blocks exchanged between pull-based operators.

use std::sync::Arc;

use mstage_error::ExecError;
use mstage_types::{Row, SchemaRef};

/// Rows of one stream chunk together with the schema describing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    rows: Vec<Row>,
    schema: SchemaRef,
}

impl DataBlock {
    #[must_use]
    pub fn new(rows: Vec<Row>, schema: SchemaRef) -> Self {
        Self { rows, schema }
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

/// Unit of the pull protocol.
///
/// - `Data`: a chunk of rows.
/// - `EndOfStream`: successful end of the logical sequence. Pulling again
///   must yield `EndOfStream` again.
/// - `NoOp`: nothing is available yet; the consumer retries later.
/// - `Error`: terminal failure. The consumer stops pulling for data and
///   propagates the block. The cause is shared so the block can be replayed
///   verbatim.
#[derive(Debug, Clone)]
pub enum Block {
    Data(DataBlock),
    EndOfStream,
    NoOp,
    Error(Arc<ExecError>),
}

impl Block {
    #[must_use]
    pub fn data(rows: Vec<Row>, schema: SchemaRef) -> Self {
        Self::Data(DataBlock::new(rows, schema))
    }

    #[must_use]
    pub fn error(err: ExecError) -> Self {
        Self::Error(Arc::new(err))
    }

    #[must_use]
    pub const fn is_data(&self) -> bool {
        matches!(self, Self::Data(_))
    }

    #[must_use]
    pub const fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }

    #[must_use]
    pub const fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp)
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// `EndOfStream` and `Error` end the stream; `Data` and `NoOp` do not.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::EndOfStream | Self::Error(_))
    }

    /// Rows carried by a data block; empty for control blocks.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        match self {
            Self::Data(block) => block.rows(),
            _ => &[],
        }
    }

    #[must_use]
    pub fn error_cause(&self) -> Option<&ExecError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Stable label for logs.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::Data(_) => "data",
            Self::EndOfStream => "end_of_stream",
            Self::NoOp => "noop",
            Self::Error(_) => "error",
        }
    }
}
