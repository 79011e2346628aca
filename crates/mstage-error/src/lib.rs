//! Error types for the mstage execution workspace.
//!
//! Every crate in the workspace reports failures through [`ExecError`].
//! Operators never panic on bad input; construction problems are returned
//! from constructors, and runtime problems travel downstream inside error
//! blocks so that the consumer of an operator tree sees the first failure.

use thiserror::Error;

/// Primary error type for operator construction and execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    // === Construction ===
    /// The planner asked for a join type the hash join cannot execute.
    #[error("join type {join_type} is not supported by the hash join")]
    UnsupportedJoinType { join_type: String },

    /// A join descriptor arrived without a key selector for one side.
    #[error("{side} key selector for join cannot be null")]
    MissingKeySelector { side: &'static str },

    /// Left and right key selectors produce keys of different lengths.
    #[error("left key selector selects {left} columns but right key selector selects {right}")]
    KeyArityMismatch { left: usize, right: usize },

    /// A key selector references a column past the end of its row.
    #[error("{side} key column {column} out of bounds for row width {width}")]
    KeyColumnOutOfBounds {
        side: &'static str,
        column: usize,
        width: usize,
    },

    /// The left input has no columns.
    #[error("left column size has to be greater than zero")]
    EmptyLeftSchema,

    /// Declared result width disagrees with the two input widths.
    #[error("result column size {result} must equal left column size {left} plus right column size {right}")]
    SchemaWidthMismatch {
        left: usize,
        right: usize,
        result: usize,
    },

    /// A schema could not be built.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// A query option could not be parsed.
    #[error("invalid query option {key}={value}: {reason}")]
    InvalidOption {
        key: String,
        value: String,
        reason: String,
    },

    // === Execution ===
    /// A row in a data block does not match its side's schema width.
    #[error("{side} row has {actual} columns but its schema declares {expected}")]
    RowWidthMismatch {
        side: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A residual predicate failed or returned a value that is not a boolean.
    #[error("residual predicate evaluation failed: {0}")]
    Evaluation(String),

    /// The broadcast side grew past the configured row limit.
    #[error("broadcast table exceeded the maxRowsInJoin limit of {limit} rows")]
    BuildRowLimitExceeded { limit: usize },

    /// Failure raised by a leaf operator or the exchange layer feeding it.
    #[error("upstream operator failed: {0}")]
    Upstream(String),
}

impl ExecError {
    /// Create an evaluation error from any displayable cause.
    pub fn evaluation(cause: impl std::fmt::Display) -> Self {
        Self::Evaluation(cause.to_string())
    }

    /// Create an upstream error from any displayable cause.
    pub fn upstream(cause: impl std::fmt::Display) -> Self {
        Self::Upstream(cause.to_string())
    }

    /// Whether this error is raised before any block is pulled.
    #[must_use]
    pub const fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedJoinType { .. }
                | Self::MissingKeySelector { .. }
                | Self::KeyArityMismatch { .. }
                | Self::KeyColumnOutOfBounds { .. }
                | Self::EmptyLeftSchema
                | Self::SchemaWidthMismatch { .. }
                | Self::InvalidSchema(_)
                | Self::InvalidOption { .. }
        )
    }
}

/// Result type alias using [`ExecError`].
pub type Result<T> = std::result::Result<T, ExecError>;
