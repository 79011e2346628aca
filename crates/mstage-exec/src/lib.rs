//! Pull-based block operators for multi-stage query fragments.
//!
//! Each operator exposes [`Operator::next_block`], returning data, `NoOp`
//! (retry later), `EndOfStream`, or a terminal error. The main operator is
//! the broadcast [`HashJoinOperator`], which materializes its right input and
//! streams its left input against it.

pub mod block;
pub mod hash_join;
pub mod instrumentation;
pub mod key;
pub mod operator;
pub mod options;
pub mod predicate;
pub mod source;

pub use block::{Block, DataBlock};
pub use hash_join::{
    HashJoinOperator, HashJoinStats, JoinDescriptor, JoinKind, JoinRelType, JoinState,
};
pub use instrumentation::{
    HashJoinMetricsSnapshot, hash_join_metrics_snapshot, reset_hash_join_metrics,
};
pub use key::KeySelector;
pub use operator::{BoxedOperator, Operator, collect_rows, explain_tree};
pub use options::{JoinOptions, MAX_ROWS_IN_JOIN_OPTION};
pub use predicate::{
    CompareOp, Comparison, EvaluatorRef, Operand, ResidualFilter, RowEvaluator, coerce_to_bool,
};
pub use source::{QueuedBlockSource, SourceProbe};
