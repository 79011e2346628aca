//! The pull-based operator contract.

use std::fmt;

use mstage_error::{ExecError, Result};
use mstage_types::Row;

use crate::block::Block;

/// An operator in a query-fragment pipeline.
///
/// Calls are synchronous and non-reentrant; exactly one consumer pulls at a
/// time. Operators never block: a child with nothing to offer returns
/// [`Block::NoOp`] and the consumer retries.
pub trait Operator: Send {
    /// Produce the next block of the stream.
    fn next_block(&mut self) -> Block;

    /// Child operators, for diagnostics only.
    fn children(&self) -> Vec<&dyn Operator> {
        Vec::new()
    }

    /// Stable operator name for explain output and logs.
    fn explain_name(&self) -> &'static str;

    /// Release resources. Must be safe to call more than once.
    fn close(&mut self) {}
}

/// Owned operator handle used for child links.
pub type BoxedOperator = Box<dyn Operator>;

/// Render an operator tree, one operator per line, children indented.
#[must_use]
pub fn explain_tree(root: &dyn Operator) -> String {
    ExplainTree(root).to_string()
}

struct ExplainTree<'a>(&'a dyn Operator);

impl fmt::Display for ExplainTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(f, self.0, 0)
    }
}

fn write_node(out: &mut impl fmt::Write, op: &dyn Operator, depth: usize) -> fmt::Result {
    writeln!(out, "{:indent$}{}", "", op.explain_name(), indent = depth * 2)?;
    for child in op.children() {
        write_node(out, child, depth + 1)?;
    }
    Ok(())
}

/// Pull `op` until it reports a terminal block and gather every data row.
///
/// At most `max_consecutive_noops` `NoOp` blocks are tolerated in a row;
/// a driver in a real scheduler would yield instead of giving up.
///
/// # Errors
///
/// Returns the cause of the first error block, or [`ExecError::Upstream`]
/// if the operator stalls past the `NoOp` bound.
pub fn collect_rows(op: &mut dyn Operator, max_consecutive_noops: usize) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    let mut noops = 0_usize;
    loop {
        match op.next_block() {
            Block::Data(block) => {
                noops = 0;
                if !block.is_empty() {
                    rows.extend(block.into_rows());
                }
            }
            Block::EndOfStream => return Ok(rows),
            Block::NoOp => {
                noops += 1;
                if noops > max_consecutive_noops {
                    return Err(ExecError::upstream(format!(
                        "{} made no progress after {noops} consecutive NoOp blocks",
                        op.explain_name()
                    )));
                }
            }
            Block::Error(err) => return Err(ExecError::clone(&err)),
        }
    }
}
