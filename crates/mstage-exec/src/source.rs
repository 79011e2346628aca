//! Leaf operator replaying a scripted sequence of blocks.
//!
//! Stands in for the exchange layer that normally feeds a query fragment.
//! Once the script is exhausted the source reports `EndOfStream` forever.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use mstage_types::{Row, SchemaRef};

use crate::block::Block;
use crate::operator::Operator;

/// Shared view of a [`QueuedBlockSource`]'s activity, usable after the
/// source has been moved into a parent operator.
#[derive(Debug, Clone, Default)]
pub struct SourceProbe {
    pulls: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl SourceProbe {
    /// Number of `next_block` calls observed so far.
    #[must_use]
    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct QueuedBlockSource {
    blocks: VecDeque<Block>,
    probe: SourceProbe,
}

impl QueuedBlockSource {
    #[must_use]
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            blocks: blocks.into(),
            probe: SourceProbe::default(),
        }
    }

    /// One data block per batch, followed by `EndOfStream`.
    #[must_use]
    pub fn from_batches(schema: &SchemaRef, batches: Vec<Vec<Row>>) -> Self {
        let mut blocks: Vec<Block> = batches
            .into_iter()
            .map(|rows| Block::data(rows, Arc::clone(schema)))
            .collect();
        blocks.push(Block::EndOfStream);
        Self::new(blocks)
    }

    #[must_use]
    pub fn probe(&self) -> SourceProbe {
        self.probe.clone()
    }
}

impl Operator for QueuedBlockSource {
    fn next_block(&mut self) -> Block {
        self.probe.pulls.fetch_add(1, Ordering::Relaxed);
        self.blocks.pop_front().unwrap_or(Block::EndOfStream)
    }

    fn explain_name(&self) -> &'static str {
        "QUEUED_SOURCE"
    }

    fn close(&mut self) {
        self.blocks.clear();
        self.probe.closed.store(true, Ordering::Relaxed);
    }
}
