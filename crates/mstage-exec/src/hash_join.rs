//! Broadcast hash-join operator.
//!
//! The right input is the broadcast side: it is drained completely into an
//! in-memory multi-map keyed by join key before any output is produced.
//! Left blocks are then streamed one per pull and probed against that table.
//! RIGHT and FULL joins remember which right rows matched and, once the left
//! input ends, emit every unmatched right row in one final block.
//!
//! There is no spill path: the whole right input must fit in memory,
//! optionally capped by [`JoinOptions::max_rows_in_join`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hashbrown::{HashMap, HashSet};
use mstage_error::{ExecError, Result};
use mstage_types::{Key, Row, SchemaRef, Value};
use tracing::{debug, info, trace, warn};

use crate::block::{Block, DataBlock};
use crate::instrumentation::{
    record_build_rows, record_error, record_output_rows, record_probe_rows,
    record_unmatched_right_rows,
};
use crate::key::KeySelector;
use crate::operator::{BoxedOperator, Operator};
use crate::options::JoinOptions;
use crate::predicate::ResidualFilter;

/// Explain label of [`HashJoinOperator`].
pub const EXPLAIN_NAME: &str = "HASH_JOIN";

// ── Join types ─────────────────────────────────────────────────────────────

/// Relational join type as produced by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinRelType {
    Inner,
    Left,
    Right,
    Full,
    Semi,
    Anti,
    AsOf,
    LeftAsOf,
}

impl JoinRelType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inner => "INNER",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Full => "FULL",
            Self::Semi => "SEMI",
            Self::Anti => "ANTI",
            Self::AsOf => "ASOF",
            Self::LeftAsOf => "LEFT_ASOF",
        }
    }
}

impl fmt::Display for JoinRelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Join kinds the hash join executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    /// Matching pairs only.
    Inner,
    /// Every left row; null right side when nothing matches.
    Left,
    /// Every right row; null left side when nothing matches.
    Right,
    /// Union of LEFT and RIGHT behaviour.
    Full,
    /// Left rows whose key exists on the right.
    Semi,
    /// Left rows whose key is absent on the right.
    Anti,
}

impl JoinKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inner => "INNER",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Full => "FULL",
            Self::Semi => "SEMI",
            Self::Anti => "ANTI",
        }
    }

    /// Whether left rows without a qualifying match are emitted null-padded.
    #[must_use]
    pub const fn needs_unmatched_left_rows(self) -> bool {
        matches!(self, Self::Left | Self::Full)
    }

    /// Whether right rows never matched are emitted after the left input ends.
    #[must_use]
    pub const fn needs_unmatched_right_rows(self) -> bool {
        matches!(self, Self::Right | Self::Full)
    }

    const fn strategy(self) -> ProbeStrategy {
        match self {
            Self::Semi => ProbeStrategy::Existence { keep_if_present: true },
            Self::Anti => ProbeStrategy::Existence {
                keep_if_present: false,
            },
            Self::Inner | Self::Left | Self::Right | Self::Full => ProbeStrategy::Match {
                pad_unmatched_left: self.needs_unmatched_left_rows(),
            },
        }
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<JoinRelType> for JoinKind {
    type Error = ExecError;

    fn try_from(value: JoinRelType) -> Result<Self> {
        match value {
            JoinRelType::Inner => Ok(Self::Inner),
            JoinRelType::Left => Ok(Self::Left),
            JoinRelType::Right => Ok(Self::Right),
            JoinRelType::Full => Ok(Self::Full),
            JoinRelType::Semi => Ok(Self::Semi),
            JoinRelType::Anti => Ok(Self::Anti),
            JoinRelType::AsOf | JoinRelType::LeftAsOf => Err(ExecError::UnsupportedJoinType {
                join_type: value.as_str().to_owned(),
            }),
        }
    }
}

impl FromStr for JoinKind {
    type Err = ExecError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INNER" => Ok(Self::Inner),
            "LEFT" => Ok(Self::Left),
            "RIGHT" => Ok(Self::Right),
            "FULL" => Ok(Self::Full),
            "SEMI" => Ok(Self::Semi),
            "ANTI" => Ok(Self::Anti),
            _ => Err(ExecError::UnsupportedJoinType {
                join_type: s.to_owned(),
            }),
        }
    }
}

/// How a left row is classified, fixed per join kind at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeStrategy {
    /// SEMI/ANTI: only key presence matters; right rows are never read.
    Existence { keep_if_present: bool },
    /// INNER/LEFT/RIGHT/FULL: pair with every bucket row passing the residuals.
    Match { pad_unmatched_left: bool },
}

// ── Descriptor ─────────────────────────────────────────────────────────────

/// Everything the planner hands to a hash join.
#[derive(Debug, Clone)]
pub struct JoinDescriptor {
    pub join_type: JoinRelType,
    pub left_schema: SchemaRef,
    pub right_schema: SchemaRef,
    /// Output schema; its width must be left width plus right width.
    pub result_schema: SchemaRef,
    pub left_keys: Option<KeySelector>,
    pub right_keys: Option<KeySelector>,
    /// Non-equi conditions over the concatenated candidate row.
    pub residuals: ResidualFilter,
}

impl JoinDescriptor {
    /// Equi-join over the given key columns with the concatenated result schema
    /// and no residual predicates.
    #[must_use]
    pub fn new(
        join_type: JoinRelType,
        left_schema: SchemaRef,
        right_schema: SchemaRef,
        left_keys: KeySelector,
        right_keys: KeySelector,
    ) -> Self {
        let result_schema = left_schema.join(&right_schema).into_ref();
        Self {
            join_type,
            left_schema,
            right_schema,
            result_schema,
            left_keys: Some(left_keys),
            right_keys: Some(right_keys),
            residuals: ResidualFilter::none(),
        }
    }

    #[must_use]
    pub fn with_residuals(mut self, residuals: ResidualFilter) -> Self {
        self.residuals = residuals;
        self
    }

    #[must_use]
    pub fn with_result_schema(mut self, result_schema: SchemaRef) -> Self {
        self.result_schema = result_schema;
        self
    }
}

// ── State ──────────────────────────────────────────────────────────────────

/// Externally visible lifecycle position of a [`HashJoinOperator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    /// Constructed, never pulled.
    Init,
    /// Draining the right input; may be suspended by a right `NoOp`.
    Building,
    /// Streaming left blocks against the broadcast table.
    Probing,
    /// Sweeping the broadcast table for unmatched right rows.
    EmittingUnmatchedRight,
    /// Output complete; every pull returns `EndOfStream`.
    Done,
    /// Terminal failure; every pull returns the same error block.
    Error,
}

/// Per-instance counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashJoinStats {
    pub right_blocks: u64,
    pub right_rows: u64,
    /// Distinct keys in the broadcast table once built.
    pub build_keys: u64,
    pub build_duration: Duration,
    pub left_blocks: u64,
    pub left_rows: u64,
    pub emitted_rows: u64,
    pub unmatched_right_rows: u64,
}

/// Key → right rows in arrival order. Duplicate keys accumulate.
type BroadcastTable = HashMap<Key, Vec<Row>>;

/// Key → positions within that key's bucket matched by a passing left row.
type MatchedIndex = HashMap<Key, HashSet<usize>>;

// ── Operator ───────────────────────────────────────────────────────────────

pub struct HashJoinOperator {
    left: BoxedOperator,
    right: BoxedOperator,
    kind: JoinKind,
    strategy: ProbeStrategy,
    left_keys: KeySelector,
    right_keys: KeySelector,
    residuals: ResidualFilter,
    result_schema: SchemaRef,
    left_width: usize,
    right_width: usize,
    options: JoinOptions,
    table: BroadcastTable,
    /// Allocated only for RIGHT and FULL joins.
    matched: Option<MatchedIndex>,
    table_rows: usize,
    state: JoinState,
    error: Option<Arc<ExecError>>,
    closed: bool,
    build_started: Option<Instant>,
    stats: HashJoinStats,
}

impl HashJoinOperator {
    /// Create a join with default options.
    ///
    /// # Errors
    ///
    /// See [`HashJoinOperator::with_options`].
    pub fn try_new(
        left: BoxedOperator,
        right: BoxedOperator,
        descriptor: JoinDescriptor,
    ) -> Result<Self> {
        Self::with_options(left, right, descriptor, JoinOptions::default())
    }

    /// Create a join, validating the descriptor before any pull.
    ///
    /// # Errors
    ///
    /// Returns a construction error when the join type is unsupported, a key
    /// selector is missing, the key selectors disagree in arity or reference
    /// columns outside their inputs, the left schema is empty, or the result
    /// width is not left width plus right width.
    pub fn with_options(
        left: BoxedOperator,
        right: BoxedOperator,
        descriptor: JoinDescriptor,
        options: JoinOptions,
    ) -> Result<Self> {
        let JoinDescriptor {
            join_type,
            left_schema,
            right_schema,
            result_schema,
            left_keys,
            right_keys,
            residuals,
        } = descriptor;

        let kind = JoinKind::try_from(join_type)?;
        let left_keys = left_keys.ok_or(ExecError::MissingKeySelector { side: "left" })?;
        let right_keys = right_keys.ok_or(ExecError::MissingKeySelector { side: "right" })?;

        let left_width = left_schema.width();
        let right_width = right_schema.width();
        if left_width == 0 {
            return Err(ExecError::EmptyLeftSchema);
        }
        if result_schema.width() != left_width + right_width {
            return Err(ExecError::SchemaWidthMismatch {
                left: left_width,
                right: right_width,
                result: result_schema.width(),
            });
        }
        if left_keys.arity() != right_keys.arity() {
            return Err(ExecError::KeyArityMismatch {
                left: left_keys.arity(),
                right: right_keys.arity(),
            });
        }
        left_keys.validate("left", left_width)?;
        right_keys.validate("right", right_width)?;

        let matched = kind.needs_unmatched_right_rows().then(MatchedIndex::new);

        Ok(Self {
            left,
            right,
            kind,
            strategy: kind.strategy(),
            left_keys,
            right_keys,
            residuals,
            result_schema,
            left_width,
            right_width,
            options,
            table: BroadcastTable::new(),
            matched,
            table_rows: 0,
            state: JoinState::Init,
            error: None,
            closed: false,
            build_started: None,
            stats: HashJoinStats::default(),
        })
    }

    #[must_use]
    pub const fn kind(&self) -> JoinKind {
        self.kind
    }

    #[must_use]
    pub const fn state(&self) -> JoinState {
        self.state
    }

    #[must_use]
    pub const fn stats(&self) -> &HashJoinStats {
        &self.stats
    }

    #[must_use]
    pub fn result_schema(&self) -> &SchemaRef {
        &self.result_schema
    }

    /// Whether matched-row tracking was allocated (RIGHT and FULL only).
    #[must_use]
    pub const fn tracks_matched_rows(&self) -> bool {
        self.matched.is_some()
    }

    /// Rows currently held in the broadcast table.
    #[must_use]
    pub const fn broadcast_rows(&self) -> usize {
        self.table_rows
    }

    // ── Build ──────────────────────────────────────────────────────────────

    /// Drain the right input until it ends, fails, or reports `NoOp`.
    ///
    /// Returns `Some(block)` when the pull must end here (suspension or
    /// failure) and `None` once the table is complete.
    fn build_step(&mut self) -> Option<Block> {
        if self.state == JoinState::Init {
            self.state = JoinState::Building;
            self.build_started = Some(Instant::now());
        }
        loop {
            match self.right.next_block() {
                Block::Data(block) => {
                    if let Err(err) = self.insert_right_block(block) {
                        return Some(self.fail(Arc::new(err)));
                    }
                }
                Block::NoOp => return Some(Block::NoOp),
                Block::EndOfStream => {
                    self.finish_build();
                    return None;
                }
                Block::Error(err) => return Some(self.fail(err)),
            }
        }
    }

    fn insert_right_block(&mut self, block: DataBlock) -> Result<()> {
        let rows = block.into_rows();
        if let Some(limit) = self.options.max_rows_in_join {
            if self.table_rows + rows.len() > limit {
                return Err(ExecError::BuildRowLimitExceeded { limit });
            }
        }
        check_row_widths("right", self.right_width, &rows)?;

        let added = rows.len();
        for row in rows {
            let key = self.right_keys.key_of(&row);
            self.table.entry(key).or_default().push(row);
        }
        self.table_rows += added;
        self.stats.right_blocks += 1;
        self.stats.right_rows += added as u64;
        record_build_rows(added);
        Ok(())
    }

    fn finish_build(&mut self) {
        self.stats.build_keys = self.table.len() as u64;
        self.stats.build_duration = self
            .build_started
            .map_or(Duration::ZERO, |started| started.elapsed());
        self.state = JoinState::Probing;
        info!(
            join_kind = self.kind.as_str(),
            right_rows = self.table_rows,
            distinct_keys = self.table.len(),
            build_micros = self.stats.build_duration.as_micros() as u64,
            "broadcast table built"
        );
    }

    // ── Probe ──────────────────────────────────────────────────────────────

    fn probe_step(&mut self) -> Block {
        match self.left.next_block() {
            Block::Data(block) => match self.probe_block(block) {
                Ok(rows) => {
                    self.stats.emitted_rows += rows.len() as u64;
                    record_output_rows(rows.len());
                    Block::data(rows, Arc::clone(&self.result_schema))
                }
                Err(err) => self.fail(Arc::new(err)),
            },
            Block::NoOp => Block::NoOp,
            Block::EndOfStream => {
                if self.kind.needs_unmatched_right_rows() {
                    self.state = JoinState::EmittingUnmatchedRight;
                    let rows = self.unmatched_right_rows();
                    self.state = JoinState::Done;
                    Block::data(rows, Arc::clone(&self.result_schema))
                } else {
                    self.state = JoinState::Done;
                    Block::EndOfStream
                }
            }
            Block::Error(err) => self.fail(err),
        }
    }

    fn probe_block(&mut self, block: DataBlock) -> Result<Vec<Row>> {
        let Self {
            kind,
            strategy,
            left_keys,
            residuals,
            table,
            matched,
            left_width,
            right_width,
            stats,
            ..
        } = self;
        let (left_width, right_width) = (*left_width, *right_width);
        let left_rows = block.rows();
        check_row_widths("left", left_width, left_rows)?;

        let mut out = Vec::with_capacity(left_rows.len());
        for left_row in left_rows {
            let key = left_keys.key_of(left_row);
            match *strategy {
                ProbeStrategy::Existence { keep_if_present } => {
                    if table.contains_key(&key) == keep_if_present {
                        out.push(concat_rows(left_width, right_width, Some(left_row.as_slice()), None));
                    }
                }
                ProbeStrategy::Match { pad_unmatched_left } => {
                    let mut has_match = false;
                    if let Some(bucket) = table.get(&key) {
                        for (pos, right_row) in bucket.iter().enumerate() {
                            let candidate = concat_rows(
                                left_width,
                                right_width,
                                Some(left_row.as_slice()),
                                Some(right_row.as_slice()),
                            );
                            if !residuals.passes(&candidate)? {
                                continue;
                            }
                            out.push(candidate);
                            has_match = true;
                            if let Some(matched) = matched.as_mut() {
                                mark_matched(matched, &key, pos);
                            }
                        }
                    }
                    if !has_match && pad_unmatched_left {
                        out.push(concat_rows(left_width, right_width, Some(left_row.as_slice()), None));
                    }
                }
            }
        }

        stats.left_blocks += 1;
        stats.left_rows += left_rows.len() as u64;
        record_probe_rows(left_rows.len());
        debug!(
            join_kind = kind.as_str(),
            input_rows = left_rows.len(),
            output_rows = out.len(),
            "probed left block"
        );
        Ok(out)
    }

    /// One pass over the broadcast table collecting right rows no left row
    /// matched, null-padded on the left.
    fn unmatched_right_rows(&mut self) -> Vec<Row> {
        let mut out = Vec::new();
        for (key, bucket) in &self.table {
            let matched = self.matched.as_ref().and_then(|m| m.get(key));
            if matched.is_some_and(|m| m.len() == bucket.len()) {
                continue;
            }
            for (pos, right_row) in bucket.iter().enumerate() {
                if !matched.is_some_and(|m| m.contains(&pos)) {
                    out.push(concat_rows(
                        self.left_width,
                        self.right_width,
                        None,
                        Some(right_row.as_slice()),
                    ));
                }
            }
        }
        self.stats.unmatched_right_rows = out.len() as u64;
        self.stats.emitted_rows += out.len() as u64;
        record_unmatched_right_rows(out.len());
        record_output_rows(out.len());
        debug!(
            join_kind = self.kind.as_str(),
            unmatched_right_rows = out.len(),
            "emitted unmatched right rows"
        );
        out
    }

    // ── Termination ────────────────────────────────────────────────────────

    /// Enter the terminal error state and return the block to replay.
    fn fail(&mut self, err: Arc<ExecError>) -> Block {
        warn!(
            join_kind = self.kind.as_str(),
            state = ?self.state,
            error = %err,
            "hash join terminated by error"
        );
        record_error();
        self.state = JoinState::Error;
        self.error = Some(Arc::clone(&err));
        Block::Error(err)
    }

    fn release_tables(&mut self) {
        self.table = BroadcastTable::new();
        if self.matched.is_some() {
            self.matched = Some(MatchedIndex::new());
        }
        self.table_rows = 0;
    }
}

impl Operator for HashJoinOperator {
    fn next_block(&mut self) -> Block {
        let _span = tracing::debug_span!(
            "hash_join",
            join_kind = self.kind.as_str(),
            state = ?self.state,
        )
        .entered();

        if let Some(err) = &self.error {
            return Block::Error(Arc::clone(err));
        }
        if self.closed {
            return Block::EndOfStream;
        }
        let block = match self.state {
            JoinState::Init | JoinState::Building => match self.build_step() {
                Some(block) => block,
                None => self.probe_step(),
            },
            JoinState::Probing => self.probe_step(),
            JoinState::EmittingUnmatchedRight | JoinState::Done | JoinState::Error => {
                Block::EndOfStream
            }
        };
        trace!(block = block.kind_label(), rows = block.rows().len(), "hash join pull");
        block
    }

    fn children(&self) -> Vec<&dyn Operator> {
        vec![self.left.as_ref(), self.right.as_ref()]
    }

    fn explain_name(&self) -> &'static str {
        EXPLAIN_NAME
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.release_tables();
        self.left.close();
        self.right.close();
        debug!(join_kind = self.kind.as_str(), "hash join closed");
    }
}

impl fmt::Debug for HashJoinOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashJoinOperator")
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("left_width", &self.left_width)
            .field("right_width", &self.right_width)
            .field("broadcast_rows", &self.table_rows)
            .field("residuals", &self.residuals)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn check_row_widths(side: &'static str, expected: usize, rows: &[Row]) -> Result<()> {
    match rows.iter().find(|row| row.len() != expected) {
        Some(row) => Err(ExecError::RowWidthMismatch {
            side,
            expected,
            actual: row.len(),
        }),
        None => Ok(()),
    }
}

/// `left ++ right`, with nulls standing in for an absent side.
fn concat_rows(
    left_width: usize,
    right_width: usize,
    left: Option<&[Value]>,
    right: Option<&[Value]>,
) -> Row {
    let mut row = Vec::with_capacity(left_width + right_width);
    match left {
        Some(values) => row.extend_from_slice(values),
        None => row.resize(left_width, Value::Null),
    }
    match right {
        Some(values) => row.extend_from_slice(values),
        None => row.resize(left_width + right_width, Value::Null),
    }
    row
}

fn mark_matched(matched: &mut MatchedIndex, key: &Key, pos: usize) {
    if let Some(positions) = matched.get_mut(key) {
        positions.insert(pos);
    } else {
        matched.insert(key.clone(), HashSet::from_iter([pos]));
    }
}
