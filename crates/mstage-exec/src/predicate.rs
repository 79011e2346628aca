//! Residual (non-equi) join predicates.
//!
//! Predicates run against the concatenated candidate row: left columns
//! followed by right columns. A candidate survives only if every predicate
//! yields a strict true; null and false both reject.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use mstage_error::{ExecError, Result};
use mstage_types::Value;

/// Compiled expression over a row.
pub trait RowEvaluator: Send + Sync {
    fn evaluate(&self, row: &[Value]) -> Result<Value>;
}

impl<F> RowEvaluator for F
where
    F: Fn(&[Value]) -> Result<Value> + Send + Sync,
{
    fn evaluate(&self, row: &[Value]) -> Result<Value> {
        self(row)
    }
}

/// Shared evaluator handle.
pub type EvaluatorRef = Arc<dyn RowEvaluator>;

/// Strict BOOLEAN coercion of an evaluator result.
///
/// Integers follow the numeric-boolean convention (`0` is false). Null is
/// false.
///
/// # Errors
///
/// Returns [`ExecError::Evaluation`] for values of any other type.
pub fn coerce_to_bool(value: &Value) -> Result<bool> {
    match value {
        Value::Null => Ok(false),
        Value::Boolean(b) => Ok(*b),
        Value::Int(v) => Ok(*v != 0),
        Value::Long(v) => Ok(*v != 0),
        other => Err(ExecError::evaluation(format_args!(
            "cannot coerce {other} of type {} to BOOLEAN",
            other.data_type().map_or("NULL", |ty| ty.as_str())
        ))),
    }
}

/// Conjunction of residual predicates.
#[derive(Clone, Default)]
pub struct ResidualFilter {
    evaluators: Vec<EvaluatorRef>,
}

impl ResidualFilter {
    #[must_use]
    pub fn new(evaluators: Vec<EvaluatorRef>) -> Self {
        Self { evaluators }
    }

    /// Filter that accepts every candidate.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, evaluator: impl RowEvaluator + 'static) -> Self {
        self.evaluators.push(Arc::new(evaluator));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    /// Whether `row` satisfies every predicate; stops at the first rejection.
    ///
    /// # Errors
    ///
    /// Propagates evaluator failures and coercion failures.
    pub fn passes(&self, row: &[Value]) -> Result<bool> {
        for evaluator in &self.evaluators {
            if !coerce_to_bool(&evaluator.evaluate(row)?)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Debug for ResidualFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResidualFilter")
            .field("predicates", &self.evaluators.len())
            .finish()
    }
}

/// Comparison operator for [`Comparison`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => matches!(ordering, Ordering::Equal),
            Self::NotEq => !matches!(ordering, Ordering::Equal),
            Self::Lt => matches!(ordering, Ordering::Less),
            Self::LtEq => !matches!(ordering, Ordering::Greater),
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::GtEq => !matches!(ordering, Ordering::Less),
        }
    }
}

/// Input of a [`Comparison`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Column of the candidate row.
    Column(usize),
    Literal(Value),
}

impl Operand {
    fn resolve<'a>(&'a self, row: &'a [Value]) -> Result<&'a Value> {
        match self {
            Self::Column(idx) => row.get(*idx).ok_or_else(|| {
                ExecError::evaluation(format_args!(
                    "column {idx} out of bounds for row width {}",
                    row.len()
                ))
            }),
            Self::Literal(value) => Ok(value),
        }
    }
}

/// Binary comparison with three-valued logic: a null operand yields null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub left: Operand,
    pub op: CompareOp,
    pub right: Operand,
}

impl Comparison {
    #[must_use]
    pub const fn new(left: Operand, op: CompareOp, right: Operand) -> Self {
        Self { left, op, right }
    }

    /// `row[left] op row[right]`.
    #[must_use]
    pub const fn columns(left: usize, op: CompareOp, right: usize) -> Self {
        Self::new(Operand::Column(left), op, Operand::Column(right))
    }

    /// `row[column] op literal`.
    #[must_use]
    pub fn column_literal(column: usize, op: CompareOp, literal: impl Into<Value>) -> Self {
        Self::new(Operand::Column(column), op, Operand::Literal(literal.into()))
    }
}

impl RowEvaluator for Comparison {
    fn evaluate(&self, row: &[Value]) -> Result<Value> {
        let lhs = self.left.resolve(row)?;
        let rhs = self.right.resolve(row)?;
        if lhs.is_null() || rhs.is_null() {
            return Ok(Value::Null);
        }
        let ordering = lhs.sql_cmp(rhs).ok_or_else(|| {
            ExecError::evaluation(format_args!("cannot compare {lhs} with {rhs}"))
        })?;
        Ok(Value::Boolean(self.op.accepts(ordering)))
    }
}
