//! Join keys.

use smallvec::SmallVec;

use crate::value::Value;

/// Ordered tuple of values identifying a hash bucket.
///
/// Two keys are equal iff every positional value is equal under
/// [`Value`]'s structural equality, so a null component matches a null
/// component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Key(SmallVec<[Value; 2]>);

impl Key {
    /// The constant key produced when no equality columns are selected.
    #[must_use]
    pub fn empty() -> Self {
        Self(SmallVec::new())
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn has_null(&self) -> bool {
        self.0.iter().any(Value::is_null)
    }
}

impl FromIterator<Value> for Key {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Value>> for Key {
    fn from(values: Vec<Value>) -> Self {
        Self(SmallVec::from_vec(values))
    }
}
