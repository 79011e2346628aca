//! Join key selection.

use mstage_error::{ExecError, Result};
use mstage_types::{Key, Value};
use smallvec::SmallVec;

/// Selects the equality columns of a row, in order.
///
/// The same selector shape is applied to both join inputs, each against its
/// own schema. With no columns selected every row maps to [`Key::empty`], so
/// the whole input lands in a single bucket.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeySelector {
    columns: SmallVec<[usize; 4]>,
}

impl KeySelector {
    pub fn new(columns: impl IntoIterator<Item = usize>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
        }
    }

    /// Selector with no equality columns.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    /// Number of values in every key this selector produces.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    /// Check every selected column exists in rows of `width` columns.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::KeyColumnOutOfBounds`] for the first column that
    /// does not.
    pub fn validate(&self, side: &'static str, width: usize) -> Result<()> {
        match self.columns.iter().find(|&&column| column >= width) {
            Some(&column) => Err(ExecError::KeyColumnOutOfBounds {
                side,
                column,
                width,
            }),
            None => Ok(()),
        }
    }

    /// Extract the key of `row`.
    ///
    /// Expects a row validated against the selector's width; a missing
    /// column reads as null.
    #[must_use]
    pub fn key_of(&self, row: &[Value]) -> Key {
        self.columns
            .iter()
            .map(|&column| row.get(column).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_columns_in_selector_order() {
        let row = vec![Value::Long(1), Value::from("a"), Value::Double(2.5)];
        let key = KeySelector::new([2, 0]).key_of(&row);
        assert_eq!(key.values(), &[Value::Double(2.5), Value::Long(1)]);
    }

    #[test]
    fn empty_selector_yields_constant_key() {
        let sel = KeySelector::empty();
        assert_eq!(sel.key_of(&[Value::Long(1)]), Key::empty());
        assert_eq!(sel.key_of(&[Value::Long(2)]), Key::empty());
        assert_eq!(sel.arity(), 0);
    }

    #[test]
    fn null_key_columns_are_kept() {
        let key = KeySelector::new([0]).key_of(&[Value::Null, Value::Int(1)]);
        assert!(key.has_null());
        assert_eq!(key, Key::from(vec![Value::Null]));
    }

    #[test]
    fn validate_rejects_out_of_range_columns() {
        let sel = KeySelector::new([0, 3]);
        assert!(sel.validate("left", 4).is_ok());
        let err = sel.validate("left", 3).unwrap_err();
        assert_eq!(
            err,
            ExecError::KeyColumnOutOfBounds {
                side: "left",
                column: 3,
                width: 3
            }
        );
    }
}
