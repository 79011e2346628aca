//! Per-query join options.

use std::collections::BTreeMap;

use mstage_error::{ExecError, Result};
use serde::{Deserialize, Serialize};

/// Query option naming the broadcast-table row limit.
pub const MAX_ROWS_IN_JOIN_OPTION: &str = "maxRowsInJoin";

/// Tunables for a single hash-join instance.
///
/// The broadcast side must fit in memory; `max_rows_in_join` caps it. When
/// the cap is hit the join fails rather than dropping right rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JoinOptions {
    /// Maximum number of rows held in the broadcast table. `None` is unbounded.
    pub max_rows_in_join: Option<usize>,
}

impl JoinOptions {
    #[must_use]
    pub const fn with_max_rows_in_join(mut self, limit: usize) -> Self {
        self.max_rows_in_join = Some(limit);
        self
    }

    /// Read options from the string map attached to a query.
    ///
    /// Unknown keys are ignored; they belong to other operators.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::InvalidOption`] if a recognised key carries a
    /// value that does not parse.
    pub fn from_query_options(options: &BTreeMap<String, String>) -> Result<Self> {
        let mut parsed = Self::default();
        if let Some(raw) = options.get(MAX_ROWS_IN_JOIN_OPTION) {
            let limit = raw
                .trim()
                .parse::<usize>()
                .map_err(|err| ExecError::InvalidOption {
                    key: MAX_ROWS_IN_JOIN_OPTION.to_owned(),
                    value: raw.clone(),
                    reason: err.to_string(),
                })?;
            parsed.max_rows_in_join = Some(limit);
        }
        Ok(parsed)
    }
}
