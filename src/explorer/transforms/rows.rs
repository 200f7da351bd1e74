//! Row extraction by human-entered index expressions.

use super::{Parameters, Transform, TransformOutcome, param, to_param};
use crate::error::{OperationError, Result};
use crate::explorer::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowAction {
    /// Keep only the selected rows
    Keep,
    /// Remove the selected rows
    Drop,
}

/// Positions resolved from an index expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSelection {
    /// Sorted, deduplicated, all `< n`.
    pub indices: Vec<usize>,
    /// One message per out-of-range single index that was dropped.
    pub warnings: Vec<String>,
}

/// Parse `"0,2-4,6"` style expressions against a table of `n` rows.
///
/// Positions are 0-based and ranges are end-inclusive. Range bounds are
/// clamped to `[0, n-1]` and a reversed range selects nothing. A single index
/// outside the table is dropped with a warning.
///
/// # Errors
///
/// [`OperationError::InvalidIndexExpression`] for a token that is neither an
/// unsigned integer nor a `start-end` pair of them.
pub fn parse_index_expression(expression: &str, n: usize) -> Result<IndexSelection> {
    let mut indices = BTreeSet::new();
    let mut warnings = Vec::new();

    for token in expression.split(',').map(str::trim) {
        if token.is_empty() {
            continue;
        }
        let invalid = || OperationError::InvalidIndexExpression {
            token: token.to_owned(),
        };

        if let Some((start, end)) = token.split_once('-') {
            let start: usize = start.trim().parse().map_err(|_| invalid())?;
            let end: usize = end.trim().parse().map_err(|_| invalid())?;
            if n == 0 {
                continue;
            }
            let end = end.min(n - 1);
            indices.extend(start..=end);
        } else {
            let index: usize = token.parse().map_err(|_| invalid())?;
            if index < n {
                indices.insert(index);
            } else {
                let warning = if n == 0 {
                    format!("index {index} out of range (table is empty)")
                } else {
                    format!("index {index} out of range (0-{})", n - 1)
                };
                tracing::warn!("{warning}");
                warnings.push(warning);
            }
        }
    }

    Ok(IndexSelection {
        indices: indices.into_iter().collect(),
        warnings,
    })
}

/// Keep or drop rows by position
#[derive(Debug, Clone)]
pub struct SelectRowsTransform {
    expression: String,
    action: RowAction,
}

impl SelectRowsTransform {
    pub fn new(expression: impl Into<String>, action: RowAction) -> Self {
        Self {
            expression: expression.into(),
            action,
        }
    }

    /// # Errors
    ///
    /// Missing or malformed `expression` / `action`.
    pub fn from_parameters(params: &Parameters) -> Result<Self> {
        Ok(Self {
            expression: param(params, "expression")?,
            action: param(params, "action")?,
        })
    }
}

impl Transform for SelectRowsTransform {
    fn apply(&self, table: &Table) -> Result<TransformOutcome> {
        let selection = parse_index_expression(&self.expression, table.height())?;
        if selection.indices.is_empty() {
            return Err(OperationError::NoRowsSelected.into());
        }

        let mut mask = vec![self.action == RowAction::Drop; table.height()];
        for &index in &selection.indices {
            mask[index] = self.action == RowAction::Keep;
        }
        let count = selection.indices.len();
        let message = match self.action {
            RowAction::Keep => format!("Kept {count} rows"),
            RowAction::Drop => format!("Removed {count} rows"),
        };

        Ok(TransformOutcome::new(table.filter_rows(&mask)?, message)
            .with_warnings(selection.warnings))
    }

    fn name(&self) -> &'static str {
        "select_rows"
    }

    fn parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        params.insert("expression".to_owned(), to_param(&self.expression));
        params.insert("action".to_owned(), to_param(&self.action));
        params
    }

    fn description(&self) -> String {
        match self.action {
            RowAction::Keep => format!("Keep rows {}", self.expression),
            RowAction::Drop => format!("Drop rows {}", self.expression),
        }
    }
}
