//! Column extraction.

use super::{Parameters, Transform, TransformOutcome, param, require_selection, to_param};
use crate::error::Result;
use crate::explorer::table::Table;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnAction {
    /// Keep only the named columns, in the order given
    Keep,
    /// Remove the named columns
    Drop,
}

/// Keep-only or drop a set of named columns
#[derive(Debug, Clone)]
pub struct SelectColumnsTransform {
    columns: Vec<String>,
    action: ColumnAction,
}

impl SelectColumnsTransform {
    pub fn new(columns: Vec<String>, action: ColumnAction) -> Self {
        Self { columns, action }
    }

    /// # Errors
    ///
    /// Missing or malformed `columns`; `action` defaults to keep.
    pub fn from_parameters(params: &Parameters) -> Result<Self> {
        let action = super::param_opt(params, "action")?.unwrap_or(ColumnAction::Keep);
        Ok(Self {
            columns: param(params, "columns")?,
            action,
        })
    }
}

impl Transform for SelectColumnsTransform {
    fn apply(&self, table: &Table) -> Result<TransformOutcome> {
        require_selection(&self.columns)?;
        let count = self.columns.len();
        let outcome = match self.action {
            ColumnAction::Keep => TransformOutcome::new(
                table.select_columns(&self.columns)?,
                format!("Kept {count} columns"),
            ),
            ColumnAction::Drop => TransformOutcome::new(
                table.drop_columns(&self.columns)?,
                format!("Removed {count} columns"),
            ),
        };
        Ok(outcome)
    }

    fn name(&self) -> &'static str {
        "select_columns"
    }

    fn parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        params.insert("columns".to_owned(), to_param(&self.columns));
        params.insert("action".to_owned(), to_param(&self.action));
        params
    }

    fn description(&self) -> String {
        match self.action {
            ColumnAction::Keep => format!("Keep columns {}", self.columns.join(", ")),
            ColumnAction::Drop => format!("Drop columns {}", self.columns.join(", ")),
        }
    }
}

/// Missing-data strategy: remove whole columns
#[derive(Debug, Clone)]
pub struct DropColumnsTransform {
    columns: Vec<String>,
}

impl DropColumnsTransform {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// # Errors
    ///
    /// Missing or malformed `columns`.
    pub fn from_parameters(params: &Parameters) -> Result<Self> {
        Ok(Self {
            columns: param(params, "columns")?,
        })
    }
}

impl Transform for DropColumnsTransform {
    fn apply(&self, table: &Table) -> Result<TransformOutcome> {
        require_selection(&self.columns)?;
        Ok(TransformOutcome::new(
            table.drop_columns(&self.columns)?,
            format!("Removed columns: {}", self.columns.join(", ")),
        ))
    }

    fn name(&self) -> &'static str {
        "drop_columns"
    }

    fn parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        params.insert("columns".to_owned(), to_param(&self.columns));
        params
    }

    fn description(&self) -> String {
        format!("Drop {} columns", self.columns.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use polars::prelude::*;

    fn sample() -> Result<Table> {
        Ok(Table::new(df!(
            "a" => &[1, 2],
            "b" => &["x", "y"],
            "c" => &[0.5, 1.5]
        )?))
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_keep_follows_selection_order() -> Result<()> {
        let out = SelectColumnsTransform::new(names(&["c", "a"]), ColumnAction::Keep)
            .apply(&sample()?)?;
        assert_eq!(out.table.column_names(), vec!["c", "a"]);
        Ok(())
    }

    #[test]
    fn test_drop() -> Result<()> {
        let out = SelectColumnsTransform::new(names(&["b"]), ColumnAction::Drop)
            .apply(&sample()?)?;
        assert_eq!(out.table.column_names(), vec!["a", "c"]);
        assert_eq!(out.message, "Removed 1 columns");
        Ok(())
    }

    #[test]
    fn test_unknown_column_rejected() -> Result<()> {
        let err = DropColumnsTransform::new(names(&["a", "zz"]))
            .apply(&sample()?)
            .unwrap_err();
        assert!(err.to_string().contains("'zz'"));
        Ok(())
    }

    #[test]
    fn test_empty_selection_rejected() -> Result<()> {
        let result = SelectColumnsTransform::new(Vec::new(), ColumnAction::Keep).apply(&sample()?);
        assert!(result.is_err());
        Ok(())
    }
}
