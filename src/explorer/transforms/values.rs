//! Cell-level value replacement and type conversion.

use super::{Parameters, Transform, TransformOutcome, param, to_param};
use crate::error::{OperationError, Result};
use crate::explorer::io::{coerce_numeric_columns, parse_number, parse_numeric};
use crate::explorer::table::{Table, text_series};
use polars::prelude::DataType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One manual edit, addressed by row identity label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellEdit {
    pub row: usize,
    pub column: String,
    /// `None` clears the cell.
    pub value: Option<String>,
}

/// Manual edits made in an editable grid
#[derive(Debug, Clone)]
pub struct SetCellsTransform {
    edits: Vec<CellEdit>,
}

impl SetCellsTransform {
    pub fn new(edits: Vec<CellEdit>) -> Self {
        Self { edits }
    }

    /// # Errors
    ///
    /// Missing or malformed `edits`.
    pub fn from_parameters(params: &Parameters) -> Result<Self> {
        Ok(Self {
            edits: param(params, "edits")?,
        })
    }
}

impl Transform for SetCellsTransform {
    fn apply(&self, table: &Table) -> Result<TransformOutcome> {
        let mut by_column: BTreeMap<&str, Vec<&CellEdit>> = BTreeMap::new();
        for edit in &self.edits {
            by_column.entry(edit.column.as_str()).or_default().push(edit);
        }

        let mut result = table.clone();
        for (column, edits) in by_column {
            let mut cells = table.text_values(column)?;
            for edit in &edits {
                let position = table
                    .position_of(edit.row)
                    .ok_or(OperationError::UnknownRow { row: edit.row })?;
                cells[position].clone_from(&edit.value);
            }
            let series = if table.is_numeric(column)? {
                parse_numeric(column, &cells, table.is_integer(column)?).ok_or_else(|| {
                    let bad = edits
                        .iter()
                        .filter_map(|e| e.value.as_deref())
                        .find(|v| parse_number(v).is_none())
                        .unwrap_or_default();
                    OperationError::InvalidParameter(format!(
                        "'{bad}' is not a number; column '{column}' is numeric"
                    ))
                })?
            } else {
                text_series(column, cells)
            };
            result = result.with_series(series)?;
        }

        Ok(TransformOutcome::new(
            result,
            format!("Edited {} cells", self.edits.len()),
        ))
    }

    fn name(&self) -> &'static str {
        "set_cells"
    }

    fn parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        params.insert("edits".to_owned(), to_param(&self.edits));
        params
    }

    fn description(&self) -> String {
        format!("Edit {} cells", self.edits.len())
    }
}

/// Replace every exact occurrence of a value in one column
#[derive(Debug, Clone)]
pub struct ReplaceValueTransform {
    column: String,
    old: String,
    new: String,
}

impl ReplaceValueTransform {
    pub fn new(column: impl Into<String>, old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            old: old.into(),
            new: new.into(),
        }
    }

    /// # Errors
    ///
    /// Missing or malformed `column` / `old` / `new`.
    pub fn from_parameters(params: &Parameters) -> Result<Self> {
        Ok(Self {
            column: param(params, "column")?,
            old: param(params, "old")?,
            new: param(params, "new")?,
        })
    }
}

impl Transform for ReplaceValueTransform {
    fn apply(&self, table: &Table) -> Result<TransformOutcome> {
        if self.old.is_empty() {
            return Err(
                OperationError::InvalidParameter("old value must not be empty".to_owned()).into(),
            );
        }

        let hits = self.matches(table)?;
        let count = hits.iter().filter(|h| **h).count();
        if count == 0 {
            return Ok(self.not_found(table));
        }

        let cells: Vec<Option<String>> = table
            .text_values(&self.column)?
            .into_iter()
            .zip(&hits)
            .map(|(cell, &hit)| if hit { Some(self.new.clone()) } else { cell })
            .collect();
        let numeric = if table.is_numeric(&self.column)? {
            parse_numeric(&self.column, &cells, table.is_integer(&self.column)?)
        } else {
            None
        };
        // A text replacement turns a numeric column into text.
        let series = numeric.unwrap_or_else(|| text_series(&self.column, cells));
        let result = table.with_series(series)?;
        Ok(TransformOutcome::new(
            result,
            format!(
                "Replaced {count} occurrences of '{}' with '{}' in column '{}'",
                self.old, self.new, self.column
            ),
        ))
    }

    fn name(&self) -> &'static str {
        "replace_value"
    }

    fn parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        params.insert("column".to_owned(), to_param(&self.column));
        params.insert("old".to_owned(), to_param(&self.old));
        params.insert("new".to_owned(), to_param(&self.new));
        params
    }

    fn description(&self) -> String {
        format!(
            "Replace '{}' with '{}' in {}",
            self.old, self.new, self.column
        )
    }
}

impl ReplaceValueTransform {
    /// Cells equal to the old value; numeric columns compare as numbers.
    fn matches(&self, table: &Table) -> Result<Vec<bool>> {
        let series = table.series(&self.column)?;
        if !series.dtype().is_primitive_numeric() {
            return Ok(table
                .text_values(&self.column)?
                .iter()
                .map(|cell| cell.as_deref() == Some(self.old.as_str()))
                .collect());
        }
        if series.dtype().is_integer() {
            if let Ok(old) = self.old.trim().parse::<i64>() {
                let ints = series.cast(&DataType::Int64)?;
                return Ok(ints.i64()?.into_iter().map(|c| c == Some(old)).collect());
            }
        }
        // A non-numeric old value cannot occur in a numeric column.
        let Some(old) = parse_number(&self.old) else {
            return Ok(vec![false; table.height()]);
        };
        let floats = series.cast(&DataType::Float64)?;
        Ok(floats.f64()?.into_iter().map(|c| c == Some(old)).collect())
    }

    fn not_found(&self, table: &Table) -> TransformOutcome {
        TransformOutcome::new(
            table.clone(),
            format!(
                "Value '{}' not found in column '{}'",
                self.old, self.column
            ),
        )
    }
}

/// Re-run the load-time numeric coercion on text columns
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertTypesTransform;

impl Transform for ConvertTypesTransform {
    fn apply(&self, table: &Table) -> Result<TransformOutcome> {
        let mut result = table.clone();
        let converted = coerce_numeric_columns(&mut result)?;
        let message = if converted.is_empty() {
            "No text columns could be converted".to_owned()
        } else {
            format!("Converted to numeric: {}", converted.join(", "))
        };
        Ok(TransformOutcome::new(result, message))
    }

    fn name(&self) -> &'static str {
        "convert_types"
    }

    fn parameters(&self) -> Parameters {
        Parameters::new()
    }

    fn description(&self) -> String {
        "Convert numeric-looking text columns".to_owned()
    }
}
