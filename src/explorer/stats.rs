//! Descriptive statistics: dataset overview, per-column summaries, missing-data report.

use super::classify::{ClassifierConfig, ColumnClassification, classify};
use super::table::Table;
use super::transforms::{DuplicateKeep, duplicated};
use crate::error::Result;
use polars::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

// ============================================================================
// Value frequencies
// ============================================================================

const VALUE: &str = "value";
const COUNT: &str = "count";

/// Distinct present values of `series` and how often each occurs.
fn value_counts(series: &Series) -> Result<DataFrame> {
    Ok(series
        .drop_nulls()
        .with_name(VALUE.into())
        .value_counts(false, false, COUNT.into(), false)?)
}

fn counts_of(counted: &DataFrame) -> Result<Vec<usize>> {
    let counts = counted
        .column(COUNT)?
        .as_materialized_series()
        .cast(&DataType::UInt64)?;
    Ok(counts
        .u64()?
        .into_no_null_iter()
        .map(|c| usize::try_from(c).unwrap_or(usize::MAX))
        .collect())
}

/// Most frequent present value; the smallest of the tied values wins.
///
/// # Errors
///
/// Fails when `series` cannot be cast to `Float64`.
pub fn numeric_mode(series: &Series) -> Result<Option<f64>> {
    let counted = value_counts(&series.cast(&DataType::Float64)?)?;
    let counts = counts_of(&counted)?;
    let Some(top) = counts.iter().copied().max() else {
        return Ok(None);
    };
    let values = counted.column(VALUE)?.as_materialized_series();
    Ok(values
        .f64()?
        .into_iter()
        .zip(counts)
        .filter(|(_, count)| *count == top)
        .filter_map(|(value, _)| value)
        .min_by(f64::total_cmp))
}

/// Most frequent present value; the lexicographically smallest of the tied values wins.
///
/// # Errors
///
/// Fails when `series` cannot be cast to text.
pub fn text_mode(series: &Series) -> Result<Option<String>> {
    let counted = value_counts(&series.cast(&DataType::String)?)?;
    let counts = counts_of(&counted)?;
    let Some(top) = counts.iter().copied().max() else {
        return Ok(None);
    };
    let values = counted.column(VALUE)?.as_materialized_series();
    Ok(values
        .str()?
        .into_iter()
        .zip(counts)
        .filter(|(_, count)| *count == top)
        .filter_map(|(value, _)| value)
        .min()
        .map(str::to_owned))
}

/// Display formatting used throughout reports.
///
/// - missing or NaN -> `N/A`
/// - `0 < |v| < 0.01` -> scientific with two decimals, e.g. `1.23e-03`
/// - otherwise four decimals
pub fn format_number(value: Option<f64>) -> String {
    let Some(v) = value.filter(|v| !v.is_nan()) else {
        return "N/A".to_owned();
    };
    if v != 0.0 && v.abs() < 0.01 {
        let formatted = format!("{v:.2e}");
        if let Some((mantissa, exponent)) = formatted.split_once('e')
            && let Ok(exponent) = exponent.parse::<i32>()
        {
            let sign = if exponent < 0 { '-' } else { '+' };
            return format!("{mantissa}e{sign}{:02}", exponent.abs());
        }
        return formatted;
    }
    format!("{v:.4}")
}

// ============================================================================
// Dataset overview and before/after comparison
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatasetOverview {
    pub rows: usize,
    pub columns: usize,
    pub missing_cells: usize,
    /// Rows equal (across all columns) to an earlier row
    pub duplicate_rows: usize,
}

/// # Errors
///
/// Propagates column materialization failures.
pub fn overview(table: &Table) -> Result<DatasetOverview> {
    let duplicate_rows = duplicated(table, &table.column_names(), DuplicateKeep::First)?
        .iter()
        .filter(|d| **d)
        .count();
    Ok(DatasetOverview {
        rows: table.height(),
        columns: table.width(),
        missing_cells: table.missing_cells()?,
        duplicate_rows,
    })
}

fn delta(before: usize, after: usize) -> i64 {
    i64::try_from(after).unwrap_or(i64::MAX) - i64::try_from(before).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableComparison {
    pub before: DatasetOverview,
    pub after: DatasetOverview,
}

impl TableComparison {
    /// # Errors
    ///
    /// Propagates column materialization failures.
    pub fn between(before: &Table, after: &Table) -> Result<Self> {
        Ok(Self {
            before: overview(before)?,
            after: overview(after)?,
        })
    }

    pub fn rows_delta(&self) -> i64 {
        delta(self.before.rows, self.after.rows)
    }

    pub fn columns_delta(&self) -> i64 {
        delta(self.before.columns, self.after.columns)
    }

    pub fn missing_delta(&self) -> i64 {
        delta(self.before.missing_cells, self.after.missing_cells)
    }

    pub fn duplicates_delta(&self) -> i64 {
        delta(self.before.duplicate_rows, self.after.duplicate_rows)
    }
}

// ============================================================================
// Column summaries
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; `None` with fewer than two values
    pub std: Option<f64>,
    pub mode: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoricalSummary {
    pub column: String,
    pub count: usize,
    pub unique: usize,
    /// Highest count; the first value seen among equal counts
    pub most_frequent: String,
    pub frequency: usize,
    /// Highest count; the smallest value among equal counts
    pub mode: String,
}

/// Summaries for the given numeric columns; all-missing columns are skipped.
///
/// # Errors
///
/// Unknown or non-numeric column.
pub fn numeric_summaries(table: &Table, columns: &[String]) -> Result<Vec<NumericSummary>> {
    let mut summaries = Vec::new();
    for column in columns {
        let series = table.numeric_series(column)?;
        let ca = series.f64()?;
        let count = ca.len() - ca.null_count();
        let (Some(min), Some(max), Some(mean), Some(median), Some(mode)) = (
            ca.min(),
            ca.max(),
            ca.mean(),
            ca.median(),
            numeric_mode(&series)?,
        ) else {
            continue;
        };
        summaries.push(NumericSummary {
            column: column.clone(),
            count,
            min,
            max,
            mean,
            median,
            std: if count < 2 { None } else { ca.std(1) },
            mode,
        });
    }
    Ok(summaries)
}

/// Summaries for the given categorical columns; all-missing columns are skipped.
///
/// # Errors
///
/// Unknown column.
pub fn categorical_summaries(
    table: &Table,
    columns: &[String],
) -> Result<Vec<CategoricalSummary>> {
    let mut summaries = Vec::new();
    for column in columns {
        let series = table.series(column)?.cast(&DataType::String)?;
        let Some(mode) = text_mode(&series)? else {
            continue;
        };

        let counted = value_counts(&series)?;
        let values = counted.column(VALUE)?.as_materialized_series().str()?.clone();
        let counts: HashMap<&str, usize> =
            values.into_iter().flatten().zip(counts_of(&counted)?).collect();

        // first-seen order decides between equally frequent values
        let present = series.drop_nulls();
        let first_seen = present.take(&present.arg_unique()?)?;
        let mut most_frequent = "";
        let mut frequency = 0;
        for value in first_seen.str()?.into_iter().flatten() {
            let count = counts.get(value).copied().unwrap_or(0);
            if count > frequency {
                most_frequent = value;
                frequency = count;
            }
        }

        summaries.push(CategoricalSummary {
            column: column.clone(),
            count: present.len(),
            unique: counted.height(),
            most_frequent: most_frequent.to_owned(),
            frequency,
            mode,
        });
    }
    Ok(summaries)
}

/// Everything the statistics view shows for one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Description {
    pub overview: DatasetOverview,
    pub classification: ColumnClassification,
    pub numeric: Vec<NumericSummary>,
    pub categorical: Vec<CategoricalSummary>,
}

/// # Errors
///
/// Propagates column materialization failures.
pub fn describe(table: &Table, config: &ClassifierConfig) -> Result<Description> {
    let classification = classify(table, config)?;
    let numeric = numeric_summaries(table, &classification.numeric())?;
    let categorical = categorical_summaries(table, &classification.categorical())?;
    Ok(Description {
        overview: overview(table)?,
        classification,
        numeric,
        categorical,
    })
}

// ============================================================================
// Missing-data report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingColumn {
    pub column: String,
    pub dtype: String,
    pub missing: usize,
    pub percent: f64,
    /// Row labels of the first missing cells, up to the preview limit
    pub rows: Vec<usize>,
}

impl MissingColumn {
    /// Missing cells beyond the previewed labels.
    pub fn hidden(&self) -> usize {
        self.missing - self.rows.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingReport {
    pub total_missing: usize,
    /// Only columns with at least one missing cell
    pub columns: Vec<MissingColumn>,
    /// Sorted labels of rows with any missing cell
    pub rows_with_missing: Vec<usize>,
}

impl MissingReport {
    pub fn is_clean(&self) -> bool {
        self.total_missing == 0
    }
}

/// # Errors
///
/// Propagates column materialization failures.
pub fn missing_report(table: &Table, preview_limit: usize) -> Result<MissingReport> {
    let mut columns = Vec::new();
    let mut total_missing = 0;
    for name in table.column_names() {
        let mask = table.missing_mask(&name)?;
        let missing = mask.sum().map_or(0, |m| m as usize);
        if missing == 0 {
            continue;
        }
        total_missing += missing;
        let rows = mask
            .into_no_null_iter()
            .zip(table.row_ids())
            .filter(|(is_missing, _)| *is_missing)
            .map(|(_, id)| *id)
            .take(preview_limit)
            .collect();
        columns.push(MissingColumn {
            dtype: table.column(&name)?.dtype().to_string(),
            column: name,
            missing,
            percent: missing as f64 / table.height() as f64 * 100.0,
            rows,
        });
    }

    let mut rows_with_missing: Vec<usize> = table
        .rows_with_missing()?
        .iter()
        .zip(table.row_ids())
        .filter(|(m, _)| **m)
        .map(|(_, id)| *id)
        .collect();
    rows_with_missing.sort_unstable();

    Ok(MissingReport {
        total_missing,
        columns,
        rows_with_missing,
    })
}
