//! Pairwise correlation between numeric columns.
//!
//! Coefficients are pairwise-complete: a row missing either value is left out
//! of that pair only, so each cell of the matrix can rest on a different set of
//! rows.

use super::table::Table;
use crate::error::{OperationError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    Spearman,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub method: CorrelationMethod,
    pub columns: Vec<String>,
    /// Square and symmetric; `NaN` where the coefficient is undefined
    pub data: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some(self.data[i][j])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationPair {
    pub first: String,
    pub second: String,
    pub coefficient: f64,
}

/// Average ranks (1-based, ties share the mean of their positions).
fn average_ranks(values: Series) -> Result<Series> {
    let ranked = DataFrame::new(vec![values.with_name("v".into()).into()])?
        .lazy()
        .select([col("v").rank(
            RankOptions {
                method: RankMethod::Average,
                descending: false,
            },
            None,
        )])
        .collect()?;
    Ok(ranked.column("v")?.as_materialized_series().cast(&DataType::Float64)?)
}

/// Coefficient over the rows where both values are present; `NaN` when undefined.
fn coefficient(x: &Series, y: &Series, method: CorrelationMethod) -> Result<f64> {
    let both = &x.is_not_null() & &y.is_not_null();
    let (x, y) = (x.filter(&both)?, y.filter(&both)?);
    if x.len() < 2 {
        return Ok(f64::NAN);
    }
    let (x, y) = match method {
        CorrelationMethod::Pearson => (x, y),
        CorrelationMethod::Spearman => (average_ranks(x)?, average_ranks(y)?),
    };
    let (x, y) = (x.f64()?, y.f64()?);
    // constant input has no defined coefficient
    if x.std(0).is_none_or(|s| s == 0.0) || y.std(0).is_none_or(|s| s == 0.0) {
        return Ok(f64::NAN);
    }
    Ok(cov::pearson_corr(x, y).map_or(f64::NAN, |r| r.clamp(-1.0, 1.0)))
}

/// Correlate every pair of `columns`.
///
/// The diagonal is 1.0, or `NaN` for a column with fewer than two values or
/// no variation.
///
/// # Errors
///
/// [`OperationError::InsufficientColumns`] for fewer than two columns; unknown
/// or non-numeric column.
pub fn correlation_matrix(
    table: &Table,
    columns: &[String],
    method: CorrelationMethod,
) -> Result<CorrelationMatrix> {
    if columns.len() < 2 {
        return Err(OperationError::InsufficientColumns {
            min_required: 2,
            actual: columns.len(),
        }
        .into());
    }

    let values = columns
        .iter()
        .map(|c| table.numeric_series(c))
        .collect::<Result<Vec<_>>>()?;

    let n = columns.len();
    let mut data = vec![vec![f64::NAN; n]; n];
    for i in 0..n {
        let self_corr = coefficient(&values[i], &values[i], method)?;
        data[i][i] = if self_corr.is_nan() { f64::NAN } else { 1.0 };
        for j in (i + 1)..n {
            let r = coefficient(&values[i], &values[j], method)?;
            data[i][j] = r;
            data[j][i] = r;
        }
    }

    tracing::debug!(?method, columns = n, "Computed correlation matrix");
    Ok(CorrelationMatrix {
        method,
        columns: columns.to_vec(),
        data,
    })
}

/// Off-diagonal pairs ranked by absolute coefficient, strongest first.
///
/// Undefined coefficients are skipped and equal strengths keep column order.
pub fn strongest_pairs(matrix: &CorrelationMatrix, limit: usize) -> Vec<CorrelationPair> {
    let mut pairs = Vec::new();
    for (i, first) in matrix.columns.iter().enumerate() {
        for (j, second) in matrix.columns.iter().enumerate().skip(i + 1) {
            let coefficient = matrix.data[i][j];
            if coefficient.is_nan() {
                continue;
            }
            pairs.push(CorrelationPair {
                first: first.clone(),
                second: second.clone(),
                coefficient,
            });
        }
    }
    pairs.sort_by(|a, b| b.coefficient.abs().total_cmp(&a.coefficient.abs()));
    pairs.truncate(limit);
    pairs
}
