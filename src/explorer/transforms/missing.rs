//! Missing-data normalization and strategies.

use super::{Parameters, Transform, TransformOutcome, param, param_opt, to_param};
use crate::config::{DEFAULT_MISSING_TOKENS, ExplorerSettings};
use crate::error::{OperationError, Result};
use crate::explorer::io::parse_number;
use crate::explorer::stats::format_number;
use crate::explorer::table::{Table, text_series};
use polars::prelude::*;

/// Turn literal missing markers in text columns into real missing cells
#[derive(Debug, Clone, Default)]
pub struct NormalizeMissingTransform {
    /// `None` means the session's configured tokens, or the built-in list outside a session
    tokens: Option<Vec<String>>,
}

impl NormalizeMissingTransform {
    pub fn new(tokens: Vec<String>) -> Self {
        Self {
            tokens: Some(tokens),
        }
    }

    /// `tokens` is optional; without it the configured marker list applies.
    ///
    /// # Errors
    ///
    /// Malformed `tokens`.
    pub fn from_parameters(params: &Parameters) -> Result<Self> {
        Ok(Self {
            tokens: param_opt(params, "tokens")?,
        })
    }

    fn is_marker(&self, value: &str) -> bool {
        value.trim().is_empty()
            || match &self.tokens {
                Some(tokens) => tokens.iter().any(|t| t == value),
                None => DEFAULT_MISSING_TOKENS.contains(&value),
            }
    }
}

impl Transform for NormalizeMissingTransform {
    fn apply(&self, table: &Table) -> Result<TransformOutcome> {
        let mut result = table.clone();
        let mut replaced = 0;
        for name in table.column_names() {
            if table.is_numeric(&name)? {
                continue;
            }
            let before = replaced;
            let cells: Vec<Option<String>> = table
                .text_values(&name)?
                .into_iter()
                .map(|cell| match cell {
                    Some(v) if self.is_marker(&v) => {
                        replaced += 1;
                        None
                    }
                    other => other,
                })
                .collect();
            if replaced > before {
                result = result.with_series(text_series(&name, cells))?;
            }
        }
        Ok(TransformOutcome::new(
            result,
            format!("Marked {replaced} cells as missing"),
        ))
    }

    fn name(&self) -> &'static str {
        "normalize_missing"
    }

    fn parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        if let Some(tokens) = &self.tokens {
            params.insert("tokens".to_owned(), to_param(tokens));
        }
        params
    }

    fn description(&self) -> String {
        match &self.tokens {
            Some(tokens) => format!("Normalize {} missing markers", tokens.len()),
            None => "Normalize configured missing markers".to_owned(),
        }
    }

    fn configured(&self, settings: &ExplorerSettings) -> Option<Box<dyn Transform>> {
        match self.tokens {
            Some(_) => None,
            None => Some(Box::new(Self::new(settings.missing_tokens.clone()))),
        }
    }
}

/// Remove every row that has at least one missing cell
#[derive(Debug, Clone, Copy, Default)]
pub struct DropMissingRowsTransform;

impl Transform for DropMissingRowsTransform {
    fn apply(&self, table: &Table) -> Result<TransformOutcome> {
        let keep: Vec<bool> = table.rows_with_missing()?.iter().map(|m| !m).collect();
        let removed = keep.iter().filter(|k| !**k).count();
        Ok(TransformOutcome::new(
            table.filter_rows(&keep)?,
            format!("Removed {removed} rows with missing values"),
        ))
    }

    fn name(&self) -> &'static str {
        "drop_missing_rows"
    }

    fn parameters(&self) -> Parameters {
        Parameters::new()
    }

    fn description(&self) -> String {
        "Drop rows with any missing value".to_owned()
    }
}

/// What to put in the holes of one column.
#[derive(Debug, Clone, PartialEq)]
pub enum FillMethod {
    /// Numeric columns only
    Mean,
    /// Numeric columns only
    Median,
    /// Most frequent value; the smallest one on ties
    Mode,
    /// A literal supplied by the user
    Value(String),
}

impl FillMethod {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Mode => "mode",
            Self::Value(_) => "value",
        }
    }
}

/// Fill the missing cells of one column
#[derive(Debug, Clone)]
pub struct FillMissingTransform {
    column: String,
    method: FillMethod,
}

impl FillMissingTransform {
    pub fn new(column: String, method: FillMethod) -> Self {
        Self { column, method }
    }

    /// `method` is one of `mean`, `median`, `mode`, `value`; `value` needs a
    /// `value` parameter.
    ///
    /// # Errors
    ///
    /// Missing or malformed parameters.
    pub fn from_parameters(params: &Parameters) -> Result<Self> {
        let method: String = param(params, "method")?;
        let method = match method.as_str() {
            "mean" => FillMethod::Mean,
            "median" => FillMethod::Median,
            "mode" => FillMethod::Mode,
            "value" => FillMethod::Value(param(params, "value")?),
            other => {
                return Err(OperationError::InvalidParameter(format!(
                    "unknown fill method: {other}"
                ))
                .into());
            }
        };
        Ok(Self {
            column: param(params, "column")?,
            method,
        })
    }

    fn undefined(&self) -> OperationError {
        OperationError::UndefinedStatistic {
            column: self.column.clone(),
            statistic: self.method.as_str(),
        }
    }

    /// Expression writing the fill into the column.
    fn fill_expr(&self, dtype: &DataType) -> Result<Expr> {
        let mut cell = col(self.column.as_str());
        if dtype.is_float() {
            cell = cell.fill_nan(lit(NULL));
        }
        let numeric = dtype.is_primitive_numeric();
        let filled = match &self.method {
            FillMethod::Mean | FillMethod::Median if !numeric => {
                return Err(OperationError::NotNumeric {
                    column: self.column.clone(),
                }
                .into());
            }
            FillMethod::Mean => cell.clone().fill_null(cell.mean()),
            FillMethod::Median => cell.clone().fill_null(cell.median()),
            FillMethod::Mode => cell.clone().fill_null(cell.drop_nulls().mode().min()),
            FillMethod::Value(literal) if numeric => {
                match (literal.trim().parse::<i64>(), parse_number(literal)) {
                    (Ok(v), _) if dtype.is_integer() => cell.fill_null(lit(v)),
                    (_, Some(v)) => cell.fill_null(lit(v)),
                    // A text literal turns the column into text.
                    (_, None) => cell
                        .cast(DataType::String)
                        .fill_null(lit(literal.as_str())),
                }
            }
            FillMethod::Value(literal) => cell.fill_null(lit(literal.as_str())),
        };
        Ok(filled.alias(self.column.as_str()))
    }
}

/// Report form of a filled cell.
fn shown(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Float64(v) => format_number(Some(v)),
        AnyValue::Float32(v) => format_number(Some(f64::from(v))),
        AnyValue::String(v) => v.to_owned(),
        AnyValue::StringOwned(v) => v.to_string(),
        other => other.to_string(),
    }
}

impl Transform for FillMissingTransform {
    fn apply(&self, table: &Table) -> Result<TransformOutcome> {
        let series = table.series(&self.column)?;
        let fill = self.fill_expr(series.dtype())?;

        let missing = series.null_count();
        if missing == 0 {
            return Ok(TransformOutcome::new(
                table.clone(),
                format!("Column '{}' has no missing values", self.column),
            ));
        }
        if missing == series.len() && !matches!(self.method, FillMethod::Value(_)) {
            return Err(self.undefined().into());
        }

        let frame = table.frame().clone().lazy().with_column(fill).collect()?;
        let first_gap = series
            .is_null()
            .into_no_null_iter()
            .position(|is_missing| is_missing)
            .unwrap_or(0);
        let value = shown(frame.column(&self.column)?.get(first_gap)?);

        Ok(TransformOutcome::new(
            table.with_frame(frame)?,
            format!(
                "Filled {missing} missing values in column '{}' with {value}",
                self.column
            ),
        ))
    }

    fn name(&self) -> &'static str {
        "fill_missing"
    }

    fn parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        params.insert("column".to_owned(), to_param(&self.column));
        params.insert("method".to_owned(), to_param(&self.method.as_str()));
        if let FillMethod::Value(value) = &self.method {
            params.insert("value".to_owned(), to_param(value));
        }
        params
    }

    fn description(&self) -> String {
        format!("Fill missing values in {} ({})", self.column, self.method.as_str())
    }
}
