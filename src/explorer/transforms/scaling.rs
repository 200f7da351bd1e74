//! Numeric column scaling.

use super::{Parameters, Transform, TransformOutcome, param, require_selection, to_param};
use crate::error::{OperationError, Result};
use crate::explorer::table::Table;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMethod {
    /// `(x - min) / (max - min)`
    MinMax,
    /// `(x - mean) / std` with the population standard deviation
    Standard,
}

/// Rescale numeric columns; missing cells stay missing and constant columns become 0
#[derive(Debug, Clone)]
pub struct ScaleTransform {
    columns: Vec<String>,
    method: ScaleMethod,
}

impl ScaleTransform {
    pub fn new(columns: Vec<String>, method: ScaleMethod) -> Self {
        Self { columns, method }
    }

    /// # Errors
    ///
    /// Missing or malformed `columns` / `method`.
    pub fn from_parameters(params: &Parameters) -> Result<Self> {
        Ok(Self {
            columns: param(params, "columns")?,
            method: param(params, "method")?,
        })
    }
}

/// `(x - offset) / divisor`, or 0 for every present cell when the divisor is 0.
fn scaled(name: &str, method: ScaleMethod) -> Expr {
    let x = col(name).cast(DataType::Float64);
    let (offset, divisor) = match method {
        ScaleMethod::MinMax => {
            let min = x.clone().min();
            let max = x.clone().max();
            (min.clone(), max - min)
        }
        ScaleMethod::Standard => (x.clone().mean(), x.clone().std(0)),
    };
    when(divisor.clone().neq(lit(0.0)))
        .then((x.clone() - offset) / divisor)
        .otherwise(x * lit(0.0))
        .alias(name)
}

impl Transform for ScaleTransform {
    fn apply(&self, table: &Table) -> Result<TransformOutcome> {
        require_selection(&self.columns)?;
        for column in &self.columns {
            if !table.is_numeric(column)? {
                return Err(OperationError::NotNumeric {
                    column: column.clone(),
                }
                .into());
            }
        }
        let exprs: Vec<Expr> = self
            .columns
            .iter()
            .map(|column| scaled(column, self.method))
            .collect();
        let frame = table.frame().clone().lazy().with_columns(exprs).collect()?;
        let result = table.with_frame(frame)?;
        let method = match self.method {
            ScaleMethod::MinMax => "min-max",
            ScaleMethod::Standard => "standard",
        };
        Ok(TransformOutcome::new(
            result,
            format!("Applied {method} scaling to {} columns", self.columns.len()),
        ))
    }

    fn name(&self) -> &'static str {
        "scale"
    }

    fn parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        params.insert("columns".to_owned(), to_param(&self.columns));
        params.insert("method".to_owned(), to_param(&self.method));
        params
    }

    fn description(&self) -> String {
        format!("Scale {} columns ({:?})", self.columns.len(), self.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use polars::prelude::*;

    fn assert_close(actual: &[Option<f64>], expected: &[Option<f64>]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            match (a, e) {
                (Some(a), Some(e)) => assert!((a - e).abs() < 1e-9, "{a} != {e}"),
                (None, None) => {}
                _ => panic!("{actual:?} != {expected:?}"),
            }
        }
    }

    #[test]
    fn test_min_max() -> Result<()> {
        let t = Table::new(df!("v" => &[Some(2i64), Some(4), None, Some(6)])?);
        let out = ScaleTransform::new(vec!["v".to_owned()], ScaleMethod::MinMax).apply(&t)?;
        assert_close(
            &out.table.numeric_values("v")?,
            &[Some(0.0), Some(0.5), None, Some(1.0)],
        );
        Ok(())
    }

    #[test]
    fn test_standard_uses_population_std() -> Result<()> {
        let t = Table::new(df!("v" => &[1.0, 3.0])?);
        let out = ScaleTransform::new(vec!["v".to_owned()], ScaleMethod::Standard).apply(&t)?;
        assert_close(&out.table.numeric_values("v")?, &[Some(-1.0), Some(1.0)]);
        Ok(())
    }

    #[test]
    fn test_constant_column_scales_to_zero() -> Result<()> {
        let t = Table::new(df!("v" => &[Some(5.0), Some(5.0), None])?);
        for method in [ScaleMethod::MinMax, ScaleMethod::Standard] {
            let out = ScaleTransform::new(vec!["v".to_owned()], method).apply(&t)?;
            assert_eq!(
                out.table.numeric_values("v")?,
                vec![Some(0.0), Some(0.0), None]
            );
        }
        Ok(())
    }

    #[test]
    fn test_all_missing_column_stays_missing() -> Result<()> {
        let t = Table::new(df!("v" => &[None::<f64>, None], "w" => &[1.0, 2.0])?);
        let out = ScaleTransform::new(vec!["v".to_owned(), "w".to_owned()], ScaleMethod::MinMax)
            .apply(&t)?;
        assert_eq!(out.table.numeric_values("v")?, vec![None, None]);
        assert_eq!(out.table.numeric_values("w")?, vec![Some(0.0), Some(1.0)]);
        assert_eq!(out.table.column_names(), vec!["v", "w"]);
        Ok(())
    }

    #[test]
    fn test_text_column_rejected() -> Result<()> {
        let t = Table::new(df!("s" => &["a", "b"])?);
        let err = ScaleTransform::new(vec!["s".to_owned()], ScaleMethod::MinMax)
            .apply(&t)
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid operation: column 's' is not numeric");
        Ok(())
    }
}
