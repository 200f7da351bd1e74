//! Categorical encoding: one-hot, label and binary.

use super::{Parameters, Transform, TransformOutcome, param, require_selection, to_param};
use crate::error::Result;
use crate::explorer::table::{Table, code_series};
use polars::prelude::{DataType, NamedFrom, Series, ToDummies as _};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Class order of one label-encoded column: code `i` stands for `classes[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoding {
    pub column: String,
    pub classes: Vec<String>,
}

impl LabelEncoding {
    pub fn decode(&self, code: i64) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|i| self.classes.get(i))
            .map(String::as_str)
    }

    pub fn encode(&self, value: &str) -> Option<i64> {
        self.classes
            .iter()
            .position(|c| c == value)
            .and_then(|i| i64::try_from(i).ok())
    }

    /// Map codes back to the original values.
    pub fn decode_all(&self, codes: &[Option<i64>]) -> Vec<Option<String>> {
        codes
            .iter()
            .map(|code| code.and_then(|c| self.decode(c)).map(str::to_owned))
            .collect()
    }
}

/// Assign codes `0..d` to distinct values in the order they are first seen.
/// Missing cells stay missing.
pub fn fit_labels(values: &[Option<String>]) -> (Vec<Option<i64>>, Vec<String>) {
    let mut classes: Vec<String> = Vec::new();
    let mut lookup: HashMap<&str, i64> = HashMap::new();
    let mut codes = Vec::with_capacity(values.len());
    for value in values {
        let code = value.as_deref().map(|v| {
            *lookup.entry(v).or_insert_with(|| {
                classes.push(v.to_owned());
                classes.len() as i64 - 1
            })
        });
        codes.push(code);
    }
    (codes, classes)
}

fn column_names_set(table: &Table) -> HashSet<String> {
    table.column_names().into_iter().collect()
}

/// Replace each column with one 0/1 column per distinct value
#[derive(Debug, Clone)]
pub struct OneHotTransform {
    columns: Vec<String>,
}

impl OneHotTransform {
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

impl Transform for OneHotTransform {
    fn apply(&self, table: &Table) -> Result<TransformOutcome> {
        require_selection(&self.columns)?;
        let mut result = table.clone();
        let mut added = 0;
        for column in &self.columns {
            let values = result.text_values(column)?;
            // Missing cells get a placeholder class whose indicator is discarded.
            let present: HashSet<String> = values.iter().flatten().cloned().collect();
            let hole = Table::unique_name("__missing", &present);
            let filled: Vec<String> = values
                .into_iter()
                .map(|v| v.unwrap_or_else(|| hole.clone()))
                .collect();
            let dummies =
                Series::new(column.as_str().into(), filled).to_dummies(Some("_"), false)?;

            result = result.drop_columns(std::slice::from_ref(column))?;
            let mut taken = column_names_set(&result);
            let prefix = format!("{column}_");
            for dummy in dummies.get_columns() {
                let raw = dummy.name().as_str();
                let value = raw.strip_prefix(prefix.as_str()).unwrap_or(raw);
                if value == hole {
                    continue;
                }
                let name = Table::unique_name(&format!("{column}_{value}"), &taken);
                let indicator = dummy
                    .as_materialized_series()
                    .cast(&DataType::Int64)?
                    .with_name(name.as_str().into());
                result = result.with_series(indicator)?;
                taken.insert(name);
                added += 1;
            }
        }
        Ok(TransformOutcome::new(
            result,
            format!(
                "One-hot encoded {} columns into {added} indicator columns",
                self.columns.len()
            ),
        ))
    }

    fn name(&self) -> &'static str {
        "one_hot"
    }

    fn parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        params.insert("columns".to_owned(), to_param(&self.columns));
        params
    }

    fn description(&self) -> String {
        format!("One-hot encode {}", self.columns.join(", "))
    }
}

/// Replace values with first-seen integer codes
#[derive(Debug, Clone)]
pub struct LabelEncodeTransform {
    columns: Vec<String>,
}

impl LabelEncodeTransform {
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

impl Transform for LabelEncodeTransform {
    fn apply(&self, table: &Table) -> Result<TransformOutcome> {
        require_selection(&self.columns)?;
        let mut result = table.clone();
        let mut encodings = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let (codes, classes) = fit_labels(&result.text_values(column)?);
            result = result.with_series(code_series(column, codes))?;
            encodings.push(LabelEncoding {
                column: column.clone(),
                classes,
            });
        }
        Ok(TransformOutcome::new(
            result,
            format!("Label encoded {} columns", self.columns.len()),
        )
        .with_encodings(encodings))
    }

    fn name(&self) -> &'static str {
        "label_encode"
    }

    fn parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        params.insert("columns".to_owned(), to_param(&self.columns));
        params
    }

    fn description(&self) -> String {
        format!("Label encode {}", self.columns.join(", "))
    }
}

/// Bits needed for the largest code; at least one.
fn bit_width(max_code: i64) -> usize {
    (64 - max_code.max(0).leading_zeros()).max(1) as usize
}

/// Label encode, then spread each code over `{column}_bit_{i}` columns, least significant first
#[derive(Debug, Clone)]
pub struct BinaryEncodeTransform {
    columns: Vec<String>,
}

impl BinaryEncodeTransform {
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

impl Transform for BinaryEncodeTransform {
    fn apply(&self, table: &Table) -> Result<TransformOutcome> {
        require_selection(&self.columns)?;
        let mut result = table.clone();
        let mut encodings = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let (codes, classes) = fit_labels(&result.text_values(column)?);
            let max_code = codes.iter().flatten().copied().max().unwrap_or(0);
            let bits = bit_width(max_code);

            result = result.drop_columns(std::slice::from_ref(column))?;
            let mut taken = column_names_set(&result);
            for bit in 0..bits {
                let name = Table::unique_name(&format!("{column}_bit_{bit}"), &taken);
                let values: Vec<Option<i64>> =
                    codes.iter().map(|c| c.map(|code| (code >> bit) & 1)).collect();
                result = result.with_series(code_series(&name, values))?;
                taken.insert(name);
            }
            tracing::debug!(
                column = %column,
                bits,
                classes = classes.len(),
                "Binary encoded column"
            );
            encodings.push(LabelEncoding {
                column: column.clone(),
                classes,
            });
        }
        Ok(TransformOutcome::new(
            result,
            format!("Binary encoded {} columns", self.columns.len()),
        )
        .with_encodings(encodings))
    }

    fn name(&self) -> &'static str {
        "binary_encode"
    }

    fn parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        params.insert("columns".to_owned(), to_param(&self.columns));
        params
    }

    fn description(&self) -> String {
        format!("Binary encode {}", self.columns.join(", "))
    }
}
