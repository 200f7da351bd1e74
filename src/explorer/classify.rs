//! Numeric / categorical column classification.
//!
//! The classification is derived from the table on every call and never
//! cached: transforms change column types (label encoding turns a text column
//! into a numeric one), so a stored answer would go stale.

use super::io::parse_number;
use super::table::Table;
use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// A text column is categorical when fewer than this fraction of its
    /// sampled values parse as numbers.
    pub categorical_threshold: f64,
    /// How many leading non-missing values of a text column are sampled.
    pub sample_size: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            categorical_threshold: 0.7,
            sample_size: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnClass {
    Numeric,
    Categorical,
}

impl ColumnClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
        }
    }
}

/// Classes of the columns of one table snapshot, in column order.
///
/// Columns absent from the list are unclassified: text columns with no values,
/// or text columns that look mostly numeric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnClassification {
    pub columns: Vec<(String, ColumnClass)>,
}

impl ColumnClassification {
    pub fn class_of(&self, name: &str) -> Option<ColumnClass> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, class)| *class)
    }

    pub fn numeric(&self) -> Vec<String> {
        self.with_class(ColumnClass::Numeric)
    }

    pub fn categorical(&self) -> Vec<String> {
        self.with_class(ColumnClass::Categorical)
    }

    pub fn is_numeric(&self, name: &str) -> bool {
        self.class_of(name) == Some(ColumnClass::Numeric)
    }

    pub fn is_categorical(&self, name: &str) -> bool {
        self.class_of(name) == Some(ColumnClass::Categorical)
    }

    fn with_class(&self, class: ColumnClass) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, c)| *c == class)
            .map(|(n, _)| n.clone())
            .collect()
    }
}

/// Classify every column of `table`.
///
/// - numeric storage -> [`ColumnClass::Numeric`]
/// - text storage -> sample the first `sample_size` non-missing values; if the
///   fraction parsing as a float is below the threshold the column is
///   [`ColumnClass::Categorical`], otherwise it is left unclassified
/// - text columns with no non-missing values are left unclassified
///
/// # Errors
///
/// Propagates column materialization failures.
pub fn classify(table: &Table, config: &ClassifierConfig) -> Result<ColumnClassification> {
    let mut columns = Vec::new();
    for name in table.column_names() {
        if table.is_numeric(&name)? {
            columns.push((name, ColumnClass::Numeric));
            continue;
        }

        let values = table.text_values(&name)?;
        let sample: Vec<&str> = values
            .iter()
            .flatten()
            .take(config.sample_size)
            .map(String::as_str)
            .collect();
        if sample.is_empty() {
            continue;
        }

        let parseable = sample.iter().filter(|v| parse_number(v).is_some()).count();
        let fraction = parseable as f64 / sample.len() as f64;
        if fraction < config.categorical_threshold {
            columns.push((name, ColumnClass::Categorical));
        } else {
            tracing::debug!(
                column = %name,
                fraction,
                "Text column looks numeric; left unclassified"
            );
        }
    }
    Ok(ColumnClassification { columns })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use polars::prelude::*;

    #[test]
    fn test_numeric_and_categorical() -> Result<()> {
        let df = df!(
            "A" => &[Some(1.0), Some(2.0), None, Some(4.0)],
            "B" => &["x", "y", "x", "y"]
        )?;
        let classes = classify(&Table::new(df), &ClassifierConfig::default())?;
        assert_eq!(classes.numeric(), vec!["A"]);
        assert_eq!(classes.categorical(), vec!["B"]);
        Ok(())
    }

    #[test]
    fn test_mostly_numeric_text_is_unclassified() -> Result<()> {
        // 8 of 10 parse: 0.8 >= 0.7
        let df = df!(
            "codes" => &["1", "2", "3", "4", "5", "6", "7", "8", "a", "b"]
        )?;
        let classes = classify(&Table::new(df), &ClassifierConfig::default())?;
        assert!(classes.columns.is_empty());
        Ok(())
    }

    #[test]
    fn test_threshold_is_configurable() -> Result<()> {
        let df = df!("codes" => &["1", "2", "a", "b"])?;
        let table = Table::new(df);

        let default = classify(&table, &ClassifierConfig::default())?;
        assert!(default.is_categorical("codes"));

        let lenient = ClassifierConfig {
            categorical_threshold: 0.5,
            sample_size: 100,
        };
        assert!(classify(&table, &lenient)?.columns.is_empty());
        Ok(())
    }

    #[test]
    fn test_sample_cap() -> Result<()> {
        // Only the first two values are sampled and both are numbers.
        let df = df!("mixed" => &["1", "2", "x", "y", "z"])?;
        let config = ClassifierConfig {
            categorical_threshold: 0.7,
            sample_size: 2,
        };
        assert!(classify(&Table::new(df), &config)?.columns.is_empty());
        Ok(())
    }

    #[test]
    fn test_all_missing_text_excluded() -> Result<()> {
        let s = Series::new("empty".into(), vec![None::<&str>, None]);
        let df = DataFrame::new(vec![Column::from(s)])?;
        let classes = classify(&Table::new(df), &ClassifierConfig::default())?;
        assert_eq!(classes.class_of("empty"), None);
        Ok(())
    }
}
