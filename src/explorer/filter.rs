//! Read-only views over a table: categorical filters and pagination.
//!
//! Nothing here changes the session's working table; every function returns
//! a new view.

use super::classify::{ClassifierConfig, classify};
use super::table::Table;
use crate::error::{OperationError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// A categorical column that can be filtered, with its sorted distinct values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOption {
    pub column: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub available: Vec<FilterOption>,
    /// Categorical columns skipped for having too many distinct values, with their count
    pub too_many_values: Vec<(String, usize)>,
}

/// Offer a filter for each categorical column with at most `max_unique` distinct values.
///
/// # Errors
///
/// Propagates column materialization failures.
pub fn filter_options(
    table: &Table,
    classifier: &ClassifierConfig,
    max_unique: usize,
) -> Result<FilterOptions> {
    let mut options = FilterOptions::default();
    for column in classify(table, classifier)?.categorical() {
        let values: BTreeSet<String> = table.text_values(&column)?.into_iter().flatten().collect();
        if values.len() <= max_unique {
            options.available.push(FilterOption {
                column,
                values: values.into_iter().collect(),
            });
        } else {
            options.too_many_values.push((column, values.len()));
        }
    }
    Ok(options)
}

/// Keep rows whose value in `column` is one of `values`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFilter {
    pub column: String,
    pub values: Vec<String>,
}

impl CategoryFilter {
    /// Parse `column=v1,v2`.
    ///
    /// # Errors
    ///
    /// [`OperationError::InvalidParameter`] when there is no `=`.
    pub fn parse(expr: &str) -> Result<Self> {
        let (column, values) = expr.split_once('=').ok_or_else(|| {
            OperationError::InvalidParameter(format!("filter '{expr}' must look like column=v1,v2"))
        })?;
        Ok(Self {
            column: column.trim().to_owned(),
            values: values.split(',').map(|v| v.trim().to_owned()).collect(),
        })
    }
}

/// Apply every filter (AND across columns). Filters with no values are ignored.
///
/// # Errors
///
/// Unknown column.
pub fn apply_filters(table: &Table, filters: &[CategoryFilter]) -> Result<Table> {
    let mut keep = vec![true; table.height()];
    for filter in filters.iter().filter(|f| !f.values.is_empty()) {
        let allowed: HashSet<&str> = filter.values.iter().map(String::as_str).collect();
        let cells = table.text_values(&filter.column)?;
        for (flag, cell) in keep.iter_mut().zip(&cells) {
            if !cell.as_deref().is_some_and(|v| allowed.contains(v)) {
                *flag = false;
            }
        }
    }
    let view = table.filter_rows(&keep)?;
    if !filters.is_empty() {
        tracing::debug!(
            kept = view.height(),
            total = table.height(),
            "Applied category filters"
        );
    }
    Ok(view)
}

/// One page of a table view.
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based page number
    pub number: usize,
    pub page_count: usize,
    /// 0-based position of the first row on the page
    pub start: usize,
    /// Exclusive end position
    pub end: usize,
    pub total_rows: usize,
    pub rows: Table,
}

impl Page {
    /// "rows 51-100 of 230"
    pub fn range_label(&self) -> String {
        if self.total_rows == 0 {
            return "rows 0-0 of 0".to_owned();
        }
        format!(
            "rows {}-{} of {}",
            self.start + 1,
            self.end,
            self.total_rows
        )
    }
}

/// Page `number` (1-based) of `page_size` rows.
///
/// # Errors
///
/// [`OperationError::InvalidParameter`] for a zero page size or a page past the end.
pub fn paginate(table: &Table, number: usize, page_size: usize) -> Result<Page> {
    if page_size == 0 {
        return Err(
            OperationError::InvalidParameter("page size must be at least 1".to_owned()).into(),
        );
    }
    let total_rows = table.height();
    let page_count = total_rows.div_ceil(page_size).max(1);
    if number == 0 || number > page_count {
        return Err(OperationError::InvalidParameter(format!(
            "page {number} out of range (1-{page_count})"
        ))
        .into());
    }

    let start = (number - 1) * page_size;
    let end = (start + page_size).min(total_rows);
    let mask: Vec<bool> = (0..total_rows).map(|i| i >= start && i < end).collect();
    Ok(Page {
        number,
        page_count,
        start,
        end,
        total_rows,
        rows: table.filter_rows(&mask)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use polars::prelude::*;

    fn sample() -> Result<Table> {
        Ok(Table::new(df!(
            "city" => &[Some("Oslo"), Some("Rome"), Some("Oslo"), None, Some("Lima")],
            "kind" => &["a", "b", "b", "a", "a"],
            "n" => &[1, 2, 3, 4, 5]
        )?))
    }

    #[test]
    fn test_filter_options_sorted_and_capped() -> Result<()> {
        let t = sample()?;
        let options = filter_options(&t, &ClassifierConfig::default(), 2)?;
        assert_eq!(options.available.len(), 1);
        assert_eq!(options.available[0].column, "kind");
        assert_eq!(options.available[0].values, vec!["a", "b"]);
        assert_eq!(options.too_many_values, vec![("city".to_owned(), 3)]);
        Ok(())
    }

    #[test]
    fn test_filters_and_across_columns() -> Result<()> {
        let t = sample()?;
        let filters = vec![
            CategoryFilter::parse("city=Oslo,Lima")?,
            CategoryFilter::parse("kind=a")?,
        ];
        let view = apply_filters(&t, &filters)?;
        assert_eq!(view.row_ids(), &[0, 4]);
        // the working table is untouched
        assert_eq!(t.height(), 5);
        Ok(())
    }

    #[test]
    fn test_bad_filter_expression() {
        assert!(CategoryFilter::parse("city").is_err());
    }

    #[test]
    fn test_pagination() -> Result<()> {
        let t = sample()?;
        let page = paginate(&t, 2, 2)?;
        assert_eq!(page.page_count, 3);
        assert_eq!(page.rows.row_ids(), &[2, 3]);
        assert_eq!(page.range_label(), "rows 3-4 of 5");

        let last = paginate(&t, 3, 2)?;
        assert_eq!(last.rows.height(), 1);
        assert!(paginate(&t, 4, 2).is_err());
        assert!(paginate(&t, 0, 2).is_err());
        Ok(())
    }
}
