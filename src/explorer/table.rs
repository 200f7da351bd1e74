//! The in-memory table every component works on.
//!
//! A [`Table`] is a Polars [`DataFrame`] paired with one identity label per
//! row. Labels are assigned 0-based when a dataset is loaded or reset and are
//! carried through row deletions, so "row 7" keeps naming the same record
//! until the next reset.

use crate::error::{OperationError, Result};
use polars::prelude::*;
use std::collections::HashSet;

pub fn text_series(name: &str, values: Vec<Option<String>>) -> Series {
    Series::new(name.into(), values)
}

pub fn code_series(name: &str, values: Vec<Option<i64>>) -> Series {
    Series::new(name.into(), values)
}

#[derive(Debug, Clone)]
pub struct Table {
    frame: DataFrame,
    row_ids: Vec<usize>,
}

impl Table {
    /// Wrap a frame with fresh 0-based row labels.
    pub fn new(frame: DataFrame) -> Self {
        let row_ids = (0..frame.height()).collect();
        Self { frame, row_ids }
    }

    /// Wrap a frame with caller-supplied row labels.
    ///
    /// # Errors
    ///
    /// Fails when the label count differs from the frame height or labels repeat.
    pub fn with_row_ids(frame: DataFrame, row_ids: Vec<usize>) -> Result<Self> {
        if row_ids.len() != frame.height() {
            return Err(OperationError::InvalidParameter(format!(
                "{} row labels for {} rows",
                row_ids.len(),
                frame.height()
            ))
            .into());
        }
        let unique: HashSet<usize> = row_ids.iter().copied().collect();
        if unique.len() != row_ids.len() {
            return Err(
                OperationError::InvalidParameter("row labels must be unique".to_owned()).into(),
            );
        }
        Ok(Self { frame, row_ids })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn row_ids(&self) -> &[usize] {
        &self.row_ids
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0 || self.width() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_index(name).is_some()
    }

    /// # Errors
    ///
    /// [`OperationError::UnknownColumn`] when the name is not present.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.frame.column(name).map_err(|_| {
            OperationError::UnknownColumn {
                name: name.to_owned(),
            }
            .into()
        })
    }

    /// # Errors
    ///
    /// [`OperationError::UnknownColumn`] for the first missing name.
    pub fn require_columns(&self, names: &[String]) -> Result<()> {
        for name in names {
            self.column(name)?;
        }
        Ok(())
    }

    /// Whether the column stores numbers (as opposed to text).
    ///
    /// # Errors
    ///
    /// [`OperationError::UnknownColumn`] when the name is not present.
    pub fn is_numeric(&self, name: &str) -> Result<bool> {
        Ok(self.column(name)?.dtype().is_primitive_numeric())
    }

    /// # Errors
    ///
    /// [`OperationError::UnknownColumn`] when the name is not present.
    pub fn is_integer(&self, name: &str) -> Result<bool> {
        Ok(self.column(name)?.dtype().is_integer())
    }

    /// The column as a Polars series, float NaN turned into null.
    ///
    /// # Errors
    ///
    /// Unknown column or a Polars cast failure.
    pub fn series(&self, name: &str) -> Result<Series> {
        let series = self.column(name)?.as_materialized_series().clone();
        if !series.dtype().is_float() {
            return Ok(series);
        }
        let series = series.cast(&DataType::Float64)?;
        let ca = series.f64()?;
        let nan = ca.is_nan();
        if !nan.any() {
            return Ok(series);
        }
        Ok(ca.set(&nan, None)?.into_series())
    }

    /// # Errors
    ///
    /// Unknown column, or [`OperationError::NotNumeric`] for a text column.
    pub fn numeric_series(&self, name: &str) -> Result<Series> {
        if !self.is_numeric(name)? {
            return Err(OperationError::NotNumeric {
                column: name.to_owned(),
            }
            .into());
        }
        Ok(self.series(name)?.cast(&DataType::Float64)?)
    }

    /// Numeric cells of a column; NaN counts as missing.
    ///
    /// # Errors
    ///
    /// Unknown column, or [`OperationError::NotNumeric`] for a text column.
    pub fn numeric_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let series = self.numeric_series(name)?;
        Ok(series.f64()?.into_iter().collect())
    }

    /// Cells of any column rendered as text, as used for equality and grouping.
    ///
    /// # Errors
    ///
    /// Unknown column, or a Polars cast failure.
    pub fn text_values(&self, name: &str) -> Result<Vec<Option<String>>> {
        let series = self.series(name)?.cast(&DataType::String)?;
        Ok(series
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_owned))
            .collect())
    }

    /// Missing flags of one column.
    ///
    /// # Errors
    ///
    /// Unknown column.
    pub fn missing_mask(&self, name: &str) -> Result<BooleanChunked> {
        Ok(self.series(name)?.is_null())
    }

    /// Keep the rows whose mask entry is true; labels follow their rows.
    ///
    /// # Errors
    ///
    /// Fails when the mask length differs from the row count.
    pub fn filter_rows(&self, keep: &[bool]) -> Result<Self> {
        if keep.len() != self.height() {
            return Err(OperationError::InvalidParameter(format!(
                "row mask has {} entries for {} rows",
                keep.len(),
                self.height()
            ))
            .into());
        }
        let mask = BooleanChunked::from_slice("mask".into(), keep);
        let frame = self.frame.filter(&mask)?;
        let row_ids = self
            .row_ids
            .iter()
            .zip(keep)
            .filter(|&(_, &k)| k)
            .map(|(&id, _)| id)
            .collect();
        Ok(Self { frame, row_ids })
    }

    /// Keep only the named columns, in the given order.
    ///
    /// # Errors
    ///
    /// [`OperationError::UnknownColumn`] for the first missing name.
    pub fn select_columns(&self, names: &[String]) -> Result<Self> {
        self.require_columns(names)?;
        let frame = self.frame.select(names.iter().map(String::as_str))?;
        Ok(Self {
            frame,
            row_ids: self.row_ids.clone(),
        })
    }

    /// # Errors
    ///
    /// [`OperationError::UnknownColumn`] for the first missing name.
    pub fn drop_columns(&self, names: &[String]) -> Result<Self> {
        self.require_columns(names)?;
        let mut frame = self.frame.clone();
        for name in names {
            frame = frame.drop(name)?;
        }
        Ok(Self {
            frame,
            row_ids: self.row_ids.clone(),
        })
    }

    /// Replace a column of the same name in place, or append a new one.
    ///
    /// # Errors
    ///
    /// Fails when the series length differs from the row count.
    pub fn with_series(&self, series: Series) -> Result<Self> {
        let mut frame = self.frame.clone();
        frame.with_column(series)?;
        Ok(Self {
            frame,
            row_ids: self.row_ids.clone(),
        })
    }

    /// Swap in a frame derived from this one, keeping the row labels.
    ///
    /// # Errors
    ///
    /// Fails when the frame height differs from the row count.
    pub fn with_frame(&self, frame: DataFrame) -> Result<Self> {
        Self::with_row_ids(frame, self.row_ids.clone())
    }

    /// Same content, labels reassigned 0..n.
    pub fn resequenced(&self) -> Self {
        Self::new(self.frame.clone())
    }

    /// Row-wise missing flags across every column.
    ///
    /// # Errors
    ///
    /// Propagates column access failures.
    pub fn rows_with_missing(&self) -> Result<Vec<bool>> {
        let mut flags = BooleanChunked::full("missing".into(), false, self.height());
        for name in self.column_names() {
            flags = &flags | &self.missing_mask(&name)?;
        }
        Ok(flags.into_no_null_iter().collect())
    }

    /// Total count of missing cells.
    ///
    /// # Errors
    ///
    /// Propagates column access failures.
    pub fn missing_cells(&self) -> Result<usize> {
        let mut total = 0;
        for name in self.column_names() {
            total += self.series(&name)?.null_count();
        }
        Ok(total)
    }

    /// Position of a row label in the current table.
    pub fn position_of(&self, row_id: usize) -> Option<usize> {
        self.row_ids.iter().position(|&id| id == row_id)
    }

    /// Same columns, same cells (missing equal to missing), same labels.
    pub fn same_content(&self, other: &Self) -> bool {
        self.row_ids == other.row_ids && self.frame.equals_missing(&other.frame)
    }

    /// Pick a column name not present in `taken`, suffixing `_1`, `_2`, ... as needed.
    pub fn unique_name(base: &str, taken: &HashSet<String>) -> String {
        let mut candidate = base.to_owned();
        let mut count = 0;
        while taken.contains(&candidate) {
            count += 1;
            candidate = format!("{base}_{count}");
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn sample() -> Result<Table> {
        let df = df!(
            "A" => &[Some(1.0), Some(2.0), None, Some(4.0)],
            "B" => &[Some("x"), Some("y"), Some("x"), None]
        )?;
        Ok(Table::new(df))
    }

    #[test]
    fn test_fresh_labels() -> Result<()> {
        let table = sample()?;
        assert_eq!(table.row_ids(), &[0, 1, 2, 3]);
        assert_eq!(table.column_names(), vec!["A", "B"]);
        Ok(())
    }

    #[test]
    fn test_filter_keeps_labels() -> Result<()> {
        let table = sample()?;
        let filtered = table.filter_rows(&[true, false, true, false])?;
        assert_eq!(filtered.row_ids(), &[0, 2]);
        assert_eq!(filtered.height(), 2);
        assert_eq!(filtered.resequenced().row_ids(), &[0, 1]);
        Ok(())
    }

    #[test]
    fn test_unknown_column() -> Result<()> {
        let table = sample()?;
        let err = table.numeric_values("Z").unwrap_err();
        assert!(err.is_operation());
        assert!(err.to_string().contains("'Z'"));
        Ok(())
    }

    #[test]
    fn test_missing_accounting() -> Result<()> {
        let table = sample()?;
        assert_eq!(table.missing_cells()?, 2);
        assert_eq!(table.rows_with_missing()?, vec![false, false, true, true]);
        Ok(())
    }

    #[test]
    fn test_nan_reads_as_missing() -> Result<()> {
        let table = Table::new(df!("v" => &[Some(1.0), Some(f64::NAN), None])?);
        assert_eq!(table.series("v")?.null_count(), 2);
        assert_eq!(table.numeric_values("v")?, vec![Some(1.0), None, None]);
        assert_eq!(table.text_values("v")?[1], None);
        assert_eq!(table.missing_cells()?, 2);
        Ok(())
    }

    #[test]
    fn test_with_frame_keeps_labels() -> Result<()> {
        let table = sample()?.filter_rows(&[false, true, true, true])?;
        let frame = table.frame().select(["B"])?;
        let narrowed = table.with_frame(frame)?;
        assert_eq!(narrowed.row_ids(), &[1, 2, 3]);
        assert!(table.with_frame(df!("x" => &[1])?).is_err());
        Ok(())
    }

    #[test]
    fn test_unique_name() {
        let taken: HashSet<String> = ["B_x".to_owned(), "B_x_1".to_owned()].into();
        assert_eq!(Table::unique_name("B_x", &taken), "B_x_2");
        assert_eq!(Table::unique_name("B_y", &taken), "B_y");
    }

    #[test]
    fn test_with_row_ids_validates() -> Result<()> {
        let df = df!("A" => &[1, 2])?;
        assert!(Table::with_row_ids(df.clone(), vec![0]).is_err());
        assert!(Table::with_row_ids(df.clone(), vec![3, 3]).is_err());
        let table = Table::with_row_ids(df, vec![5, 9])?;
        assert_eq!(table.position_of(9), Some(1));
        Ok(())
    }
}
