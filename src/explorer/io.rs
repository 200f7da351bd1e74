//! Loading uploads into a [`Table`].

use super::table::{Table, text_series};
use crate::config::ExplorerSettings;
use crate::error::{ExplorerError, Result};
use polars::prelude::*;
use std::io::Cursor;

/// A freshly parsed upload.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: Table,
    /// Text columns that were converted to numeric because every value parsed.
    pub converted: Vec<String>,
}

/// Parse delimited text (header row first) into a table with 0-based row labels.
///
/// Every field is read as text first. Cells matching a configured missing
/// token, or containing only whitespace, become missing. A column then becomes
/// numeric if and only if every non-missing value parses as a number.
///
/// # Errors
///
/// Returns [`ExplorerError::Parse`] for empty or malformed input.
pub fn load(bytes: &[u8], settings: &ExplorerSettings) -> Result<LoadedTable> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ExplorerError::Parse("upload is empty".to_owned()));
    }

    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
        .finish()
        .map_err(|e| ExplorerError::Parse(e.to_string()))?;

    if frame.width() == 0 {
        return Err(ExplorerError::Parse("no columns found".to_owned()));
    }

    let mut table = Table::new(frame);
    for name in table.column_names() {
        let values = table
            .text_values(&name)?
            .into_iter()
            .map(|cell| cell.filter(|v| !settings.is_missing_token(v)))
            .collect();
        table = table.with_series(text_series(&name, values))?;
    }

    let converted = coerce_numeric_columns(&mut table)?;
    tracing::info!(
        rows = table.height(),
        columns = table.width(),
        converted = converted.len(),
        "Parsed upload"
    );
    Ok(LoadedTable { table, converted })
}

/// Convert each text column whose non-missing values all parse as numbers.
///
/// Columns of whole numbers become `Int64`, the rest `Float64`. Returns the converted names.
///
/// # Errors
///
/// Propagates column access failures.
pub fn coerce_numeric_columns(table: &mut Table) -> Result<Vec<String>> {
    let mut converted = Vec::new();
    for name in table.column_names() {
        if table.is_numeric(&name)? {
            continue;
        }
        let Some(series) = parse_numeric(&name, &table.text_values(&name)?, true) else {
            continue;
        };
        tracing::debug!(
            column = %name,
            dtype = %series.dtype(),
            "Converted text column to numeric"
        );
        *table = table.with_series(series)?;
        converted.push(name);
    }
    Ok(converted)
}

/// A numeric series holding `values`, or `None` if a present cell is not a number.
///
/// With `allow_int` the series is `Int64` when every cell is a whole number in
/// `i64` range, parsed exactly. Otherwise it is `Float64`.
pub fn parse_numeric(name: &str, values: &[Option<String>], allow_int: bool) -> Option<Series> {
    if allow_int {
        let ints: Option<Vec<Option<i64>>> = values
            .iter()
            .map(|cell| match cell {
                None => Some(None),
                Some(v) => v.trim().parse::<i64>().ok().map(Some),
            })
            .collect();
        if let Some(ints) = ints {
            return Some(Series::new(name.into(), ints));
        }
    }
    let floats: Option<Vec<Option<f64>>> = values
        .iter()
        .map(|cell| match cell {
            None => Some(None),
            Some(v) => parse_number(v).map(Some),
        })
        .collect();
    floats.map(|floats| Series::new(name.into(), floats))
}

/// Lenient number parsing used by loading and classification.
pub fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn load_str(csv: &str) -> crate::error::Result<LoadedTable> {
        load(csv.as_bytes(), &ExplorerSettings::default())
    }

    #[test]
    fn test_missing_tokens_and_numeric_coercion() -> Result<()> {
        let loaded = load_str("A,B,C\n1,x,?\n2,y,3.5\nNA,x,missing\n4, ,7\n")?;
        let table = &loaded.table;

        assert_eq!(table.height(), 4);
        assert_eq!(table.row_ids(), &[0, 1, 2, 3]);
        assert_eq!(loaded.converted, vec!["A", "C"]);

        assert!(table.is_integer("A")?);
        assert_eq!(
            table.numeric_values("A")?,
            vec![Some(1.0), Some(2.0), None, Some(4.0)]
        );
        assert_eq!(
            table.numeric_values("C")?,
            vec![None, Some(3.5), None, Some(7.0)]
        );
        assert_eq!(
            table.text_values("B")?,
            vec![
                Some("x".to_owned()),
                Some("y".to_owned()),
                Some("x".to_owned()),
                None
            ]
        );
        Ok(())
    }

    #[test]
    fn test_mixed_column_stays_text() -> Result<()> {
        let loaded = load_str("code\n1\n2\nabc\n")?;
        assert!(!loaded.table.is_numeric("code")?);
        assert!(loaded.converted.is_empty());
        Ok(())
    }

    #[test]
    fn test_all_missing_column_becomes_numeric() -> Result<()> {
        let loaded = load_str("a,b\n1,?\n2,NA\n")?;
        assert!(loaded.table.is_numeric("b")?);
        assert_eq!(loaded.table.numeric_values("b")?, vec![None, None]);
        Ok(())
    }

    #[test]
    fn test_large_integer_ids_stay_exact() -> Result<()> {
        let csv = "id\n12345678901234567\n12345678901234568\n-9223372036854775808\n";
        let loaded = load_str(csv)?;
        let id = loaded.table.column("id")?.as_materialized_series().clone();
        assert_eq!(id.dtype(), &DataType::Int64);
        assert_eq!(
            id.i64()?.into_iter().collect::<Vec<_>>(),
            vec![
                Some(12_345_678_901_234_567),
                Some(12_345_678_901_234_568),
                Some(i64::MIN)
            ]
        );
        Ok(())
    }

    #[test]
    fn test_out_of_range_integers_become_float() -> Result<()> {
        let loaded = load_str("n\n1\n99999999999999999999\n")?;
        assert!(loaded.table.is_numeric("n")?);
        assert!(!loaded.table.is_integer("n")?);
        Ok(())
    }

    #[test]
    fn test_empty_upload_is_parse_error() {
        let err = load_str("  \n").unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_ragged_rows_are_parse_error() {
        let err = load_str("a,b\n1,2\n3,4,5,6\n").unwrap_err();
        assert!(err.is_parse());
    }
}
