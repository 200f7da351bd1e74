//! Deduplication.

use super::{Parameters, Transform, TransformOutcome, param_opt, to_param};
use crate::error::Result;
use crate::explorer::table::Table;
use polars::prelude::{DataFrame, UniqueKeepStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which member of a duplicate group survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeep {
    #[default]
    First,
    Last,
    /// Drop every member of a duplicate group, including the first
    None,
}

impl From<DuplicateKeep> for UniqueKeepStrategy {
    fn from(keep: DuplicateKeep) -> Self {
        match keep {
            DuplicateKeep::First => Self::First,
            DuplicateKeep::Last => Self::Last,
            DuplicateKeep::None => Self::None,
        }
    }
}

/// Flag the rows `keep` would remove when comparing `columns`. Missing equals missing.
///
/// # Errors
///
/// Unknown column or a Polars failure.
pub fn duplicated(table: &Table, columns: &[String], keep: DuplicateKeep) -> Result<Vec<bool>> {
    table.require_columns(columns)?;
    if table.height() == 0 {
        return Ok(Vec::new());
    }

    let taken: HashSet<String> = columns.iter().cloned().collect();
    let position = Table::unique_name("__position", &taken);
    let keyed: DataFrame = table
        .frame()
        .select(columns.iter().map(String::as_str))?
        .with_row_index(position.as_str().into(), None)?;
    let kept = keyed.unique_stable(Some(columns), keep.into(), None)?;

    let mut flags = vec![true; table.height()];
    let positions = kept.column(&position)?.as_materialized_series().idx()?;
    for pos in positions.into_no_null_iter() {
        flags[pos as usize] = false;
    }
    Ok(flags)
}

/// Drop rows that are equal across a column subset
#[derive(Debug, Clone, Default)]
pub struct DropDuplicatesTransform {
    subset: Option<Vec<String>>,
    keep: DuplicateKeep,
}

impl DropDuplicatesTransform {
    /// `None` or an empty subset compares all columns.
    pub fn new(subset: Option<Vec<String>>, keep: DuplicateKeep) -> Self {
        Self { subset, keep }
    }

    /// # Errors
    ///
    /// Malformed `subset` / `keep`; both are optional.
    pub fn from_parameters(params: &Parameters) -> Result<Self> {
        Ok(Self {
            subset: param_opt(params, "subset")?,
            keep: param_opt(params, "keep")?.unwrap_or_default(),
        })
    }
}

impl Transform for DropDuplicatesTransform {
    fn apply(&self, table: &Table) -> Result<TransformOutcome> {
        let columns = match &self.subset {
            Some(subset) if !subset.is_empty() => subset.clone(),
            _ => table.column_names(),
        };
        let keep: Vec<bool> = duplicated(table, &columns, self.keep)?
            .iter()
            .map(|d| !d)
            .collect();
        let removed = keep.iter().filter(|k| !**k).count();
        Ok(TransformOutcome::new(
            table.filter_rows(&keep)?,
            format!("Removed {removed} duplicate rows"),
        ))
    }

    fn name(&self) -> &'static str {
        "drop_duplicates"
    }

    fn parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        if let Some(subset) = &self.subset {
            params.insert("subset".to_owned(), to_param(subset));
        }
        params.insert("keep".to_owned(), to_param(&self.keep));
        params
    }

    fn description(&self) -> String {
        match &self.subset {
            Some(subset) if !subset.is_empty() => {
                format!("Drop duplicates over {}", subset.join(", "))
            }
            _ => "Drop duplicate rows".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use polars::prelude::*;

    fn sample() -> Result<Table> {
        Ok(Table::new(df!(
            "k" => &[Some("a"), Some("b"), Some("a"), None, None, Some("a")],
            "v" => &[1, 2, 1, 3, 3, 9]
        )?))
    }

    #[test]
    fn test_keep_first() -> Result<()> {
        let out = DropDuplicatesTransform::default().apply(&sample()?)?;
        assert_eq!(out.table.row_ids(), &[0, 1, 3, 5]);
        assert_eq!(out.message, "Removed 2 duplicate rows");
        Ok(())
    }

    #[test]
    fn test_keep_last_on_subset() -> Result<()> {
        let out = DropDuplicatesTransform::new(Some(vec!["k".to_owned()]), DuplicateKeep::Last)
            .apply(&sample()?)?;
        assert_eq!(out.table.row_ids(), &[1, 4, 5]);
        Ok(())
    }

    #[test]
    fn test_keep_none() -> Result<()> {
        let out = DropDuplicatesTransform::new(None, DuplicateKeep::None).apply(&sample()?)?;
        assert_eq!(out.table.row_ids(), &[1, 5]);
        Ok(())
    }

    #[test]
    fn test_no_duplicates_on_distinct_rows() -> Result<()> {
        let t = Table::new(df!(
            "A" => &[Some(1.0), Some(2.0), None, Some(4.0)],
            "B" => &["x", "y", "x", "y"]
        )?);
        let out = DropDuplicatesTransform::default().apply(&t)?;
        assert_eq!(out.table.height(), 4);
        Ok(())
    }

    #[test]
    fn test_duplicated_flags() -> Result<()> {
        let t = Table::new(df!("k" => &[1, 2, 1, 1])?);
        let columns = vec!["k".to_owned()];
        assert_eq!(
            duplicated(&t, &columns, DuplicateKeep::First)?,
            vec![false, false, true, true]
        );
        assert_eq!(
            duplicated(&t, &columns, DuplicateKeep::Last)?,
            vec![true, false, true, false]
        );
        assert_eq!(
            duplicated(&t, &columns, DuplicateKeep::None)?,
            vec![true, false, true, true]
        );
        Ok(())
    }

    #[test]
    fn test_large_ids_are_not_duplicates() -> Result<()> {
        let t = Table::new(df!("id" => &[12_345_678_901_234_567i64, 12_345_678_901_234_568])?);
        let out = DropDuplicatesTransform::default().apply(&t)?;
        assert_eq!(out.table.height(), 2);
        assert_eq!(out.message, "Removed 0 duplicate rows");
        Ok(())
    }

    #[test]
    fn test_position_column_name_does_not_clash() -> Result<()> {
        let t = Table::new(df!("__position" => &[7, 7, 8])?);
        let flags = duplicated(&t, &["__position".to_owned()], DuplicateKeep::First)?;
        assert_eq!(flags, vec![false, true, false]);
        Ok(())
    }
}
