//! One interactive session: the uploaded table, the working copy, and the log.
//!
//! A session holds two tables. `original` is set once per upload and never
//! touched by operations; `current` starts as a copy of it and is replaced by
//! every applied transform. Failed operations leave both tables as they were.

use super::classify::{ColumnClassification, classify};
use super::io;
use super::oplog::{OperationLog, OperationStatus, Shape};
use super::stats::TableComparison;
use super::table::Table;
use super::transforms::{LabelEncoding, Transform, TransformPipeline, TransformSpec};
use crate::config::ExplorerSettings;
use crate::error::{ExplorerError, Result};
use uuid::Uuid;

/// What an upload did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// A new table replaced whatever the session held.
    Loaded {
        rows: usize,
        columns: usize,
        /// Text columns converted to numeric while loading
        converted: Vec<String>,
    },
    /// Same file name as the active upload; nothing was reloaded.
    Unchanged,
}

/// A transform that went through, with the snapshots on either side.
#[derive(Debug, Clone)]
pub struct AppliedTransform {
    pub name: &'static str,
    /// What the transform was asked to do
    pub description: String,
    /// What it actually did
    pub message: String,
    pub warnings: Vec<String>,
    pub encodings: Vec<LabelEncoding>,
    pub before: Table,
    pub after: Table,
    pub comparison: TableComparison,
}

/// A pipeline step that was rejected; the steps before it stay applied.
#[derive(Debug)]
pub struct RejectedStep {
    pub index: usize,
    pub transform_type: String,
    pub error: ExplorerError,
}

#[derive(Debug, Default)]
pub struct PipelineRun {
    pub applied: Vec<AppliedTransform>,
    pub rejected: Option<RejectedStep>,
}

impl PipelineRun {
    pub fn is_complete(&self) -> bool {
        self.rejected.is_none()
    }
}

fn shape_of(table: Option<&Table>) -> Shape {
    table.map_or_else(Shape::default, |t| Shape {
        rows: t.height(),
        columns: t.width(),
    })
}

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    settings: ExplorerSettings,
    source_name: Option<String>,
    original: Option<Table>,
    current: Option<Table>,
    log: OperationLog,
}

impl Session {
    pub fn new(settings: ExplorerSettings) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(%id, "Session created");
        Self {
            id,
            settings,
            source_name: None,
            original: None,
            current: None,
            log: OperationLog::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn settings(&self) -> &ExplorerSettings {
        &self.settings
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    pub fn has_dataset(&self) -> bool {
        self.current.is_some()
    }

    pub fn original(&self) -> Option<&Table> {
        self.original.as_ref()
    }

    /// # Errors
    ///
    /// [`ExplorerError::NoDataset`] before the first upload.
    pub fn current(&self) -> Result<&Table> {
        self.current.as_ref().ok_or(ExplorerError::NoDataset)
    }

    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    /// Load `bytes` unless `name` is already the active upload.
    ///
    /// # Errors
    ///
    /// [`ExplorerError::Parse`] for unusable input; the session keeps its
    /// previous tables.
    pub fn upload(&mut self, name: &str, bytes: &[u8]) -> Result<UploadOutcome> {
        if self.current.is_some() && self.source_name.as_deref() == Some(name) {
            return Ok(UploadOutcome::Unchanged);
        }

        let before = shape_of(self.current.as_ref());
        let loaded = match io::load(bytes, &self.settings) {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(file = name, "Upload rejected: {e}");
                self.log.record(
                    "upload",
                    format!("{name}: {e}"),
                    OperationStatus::Rejected,
                    before,
                    before,
                );
                return Err(e);
            }
        };

        let outcome = UploadOutcome::Loaded {
            rows: loaded.table.height(),
            columns: loaded.table.width(),
            converted: loaded.converted,
        };
        let after = self.install(loaded.table);
        self.source_name = Some(name.to_owned());
        self.log
            .record("upload", name, OperationStatus::Applied, before, after);
        tracing::info!(session = %self.id, file = name, "Dataset uploaded");
        Ok(outcome)
    }

    /// Install `table` as both original and working copy, with fresh 0-based row labels.
    pub fn replace(&mut self, table: Table) {
        let before = shape_of(self.current.as_ref());
        let after = self.install(table);
        self.log.record(
            "replace",
            "Dataset replaced",
            OperationStatus::Applied,
            before,
            after,
        );
    }

    fn install(&mut self, table: Table) -> Shape {
        let table = table.resequenced();
        let shape = shape_of(Some(&table));
        self.original = Some(table.clone());
        self.current = Some(table);
        shape
    }

    /// Forget the upload: both tables and the file name are cleared.
    pub fn remove_upload(&mut self) {
        let before = shape_of(self.current.as_ref());
        self.original = None;
        self.current = None;
        self.source_name = None;
        self.log.record(
            "remove_upload",
            "Upload removed",
            OperationStatus::Applied,
            before,
            Shape::default(),
        );
        tracing::info!(session = %self.id, "Upload removed");
    }

    /// Discard every change: `current` becomes a fresh copy of `original`.
    ///
    /// # Errors
    ///
    /// [`ExplorerError::NoDataset`] before the first upload.
    pub fn reset(&mut self) -> Result<()> {
        let original = self.original.as_ref().ok_or(ExplorerError::NoDataset)?;
        let before = shape_of(self.current.as_ref());
        let restored = original.resequenced();
        let after = shape_of(Some(&restored));
        self.current = Some(restored);
        self.log
            .record("reset", "Reset to original", OperationStatus::Applied, before, after);
        tracing::info!(session = %self.id, "Reset to original");
        Ok(())
    }

    /// Run one transform against `current`.
    ///
    /// # Errors
    ///
    /// [`ExplorerError::NoDataset`], or whatever the transform rejected; either
    /// way `current` is unchanged.
    pub fn apply(&mut self, transform: &dyn Transform) -> Result<AppliedTransform> {
        let before = self.current()?.clone();
        let shape_before = shape_of(Some(&before));

        let configured = transform.configured(&self.settings);
        let transform: &dyn Transform = match &configured {
            Some(configured) => configured.as_ref(),
            None => transform,
        };
        let description = transform.description();
        tracing::debug!(operation = transform.name(), "{description}");

        let outcome = match transform.apply(&before) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(operation = transform.name(), "Operation rejected: {e}");
                self.log.record(
                    transform.name(),
                    e.to_string(),
                    OperationStatus::Rejected,
                    shape_before,
                    shape_before,
                );
                return Err(e);
            }
        };

        for warning in &outcome.warnings {
            tracing::warn!(operation = transform.name(), "{warning}");
        }
        let comparison = TableComparison::between(&before, &outcome.table)?;
        let after = outcome.table;
        self.current = Some(after.clone());
        self.log.record(
            transform.name(),
            outcome.message.clone(),
            OperationStatus::Applied,
            shape_before,
            shape_of(Some(&after)),
        );
        tracing::info!(
            operation = transform.name(),
            description = %description,
            "{}",
            outcome.message
        );

        Ok(AppliedTransform {
            name: transform.name(),
            description,
            message: outcome.message,
            warnings: outcome.warnings,
            encodings: outcome.encodings,
            before,
            after,
            comparison,
        })
    }

    /// Instantiate and run a serialized transform.
    ///
    /// # Errors
    ///
    /// As [`Session::apply`], plus unknown types and malformed parameters.
    pub fn apply_spec(&mut self, spec: &TransformSpec) -> Result<AppliedTransform> {
        let shape = shape_of(Some(self.current()?));
        let transform = match spec.instantiate() {
            Ok(transform) => transform,
            Err(e) => {
                tracing::warn!(operation = %spec.transform_type, "Operation rejected: {e}");
                self.log.record(
                    spec.transform_type.clone(),
                    e.to_string(),
                    OperationStatus::Rejected,
                    shape,
                    shape,
                );
                return Err(e);
            }
        };
        self.apply(transform.as_ref())
    }

    /// Apply the steps of `pipeline` in order, stopping at the first rejected step.
    ///
    /// # Errors
    ///
    /// [`ExplorerError::NoDataset`] only; step failures are reported in the run.
    pub fn apply_pipeline(&mut self, pipeline: &TransformPipeline) -> Result<PipelineRun> {
        self.current()?;
        let mut run = PipelineRun::default();
        for (index, spec) in pipeline.iter().enumerate() {
            match self.apply_spec(spec) {
                Ok(applied) => run.applied.push(applied),
                Err(error) => {
                    run.rejected = Some(RejectedStep {
                        index,
                        transform_type: spec.transform_type.clone(),
                        error,
                    });
                    break;
                }
            }
        }
        Ok(run)
    }

    /// Replace `current` with a user-edited copy, keeping the copy's row labels.
    ///
    /// Returns `false` when the copy has the same content as `current`.
    ///
    /// # Errors
    ///
    /// [`ExplorerError::NoDataset`] before the first upload.
    pub fn commit_edits(&mut self, edited: Table) -> Result<bool> {
        let current = self.current()?;
        if current.same_content(&edited) {
            return Ok(false);
        }
        let before = shape_of(Some(current));
        let after = shape_of(Some(&edited));
        self.current = Some(edited);
        self.log.record(
            "commit_edits",
            "Edited table committed",
            OperationStatus::Applied,
            before,
            after,
        );
        tracing::info!(session = %self.id, "Edits committed");
        Ok(true)
    }

    /// Column classes of `current`, computed fresh on every call.
    ///
    /// # Errors
    ///
    /// [`ExplorerError::NoDataset`] before the first upload.
    pub fn classification(&self) -> Result<ColumnClassification> {
        classify(self.current()?, &self.settings.classifier)
    }

    /// Overview deltas between `original` and `current`.
    ///
    /// # Errors
    ///
    /// [`ExplorerError::NoDataset`] before the first upload.
    pub fn compare_with_original(&self) -> Result<TableComparison> {
        let original = self.original.as_ref().ok_or(ExplorerError::NoDataset)?;
        TableComparison::between(original, self.current()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::transforms::{
        FillMethod, FillMissingTransform, LabelEncodeTransform, NormalizeMissingTransform,
        ReplaceValueTransform, RowAction, SelectRowsTransform,
    };
    use anyhow::Result;

    const CSV: &[u8] = b"A,B\n1,x\n2,y\n?,x\n4,y\n";

    fn loaded() -> Result<Session> {
        let mut session = Session::new(ExplorerSettings::default());
        session.upload("data.csv", CSV)?;
        Ok(session)
    }

    #[test]
    fn test_operations_need_a_dataset() {
        let mut session = Session::new(ExplorerSettings::default());
        assert!(matches!(session.current(), Err(ExplorerError::NoDataset)));
        assert!(matches!(session.reset(), Err(ExplorerError::NoDataset)));
        let result = session.apply(&LabelEncodeTransform::new(vec!["B".to_owned()]));
        assert!(matches!(result, Err(ExplorerError::NoDataset)));
    }

    #[test]
    fn test_normalize_uses_configured_tokens() -> Result<()> {
        let mut settings = ExplorerSettings::default();
        settings.missing_tokens.push("--".to_owned());
        let mut session = Session::new(settings);
        session.upload("data.csv", CSV)?;
        session.apply(&ReplaceValueTransform::new("B", "y", "--"))?;
        assert_eq!(session.current()?.missing_cells()?, 1);

        let applied = session.apply(&NormalizeMissingTransform::default())?;
        assert_eq!(applied.message, "Marked 2 cells as missing");
        assert_eq!(applied.description, "Normalize 10 missing markers");
        assert_eq!(session.current()?.missing_cells()?, 3);

        session.apply(&ReplaceValueTransform::new("B", "x", "--"))?;
        let pipeline = TransformPipeline::from_json(
            r#"[{"transform_type": "normalize_missing", "parameters": {}}]"#,
        )?;
        let run = session.apply_pipeline(&pipeline)?;
        assert_eq!(run.applied[0].message, "Marked 2 cells as missing");
        Ok(())
    }

    #[test]
    fn test_explicit_tokens_are_kept() -> Result<()> {
        let mut session = loaded()?;
        let applied = session.apply(&NormalizeMissingTransform::new(vec!["x".to_owned()]))?;
        assert_eq!(applied.message, "Marked 2 cells as missing");
        assert_eq!(applied.description, "Normalize 1 missing markers");
        Ok(())
    }

    #[test]
    fn test_same_name_upload_is_unchanged() -> Result<()> {
        let mut session = loaded()?;
        session.apply(&SelectRowsTransform::new("0", RowAction::Drop))?;
        assert_eq!(session.upload("data.csv", CSV)?, UploadOutcome::Unchanged);
        assert_eq!(session.current()?.height(), 3);

        let outcome = session.upload("other.csv", b"q\n1\n")?;
        assert!(matches!(outcome, UploadOutcome::Loaded { rows: 1, .. }));
        assert_eq!(session.source_name(), Some("other.csv"));
        Ok(())
    }

    #[test]
    fn test_failed_upload_keeps_previous_tables() -> Result<()> {
        let mut session = loaded()?;
        assert!(session.upload("empty.csv", b"").is_err());
        assert_eq!(session.current()?.height(), 4);
        assert_eq!(session.source_name(), Some("data.csv"));
        Ok(())
    }

    #[test]
    fn test_apply_keeps_gaps_and_reset_resequences() -> Result<()> {
        let mut session = loaded()?;
        let applied = session.apply(&SelectRowsTransform::new("1", RowAction::Drop))?;
        assert_eq!(applied.after.row_ids(), &[0, 2, 3]);
        assert_eq!(applied.comparison.rows_delta(), -1);
        assert_eq!(session.original().map(Table::height), Some(4));

        session.reset()?;
        let current = session.current()?;
        assert_eq!(current.row_ids(), &[0, 1, 2, 3]);
        assert!(session.original().is_some_and(|o| o.same_content(current)));
        Ok(())
    }

    #[test]
    fn test_rejected_operation_changes_nothing_and_is_logged() -> Result<()> {
        let mut session = loaded()?;
        let before = session.current()?.clone();
        let err = session
            .apply(&FillMissingTransform::new("B".to_owned(), FillMethod::Mean))
            .unwrap_err();
        assert!(err.is_operation());
        assert!(session.current()?.same_content(&before));
        assert_eq!(
            session.log().last().map(|e| e.status),
            Some(OperationStatus::Rejected)
        );
        Ok(())
    }

    #[test]
    fn test_classification_follows_transforms() -> Result<()> {
        let mut session = loaded()?;
        assert!(session.classification()?.is_categorical("B"));
        session.apply(&LabelEncodeTransform::new(vec!["B".to_owned()]))?;
        assert!(session.classification()?.is_numeric("B"));
        Ok(())
    }

    #[test]
    fn test_commit_edits() -> Result<()> {
        let mut session = loaded()?;
        let same = session.current()?.clone();
        assert!(!session.commit_edits(same)?);

        let edited = session.current()?.filter_rows(&[true, true, false, true])?;
        assert!(session.commit_edits(edited)?);
        assert_eq!(session.current()?.row_ids(), &[0, 1, 3]);
        Ok(())
    }

    #[test]
    fn test_pipeline_stops_at_rejected_step() -> Result<()> {
        let mut session = loaded()?;
        let pipeline = TransformPipeline::from_json(
            r#"[
                {"transform_type": "fill_missing",
                 "parameters": {"column": "A", "method": "median"}},
                {"transform_type": "select_columns", "parameters": {"columns": ["Z"]}},
                {"transform_type": "one_hot", "parameters": {"columns": ["B"]}}
            ]"#,
        )?;
        let run = session.apply_pipeline(&pipeline)?;
        assert_eq!(run.applied.len(), 1);
        let rejected = run.rejected.as_ref().map(|r| (r.index, r.transform_type.as_str()));
        assert_eq!(rejected, Some((1, "select_columns")));
        assert_eq!(session.current()?.missing_cells()?, 0);
        assert_eq!(session.current()?.column_names(), vec!["A", "B"]);
        Ok(())
    }

    #[test]
    fn test_remove_upload() -> Result<()> {
        let mut session = loaded()?;
        session.remove_upload();
        assert!(!session.has_dataset());
        assert!(session.original().is_none());
        assert_eq!(session.source_name(), None);
        Ok(())
    }
}
