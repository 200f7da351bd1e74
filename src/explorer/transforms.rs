//! Transform trait and pipeline for serializable table operations.
//!
//! Every operation the user can trigger is a [`Transform`]: it reads the
//! current [`Table`] and returns a new one, or fails and leaves the input
//! untouched. Transforms round-trip through [`TransformSpec`] so a sequence of
//! them can be stored as a JSON [`TransformPipeline`] and replayed.

mod columns;
mod duplicates;
mod encoding;
mod missing;
mod rows;
mod scaling;
mod values;

pub use columns::{ColumnAction, DropColumnsTransform, SelectColumnsTransform};
pub use duplicates::{DropDuplicatesTransform, DuplicateKeep, duplicated};
pub use encoding::{
    BinaryEncodeTransform, LabelEncodeTransform, LabelEncoding, OneHotTransform, fit_labels,
};
pub use missing::{
    DropMissingRowsTransform, FillMethod, FillMissingTransform, NormalizeMissingTransform,
};
pub use rows::{IndexSelection, RowAction, SelectRowsTransform, parse_index_expression};
pub use scaling::{ScaleMethod, ScaleTransform};
pub use values::{CellEdit, ConvertTypesTransform, ReplaceValueTransform, SetCellsTransform};

use super::table::Table;
use crate::config::ExplorerSettings;
use crate::error::{OperationError, Result, ResultExt as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type Parameters = HashMap<String, serde_json::Value>;

/// Trait for all table operations.
/// Each transform must be:
/// - Serializable (to/from a [`TransformSpec`])
/// - Parameterized (all params in a `HashMap`)
/// - Deterministic (same input + params = same output)
/// - All or nothing: an `Err` means the input table is the result
pub trait Transform: Send + Sync {
    /// Apply this transform to a table snapshot
    fn apply(&self, table: &Table) -> Result<TransformOutcome>;

    /// Get the name of this transform
    fn name(&self) -> &'static str;

    /// Serialize parameters to JSON-compatible map
    fn parameters(&self) -> Parameters;

    /// Create a summary of what this transform does
    fn description(&self) -> String;

    /// A copy that picks up session settings, for transforms left unconfigured.
    fn configured(&self, _settings: &ExplorerSettings) -> Option<Box<dyn Transform>> {
        None
    }

    fn to_spec(&self) -> TransformSpec {
        TransformSpec {
            transform_type: self.name().to_owned(),
            parameters: self.parameters(),
        }
    }
}

/// Result of a successful transform.
#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub table: Table,
    /// User-facing summary, e.g. "Replaced 3 occurrences".
    pub message: String,
    /// Non-fatal problems, e.g. dropped out-of-range row indices.
    pub warnings: Vec<String>,
    /// Class orders produced by label and binary encoding.
    pub encodings: Vec<LabelEncoding>,
}

impl TransformOutcome {
    pub fn new(table: Table, message: impl Into<String>) -> Self {
        Self {
            table,
            message: message.into(),
            warnings: Vec::new(),
            encodings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    #[must_use]
    pub fn with_encodings(mut self, encodings: Vec<LabelEncoding>) -> Self {
        self.encodings = encodings;
        self
    }
}

/// Serializable specification of a transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSpec {
    pub transform_type: String,
    #[serde(default)]
    pub parameters: Parameters,
}

impl TransformSpec {
    pub fn new(transform_type: &str, parameters: Parameters) -> Self {
        Self {
            transform_type: transform_type.to_owned(),
            parameters,
        }
    }

    /// # Errors
    ///
    /// Unknown transform type or malformed parameters.
    pub fn instantiate(&self) -> Result<Box<dyn Transform>> {
        instantiate_transform(self)
    }
}

/// A pipeline of transforms applied sequentially
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformPipeline {
    transforms: Vec<TransformSpec>,
}

impl TransformPipeline {
    pub fn empty() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    pub fn new(transforms: Vec<TransformSpec>) -> Self {
        Self { transforms }
    }

    pub fn add(&mut self, spec: TransformSpec) {
        self.transforms.push(spec);
    }

    /// Apply all transforms in sequence, outside of any session.
    ///
    /// # Errors
    ///
    /// The first step that cannot be instantiated or applied.
    pub fn apply(&self, table: &Table) -> Result<Table> {
        let mut result = table.clone();

        for (idx, spec) in self.transforms.iter().enumerate() {
            let transform = instantiate_transform(spec).with_context(|| {
                format!(
                    "Failed to instantiate transform {}: {}",
                    idx, spec.transform_type
                )
            })?;

            result = transform
                .apply(&result)
                .with_context(|| {
                    format!("Failed to apply transform {}: {}", idx, spec.transform_type)
                })?
                .table;
        }

        Ok(result)
    }

    /// # Errors
    ///
    /// Serialization failures.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Accepts either `{"transforms": [...]}` or a bare list of specs.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is neither form.
    pub fn from_json(json: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum PipelineFile {
            Wrapped { transforms: Vec<TransformSpec> },
            Bare(Vec<TransformSpec>),
        }

        let file: PipelineFile =
            serde_json::from_str(json).context("Failed to deserialize pipeline")?;
        Ok(match file {
            PipelineFile::Wrapped { transforms } | PipelineFile::Bare(transforms) => {
                Self { transforms }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransformSpec> {
        self.transforms.iter()
    }
}

/// Instantiate a concrete transform from a spec
///
/// # Errors
///
/// [`OperationError::InvalidParameter`] for an unknown type or bad parameters.
pub fn instantiate_transform(spec: &TransformSpec) -> Result<Box<dyn Transform>> {
    let params = &spec.parameters;
    match spec.transform_type.as_str() {
        "select_rows" => Ok(Box::new(SelectRowsTransform::from_parameters(params)?)),
        "select_columns" => Ok(Box::new(SelectColumnsTransform::from_parameters(params)?)),
        "drop_columns" => Ok(Box::new(DropColumnsTransform::from_parameters(params)?)),
        "set_cells" => Ok(Box::new(SetCellsTransform::from_parameters(params)?)),
        "replace_value" => Ok(Box::new(ReplaceValueTransform::from_parameters(params)?)),
        "convert_types" => Ok(Box::new(ConvertTypesTransform)),
        "scale" => Ok(Box::new(ScaleTransform::from_parameters(params)?)),
        "normalize_missing" => Ok(Box::new(NormalizeMissingTransform::from_parameters(
            params,
        )?)),
        "drop_missing_rows" => Ok(Box::new(DropMissingRowsTransform)),
        "fill_missing" => Ok(Box::new(FillMissingTransform::from_parameters(params)?)),
        "drop_duplicates" => Ok(Box::new(DropDuplicatesTransform::from_parameters(
            params,
        )?)),
        "one_hot" => Ok(Box::new(OneHotTransform::from_parameters(params)?)),
        "label_encode" => Ok(Box::new(LabelEncodeTransform::from_parameters(params)?)),
        "binary_encode" => Ok(Box::new(BinaryEncodeTransform::from_parameters(params)?)),
        other => Err(OperationError::InvalidParameter(format!(
            "unknown transform type: {other}"
        ))
        .into()),
    }
}

// ============================================================================
// Parameter helpers shared by the concrete transforms
// ============================================================================

fn required<'a>(params: &'a Parameters, key: &str) -> Result<&'a serde_json::Value> {
    params
        .get(key)
        .ok_or_else(|| {
            OperationError::InvalidParameter(format!("missing '{key}' parameter")).into()
        })
}

/// Deserialize a required parameter.
pub(crate) fn param<T: DeserializeOwned>(params: &Parameters, key: &str) -> Result<T> {
    let value = required(params, key)?;
    serde_json::from_value(value.clone()).map_err(|e| {
        OperationError::InvalidParameter(format!("invalid '{key}' parameter: {e}")).into()
    })
}

/// Deserialize an optional parameter; `null` counts as absent.
pub(crate) fn param_opt<T: DeserializeOwned>(params: &Parameters, key: &str) -> Result<Option<T>> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(_) => param(params, key).map(Some),
    }
}

pub(crate) fn to_param<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

/// Reject an empty column selection.
pub(crate) fn require_selection(columns: &[String]) -> Result<()> {
    if columns.is_empty() {
        return Err(OperationError::InvalidParameter("no columns selected".to_owned()).into());
    }
    Ok(())
}
