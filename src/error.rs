//! Error types for tablescope.
//!
//! Two kinds of failure reach the user:
//!
//! - [`ExplorerError::Parse`]: the uploaded bytes are not a usable delimited
//!   table. The upload is rejected and the session keeps whatever it held.
//! - [`ExplorerError::Operation`]: a transform or statistic was invoked with
//!   parameters that do not fit the current table (unknown column, broken
//!   index expression, undefined statistic). The table is left unchanged.
//!
//! Neither is fatal; every failure is local to one user action.
//!
//! ```
//! use tablescope::error::{ExplorerError, OperationError};
//!
//! let err = ExplorerError::from(OperationError::UnknownColumn { name: "age".to_owned() });
//! assert_eq!(err.to_string(), "Invalid operation: column 'age' not found");
//! assert!(err.is_operation());
//! ```

use std::fmt;

/// Main error type for tablescope operations.
#[derive(Debug)]
pub enum ExplorerError {
    /// I/O errors (reading an upload, writing an export)
    Io(std::io::Error),

    /// The upload could not be parsed as a delimited table
    Parse(String),

    /// Invalid operation parameters; the table is unchanged
    Operation(OperationError),

    /// An operation needs a dataset but nothing has been uploaded
    NoDataset,

    /// Settings file problems
    Config(String),

    /// Failures inside Polars that are not attributable to user input
    DataProcessing(String),

    /// Generic error with context
    Other(String),
}

/// Why an operation was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// A named column does not exist in the table.
    UnknownColumn { name: String },
    /// A token of a row index expression is not an index or a `start-end` range.
    InvalidIndexExpression { token: String },
    /// A row selection resolved to no valid rows.
    NoRowsSelected,
    /// A row identity label is not present in the table.
    UnknownRow { row: usize },
    /// A numeric operation was requested on a non-numeric column.
    NotNumeric { column: String },
    /// A statistic has no value, e.g. the mean of a column with no numbers.
    UndefinedStatistic {
        column: String,
        statistic: &'static str,
    },
    /// Too few columns were selected.
    InsufficientColumns { min_required: usize, actual: usize },
    /// Any other malformed parameter.
    InvalidParameter(String),
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownColumn { name } => write!(f, "column '{name}' not found"),
            Self::InvalidIndexExpression { token } => {
                write!(f, "invalid row index or range '{token}'")
            }
            Self::NoRowsSelected => write!(f, "no valid rows selected"),
            Self::UnknownRow { row } => write!(f, "row {row} not present"),
            Self::NotNumeric { column } => write!(f, "column '{column}' is not numeric"),
            Self::UndefinedStatistic { column, statistic } => {
                write!(f, "{statistic} of column '{column}' is undefined")
            }
            Self::InsufficientColumns {
                min_required,
                actual,
            } => write!(f, "need at least {min_required} columns, got {actual}"),
            Self::InvalidParameter(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ExplorerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Parse(msg) => write!(f, "Could not parse upload: {msg}"),
            Self::Operation(e) => write!(f, "Invalid operation: {e}"),
            Self::NoDataset => write!(f, "No dataset loaded"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::DataProcessing(msg) => write!(f, "Data processing error: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ExplorerError {}

impl ExplorerError {
    /// True for rejected operations (the table was left unchanged).
    pub fn is_operation(&self) -> bool {
        matches!(self, Self::Operation(_))
    }

    /// True for rejected uploads.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}

impl From<OperationError> for ExplorerError {
    fn from(err: OperationError) -> Self {
        Self::Operation(err)
    }
}

impl From<std::io::Error> for ExplorerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for ExplorerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

impl From<polars::error::PolarsError> for ExplorerError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataProcessing(err.to_string())
    }
}

/// Result type alias for tablescope operations.
pub type Result<T> = std::result::Result<T, ExplorerError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<ExplorerError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: ExplorerError = e.into();
            ExplorerError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: ExplorerError = e.into();
            ExplorerError::Other(format!("{}: {}", f(), err))
        })
    }
}
