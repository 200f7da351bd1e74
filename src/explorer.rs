//! The exploration engine.
//!
//! - [`io`] turns uploaded bytes into a [`table::Table`].
//! - [`classify`] decides which columns are numeric and which categorical.
//! - [`transforms`] holds every cleaning and encoding operation.
//! - [`stats`] and [`correlation`] describe a table without changing it.
//! - [`filter`] builds read-only views and [`chart`] Plotly figures.
//! - [`session`] ties it together: one original table, one working copy and
//!   an [`oplog::OperationLog`].

pub mod chart;
pub mod classify;
pub mod correlation;
pub mod filter;
pub mod io;
pub mod oplog;
pub mod session;
pub mod stats;
pub mod table;
pub mod transforms;

pub use session::{AppliedTransform, PipelineRun, Session, UploadOutcome};
pub use table::Table;
