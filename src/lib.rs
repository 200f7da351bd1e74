//! # Tablescope - Interactive Tabular Data Exploration
//!
//! Tablescope loads a delimited text table, keeps an untouched original next
//! to a working copy, and applies cleaning, selection and encoding operations
//! to the working copy one at a time. Descriptive statistics, correlations,
//! filtered views and Plotly charts are computed from the working copy on
//! demand.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tablescope::config::ExplorerSettings;
//! use tablescope::explorer::Session;
//! use tablescope::explorer::transforms::{FillMethod, FillMissingTransform};
//!
//! # fn example() -> anyhow::Result<()> {
//! let mut session = Session::new(ExplorerSettings::default());
//! session.upload("data.csv", &std::fs::read("data.csv")?)?;
//!
//! let applied = session.apply(&FillMissingTransform::new("age".to_owned(), FillMethod::Median))?;
//! println!("{}", applied.message);
//!
//! // The original is still there
//! session.reset()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`explorer`]: the engine
//!   - [`explorer::session`]: original/current lifecycle and operation log
//!   - [`explorer::transforms`]: every operation, plus JSON pipelines
//!   - [`explorer::stats`]: summaries, overview, missing-data report
//! - [`config`]: user settings
//! - [`error`]: error types and handling utilities
//! - [`logging`]: tracing subscriber setup
//!
//! ## Row Identity
//!
//! Every row carries a label assigned at load time (0, 1, 2, ...). Operations
//! that drop rows keep the surviving labels, so gaps appear; resetting to the
//! original re-sequences them. Row selection expressions like `0,2-4` and
//! cell edits address rows by position and label respectively.

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod explorer;
pub mod logging;
