//! # Tablescope command-line entry point
//!
//! ```text
//! main()
//!   │
//!   ├─> Parse CLI arguments (clap)
//!   ├─> Load settings (--config or the platform default)
//!   ├─> Initialize logging (stderr + rolling files)
//!   └─> Run the command
//! ```
//!
//! ```bash
//! tablescope summary data.csv
//! tablescope process data.csv --pipeline steps.json --page 2
//! ```

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout)] // Command reports go to stdout

mod cli;

use anyhow::{Context as _, Result};
use clap::Parser as _;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let settings = tablescope::config::load_settings(cli.config.as_deref())
        .context("Failed to load settings")?;
    tablescope::logging::init(settings.log_dir.as_deref())?;

    cli::run_command(cli.command, &settings)
}
