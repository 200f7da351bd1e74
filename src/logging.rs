//! Logging setup for the tablescope binary.
//!
//! Console output goes to stderr so command reports on stdout stay clean.
//! Two rolling files are written to the log directory:
//! - `tablescope.<date>.log`: everything that passes the env filter
//! - `error.<date>.log`: warnings and errors only
//!
//! ```no_run
//! tablescope::logging::init(None).expect("Failed to initialize logging");
//! tracing::info!("ready");
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

/// Default log directory
///
/// - Windows: `%APPDATA%/tablescope/logs`
/// - macOS: `~/Library/Application Support/tablescope/logs`
/// - Linux: `~/.local/share/tablescope/logs`
pub fn get_log_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().context("Failed to determine data directory")?;
    Ok(base_dir.join("tablescope").join("logs"))
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
    }
    Ok(())
}

/// `RUST_LOG` directives when given and valid, `info` otherwise. Applies to every output.
fn env_filter(directives: Option<&str>) -> Result<EnvFilter> {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .map_or_else(|| EnvFilter::try_new("info"), Ok)
        .context("Failed to create env filter")
}

/// Install the global subscriber.
///
/// `log_dir` overrides [`get_log_dir`]. The filter defaults to `info` and
/// honours `RUST_LOG`.
///
/// # Errors
///
/// Returns error if the log directory cannot be created or file appenders fail.
pub fn init(log_dir: Option<&Path>) -> Result<()> {
    let log_dir = match log_dir {
        Some(dir) => dir.to_path_buf(),
        None => get_log_dir()?,
    };
    ensure_dir(&log_dir)?;

    let all_logs_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix("tablescope")
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create all-logs file appender")?;

    let error_logs_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix("error")
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create error-logs file appender")?;

    let env_filter = env_filter(std::env::var("RUST_LOG").ok().as_deref())?;

    let console_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(all_logs_appender);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(error_logs_appender)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(all_logs_layer)
        .with(error_logs_layer)
        .init();

    tracing::info!("Logging initialized, log directory: {}", log_dir.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_log_dir() -> Result<()> {
        let log_dir = get_log_dir()?;
        assert!(log_dir.ends_with("tablescope/logs") || log_dir.ends_with("tablescope\\logs"));
        Ok(())
    }

    #[test]
    fn test_env_filter_follows_rust_log() -> Result<()> {
        use tracing_subscriber::filter::LevelFilter;

        assert_eq!(env_filter(None)?.max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(
            env_filter(Some("debug"))?.max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
        assert_eq!(
            env_filter(Some("tablescope=notalevel"))?.max_level_hint(),
            Some(LevelFilter::INFO)
        );
        Ok(())
    }

    #[test]
    fn test_ensure_dir_creates_nested() -> Result<()> {
        let dir = std::env::temp_dir()
            .join(format!("tablescope-logs-{}", uuid::Uuid::new_v4()))
            .join("nested");
        ensure_dir(&dir)?;
        assert!(dir.is_dir());
        if let Some(parent) = dir.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
        Ok(())
    }
}
