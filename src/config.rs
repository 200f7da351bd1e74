//! User settings, stored as JSON.

use crate::error::{ExplorerError, Result};
use crate::explorer::classify::ClassifierConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Literal cell values read as "missing" when no settings file overrides them.
/// Whitespace-only cells are always missing regardless of this list.
pub const DEFAULT_MISSING_TOKENS: [&str; 9] =
    ["?", "NA", "N/A", "null", "NULL", "", "nan", "NaN", "missing"];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ExplorerSettings {
    /// Literal tokens treated as missing values on load and by missing-data normalization
    pub missing_tokens: Vec<String>,
    /// Numeric/categorical heuristic for textual columns
    pub classifier: ClassifierConfig,
    /// Categorical columns with more distinct values than this are not offered as filters
    pub filter_max_unique: usize,
    /// How many row labels the missing-data report lists per column
    pub missing_preview_limit: usize,
    /// How many pairs the "strongest correlations" ranking keeps
    pub strongest_pairs_limit: usize,
    /// Default histogram bin count (10..=100)
    pub histogram_bins: usize,
    /// Rows per page in previews
    pub page_size: usize,
    /// Where rolling log files go; defaults to the platform data directory
    pub log_dir: Option<PathBuf>,
}

impl Default for ExplorerSettings {
    fn default() -> Self {
        Self {
            missing_tokens: DEFAULT_MISSING_TOKENS
                .iter()
                .map(|t| (*t).to_owned())
                .collect(),
            classifier: ClassifierConfig::default(),
            filter_max_unique: 50,
            missing_preview_limit: 20,
            strongest_pairs_limit: 10,
            histogram_bins: 30,
            page_size: 50,
            log_dir: None,
        }
    }
}

impl ExplorerSettings {
    /// Reject settings the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.classifier.categorical_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ExplorerError::Config(format!(
                "classifier.categorical_threshold must be in (0, 1], got {threshold}"
            )));
        }
        if self.classifier.sample_size == 0 {
            return Err(ExplorerError::Config(
                "classifier.sample_size must be at least 1".to_owned(),
            ));
        }
        if self.page_size == 0 {
            return Err(ExplorerError::Config(
                "page_size must be at least 1".to_owned(),
            ));
        }
        if !(10..=100).contains(&self.histogram_bins) {
            return Err(ExplorerError::Config(format!(
                "histogram_bins must be between 10 and 100, got {}",
                self.histogram_bins
            )));
        }
        Ok(())
    }

    /// True when `value` is one of the configured missing tokens or whitespace-only.
    pub fn is_missing_token(&self, value: &str) -> bool {
        value.trim().is_empty() || self.missing_tokens.iter().any(|t| t == value)
    }
}

pub fn get_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tablescope").join("config.json"))
}

/// Load settings from `path`, or from the default location when `path` is `None`.
///
/// An explicit path must exist and parse. The default location is optional:
/// when it is absent or unreadable the built-in defaults are used.
///
/// # Errors
///
/// Returns an error if an explicit file cannot be read or parsed, or if the
/// loaded settings fail [`ExplorerSettings::validate`].
pub fn load_settings(path: Option<&Path>) -> Result<ExplorerSettings> {
    let settings = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                ExplorerError::Config(format!("cannot read {}: {e}", path.display()))
            })?;
            serde_json::from_str::<ExplorerSettings>(&content)?
        }
        None => match get_config_path().filter(|p| p.exists()) {
            Some(path) => read_default_settings(&path),
            None => ExplorerSettings::default(),
        },
    };
    settings.validate()?;
    Ok(settings)
}

/// The default config file is optional, so problems with it fall back to defaults.
fn read_default_settings(path: &Path) -> ExplorerSettings {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Failed to read config {}: {e}; using defaults", path.display());
            return ExplorerSettings::default();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!("Malformed config {}: {e}; using defaults", path.display());
        ExplorerSettings::default()
    })
}

/// # Errors
///
/// Returns an error if the parent directory cannot be created or the file written.
pub fn save_settings(settings: &ExplorerSettings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, content)?;
    Ok(())
}
