//! Configuration management for triage.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (TRIAGE_*)
//! 2. Config file (~/.triage/config.toml, or TRIAGE_CONFIG)
//! 3. Default values

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use triage_sdk::TriageConfig;

/// Base directory for triage data
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".triage")
}

/// Get the config file path.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("TRIAGE_CONFIG") {
        PathBuf::from(path)
    } else {
        data_dir().join("config.toml")
    }
}

/// Defaults with database and reports under the data directory
pub fn default_config(data_dir: &Path) -> TriageConfig {
    TriageConfig::new(data_dir.join("knowledge.db")).with_report_dir(data_dir.join("reports"))
}

/// Load configuration from file and environment.
pub fn load() -> Result<TriageConfig> {
    let config = load_from(&config_path(), &data_dir())?;
    let config = apply_env(config, |key| std::env::var(key).ok());
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Read the config file at `path`, or fall back to defaults when absent.
pub fn load_from(path: &Path, data_dir: &Path) -> Result<TriageConfig> {
    if !path.exists() {
        return Ok(default_config(data_dir));
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Apply TRIAGE_* overrides. `lookup` returns the value of a variable.
pub fn apply_env(
    mut config: TriageConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> TriageConfig {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(key) = non_empty("TRIAGE_API_KEY").or_else(|| non_empty("ANTHROPIC_API_KEY")) {
        config.model.api_key = Some(key);
    }
    if let Some(path) = non_empty("TRIAGE_DATABASE_PATH") {
        config.knowledge.database_path = PathBuf::from(path);
    }
    if let Some(model) = non_empty("TRIAGE_MODEL") {
        config.model.model = model;
    }
    if let Some(url) = non_empty("TRIAGE_BASE_URL") {
        config.model.base_url = url;
    }
    if let Some(dir) = non_empty("TRIAGE_REPORT_DIR") {
        config.reports.output_dir = PathBuf::from(dir);
    }

    config
}
