//! Command implementations for triage CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod chat;
pub mod knowledge;
pub mod validate;

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use triage_sdk::TriageConfig;

/// Steady spinner shown while waiting on the model.
pub(crate) fn spinner(message: &str) -> Result<ProgressBar> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .context("Invalid spinner template")?,
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    Ok(bar)
}

/// Print the effective configuration with the API key masked.
pub fn show_config(config: &TriageConfig) -> Result<()> {
    let mut shown = config.clone();
    if let Some(ref key) = shown.model.api_key {
        let visible: String = key.chars().take(6).collect();
        shown.model.api_key = Some(format!("{}…", visible));
    }

    println!("{} {}", "Config file:".bold(), crate::config::config_path().display());
    println!();
    println!(
        "{}",
        toml::to_string_pretty(&shown).context("Failed to serialize config")?
    );
    Ok(())
}
