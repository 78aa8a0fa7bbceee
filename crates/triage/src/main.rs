//! triage - Symptom Triage CLI
//!
//! Guided symptom intake in the terminal, followed by an assessment report
//! that a clinician can validate into the knowledge base.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("triage=info".parse()?))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = config::load()?;

    // Execute command
    match cli.command {
        Commands::Chat { session, no_validate } => {
            commands::chat::execute(session, no_validate, &config).await
        }
        Commands::Knowledge(cmd) => commands::knowledge::execute(cmd, &config).await,
        Commands::Validate { path, edit } => {
            commands::validate::execute(&path, edit, &config).await
        }
        Commands::Config => commands::show_config(&config),
        Commands::Version => {
            println!("triage {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
