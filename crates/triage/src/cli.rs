//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Symptom Triage CLI
///
/// Talk through your symptoms, get a preliminary report, and let a
/// clinician validate it into the knowledge base.
#[derive(Parser, Debug)]
#[command(name = "triage")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive symptom conversation
    Chat {
        /// Session ID (generated when omitted)
        #[arg(short, long)]
        session: Option<String>,

        /// Skip the clinician validation prompt after the report
        #[arg(long)]
        no_validate: bool,
    },

    /// Knowledge base maintenance (count, search, ingest)
    Knowledge(KnowledgeCommand),

    /// Validate a report and store it in the knowledge base
    Validate {
        /// Saved session report (.json) or plain-text report
        path: PathBuf,

        /// Open the report in $EDITOR before validating
        #[arg(short, long)]
        edit: bool,
    },

    /// Show the effective configuration
    Config,

    /// Show version information
    Version,
}

#[derive(Args, Debug)]
pub struct KnowledgeCommand {
    #[command(subcommand)]
    pub action: KnowledgeAction,
}

#[derive(Subcommand, Debug)]
pub enum KnowledgeAction {
    /// Count indexed documents by provenance
    Count,

    /// Find the documents most similar to a query
    Search {
        /// Query text
        query: String,

        /// Number of results
        #[arg(short, default_value = "1")]
        k: usize,
    },

    /// Ingest corpus rows from a JSON Lines file
    ///
    /// Each line is an object with `label` (or `disease`) and `text`
    /// (or `combined_text`).
    Ingest {
        /// Path to the .jsonl file
        path: PathBuf,

        /// Parse the file without writing anything
        #[arg(long)]
        dry_run: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat() {
        let cli = Cli::try_parse_from(["triage", "chat", "--session", "S1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Chat { session: Some(ref s), no_validate: false } if s == "S1"
        ));
    }

    #[test]
    fn test_parse_knowledge_search() {
        let cli = Cli::try_parse_from(["triage", "knowledge", "search", "headache", "-k", "3"])
            .unwrap();
        match cli.command {
            Commands::Knowledge(KnowledgeCommand {
                action: KnowledgeAction::Search { query, k },
            }) => {
                assert_eq!(query, "headache");
                assert_eq!(k, 3);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_search_defaults_to_one_result() {
        let cli = Cli::try_parse_from(["triage", "knowledge", "search", "fever"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Knowledge(KnowledgeCommand {
                action: KnowledgeAction::Search { k: 1, .. }
            })
        ));
    }
}
