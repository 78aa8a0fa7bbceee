//! Symptom Triage SDK
//!
//! Everything a front end needs to run a triage conversation and act on it:
//!
//! - **config** - `TriageConfig`, prompts and thresholds
//! - **client** - HTTP chat model implementing `TextGenerator`
//! - **embeddings** - local fastembed model implementing `Embedder`
//! - **report** - session report persistence
//! - **sdk** - the `Triage` facade: chat, summarize, retrieve,
//!   generate_report, validate_and_store, assess
//!
//! # Example
//!
//! ```rust,no_run
//! use triage_sdk::{Triage, TriageConfig};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let triage = Triage::new(TriageConfig::new("knowledge.db").with_api_key("sk-..."))?;
//!
//!     triage.chat("S1", "I have a headache").await?;
//!     let outcome = triage.chat("S1", "stop").await?;
//!
//!     if let Some(transcript) = outcome.transcript {
//!         let report = triage.assess("S1", &transcript).await?;
//!         report.save_to_dir("reports")?;
//!     }
//!     Ok(())
//! }
//! ```

// ─────────────────────────────────────────────────────────────────────────────
// Re-export core modules from triage-core
// ─────────────────────────────────────────────────────────────────────────────

/// Core types (Turn, Transcript, KnowledgeDocument, etc.)
pub use triage_core::types;

/// Conversation controller
pub use triage_core::conversation;

/// Knowledge store
pub use triage_core::knowledge;

/// Error types from core
pub use triage_core::error as core_error;

// ─────────────────────────────────────────────────────────────────────────────
// SDK-specific modules
// ─────────────────────────────────────────────────────────────────────────────

pub mod client;
pub mod embeddings;
pub mod report;

mod config;
mod error;
mod sdk;

// Re-export main SDK types
pub use client::ChatModelClient;
pub use config::{
    ConfigValidationError, ConversationConfig, EmbeddingBackend, EmbeddingConfig,
    KnowledgeConfig, ModelConfig, Prompts, ReportConfig, TriageConfig,
};
pub use error::{SDKError, SDKResult};
pub use report::SessionReport;
pub use sdk::{Triage, TriageBuilder};

#[cfg(feature = "embeddings")]
pub use embeddings::FastEmbedder;
