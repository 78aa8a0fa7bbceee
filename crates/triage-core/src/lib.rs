//! triage-core - Core library for the symptom triage assistant
//!
//! This crate holds the state and invariants shared by the SDK and the CLI:
//!
//! - **session**: Per-session history, rolling-summary compaction, full transcript
//! - **conversation**: Turn-taking state machine and stop detection
//! - **knowledge**: SQLite-backed embedding index with cosine k-NN search
//! - **ingest**: Clinician-validated report ingestion
//! - **llm** / **embedding**: Collaborator traits for generation and embeddings
//!
//! Model calls and embedding generation are reached only through the
//! [`llm::TextGenerator`], [`llm::Summarizer`] and [`embedding::Embedder`]
//! traits.

pub mod conversation;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod knowledge;
pub mod llm;
pub mod session;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use conversation::{ChatOutcome, ControllerConfig, ConversationController};
pub use embedding::{Embedder, HashEmbedder};
pub use error::{Error, Result};
pub use ingest::ReportValidationIngest;
pub use knowledge::KnowledgeStore;
pub use llm::{PromptedSummarizer, Summarizer, TextGenerator};
pub use session::SessionStore;
pub use types::*;
