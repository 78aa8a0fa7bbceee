//! SDK Configuration
//!
//! Defines configuration options for the triage SDK. Every section has
//! defaults, so a partial TOML file deserializes cleanly.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use triage_core::conversation::{ControllerConfig, DEFAULT_STOP_WORDS};
use triage_core::knowledge::DEFAULT_INDEX_NAME;

/// SDK configuration options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Conversation settings
    pub conversation: ConversationConfig,

    /// Knowledge store settings
    pub knowledge: KnowledgeConfig,

    /// Chat model settings
    pub model: ModelConfig,

    /// Embedding settings
    pub embedding: EmbeddingConfig,

    /// Prompt texts
    pub prompts: Prompts,

    /// Reports
    pub reports: ReportConfig,
}

/// Conversation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// History length that triggers an intermediate summary (default: 10)
    pub intermediate_summary_threshold: usize,

    /// Conversation length after which a final summary is expected (default: 20)
    pub final_summary_threshold: usize,

    /// Utterances that end the conversation
    pub stop_words: Vec<String>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            intermediate_summary_threshold: 10,
            final_summary_threshold: 20,
            stop_words: DEFAULT_STOP_WORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ConversationConfig {
    /// Settings for the core conversation controller
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            compaction_threshold: self.intermediate_summary_threshold,
            stop_words: self
                .stop_words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .collect(),
        }
    }
}

/// Knowledge store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Index name (default: "medical-embeddings")
    pub index_name: String,

    /// Advisory relevance threshold; low-scoring retrievals are logged, not dropped (default: 0.5)
    pub retrieve_threshold: f32,

    /// Documents retrieved per assessment (default: 1)
    pub top_k: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("knowledge.db"),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            retrieve_threshold: 0.5,
            top_k: 1,
        }
    }
}

/// Chat model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of the messages API
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// API key (usually supplied through the environment)
    pub api_key: Option<String>,

    /// Sampling temperature (default: 0.0)
    pub temperature: f32,

    /// Maximum tokens per reply (default: 1024)
    pub max_tokens: u32,

    /// Request timeout in seconds (default: 60)
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-3-7-sonnet-20250219".to_string(),
            api_key: None,
            temperature: 0.0,
            max_tokens: 1024,
            timeout_secs: 60,
        }
    }
}

/// Embedding backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// Local fastembed model
    Fastembed,
    /// Deterministic feature hashing, no model download
    Hash,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,

    /// Vector dimension (default: 1024)
    pub dimension: usize,

    /// Model cache directory for fastembed
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Fastembed,
            dimension: 1024,
            cache_dir: None,
        }
    }
}

/// Report output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory session reports are written to
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("reports"),
        }
    }
}

/// Prompt texts sent to the chat model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    /// System prompt of every triage conversation
    pub system_chat: String,

    /// Condenses older turns during compaction
    pub intermediate_summary: String,

    /// Clinical summary of a finished conversation, used as the retrieval query
    pub final_summary: String,

    /// Produces the medical report
    pub report_generator: String,

    /// Rewrites a clinician-edited report into `Disease: <name> | ...` form
    pub validated_report_formatter: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            system_chat: "You are a medical intake assistant. Ask the patient one short, \
                clear question at a time about their symptoms: location, onset, duration, \
                severity on a scale of 1 to 10, character and associated symptoms. Do not \
                diagnose. When you have gathered enough information, thank the patient and \
                end your reply with the word STOP."
                .to_string(),
            intermediate_summary: "Summarize the following conversation between a patient \
                and a medical intake assistant. Keep every reported symptom, its location, \
                onset, duration and severity. Be concise and factual."
                .to_string(),
            final_summary: "Write a concise clinical summary of the following patient \
                conversation in third person. Include chief complaint, location, onset, \
                severity, character and associated symptoms. Do not add information that \
                was not reported."
                .to_string(),
            report_generator: "You are a clinical documentation assistant. Using the \
                clinical summary, the retrieved medical knowledge and the full conversation, \
                write a structured preliminary medical report with the sections: Patient \
                Complaint, History of Present Illness, Possible Conditions, Recommended Next \
                Steps and Severity. State clearly that the report must be reviewed by a \
                clinician."
                .to_string(),
            validated_report_formatter: "Rewrite the clinician-validated medical report \
                below as a single line in exactly this form: Disease: <name> | Symptoms: \
                <comma separated symptoms> | Severity: <severity> | Recommendation: \
                <recommendation>. Output only that line."
                .to_string(),
        }
    }
}

impl TriageConfig {
    /// Create a config with the given knowledge database path
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.knowledge.database_path = database_path.into();
        config
    }

    /// Set the chat model API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.model.api_key = Some(api_key.into());
        self
    }

    /// Set the chat model identifier
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model.model = model.into();
        self
    }

    /// Set the embedding backend
    pub fn with_embedding_backend(mut self, backend: EmbeddingBackend) -> Self {
        self.embedding.backend = backend;
        self
    }

    /// Set the report output directory
    pub fn with_report_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.reports.output_dir = output_dir.into();
        self
    }

    /// Set conversation configuration
    pub fn with_conversation(mut self, conversation: ConversationConfig) -> Self {
        self.conversation = conversation;
        self
    }

    /// Set knowledge configuration
    pub fn with_knowledge(mut self, knowledge: KnowledgeConfig) -> Self {
        self.knowledge = knowledge;
        self
    }

    /// Set prompts
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.conversation.intermediate_summary_threshold < 2 {
            return Err(ConfigValidationError::InvalidValue {
                field: "conversation.intermediate_summary_threshold".into(),
                message: "must be at least 2".into(),
            });
        }

        if self.conversation.stop_words.iter().all(|w| w.trim().is_empty()) {
            return Err(ConfigValidationError::InvalidValue {
                field: "conversation.stop_words".into(),
                message: "at least one stop word is required".into(),
            });
        }

        if self.knowledge.index_name.trim().is_empty() {
            return Err(ConfigValidationError::InvalidValue {
                field: "knowledge.index_name".into(),
                message: "must not be empty".into(),
            });
        }

        if self.knowledge.top_k == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "knowledge.top_k".into(),
                message: "must be greater than 0".into(),
            });
        }

        if !(0.0..=1.0).contains(&self.knowledge.retrieve_threshold) {
            return Err(ConfigValidationError::InvalidValue {
                field: "knowledge.retrieve_threshold".into(),
                message: "must be between 0 and 1".into(),
            });
        }

        if self.embedding.dimension == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "embedding.dimension".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.model.max_tokens == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "model.max_tokens".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.prompts.system_chat.trim().is_empty() {
            return Err(ConfigValidationError::MissingPrompt("system_chat".into()));
        }

        Ok(())
    }

    /// Validate that a remote chat model can be called
    pub fn validate_model(&self) -> Result<(), ConfigValidationError> {
        match self.model.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(ConfigValidationError::MissingApiKey),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("model.api_key is required")]
    MissingApiKey,

    #[error("prompt {0} must not be empty")]
    MissingPrompt(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
