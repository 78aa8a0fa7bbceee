//! Language-model collaborator interfaces.
//!
//! The core never talks to a model directly. Generation and summarization
//! go through these traits so the conversation logic can be exercised with
//! scripted implementations.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::types::Turn;

/// Single blocking text-generation call.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a reply for `context` under `system_prompt`.
    ///
    /// `context` is ordered oldest first and may itself contain System turns.
    async fn generate(&self, system_prompt: &str, context: &[Turn]) -> Result<String>;
}

/// Condenses rendered conversation text into a summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String>;
}

/// Summarizer backed by a text generator and a fixed instruction prompt.
///
/// The rendered text is sent as a single Patient turn, which is how the
/// intermediate, final and validated-report summaries are all produced.
pub struct PromptedSummarizer {
    generator: Arc<dyn TextGenerator>,
    prompt: String,
}

impl PromptedSummarizer {
    pub fn new(generator: Arc<dyn TextGenerator>, prompt: impl Into<String>) -> Self {
        Self {
            generator,
            prompt: prompt.into(),
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

#[async_trait]
impl Summarizer for PromptedSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        let reply = self
            .generator
            .generate(&self.prompt, &[Turn::patient(text)])
            .await?;
        Ok(reply.trim().to_string())
    }
}
