//! Scripted collaborators for deterministic tests.
//!
//! Compiled for this crate's tests and for dependents that enable the
//! `testing` feature.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::llm::{Summarizer, TextGenerator};
use crate::types::Turn;

const DEFAULT_FALLBACK_REPLY: &str = "Can you tell me more about that?";

/// A recorded `generate` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateCall {
    pub system_prompt: String,
    pub context: Vec<Turn>,
}

/// Generator that replays canned replies in order.
///
/// Once the script runs out every call returns the fallback reply.
/// Failures can be queued with [`ScriptedGenerator::fail_next`].
#[derive(Debug)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<String>>,
    pending_failures: Mutex<usize>,
    fallback: String,
    calls: Mutex<Vec<GenerateCall>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            pending_failures: Mutex::new(0),
            fallback: DEFAULT_FALLBACK_REPLY.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Generator that always answers with the fallback reply
    pub fn fallback_only() -> Self {
        Self::new(Vec::<String>::new())
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Make the next `count` calls fail without consuming the script
    pub fn fail_next(&self, count: usize) {
        *self.pending_failures.lock().unwrap() += count;
    }

    /// All recorded calls, oldest first
    pub fn calls(&self) -> Vec<GenerateCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, system_prompt: &str, context: &[Turn]) -> Result<String> {
        {
            let mut failures = self.pending_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(Error::generation("scripted failure"));
            }
        }

        self.calls.lock().unwrap().push(GenerateCall {
            system_prompt: system_prompt.to_string(),
            context: context.to_vec(),
        });

        let next = self.replies.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Summarizer returning a fixed summary and recording its inputs.
#[derive(Debug)]
pub struct RecordingSummarizer {
    summary: String,
    fail: bool,
    inputs: Mutex<Vec<String>>,
}

impl RecordingSummarizer {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            fail: false,
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Summarizer whose every call fails
    pub fn failing() -> Self {
        Self {
            summary: String::new(),
            fail: true,
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Summarizer for RecordingSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        self.inputs.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(Error::generation("summarizer unavailable"));
        }
        Ok(self.summary.clone())
    }
}
