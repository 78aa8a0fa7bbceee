//! Core types shared across the triage crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Conversation Types
// ─────────────────────────────────────────────────────────────────────────────

/// Speaker of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Assistant,
    System,
}

impl Role {
    /// Convert from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "patient" => Some(Self::Patient),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    /// Speaker label used when a conversation is rendered as text
    pub fn label(&self) -> &'static str {
        match self {
            Self::Patient => "Patient",
            Self::Assistant => "Assistant",
            Self::System => "System",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single immutable turn of dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn patient(content: impl Into<String>) -> Self {
        Self::new(Role::Patient, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Render as a `Role: content` line
    pub fn render(&self) -> String {
        format!("{}: {}", self.role.label(), self.content)
    }
}

/// Render turns as `Role: content` lines in order, skipping System turns.
pub fn render_conversation<'a>(turns: impl IntoIterator<Item = &'a Turn>) -> String {
    turns
        .into_iter()
        .filter(|t| t.role != Role::System)
        .map(Turn::render)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Complete, never-compacted log of what was said in a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn. Transcripts only ever grow.
    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    /// Render the whole transcript as `Role: content` lines
    pub fn render(&self) -> String {
        render_conversation(&self.turns)
    }
}

impl From<Vec<Turn>> for Transcript {
    fn from(turns: Vec<Turn>) -> Self {
        Self { turns }
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Knowledge Types
// ─────────────────────────────────────────────────────────────────────────────

/// Where a knowledge document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    OriginalCorpus,
    ClinicianValidated,
}

impl Provenance {
    /// Convert from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "original_corpus" => Some(Self::OriginalCorpus),
            "clinician_validated" => Some(Self::ClinicianValidated),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OriginalCorpus => "original_corpus",
            Self::ClinicianValidated => "clinician_validated",
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A document ready for insertion, embedding already computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub label: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub provenance: Provenance,
}

/// A document as stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub label: String,
    pub text: String,
    pub provenance: Provenance,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A similarity search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub document: StoredDocument,
    /// Cosine similarity between the query and the document embedding
    pub score: f32,
}

/// Index size captured immediately before and after a single insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountSnapshot {
    pub before: usize,
    pub after: usize,
}

impl CountSnapshot {
    /// True when exactly one document was added between the two counts
    pub fn is_single_insert(&self) -> bool {
        self.after == self.before + 1
    }
}

/// One row of a bulk corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusRecord {
    #[serde(alias = "disease")]
    pub label: String,
    #[serde(alias = "combined_text")]
    pub text: String,
}

/// Outcome of a bulk corpus ingest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub inserted: usize,
    pub skipped: usize,
}
