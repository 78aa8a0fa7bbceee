//! Per-session history with rolling-summary compaction.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::llm::Summarizer;
use crate::types::{render_conversation, Role, Transcript, Turn};

/// Prefix of the synthetic turn that replaces compacted history.
pub const SUMMARY_PREFIX: &str = "Previous conversation summary: ";

/// Turn count kept after compaction: System, summary, last Assistant reply.
pub const COMPACTED_HISTORY_LEN: usize = 3;

/// Smallest threshold that leaves something to summarize.
pub const MIN_COMPACTION_THRESHOLD: usize = 2;

/// State of one dialogue.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    history: Vec<Turn>,
    transcript: Transcript,
    turns_since_compaction: usize,
    compactions: usize,
    terminal: bool,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl Session {
    /// Create a session seeded with its single System turn.
    pub fn new(id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            history: vec![Turn::system(system_prompt)],
            transcript: Transcript::new(),
            turns_since_compaction: 0,
            compactions: 0,
            terminal: false,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Model context: leading System turn plus retained turns
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn turns_since_compaction(&self) -> usize {
        self.turns_since_compaction
    }

    /// Number of compactions performed so far
    pub fn compactions(&self) -> usize {
        self.compactions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Append a Patient or Assistant turn to both history and transcript.
    ///
    /// The seeded System turn is the only one a session ever holds.
    pub fn append(&mut self, turn: Turn) -> Result<()> {
        self.ensure_open()?;
        if turn.role == Role::System {
            return Err(Error::invalid_input("system turns cannot be appended to a session"));
        }

        self.transcript.push(turn.clone());
        self.history.push(turn);
        self.turns_since_compaction += 1;
        self.last_activity = Utc::now();
        Ok(())
    }

    /// Fail with `SessionClosed` once the session is terminal.
    pub fn ensure_open(&self) -> Result<()> {
        if self.terminal {
            return Err(Error::SessionClosed(self.id.clone()));
        }
        Ok(())
    }

    /// Mark terminal and hand back the full transcript.
    pub fn terminate(&mut self) -> Transcript {
        self.terminal = true;
        self.last_activity = Utc::now();
        self.transcript.clone()
    }

    /// Whether the history has grown to the compaction point.
    ///
    /// Compaction also requires the newest turn to be an Assistant reply,
    /// since that reply is what survives the boundary.
    pub fn needs_compaction(&self, threshold: usize) -> bool {
        self.history.len() > threshold
            && self
                .history
                .last()
                .is_some_and(|t| t.role == Role::Assistant)
    }

    /// Render everything except the System turn and the last Assistant turn.
    fn compaction_text(&self) -> String {
        let end = self.history.len().saturating_sub(1);
        render_conversation(&self.history[..end])
    }

    /// Replace history with System, summary, and the last Assistant turn.
    fn apply_compaction(&mut self, summary: &str) {
        let system = self.history[0].clone();
        let last_reply = self.history[self.history.len() - 1].clone();

        self.history = vec![
            system,
            Turn::patient(format!("{}{}", SUMMARY_PREFIX, summary)),
            last_reply,
        ];
        self.turns_since_compaction = 0;
        self.compactions += 1;
    }
}

/// Exclusive access to one session. Other sessions stay unblocked.
pub type SessionGuard = OwnedMutexGuard<Session>;

/// Registry of sessions with one lock per session id.
///
/// The outer lock is held only long enough to find or insert the
/// per-session mutex, never across a collaborator call.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    async fn get(&self, session_id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    async fn get_or_insert_with(
        &self,
        session_id: &str,
        make: impl FnOnce() -> Session,
    ) -> Arc<Mutex<Session>> {
        if let Some(session) = self.get(session_id).await {
            return session;
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(make())))
            .clone()
    }

    async fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Owns all session histories and transcripts.
pub struct SessionStore {
    registry: SessionRegistry,
    system_prompt: String,
    summarizer: Arc<dyn Summarizer>,
}

impl SessionStore {
    /// Create a store. New sessions are seeded with `system_prompt`;
    /// compaction summaries come from `summarizer`.
    pub fn new(system_prompt: impl Into<String>, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            registry: SessionRegistry::new(),
            system_prompt: system_prompt.into(),
            summarizer,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Lock a session for the duration of a turn, creating it if absent.
    pub async fn lock(&self, session_id: &str) -> SessionGuard {
        let handle = self
            .registry
            .get_or_insert_with(session_id, || {
                debug!(session_id, "creating session");
                Session::new(session_id, self.system_prompt.clone())
            })
            .await;
        handle.lock_owned().await
    }

    async fn lock_existing(&self, session_id: &str) -> Result<SessionGuard> {
        let handle = self
            .registry
            .get(session_id)
            .await
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        Ok(handle.lock_owned().await)
    }

    /// Return the session, creating it seeded with the System turn if absent.
    pub async fn get_or_create(&self, session_id: &str) -> Session {
        self.lock(session_id).await.clone()
    }

    /// Append a turn. Fails with `SessionClosed` on a terminal session.
    pub async fn append_turn(
        &self,
        session_id: &str,
        role: Role,
        content: impl Into<String>,
    ) -> Result<()> {
        let mut session = self.lock(session_id).await;
        session.append(Turn::new(role, content))
    }

    /// Compact the session's history once it reaches `threshold + 1` turns.
    ///
    /// Returns whether compaction happened. On summarizer failure the
    /// history is left untouched.
    pub async fn compact_if_needed(&self, session_id: &str, threshold: usize) -> Result<bool> {
        let mut session = self.lock_existing(session_id).await?;
        self.compact_session(&mut session, threshold).await
    }

    /// Compact an already-locked session.
    pub async fn compact_session(&self, session: &mut Session, threshold: usize) -> Result<bool> {
        if threshold < MIN_COMPACTION_THRESHOLD {
            return Err(Error::invalid_input(format!(
                "compaction threshold must be at least {}, got {}",
                MIN_COMPACTION_THRESHOLD, threshold
            )));
        }
        if session.is_terminal() || !session.needs_compaction(threshold) {
            return Ok(false);
        }

        let before = session.history().len();
        let summary = self.summarizer.summarize(&session.compaction_text()).await?;
        session.apply_compaction(&summary);

        info!(
            session_id = session.id(),
            before,
            after = session.history().len(),
            "compacted session history"
        );
        Ok(true)
    }

    /// Mark the session terminal and return its full transcript.
    pub async fn mark_terminal(&self, session_id: &str) -> Result<Transcript> {
        let mut session = self.lock_existing(session_id).await?;
        Ok(session.terminate())
    }

    /// Current model context for a session
    pub async fn history(&self, session_id: &str) -> Result<Vec<Turn>> {
        Ok(self.lock_existing(session_id).await?.history().to_vec())
    }

    /// Full transcript for a session
    pub async fn transcript(&self, session_id: &str) -> Result<Transcript> {
        Ok(self.lock_existing(session_id).await?.transcript().clone())
    }

    pub async fn is_terminal(&self, session_id: &str) -> Result<bool> {
        Ok(self.lock_existing(session_id).await?.is_terminal())
    }

    /// Drop a session. Returns whether it existed.
    pub async fn forget(&self, session_id: &str) -> bool {
        self.registry.remove(session_id).await
    }

    /// Number of sessions currently held
    pub async fn len(&self) -> usize {
        self.registry.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
