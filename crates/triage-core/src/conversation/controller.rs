//! Turn-taking state machine.
//!
//! Two states: Active and Terminated (absorbing). A stop word from the
//! patient, or a reply from the model that mentions "stop", ends the
//! dialogue and releases the full transcript.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::llm::TextGenerator;
use crate::session::{SessionStore, MIN_COMPACTION_THRESHOLD};
use crate::types::{Transcript, Turn};

/// Fixed assistant reply to a patient stop word.
pub const STOP_SENTINEL: &str = "STOP";

/// Utterances that end a session without calling the model.
pub const DEFAULT_STOP_WORDS: [&str; 3] = ["stop", "end", "finish"];

/// Default history length that triggers compaction.
pub const DEFAULT_COMPACTION_THRESHOLD: usize = 10;

/// Controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Compact once history holds System + this many turns
    pub compaction_threshold: usize,
    /// Normalized utterances that terminate the session
    pub stop_words: Vec<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
            stop_words: DEFAULT_STOP_WORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ControllerConfig {
    /// Reject a threshold under which compaction could never run.
    pub fn validate(&self) -> Result<()> {
        if self.compaction_threshold < MIN_COMPACTION_THRESHOLD {
            return Err(Error::invalid_input(format!(
                "compaction threshold must be at least {}, got {}",
                MIN_COMPACTION_THRESHOLD, self.compaction_threshold
            )));
        }
        Ok(())
    }
}

/// Result of one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub reply: String,
    pub terminated: bool,
    /// Present only when `terminated` is true
    pub transcript: Option<Transcript>,
}

impl ChatOutcome {
    fn active(reply: String) -> Self {
        Self {
            reply,
            terminated: false,
            transcript: None,
        }
    }

    fn terminated(reply: String, transcript: Transcript) -> Self {
        Self {
            reply,
            terminated: true,
            transcript: Some(transcript),
        }
    }
}

/// Trim and lowercase an utterance for stop-word matching.
pub fn normalize_utterance(utterance: &str) -> String {
    utterance.trim().to_lowercase()
}

/// Whether a model reply signals that enough information was gathered.
pub fn reply_signals_stop(reply: &str) -> bool {
    reply.to_lowercase().contains("stop")
}

/// Drives a dialogue for any number of independent sessions.
pub struct ConversationController {
    sessions: Arc<SessionStore>,
    generator: Arc<dyn TextGenerator>,
    config: ControllerConfig,
}

impl ConversationController {
    /// Fails with `InvalidInput` when `config` does not validate.
    pub fn new(
        sessions: Arc<SessionStore>,
        generator: Arc<dyn TextGenerator>,
        config: ControllerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            sessions,
            generator,
            config,
        })
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Whether the utterance is one of the configured stop words
    pub fn is_stop_command(&self, utterance: &str) -> bool {
        let normalized = normalize_utterance(utterance);
        self.config.stop_words.iter().any(|w| *w == normalized)
    }

    /// Process one patient utterance.
    ///
    /// On a generation failure nothing is appended and the session stays
    /// active, so the same utterance can be submitted again.
    pub async fn chat(&self, session_id: &str, utterance: &str) -> Result<ChatOutcome> {
        if utterance.trim().is_empty() {
            return Err(Error::invalid_input("utterance must not be empty"));
        }

        let mut session = self.sessions.lock(session_id).await;
        session.ensure_open()?;

        if self.is_stop_command(utterance) {
            session.append(Turn::patient(utterance))?;
            session.append(Turn::assistant(STOP_SENTINEL))?;
            let transcript = session.terminate();
            info!(
                session_id,
                turns = transcript.len(),
                "session stopped by patient"
            );
            return Ok(ChatOutcome::terminated(STOP_SENTINEL.to_string(), transcript));
        }

        let mut context = session.history().to_vec();
        context.push(Turn::patient(utterance));

        let reply = self
            .generator
            .generate(self.sessions.system_prompt(), &context)
            .await?;

        session.append(Turn::patient(utterance))?;
        session.append(Turn::assistant(reply.clone()))?;

        if reply_signals_stop(&reply) {
            let transcript = session.terminate();
            info!(
                session_id,
                turns = transcript.len(),
                "session stopped by assistant"
            );
            return Ok(ChatOutcome::terminated(reply, transcript));
        }

        // Compaction never affects the reply. A failed summary is retried
        // after the next turn since the history is still over the threshold.
        match self
            .sessions
            .compact_session(&mut session, self.config.compaction_threshold)
            .await
        {
            Ok(compacted) => {
                debug!(
                    session_id,
                    compacted,
                    history = session.history().len(),
                    "turn complete"
                );
            }
            Err(e) => {
                warn!(session_id, error = %e, "history compaction failed");
            }
        }

        Ok(ChatOutcome::active(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::COMPACTED_HISTORY_LEN;
    use crate::testing::{RecordingSummarizer, ScriptedGenerator};
    use crate::types::Role;

    const SYSTEM: &str = "Ask one question at a time.";

    fn controller_with(
        generator: Arc<ScriptedGenerator>,
        summarizer: Arc<RecordingSummarizer>,
    ) -> ConversationController {
        let sessions = Arc::new(SessionStore::new(SYSTEM, summarizer));
        ConversationController::new(sessions, generator, ControllerConfig::default()).unwrap()
    }

    fn default_controller() -> (ConversationController, Arc<ScriptedGenerator>) {
        let generator = Arc::new(ScriptedGenerator::fallback_only());
        let controller = controller_with(
            generator.clone(),
            Arc::new(RecordingSummarizer::new("summary")),
        );
        (controller, generator)
    }

    #[tokio::test]
    async fn test_stop_words_terminate_without_model_call() {
        for word in ["stop", "STOP", "  End  ", "finish\n"] {
            let (controller, generator) = default_controller();
            controller.chat("S1", "hello").await.unwrap();

            let outcome = controller.chat("S1", word).await.unwrap();
            assert_eq!(outcome.reply, STOP_SENTINEL);
            assert!(outcome.terminated);
            assert_eq!(generator.calls().len(), 1, "stop word {:?} reached the model", word);

            let transcript = outcome.transcript.unwrap();
            assert_eq!(transcript.len(), 4);
            assert_eq!(transcript.turns()[2], Turn::patient(word));
            assert_eq!(transcript.turns()[3], Turn::assistant(STOP_SENTINEL));
        }
    }

    #[tokio::test]
    async fn test_stop_on_first_turn() {
        let (controller, generator) = default_controller();
        let outcome = controller.chat("S1", "stop").await.unwrap();
        assert!(outcome.terminated);
        assert_eq!(outcome.transcript.unwrap().len(), 2);
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stop_word_must_be_whole_utterance() {
        let (controller, generator) = default_controller();
        let outcome = controller.chat("S1", "please don't stop").await.unwrap();
        assert!(!outcome.terminated);
        assert_eq!(generator.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_model_reply_containing_stop_terminates() {
        let generator = Arc::new(ScriptedGenerator::new([
            "Where is the pain?",
            "Thank you, I have enough information. STOP",
        ]));
        let controller =
            controller_with(generator, Arc::new(RecordingSummarizer::new("summary")));

        let first = controller.chat("S1", "headache").await.unwrap();
        assert!(!first.terminated);
        assert!(first.transcript.is_none());

        let second = controller.chat("S1", "forehead").await.unwrap();
        assert!(second.terminated);
        assert_eq!(second.transcript.unwrap().len(), 4);
        assert!(controller.sessions().is_terminal("S1").await.unwrap());
    }

    #[tokio::test]
    async fn test_terminated_session_rejects_turns() {
        let (controller, generator) = default_controller();
        controller.chat("S1", "end").await.unwrap();

        let err = controller.chat("S1", "hello again").await.unwrap_err();
        assert!(err.is_session_closed());
        let err = controller.chat("S1", "stop").await.unwrap_err();
        assert!(err.is_session_closed());
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_leaves_session_unchanged() {
        let (controller, generator) = default_controller();
        controller.chat("S1", "hi").await.unwrap();
        generator.fail_next(1);

        let err = controller.chat("S1", "headache").await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));

        let sessions = controller.sessions();
        assert_eq!(sessions.history("S1").await.unwrap().len(), 3);
        assert_eq!(sessions.transcript("S1").await.unwrap().len(), 2);
        assert!(!sessions.is_terminal("S1").await.unwrap());

        // Retrying the identical utterance succeeds and records it once
        controller.chat("S1", "headache").await.unwrap();
        let transcript = sessions.transcript("S1").await.unwrap();
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript.turns()[2], Turn::patient("headache"));
    }

    #[tokio::test]
    async fn test_empty_utterance_rejected() {
        let (controller, generator) = default_controller();
        let err = controller.chat("S1", "   ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_model_sees_history_and_new_utterance() {
        let (controller, generator) = default_controller();
        controller.chat("S1", "hi").await.unwrap();
        controller.chat("S1", "headache").await.unwrap();

        let calls = generator.calls();
        assert_eq!(calls[1].system_prompt, SYSTEM);
        let roles: Vec<Role> = calls[1].context.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::Patient, Role::Assistant, Role::Patient]
        );
        assert_eq!(calls[1].context[3], Turn::patient("headache"));
    }

    #[tokio::test]
    async fn test_compaction_is_invisible_to_caller() {
        let generator = Arc::new(ScriptedGenerator::fallback_only().with_fallback("And then?"));
        let summarizer = Arc::new(RecordingSummarizer::new("patient has a cough"));
        let controller = controller_with(generator.clone(), summarizer.clone());

        for i in 0..5 {
            let outcome = controller.chat("S1", &format!("detail {}", i)).await.unwrap();
            assert_eq!(outcome.reply, "And then?");
        }

        let sessions = controller.sessions();
        let history = sessions.history("S1").await.unwrap();
        assert_eq!(history.len(), COMPACTED_HISTORY_LEN);
        assert_eq!(summarizer.inputs().len(), 1);

        // Next model call sees the compacted context
        controller.chat("S1", "detail 5").await.unwrap();
        let last = generator.calls().pop().unwrap();
        assert_eq!(last.context.len(), COMPACTED_HISTORY_LEN + 1);
        assert!(last.context[1].content.starts_with("Previous conversation summary:"));
    }

    #[tokio::test]
    async fn test_compaction_failure_does_not_fail_turn() {
        let generator = Arc::new(ScriptedGenerator::fallback_only());
        let controller = controller_with(generator, Arc::new(RecordingSummarizer::failing()));

        for i in 0..6 {
            let outcome = controller.chat("S1", &format!("detail {}", i)).await;
            assert!(outcome.is_ok());
        }
        assert_eq!(controller.sessions().transcript("S1").await.unwrap().len(), 12);
    }

    #[test]
    fn test_threshold_below_minimum_rejected() {
        for threshold in [0, 1] {
            let sessions = Arc::new(SessionStore::new(
                SYSTEM,
                Arc::new(RecordingSummarizer::new("s")),
            ));
            let config = ControllerConfig {
                compaction_threshold: threshold,
                ..ControllerConfig::default()
            };
            let result = ConversationController::new(
                sessions,
                Arc::new(ScriptedGenerator::fallback_only()),
                config,
            );
            assert!(matches!(result, Err(Error::InvalidInput(_))));
        }
    }

    #[tokio::test]
    async fn test_minimum_threshold_keeps_history_bounded() {
        let sessions = Arc::new(SessionStore::new(
            SYSTEM,
            Arc::new(RecordingSummarizer::new("s")),
        ));
        let config = ControllerConfig {
            compaction_threshold: MIN_COMPACTION_THRESHOLD,
            ..ControllerConfig::default()
        };
        let controller = ConversationController::new(
            sessions,
            Arc::new(ScriptedGenerator::fallback_only()),
            config,
        )
        .unwrap();

        for i in 0..20 {
            controller.chat("S1", &format!("detail {}", i)).await.unwrap();
            let len = controller.sessions().history("S1").await.unwrap().len();
            assert_eq!(len, COMPACTED_HISTORY_LEN);
        }
        assert_eq!(controller.sessions().transcript("S1").await.unwrap().len(), 40);
    }

    #[tokio::test]
    async fn test_transcript_length_property() {
        for turns in [0usize, 1, 4, 7, 12] {
            let (controller, _) = default_controller();
            for i in 0..turns {
                let outcome = controller.chat("S", &format!("answer {}", i)).await.unwrap();
                assert!(!outcome.terminated);
            }
            let outcome = controller.chat("S", "finish").await.unwrap();
            assert_eq!(outcome.transcript.unwrap().len(), 2 * turns + 2);
        }
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let generator = Arc::new(ScriptedGenerator::new([
            "Hello! What brings you in today?",
            "Where exactly do you feel the pain?",
            "On a scale of 1 to 10, how severe is it?",
            "Can you describe what the pain feels like?",
            "How long have you had this headache?",
        ]));
        let controller = controller_with(
            generator.clone(),
            Arc::new(RecordingSummarizer::new("throbbing headache")),
        );

        let utterances = ["hi", "headache", "entire head", "10", "throbbing", "stop"];
        let mut final_outcome = None;
        for (i, utterance) in utterances.iter().enumerate() {
            let outcome = controller.chat("S1", utterance).await.unwrap();
            assert_eq!(outcome.terminated, i == utterances.len() - 1);
            final_outcome = Some(outcome);
        }

        let transcript = final_outcome.unwrap().transcript.unwrap();
        assert_eq!(transcript.len(), 12);
        let patient_turns: Vec<&str> = transcript
            .iter()
            .filter(|t| t.role == Role::Patient)
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(patient_turns, utterances);
        assert_eq!(transcript.turns()[11], Turn::assistant(STOP_SENTINEL));
        assert_eq!(generator.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_concurrent_sessions() {
        let generator = Arc::new(ScriptedGenerator::fallback_only());
        let controller = Arc::new(controller_with(
            generator,
            Arc::new(RecordingSummarizer::new("s")),
        ));

        let mut handles = Vec::new();
        for s in 0..8 {
            let controller = Arc::clone(&controller);
            handles.push(tokio::spawn(async move {
                let id = format!("session-{}", s);
                for i in 0..3 {
                    controller.chat(&id, &format!("turn {}", i)).await.unwrap();
                }
                controller.chat(&id, "stop").await.unwrap()
            }));
        }

        for handle in handles {
            let outcome = handle.await.unwrap();
            assert_eq!(outcome.transcript.unwrap().len(), 8);
        }
        assert_eq!(controller.sessions().len().await, 8);
    }
}
