//! Main SDK Entry Point
//!
//! Ties the conversation controller, the knowledge store and the model
//! collaborators together behind one facade.

use std::sync::Arc;
use tracing::{info, warn};

use triage_core::conversation::{ChatOutcome, ConversationController};
use triage_core::embedding::Embedder;
use triage_core::ingest::ReportValidationIngest;
use triage_core::knowledge::KnowledgeStore;
use triage_core::llm::{PromptedSummarizer, Summarizer, TextGenerator};
use triage_core::session::SessionStore;
use triage_core::types::{CorpusRecord, CountSnapshot, IngestSummary, Transcript, Turn};

use crate::client::ChatModelClient;
use crate::embeddings::build_embedder;
use crate::report::SessionReport;
use crate::{SDKError, SDKResult, TriageConfig};

/// Symptom triage SDK - Main entry point
///
/// # Example
///
/// ```rust,no_run
/// use triage_sdk::{Triage, TriageConfig};
///
/// async fn example() -> anyhow::Result<()> {
///     let triage = Triage::new(TriageConfig::new("knowledge.db").with_api_key("sk-..."))?;
///
///     let outcome = triage.chat("S1", "I have a headache").await?;
///     if let Some(transcript) = outcome.transcript {
///         let report = triage.assess("S1", &transcript).await?;
///         println!("{}", report.medical_report);
///     }
///     Ok(())
/// }
/// ```
pub struct Triage {
    config: TriageConfig,
    generator: Arc<dyn TextGenerator>,
    knowledge: Arc<KnowledgeStore>,
    controller: ConversationController,
    final_summarizer: PromptedSummarizer,
    validation: ReportValidationIngest,
}

impl Triage {
    /// Create an SDK instance with the HTTP chat model and the configured
    /// embedder.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The knowledge database cannot be opened
    /// - An existing index has a different dimension than the embedder
    pub fn new(config: TriageConfig) -> SDKResult<Self> {
        Self::builder(config).build()
    }

    /// Start building an SDK instance with injected collaborators
    pub fn builder(config: TriageConfig) -> TriageBuilder {
        TriageBuilder {
            config,
            generator: None,
            embedder: None,
            in_memory: false,
        }
    }

    /// Get the SDK configuration
    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    /// Get the knowledge store
    pub fn knowledge(&self) -> &Arc<KnowledgeStore> {
        &self.knowledge
    }

    /// Get the session store
    pub fn sessions(&self) -> &Arc<SessionStore> {
        self.controller.sessions()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Conversation
    // ─────────────────────────────────────────────────────────────────────────────

    /// Process one patient utterance
    pub async fn chat(&self, session_id: &str, utterance: &str) -> SDKResult<ChatOutcome> {
        Ok(self.controller.chat(session_id, utterance).await?)
    }

    /// Drop a session's state. Returns whether it existed.
    pub async fn forget(&self, session_id: &str) -> bool {
        self.sessions().forget(session_id).await
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Assessment
    // ─────────────────────────────────────────────────────────────────────────────

    /// Clinical summary of a finished conversation
    pub async fn summarize(&self, transcript: &Transcript) -> SDKResult<String> {
        if transcript.is_empty() {
            return Err(triage_core::Error::invalid_input("transcript is empty").into());
        }
        Ok(self.final_summarizer.summarize(&transcript.render()).await?)
    }

    /// Text of the `k` documents nearest to `summary`, best first.
    ///
    /// Returns `None` when the index holds no documents. Scores under the
    /// configured threshold are logged but still returned.
    pub async fn retrieve(&self, summary: &str, k: usize) -> SDKResult<Option<String>> {
        let hits = self.knowledge.similarity_search(summary, k).await?;

        let Some(top) = hits.first() else {
            warn!(index = %self.knowledge.index_name(), "knowledge index is empty");
            return Ok(None);
        };
        if top.score < self.config.knowledge.retrieve_threshold {
            warn!(
                score = top.score,
                threshold = self.config.knowledge.retrieve_threshold,
                label = %top.document.label,
                "best knowledge match is below the retrieve threshold"
            );
        } else {
            info!(score = top.score, label = %top.document.label, "retrieved knowledge");
        }

        let text = hits
            .iter()
            .map(|hit| hit.document.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(Some(text))
    }

    /// Draft the medical report from the conversation, its summary and any
    /// retrieved knowledge
    pub async fn generate_report(
        &self,
        transcript: &Transcript,
        summary: &str,
        knowledge: Option<&str>,
    ) -> SDKResult<String> {
        let input = format!(
            "CLINICAL SUMMARY: {}\n\nRETRIEVED MEDICAL KNOWLEDGE: {}\n\nFULL CONVERSATION:\n{}",
            summary,
            knowledge.unwrap_or("None"),
            transcript.render()
        );

        let report = self
            .generator
            .generate(&self.config.prompts.report_generator, &[Turn::patient(input)])
            .await?;
        Ok(report.trim().to_string())
    }

    /// Summarize, retrieve and draft the report for a finished session
    pub async fn assess(
        &self,
        session_id: &str,
        transcript: &Transcript,
    ) -> SDKResult<SessionReport> {
        let clinical_summary = self.summarize(transcript).await?;
        let retrieved_knowledge = self
            .retrieve(&clinical_summary, self.config.knowledge.top_k)
            .await?;
        let medical_report = self
            .generate_report(transcript, &clinical_summary, retrieved_knowledge.as_deref())
            .await?;

        info!(session_id, turns = transcript.len(), "assessment complete");
        Ok(SessionReport {
            session_id: session_id.to_string(),
            conversation_history: transcript.clone(),
            clinical_summary,
            medical_report,
            retrieved_knowledge,
            generated_at: chrono::Utc::now(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Knowledge
    // ─────────────────────────────────────────────────────────────────────────────

    /// Format a clinician-edited report and add it to the knowledge base.
    ///
    /// Returns `None` for a blank report.
    pub async fn validate_and_store(
        &self,
        edited_report: &str,
    ) -> SDKResult<Option<CountSnapshot>> {
        Ok(self.validation.ingest(edited_report).await?)
    }

    /// Add reference corpus rows to the knowledge base
    pub async fn ingest_corpus(&self, records: &[CorpusRecord]) -> SDKResult<IngestSummary> {
        Ok(self.knowledge.ingest_corpus(records).await?)
    }
}

/// Builder for [`Triage`].
///
/// Collaborators that are not supplied are created from the config.
pub struct TriageBuilder {
    config: TriageConfig,
    generator: Option<Arc<dyn TextGenerator>>,
    embedder: Option<Arc<dyn Embedder>>,
    in_memory: bool,
}

impl TriageBuilder {
    /// Use this text generator instead of the HTTP chat model
    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Use this embedder instead of the configured backend
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Keep the knowledge store in memory instead of on disk
    pub fn in_memory(mut self) -> Self {
        self.in_memory = true;
        self
    }

    pub fn build(self) -> SDKResult<Triage> {
        let config = self.config;
        config.validate()?;

        let generator: Arc<dyn TextGenerator> = match self.generator {
            Some(generator) => generator,
            None => {
                config.validate_model()?;
                Arc::new(ChatModelClient::new(config.model.clone())?)
            }
        };
        let embedder = match self.embedder {
            Some(embedder) => embedder,
            None => build_embedder(&config.embedding)?,
        };

        let index_name = config.knowledge.index_name.clone();
        let knowledge = if self.in_memory {
            KnowledgeStore::open_in_memory(index_name, embedder.clone())?
        } else {
            KnowledgeStore::open(&config.knowledge.database_path, index_name, embedder.clone())?
        };

        let dimension = knowledge.ensure_index(embedder.dimension())?;
        if dimension != embedder.dimension() {
            return Err(SDKError::Core(triage_core::Error::DimensionMismatch {
                expected: dimension,
                actual: embedder.dimension(),
            }));
        }
        let knowledge = Arc::new(knowledge);

        let prompts = &config.prompts;
        let compaction: Arc<dyn Summarizer> = Arc::new(PromptedSummarizer::new(
            generator.clone(),
            prompts.intermediate_summary.clone(),
        ));
        let sessions = Arc::new(SessionStore::new(prompts.system_chat.clone(), compaction));
        let controller = ConversationController::new(
            sessions,
            generator.clone(),
            config.conversation.controller_config(),
        )?;

        let final_summarizer =
            PromptedSummarizer::new(generator.clone(), prompts.final_summary.clone());
        let formatter: Arc<dyn Summarizer> = Arc::new(PromptedSummarizer::new(
            generator.clone(),
            prompts.validated_report_formatter.clone(),
        ));
        let validation = ReportValidationIngest::new(formatter, knowledge.clone());

        info!(
            index = %knowledge.index_name(),
            dimension,
            embedder = embedder.model_name(),
            "triage SDK ready"
        );

        Ok(Triage {
            config,
            generator,
            knowledge,
            controller,
            final_summarizer,
            validation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingBackend;
    use tempfile::tempdir;
    use triage_core::embedding::HashEmbedder;
    use triage_core::testing::ScriptedGenerator;
    use triage_core::types::Provenance;

    const DIM: usize = 128;

    fn config() -> TriageConfig {
        TriageConfig::default().with_embedding_backend(EmbeddingBackend::Hash)
    }

    fn triage_with(generator: Arc<ScriptedGenerator>) -> Triage {
        Triage::builder(config())
            .generator(generator)
            .embedder(Arc::new(HashEmbedder::new(DIM)))
            .in_memory()
            .build()
            .unwrap()
    }

    fn corpus() -> Vec<CorpusRecord> {
        vec![
            CorpusRecord {
                label: "Migraine".into(),
                text: "Migraine: throbbing headache with nausea and sensitivity to light".into(),
            },
            CorpusRecord {
                label: "Dermatitis".into(),
                text: "Dermatitis: itchy red skin rash".into(),
            },
        ]
    }

    #[tokio::test]
    async fn test_full_assessment_flow() {
        let generator = Arc::new(ScriptedGenerator::new([
            "Where exactly is the pain?",
            "How severe is it from 1 to 10?",
            "Patient reports a throbbing headache with nausea and sensitivity to light",
            "Preliminary report: probable migraine",
            "Disease: Migraine | Symptoms: throbbing headache, nausea | Severity: high",
        ]));
        let triage = triage_with(generator.clone());
        triage.ingest_corpus(&corpus()).await.unwrap();

        triage.chat("S1", "I have a throbbing headache").await.unwrap();
        triage.chat("S1", "entire head").await.unwrap();
        let outcome = triage.chat("S1", "stop").await.unwrap();
        assert!(outcome.terminated);
        let transcript = outcome.transcript.unwrap();
        assert_eq!(transcript.len(), 6);

        let report = triage.assess("S1", &transcript).await.unwrap();
        assert_eq!(report.session_id, "S1");
        assert_eq!(report.conversation_history, transcript);
        assert_eq!(report.medical_report, "Preliminary report: probable migraine");
        assert!(report.retrieved_knowledge.as_ref().unwrap().starts_with("Migraine:"));

        // The report call carries summary, knowledge and conversation
        let calls = generator.calls();
        let report_call = &calls[3];
        assert_eq!(report_call.system_prompt, triage.config().prompts.report_generator);
        let input = &report_call.context[0].content;
        assert!(input.contains("CLINICAL SUMMARY: Patient reports a throbbing headache"));
        assert!(input.contains("RETRIEVED MEDICAL KNOWLEDGE: Migraine:"));
        assert!(input.contains("Patient: entire head"));

        let snapshot = triage
            .validate_and_store("Confirmed migraine. Advise rest and hydration.")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot, CountSnapshot { before: 2, after: 3 });
        assert_eq!(triage.knowledge().count_by_provenance().unwrap().clinician_validated, 1);

        let dir = tempdir().unwrap();
        let path = report.save_to_dir(dir.path()).unwrap();
        assert!(path.ends_with("medical_report_S1.json"));
    }

    #[tokio::test]
    async fn test_retrieve_on_empty_index() {
        let triage = triage_with(Arc::new(ScriptedGenerator::fallback_only()));
        assert_eq!(triage.retrieve("headache", 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_retrieve_joins_top_k() {
        let triage = triage_with(Arc::new(ScriptedGenerator::fallback_only()));
        triage.ingest_corpus(&corpus()).await.unwrap();

        let one = triage.retrieve("throbbing headache", 1).await.unwrap().unwrap();
        assert!(one.starts_with("Migraine:"));
        assert!(!one.contains("Dermatitis"));

        let two = triage.retrieve("throbbing headache", 2).await.unwrap().unwrap();
        assert!(two.starts_with(&one));
        assert!(two.contains("\n\nDermatitis:"));
    }

    #[tokio::test]
    async fn test_assess_without_knowledge() {
        let generator = Arc::new(ScriptedGenerator::new(["summary", "report"]));
        let triage = triage_with(generator.clone());
        let transcript = Transcript::from(vec![
            Turn::patient("cough"),
            Turn::assistant("STOP"),
        ]);

        let report = triage.assess("S2", &transcript).await.unwrap();
        assert_eq!(report.retrieved_knowledge, None);
        assert!(generator.calls()[1].context[0]
            .content
            .contains("RETRIEVED MEDICAL KNOWLEDGE: None"));
    }

    #[tokio::test]
    async fn test_summarize_rejects_empty_transcript() {
        let triage = triage_with(Arc::new(ScriptedGenerator::fallback_only()));
        let err = triage.summarize(&Transcript::new()).await.unwrap_err();
        assert!(matches!(err, SDKError::Core(triage_core::Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_validate_blank_report() {
        let generator = Arc::new(ScriptedGenerator::fallback_only());
        let triage = triage_with(generator.clone());
        assert_eq!(triage.validate_and_store("   ").await.unwrap(), None);
        assert!(generator.calls().is_empty());
        assert_eq!(triage.knowledge().count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_closed_session_error() {
        let triage = triage_with(Arc::new(ScriptedGenerator::fallback_only()));
        triage.chat("S1", "finish").await.unwrap();
        let err = triage.chat("S1", "hello").await.unwrap_err();
        assert!(err.is_session_closed());

        assert!(triage.forget("S1").await);
        // A forgotten id starts a fresh session
        assert!(!triage.chat("S1", "hello").await.unwrap().terminated);
    }

    #[test]
    fn test_existing_index_dimension_mismatch() {
        let dir = tempdir().unwrap();
        let config = TriageConfig::new(dir.path().join("kb.db"))
            .with_embedding_backend(EmbeddingBackend::Hash);

        Triage::builder(config.clone())
            .generator(Arc::new(ScriptedGenerator::fallback_only()))
            .embedder(Arc::new(HashEmbedder::new(DIM)))
            .build()
            .unwrap();

        let result = Triage::builder(config)
            .generator(Arc::new(ScriptedGenerator::fallback_only()))
            .embedder(Arc::new(HashEmbedder::new(64)))
            .build();
        assert!(matches!(
            result,
            Err(SDKError::Core(triage_core::Error::DimensionMismatch { expected: DIM, actual: 64 }))
        ));
    }

    #[test]
    fn test_missing_api_key_without_injected_generator() {
        let result = Triage::builder(config())
            .embedder(Arc::new(HashEmbedder::new(DIM)))
            .in_memory()
            .build();
        assert!(matches!(result, Err(SDKError::Config(_))));
    }

    #[tokio::test]
    async fn test_validated_report_provenance() {
        let generator = Arc::new(ScriptedGenerator::new([
            "Disease: Influenza | Symptoms: fever, cough",
        ]));
        let triage = triage_with(generator);
        triage.validate_and_store("flu confirmed").await.unwrap();

        let hits = triage
            .knowledge()
            .similarity_search("Disease: Influenza | Symptoms: fever, cough", 1)
            .await
            .unwrap();
        assert_eq!(hits[0].document.label, "Influenza");
        assert_eq!(hits[0].document.provenance, Provenance::ClinicianValidated);
    }
}
