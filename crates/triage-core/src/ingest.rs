//! Clinician report validation.

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;
use crate::knowledge::KnowledgeStore;
use crate::llm::Summarizer;
use crate::types::CountSnapshot;

/// Formats a clinician-edited report and stores it as validated knowledge.
pub struct ReportValidationIngest {
    formatter: Arc<dyn Summarizer>,
    store: Arc<KnowledgeStore>,
}

impl ReportValidationIngest {
    /// `formatter` rewrites the edited report into the
    /// `Disease: <name> | ...` form the store extracts labels from.
    pub fn new(formatter: Arc<dyn Summarizer>, store: Arc<KnowledgeStore>) -> Self {
        Self { formatter, store }
    }

    /// Format and insert `edited_report`.
    ///
    /// Returns `None` without touching the formatter or the store when the
    /// report is blank.
    pub async fn ingest(&self, edited_report: &str) -> Result<Option<CountSnapshot>> {
        if edited_report.trim().is_empty() {
            debug!("skipping blank validated report");
            return Ok(None);
        }

        let formatted = self.formatter.summarize(edited_report).await?;
        let snapshot = self.store.insert_validated_report(&formatted).await?;

        info!(
            before = snapshot.before,
            after = snapshot.after,
            "validated report added to knowledge base"
        );
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::error::Error;
    use crate::knowledge::DEFAULT_INDEX_NAME;
    use crate::testing::RecordingSummarizer;
    use crate::types::Provenance;

    fn store() -> Arc<KnowledgeStore> {
        let store =
            KnowledgeStore::open_in_memory(DEFAULT_INDEX_NAME, Arc::new(HashEmbedder::new(64)))
                .unwrap();
        store.ensure_index(64).unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_blank_report_is_noop() {
        let store = store();
        let formatter = Arc::new(RecordingSummarizer::new("Disease: Flu |"));
        let ingest = ReportValidationIngest::new(formatter.clone(), store.clone());

        assert_eq!(ingest.ingest("").await.unwrap(), None);
        assert_eq!(ingest.ingest(" \n\t ").await.unwrap(), None);
        assert!(formatter.inputs().is_empty());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_formats_then_inserts() {
        let store = store();
        let formatter = Arc::new(RecordingSummarizer::new(
            "Disease: Tension headache | Symptoms: pressure around head",
        ));
        let ingest = ReportValidationIngest::new(formatter.clone(), store.clone());

        let snapshot = ingest
            .ingest("Edited: likely tension headache, advise rest")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot, CountSnapshot { before: 0, after: 1 });
        assert_eq!(
            formatter.inputs(),
            vec!["Edited: likely tension headache, advise rest".to_string()]
        );

        let hits = store.similarity_search("pressure around head", 1).await.unwrap();
        assert_eq!(hits[0].document.label, "Tension headache");
        assert_eq!(hits[0].document.provenance, Provenance::ClinicianValidated);
    }

    #[tokio::test]
    async fn test_formatter_failure_inserts_nothing() {
        let store = store();
        let ingest =
            ReportValidationIngest::new(Arc::new(RecordingSummarizer::failing()), store.clone());

        let err = ingest.ingest("Edited report").await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
        assert_eq!(store.count().unwrap(), 0);
    }
}
