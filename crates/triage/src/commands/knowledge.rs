//! Knowledge command for knowledge base maintenance.
//!
//! Works on the knowledge store directly, so no chat model key is needed.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

use triage_core::knowledge::KnowledgeStore;
use triage_core::types::CorpusRecord;
use triage_sdk::embeddings::build_embedder;
use triage_sdk::TriageConfig;

use crate::cli::{KnowledgeAction, KnowledgeCommand};

/// Execute knowledge command.
pub async fn execute(cmd: KnowledgeCommand, config: &TriageConfig) -> Result<()> {
    match cmd.action {
        KnowledgeAction::Count => count(config),
        KnowledgeAction::Search { query, k } => search(&query, k, config).await,
        KnowledgeAction::Ingest { path, dry_run } => ingest(&path, dry_run, config).await,
    }
}

/// Open the configured store, creating the index if needed.
fn open_store(config: &TriageConfig) -> Result<KnowledgeStore> {
    let embedder = build_embedder(&config.embedding).context("Failed to set up embedder")?;
    let store = KnowledgeStore::open(
        &config.knowledge.database_path,
        config.knowledge.index_name.clone(),
        Arc::clone(&embedder),
    )
    .with_context(|| {
        format!(
            "Failed to open knowledge database {}",
            config.knowledge.database_path.display()
        )
    })?;

    let dimension = store.ensure_index(embedder.dimension())?;
    if dimension != embedder.dimension() {
        bail!(
            "Index {} has dimension {}, but the embedder produces {}",
            config.knowledge.index_name,
            dimension,
            embedder.dimension()
        );
    }
    Ok(store)
}

/// Show document counts.
fn count(config: &TriageConfig) -> Result<()> {
    let store = open_store(config)?;
    let counts = store.count_by_provenance()?;

    println!("{}", "Knowledge Base".cyan().bold());
    println!("  Index: {}", store.index_name());
    println!("  Database: {}", config.knowledge.database_path.display().to_string().dimmed());
    println!("  Documents: {}", counts.total().to_string().bold());
    println!("    original corpus: {}", counts.original_corpus);
    println!("    clinician validated: {}", counts.clinician_validated);
    Ok(())
}

/// Search by similarity.
async fn search(query: &str, k: usize, config: &TriageConfig) -> Result<()> {
    let store = open_store(config)?;
    let hits = store.similarity_search(query, k).await?;

    if hits.is_empty() {
        println!("{}", "No documents indexed.".yellow());
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        let score = format!("{:.3}", hit.score);
        let score = if hit.score >= config.knowledge.retrieve_threshold {
            score.green()
        } else {
            score.yellow()
        };
        println!(
            "{}. {} [{}] {}",
            rank + 1,
            hit.document.label.bold(),
            hit.document.provenance,
            score
        );
        println!("   {}", hit.document.text.dimmed());
    }
    Ok(())
}

/// Parse JSON Lines corpus rows. Blank lines are ignored.
pub(crate) fn read_corpus(path: &Path) -> Result<Vec<CorpusRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid corpus row", path.display(), i + 1))
        })
        .collect()
}

/// Ingest a corpus file.
async fn ingest(path: &Path, dry_run: bool, config: &TriageConfig) -> Result<()> {
    let records = read_corpus(path)?;
    let empty = records.iter().filter(|r| r.text.trim().is_empty()).count();

    if dry_run {
        println!(
            "{} {} rows parsed, {} would be skipped",
            "✓".green(),
            records.len(),
            empty
        );
        return Ok(());
    }

    let store = open_store(config)?;
    let bar = super::spinner(&format!("Embedding {} rows...", records.len() - empty))?;
    let result = store.ingest_corpus(&records).await;
    bar.finish_and_clear();
    let summary = result?;

    println!("{} Corpus ingested", "✓".green());
    println!("  Inserted: {}", summary.inserted);
    if summary.skipped > 0 {
        println!("  Skipped (empty): {}", summary.skipped.to_string().yellow());
    }
    println!("  Total documents: {}", store.count()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use triage_sdk::EmbeddingBackend;

    #[test]
    fn test_read_corpus() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corpus.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"disease":"Migraine","combined_text":"throbbing headache"}"#,
                "\n\n",
                r#"{"label":"Flu","text":"fever and cough"}"#,
                "\n",
            ),
        )
        .unwrap();

        let records = read_corpus(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].label, "Migraine");
        assert_eq!(records[1].text, "fever and cough");
    }

    #[test]
    fn test_read_corpus_reports_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corpus.jsonl");
        std::fs::write(&path, "{\"label\":\"Flu\",\"text\":\"fever\"}\nnot json\n").unwrap();

        let err = read_corpus(&path).unwrap_err();
        assert!(err.to_string().contains(":2:"));
    }

    #[tokio::test]
    async fn test_ingest_and_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corpus.jsonl");
        std::fs::write(
            &path,
            "{\"label\":\"Flu\",\"text\":\"fever\"}\n{\"label\":\"Blank\",\"text\":\"\"}\n",
        )
        .unwrap();

        let config = TriageConfig::new(dir.path().join("kb.db"))
            .with_embedding_backend(EmbeddingBackend::Hash);
        ingest(&path, false, &config).await.unwrap();

        let store = open_store(&config).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
