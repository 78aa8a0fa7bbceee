//! Knowledge Store Implementation
//!
//! SQLite-backed embedding index with brute-force cosine k-NN search.

use chrono::{DateTime, Utc};
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::migrations::run_migrations;
use crate::embedding::{
    cosine_similarity, decode_embedding, encode_embedding, ensure_embeddable, Embedder,
};
use crate::error::{Error, Result};
use crate::types::{
    CorpusRecord, CountSnapshot, IngestSummary, KnowledgeDocument, Provenance, SearchHit,
    StoredDocument,
};

/// Default index name.
pub const DEFAULT_INDEX_NAME: &str = "medical-embeddings";

/// Label used when a validated report carries no `Disease: <name> |` field.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Extract the disease label from a formatted report.
///
/// Reads the text between `Disease:` and the next `|`. Falls back to
/// [`UNKNOWN_LABEL`] when the field is missing or blank.
pub fn extract_label(text: &str) -> String {
    static LABEL_PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = LABEL_PATTERN
        .get_or_init(|| Regex::new(r"Disease:\s*(.*?)\s*\|").expect("label pattern is valid"));

    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|label| !label.is_empty())
        .unwrap_or(UNKNOWN_LABEL)
        .to_string()
}

/// Document counts split by provenance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceCounts {
    pub original_corpus: usize,
    pub clinician_validated: usize,
}

impl ProvenanceCounts {
    pub fn total(&self) -> usize {
        self.original_corpus + self.clinician_validated
    }
}

/// Embedding index over one named SQLite table partition.
///
/// The connection sits behind a mutex. Every write, and the count/insert/count
/// sequence of a validated report, runs under a single acquisition, so
/// writers through one store are serialized.
pub struct KnowledgeStore {
    conn: Mutex<Connection>,
    index_name: String,
    embedder: Arc<dyn Embedder>,
}

impl KnowledgeStore {
    /// Open (or create) a store backed by the database file at `path`.
    pub fn open(
        path: impl AsRef<Path>,
        index_name: impl Into<String>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        debug!(path = %path.display(), "opened knowledge database");
        Self::from_connection(conn, index_name.into(), embedder)
    }

    /// Open a store that lives only as long as the process.
    pub fn open_in_memory(
        index_name: impl Into<String>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, index_name.into(), embedder)
    }

    fn from_connection(
        conn: Connection,
        index_name: String,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            index_name,
            embedder,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Index
    // ─────────────────────────────────────────────────────────────────────────────

    /// Create the index with `dimension` unless it already exists.
    ///
    /// Returns the dimension the index actually uses. An existing index keeps
    /// its original dimension.
    pub fn ensure_index(&self, dimension: usize) -> Result<usize> {
        if dimension == 0 {
            return Err(Error::invalid_input("index dimension must be positive"));
        }

        let conn = self.conn()?;
        if let Some(existing) = index_dimension(&conn, &self.index_name)? {
            if existing != dimension {
                warn!(
                    index = %self.index_name,
                    existing,
                    requested = dimension,
                    "index already exists with a different dimension"
                );
            }
            return Ok(existing);
        }

        conn.execute(
            "INSERT INTO knowledge_indexes (name, dimension, created_at) VALUES (?1, ?2, ?3)",
            params![&self.index_name, dimension as i64, Utc::now().timestamp_millis()],
        )?;
        info!(index = %self.index_name, dimension, "created knowledge index");
        Ok(dimension)
    }

    pub fn index_exists(&self) -> Result<bool> {
        Ok(self.dimension()?.is_some())
    }

    /// Dimension fixed at index creation, if the index exists
    pub fn dimension(&self) -> Result<Option<usize>> {
        let conn = self.conn()?;
        index_dimension(&conn, &self.index_name)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────────

    /// Insert a document whose embedding was computed by the caller.
    pub fn insert(&self, document: &KnowledgeDocument) -> Result<StoredDocument> {
        let conn = self.conn()?;
        insert_document(&conn, &self.index_name, document)
    }

    /// Embed and insert a clinician-validated report.
    ///
    /// The returned snapshot counts the index immediately before and after
    /// this single insert.
    pub async fn insert_validated_report(&self, formatted: &str) -> Result<CountSnapshot> {
        ensure_embeddable(formatted)?;

        let document = KnowledgeDocument {
            label: extract_label(formatted),
            text: formatted.to_string(),
            embedding: self.embedder.embed(formatted).await?,
            provenance: Provenance::ClinicianValidated,
        };

        let conn = self.conn()?;
        let before = count_documents(&conn, &self.index_name)?;
        let stored = insert_document(&conn, &self.index_name, &document)?;
        let after = count_documents(&conn, &self.index_name)?;

        info!(
            index = %self.index_name,
            id = %stored.id,
            label = %stored.label,
            before,
            after,
            "stored validated report"
        );
        Ok(CountSnapshot { before, after })
    }

    /// Embed and insert bulk corpus rows.
    ///
    /// Rows with blank text are skipped. Either every remaining row is
    /// inserted or none is.
    pub async fn ingest_corpus(&self, records: &[CorpusRecord]) -> Result<IngestSummary> {
        let (kept, skipped): (Vec<&CorpusRecord>, Vec<&CorpusRecord>) =
            records.iter().partition(|r| !r.text.trim().is_empty());

        let texts: Vec<&str> = kept.iter().map(|r| r.text.as_str()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_batch(&texts).await?
        };
        if embeddings.len() != kept.len() {
            return Err(Error::embedding(format!(
                "expected {} embeddings, got {}",
                kept.len(),
                embeddings.len()
            )));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for (record, embedding) in kept.iter().zip(embeddings) {
            let document = KnowledgeDocument {
                label: record.label.clone(),
                text: record.text.clone(),
                embedding,
                provenance: Provenance::OriginalCorpus,
            };
            insert_document(&tx, &self.index_name, &document)?;
        }
        tx.commit()?;

        let summary = IngestSummary {
            inserted: kept.len(),
            skipped: skipped.len(),
        };
        info!(
            index = %self.index_name,
            inserted = summary.inserted,
            skipped = summary.skipped,
            "ingested corpus"
        );
        Ok(summary)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────────

    /// Number of documents in the index
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        count_documents(&conn, &self.index_name)
    }

    pub fn count_by_provenance(&self) -> Result<ProvenanceCounts> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT provenance, COUNT(*) FROM knowledge_documents
             WHERE index_name = ?1 GROUP BY provenance",
        )?;
        let rows = stmt.query_map(params![&self.index_name], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = ProvenanceCounts::default();
        for row in rows {
            let (provenance, count) = row?;
            match Provenance::from_str(&provenance) {
                Some(Provenance::OriginalCorpus) => counts.original_corpus = count as usize,
                Some(Provenance::ClinicianValidated) => counts.clinician_validated = count as usize,
                None => warn!(provenance = %provenance, "ignoring unknown provenance"),
            }
        }
        Ok(counts)
    }

    /// Up to `k` documents nearest to `query` by cosine similarity, best first.
    ///
    /// Equal scores are ordered by document id, so the hits for `k` are
    /// always a prefix of the hits for `k + 1`. No score threshold is applied.
    pub async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(Error::invalid_input("k must be at least 1"));
        }

        let query_vector = self.embedder.embed(query).await?;

        let conn = self.conn()?;
        let mut hits = scan_index(&conn, &self.index_name, &query_vector).map_err(|e| match e {
            Error::Database(e) => Error::search(e.to_string()),
            other => other,
        })?;

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        hits.truncate(k);

        debug!(
            index = %self.index_name,
            k,
            returned = hits.len(),
            top_score = hits.first().map(|h| h.score),
            "similarity search"
        );
        Ok(hits)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

fn index_dimension(conn: &Connection, index_name: &str) -> Result<Option<usize>> {
    let dimension: Option<i64> = conn
        .query_row(
            "SELECT dimension FROM knowledge_indexes WHERE name = ?1",
            params![index_name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(dimension.map(|d| d as usize))
}

fn count_documents(conn: &Connection, index_name: &str) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM knowledge_documents WHERE index_name = ?1",
        params![index_name],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

fn insert_document(
    conn: &Connection,
    index_name: &str,
    document: &KnowledgeDocument,
) -> Result<StoredDocument> {
    if document.text.trim().is_empty() {
        return Err(Error::invalid_input("document text must not be empty"));
    }

    let expected = index_dimension(conn, index_name)?
        .ok_or_else(|| Error::IndexMissing(index_name.to_string()))?;
    if document.embedding.len() != expected {
        return Err(Error::DimensionMismatch {
            expected,
            actual: document.embedding.len(),
        });
    }

    let now = Utc::now();
    let stored = StoredDocument {
        id: Uuid::new_v4().to_string(),
        label: document.label.clone(),
        text: document.text.clone(),
        provenance: document.provenance,
        content_hash: hash_content(&document.text),
        created_at: DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now),
    };

    conn.execute(
        "INSERT INTO knowledge_documents (id, index_name, label, text, content_hash, embedding, provenance, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            &stored.id,
            index_name,
            &stored.label,
            &stored.text,
            &stored.content_hash,
            encode_embedding(&document.embedding),
            stored.provenance.as_str(),
            stored.created_at.timestamp_millis(),
        ],
    )?;

    debug!(index = index_name, id = %stored.id, label = %stored.label, "inserted document");
    Ok(stored)
}

/// Score every document in the index against `query_vector`.
fn scan_index(conn: &Connection, index_name: &str, query_vector: &[f32]) -> Result<Vec<SearchHit>> {
    let Some(dimension) = index_dimension(conn, index_name)? else {
        return Ok(Vec::new());
    };
    if query_vector.len() != dimension {
        return Err(Error::DimensionMismatch {
            expected: dimension,
            actual: query_vector.len(),
        });
    }

    let mut stmt = conn.prepare(
        "SELECT id, label, text, provenance, content_hash, created_at, embedding
         FROM knowledge_documents WHERE index_name = ?1",
    )?;
    let rows = stmt.query_map(params![index_name], |row| {
        Ok((row_to_document(row)?, row.get::<_, Vec<u8>>(6)?))
    })?;

    let mut hits = Vec::new();
    for row in rows {
        let (document, blob) = row?;
        let embedding = decode_embedding(&blob, dimension)?;
        hits.push(SearchHit {
            score: cosine_similarity(query_vector, &embedding),
            document,
        });
    }
    Ok(hits)
}

fn row_to_document(row: &Row) -> rusqlite::Result<StoredDocument> {
    let provenance: String = row.get(3)?;
    let provenance = Provenance::from_str(&provenance).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("invalid provenance: {}", provenance).into(),
        )
    })?;

    Ok(StoredDocument {
        id: row.get(0)?,
        label: row.get(1)?,
        text: row.get(2)?,
        provenance,
        content_hash: row.get(4)?,
        created_at: DateTime::from_timestamp_millis(row.get::<_, i64>(5)?).unwrap_or_default(),
    })
}
