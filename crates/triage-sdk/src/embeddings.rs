//! Local Embedding Model
//!
//! Provides vector embeddings using `fastembed` for the knowledge store.
//! Uses the bge-large-en-v1.5 model (1024 dimensions).
//!
//! # Features
//!
//! - Local inference (no API calls)
//! - Lazy model loading
//! - Batch embedding support

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use triage_core::embedding::{ensure_embeddable, Embedder, HashEmbedder};

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::{SDKError, SDKResult};

/// Embedding dimensions for bge-large-en-v1.5
pub const EMBEDDING_DIMENSIONS: usize = 1024;

/// Model identifier reported by [`FastEmbedder`]
pub const EMBEDDING_MODEL_NAME: &str = "bge-large-en-v1.5";

/// Embedder backed by a local fastembed model
#[cfg(feature = "embeddings")]
pub struct FastEmbedder {
    model: Arc<tokio::sync::RwLock<Option<fastembed::TextEmbedding>>>,
    cache_dir: Option<PathBuf>,
}

#[cfg(feature = "embeddings")]
impl FastEmbedder {
    /// Create a new embedder. The model is loaded on first use.
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self {
            model: Arc::new(tokio::sync::RwLock::new(None)),
            cache_dir,
        }
    }

    /// Initialize the embedding model (lazy loading)
    async fn ensure_model(&self) -> SDKResult<()> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        let model_guard = self.model.read().await;
        if model_guard.is_some() {
            return Ok(());
        }
        drop(model_guard);

        let mut model_guard = self.model.write().await;
        if model_guard.is_some() {
            return Ok(());
        }

        tracing::info!("Loading embedding model: {}", EMBEDDING_MODEL_NAME);
        let start = std::time::Instant::now();

        let mut init_options = InitOptions::default();
        init_options.model_name = EmbeddingModel::BGELargeENV15;
        init_options.show_download_progress = false;
        if let Some(ref cache_dir) = self.cache_dir {
            init_options.cache_dir = cache_dir.clone();
        }

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| SDKError::embedding(format!("Failed to load embedding model: {}", e)))?;

        tracing::info!("Embedding model loaded in {:?}", start.elapsed());

        *model_guard = Some(model);
        Ok(())
    }

    async fn embed_texts(&self, texts: Vec<&str>) -> SDKResult<Vec<Vec<f32>>> {
        self.ensure_model().await?;

        let model_guard = self.model.read().await;
        let model = model_guard
            .as_ref()
            .ok_or_else(|| SDKError::embedding("Embedding model not initialized"))?;

        model
            .embed(texts, None)
            .map_err(|e| SDKError::embedding(format!("Failed to generate embeddings: {}", e)))
    }

    /// Check if the model is loaded
    pub async fn is_loaded(&self) -> bool {
        self.model.read().await.is_some()
    }
}

#[cfg(feature = "embeddings")]
#[async_trait]
impl Embedder for FastEmbedder {
    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }

    fn model_name(&self) -> &str {
        EMBEDDING_MODEL_NAME
    }

    async fn embed(&self, text: &str) -> triage_core::Result<Vec<f32>> {
        ensure_embeddable(text)?;

        self.embed_texts(vec![text])
            .await
            .map_err(|e| triage_core::Error::embedding(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| triage_core::Error::embedding("No embedding generated"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> triage_core::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for text in texts {
            ensure_embeddable(text)?;
        }

        self.embed_texts(texts.to_vec())
            .await
            .map_err(|e| triage_core::Error::embedding(e.to_string()))
    }
}

/// Build the embedder selected by `config`.
pub fn build_embedder(config: &EmbeddingConfig) -> SDKResult<Arc<dyn Embedder>> {
    match config.backend {
        EmbeddingBackend::Hash => Ok(Arc::new(HashEmbedder::new(config.dimension))),
        #[cfg(feature = "embeddings")]
        EmbeddingBackend::Fastembed => {
            if config.dimension != EMBEDDING_DIMENSIONS {
                return Err(SDKError::invalid_operation(format!(
                    "{} produces {} dimensions, config asks for {}",
                    EMBEDDING_MODEL_NAME, EMBEDDING_DIMENSIONS, config.dimension
                )));
            }
            Ok(Arc::new(FastEmbedder::new(config.cache_dir.clone())))
        }
        #[cfg(not(feature = "embeddings"))]
        EmbeddingBackend::Fastembed => Err(SDKError::embedding(
            "Embeddings feature not enabled. Compile with --features embeddings",
        )),
    }
}
