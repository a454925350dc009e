//! Embedding service facade: the external collaborator contract from §6
//! (`embed(text, role) -> future<float[D]>`) wrapped in the cache layering
//! the teacher uses around its local ONNX backend — in-memory content-hash
//! cache, a separate query-string cache, and a disk-backed persistent cache
//! so restarts and provider-unchanged redeploys don't recompute vectors.

mod cache;
mod local;

pub use cache::{CacheStats, PersistentCacheStats, PersistentEmbeddingCache, QueryCacheStats};
pub use local::LocalHashEmbedder;

use crate::errors::{EngineError, Result};
use async_trait::async_trait;
use cache::{ChunkEmbeddingCache, QueryCache};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Role tag threaded through to the embedding backend; some providers use
/// asymmetric query/document encoders and need to know which is which.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingRole {
    RetrievalQuery,
    RetrievalDocument,
}

/// A chunk text awaiting embedding, produced by C6's serializer.
#[derive(Debug, Clone)]
pub struct PendingChunk {
    pub chunk_index: i64,
    pub content_text: String,
    pub container_path: String,
    pub timestamp: i64,
}

impl PendingChunk {
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content_text.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// A chunk with its embedding attached.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk_index: i64,
    pub content_text: String,
    pub container_path: String,
    pub timestamp: i64,
    pub embedding: Vec<f32>,
}

/// The embedding service contract (§6): `embed(text, role) -> future<float[D]>`.
/// Implementations may fail transiently (network, rate-limit) or
/// permanently (invalid key, unknown model); callers distinguish via the
/// error taxonomy, not via this trait's return type.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str, role: EmbeddingRole) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: &[String], role: EmbeddingRole) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text, role).await?);
        }
        Ok(out)
    }
    fn dimensions(&self) -> usize;
    fn provider_name(&self) -> &str;
    fn model_name(&self) -> &str;
}

/// High-level embedding service layering caches over a backend client.
pub struct EmbeddingService {
    client: Arc<dyn EmbeddingClient>,
    chunk_cache: ChunkEmbeddingCache,
    query_cache: QueryCache,
    persistent_cache: Option<PersistentEmbeddingCache>,
}

impl EmbeddingService {
    pub fn new(client: Arc<dyn EmbeddingClient>, cache_max_memory_mb: usize) -> Self {
        let persistent_cache = match PersistentEmbeddingCache::open(client.model_name()) {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!(
                    "failed to open persistent embedding cache: {e} (continuing without)"
                );
                None
            }
        };
        Self {
            client,
            chunk_cache: ChunkEmbeddingCache::with_memory_limit_mb(cache_max_memory_mb),
            query_cache: QueryCache::new(),
            persistent_cache,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.client.dimensions()
    }

    pub fn provider_name(&self) -> &str {
        self.client.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    /// Embed chunk texts with role "retrieval-document", checking the
    /// in-memory cache, then the persistent content-hash cache, before
    /// falling back to the backend for true misses.
    pub async fn embed_chunks(&self, chunks: Vec<PendingChunk>) -> Result<Vec<EmbeddedChunk>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<(usize, EmbeddedChunk)> = Vec::with_capacity(chunks.len());
        let mut misses: Vec<(usize, PendingChunk, String)> = Vec::new();

        for (i, chunk) in chunks.into_iter().enumerate() {
            let hash = chunk.content_hash();
            if let Some(embedding) = self.chunk_cache.get(&hash) {
                results.push((i, Self::attach(chunk, embedding)));
                continue;
            }
            if let Some(cache) = &self.persistent_cache {
                if let Ok(Some(embedding)) = cache.get(&hash) {
                    self.chunk_cache.put(hash.clone(), embedding.clone());
                    results.push((i, Self::attach(chunk, embedding)));
                    continue;
                }
            }
            misses.push((i, chunk, hash));
        }

        if !misses.is_empty() {
            let texts: Vec<String> = misses.iter().map(|(_, c, _)| c.content_text.clone()).collect();
            let embeddings = self
                .client
                .embed_batch(&texts, EmbeddingRole::RetrievalDocument)
                .await?;

            if embeddings.len() != misses.len() {
                return Err(EngineError::EmbeddingPermanent(
                    "embedding backend returned a mismatched batch size".to_string(),
                ));
            }

            if let Some(cache) = &self.persistent_cache {
                let entries: Vec<(&str, &[f32])> = misses
                    .iter()
                    .zip(embeddings.iter())
                    .map(|((_, _, hash), emb)| (hash.as_str(), emb.as_slice()))
                    .collect();
                if let Err(e) = cache.put_batch(&entries) {
                    tracing::warn!("failed to write persistent embedding cache: {e}");
                }
            }

            for ((i, chunk, hash), embedding) in misses.into_iter().zip(embeddings.into_iter()) {
                self.chunk_cache.put(hash, embedding.clone());
                results.push((i, Self::attach(chunk, embedding)));
            }
        }

        results.sort_by_key(|(i, _)| *i);
        Ok(results.into_iter().map(|(_, c)| c).collect())
    }

    fn attach(chunk: PendingChunk, embedding: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk_index: chunk.chunk_index,
            content_text: chunk.content_text,
            container_path: chunk.container_path,
            timestamp: chunk.timestamp,
            embedding,
        }
    }

    /// Embed a query string with role "retrieval-query", using the
    /// query-string cache (separate from the content-hash chunk cache
    /// since query text rarely matches chunk content verbatim).
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        if let Some(cached) = self.query_cache.get(query) {
            return Ok(cached);
        }
        let embedding = self.client.embed(query, EmbeddingRole::RetrievalQuery).await?;
        self.query_cache.put(query, embedding.clone());
        Ok(embedding)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.chunk_cache.stats()
    }

    pub fn query_cache_stats(&self) -> QueryCacheStats {
        self.query_cache.stats()
    }

    pub fn persistent_cache_stats(&self) -> Option<PersistentCacheStats> {
        self.persistent_cache.as_ref().and_then(|c| c.stats().ok())
    }
}
