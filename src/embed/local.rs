//! A dependency-free fallback `EmbeddingClient`: hashes whitespace tokens
//! into a fixed-width bag-of-words vector. It's good enough for offline
//! development, `doctor` checks, and the integration tests in this repo,
//! but is not a semantic embedding model — real deployments inject a
//! remote client (OpenAI, a local ONNX server, etc.) that implements the
//! same trait.

use crate::embed::{EmbeddingClient, EmbeddingRole};
use crate::errors::Result;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub struct LocalHashEmbedder {
    dimensions: usize,
    model_name: String,
}

impl LocalHashEmbedder {
    pub fn new(dimensions: usize, model_name: impl Into<String>) -> Self {
        Self {
            dimensions,
            model_name: model_name.into(),
        }
    }
}

#[async_trait]
impl EmbeddingClient for LocalHashEmbedder {
    async fn embed(&self, text: &str, _role: EmbeddingRole) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dimensions;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "local"
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_text_produces_identical_vector() {
        let embedder = LocalHashEmbedder::new(32, "test-hash-model");
        let a = embedder.embed("diamond pickaxe", EmbeddingRole::RetrievalDocument).await.unwrap();
        let b = embedder.embed("diamond pickaxe", EmbeddingRole::RetrievalQuery).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn vector_is_unit_normalized() {
        let embedder = LocalHashEmbedder::new(16, "test-hash-model");
        let v = embedder.embed("diamond sword netherite pickaxe", EmbeddingRole::RetrievalDocument).await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
