//! Embedding provider trait and the local deterministic provider

use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use fnv::FnvHasher;
use std::hash::Hasher;

/// Result of embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f32>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result.
    ///
    /// The dimension is inferred from the first embedding vector and defaults to 0 for an
    /// empty result.
    pub fn new(embeddings: Vec<Vec<f32>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Scales `vector` to unit L2 norm in place. Zero and non-finite norms leave it untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Trait for embedding providers that can generate embeddings from text
///
/// Implementations return L2-normalized vectors of exactly
/// [`embedding_dimension`](Self::embedding_dimension) elements.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate the embedding for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_text(text).await?);
        }
        Ok(EmbeddingResult::new(embeddings))
    }

    /// Get the dimension of embeddings produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Identifier of the model and its version; vectors from different identifiers are not
    /// comparable
    fn model_info(&self) -> String;
}

/// Deterministic embedding provider based on token hashing.
///
/// Every lower-cased whitespace token is hashed with FNV-1a into one of `dimension` buckets;
/// the top hash bit chooses the sign of its contribution. The result is normalized. Texts
/// sharing words end up with a positive cosine similarity, identical texts with similarity 1.
/// This is not a semantic model, only a reproducible stand-in for tests and offline runs.
#[derive(Debug, Clone)]
pub struct HashEmbedProvider {
    dimension: usize,
}

impl HashEmbedProvider {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(EmbedError::invalid_config(
                "hash provider dimension must be positive",
            ));
        }
        Ok(Self { dimension })
    }

    /// Synchronous embedding; the async trait methods delegate here.
    pub fn embed_sync(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbedError::EmptyInput);
        }

        let mut vector = vec![0.0f32; self.dimension];
        for token in text.split_whitespace() {
            let mut hasher = FnvHasher::default();
            hasher.write(token.to_lowercase().as_bytes());
            let hash = hasher.finish();

            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        l2_normalize(&mut vector);
        Ok(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_sync(text)
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn model_info(&self) -> String {
        format!("hash-embedder-v1-d{}", self.dimension)
    }
}
