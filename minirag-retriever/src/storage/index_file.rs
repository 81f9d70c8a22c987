//! The persisted vector index.

use super::framing::{decode_framed, encode_framed, read_if_exists, write_atomic};
use crate::error::{Result, RetrieverError};
use crate::retrieval::vector_index::VectorIndex;
use bincode::{Decode, Encode};
use minirag_context::Chunk;
use std::path::{Path, PathBuf};

/// Magic bytes at the start of an index file.
pub const INDEX_MAGIC: [u8; 4] = *b"MRAG";

/// Serialized form of a finished index: chunks, their vectors and the model that made them.
///
/// `vectors[i]` is the embedding of `chunks[i]` and has exactly `dimension` elements.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct IndexFile {
    pub chunks: Vec<Chunk>,
    pub vectors: Vec<Vec<f32>>,
    pub model_info: String,
    pub dimension: usize,
}

impl IndexFile {
    pub fn new(index: &VectorIndex, model_info: impl Into<String>) -> Self {
        Self {
            chunks: index.chunks().to_vec(),
            vectors: index.vectors().to_vec(),
            model_info: model_info.into(),
            dimension: index.dimension(),
        }
    }

    /// Check that chunks and vectors correspond and all vectors have the declared dimension.
    pub fn validate(&self) -> Result<()> {
        if self.chunks.len() != self.vectors.len() {
            return Err(RetrieverError::invariant(format!(
                "index has {} chunks but {} vectors",
                self.chunks.len(),
                self.vectors.len()
            )));
        }
        if let Some((i, vector)) = self
            .vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != self.dimension)
        {
            return Err(RetrieverError::invariant(format!(
                "vector {i} has dimension {}, index dimension is {}",
                vector.len(),
                self.dimension
            )));
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_framed(INDEX_MAGIC, self, "index")
    }

    /// Decode and validate; `origin` names the source in errors.
    pub fn decode(bytes: &[u8], origin: &Path) -> Result<Self> {
        let file: Self = decode_framed(INDEX_MAGIC, bytes, origin)?;
        file.validate()?;
        Ok(file)
    }

    /// Build the searchable index, keeping the model identifier.
    pub fn into_index(self) -> Result<(VectorIndex, String)> {
        let index = VectorIndex::build(self.chunks, self.vectors, self.dimension)?;
        Ok((index, self.model_info))
    }

    /// Number of distinct source documents.
    pub fn document_count(&self) -> usize {
        let mut paths: Vec<&str> = self.chunks.iter().map(|c| c.path.as_str()).collect();
        paths.sort_unstable();
        paths.dedup();
        paths.len()
    }
}

/// Location of the index file on disk.
#[derive(Debug, Clone)]
pub struct IndexFileStore {
    path: PathBuf,
}

impl IndexFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn save(&self, index: &IndexFile) -> Result<()> {
        index.validate()?;
        let bytes = index.encode()?;
        write_atomic(&self.path, &bytes).await?;
        tracing::info!(
            "Saved index with {} chunks to {}",
            index.chunks.len(),
            self.path.display()
        );
        Ok(())
    }

    pub async fn load(&self) -> Result<IndexFile> {
        let bytes = read_if_exists(&self.path).await?.ok_or_else(|| {
            RetrieverError::Io {
                path: self.path.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "index file not found; run `minirag generate` first",
                ),
            }
        })?;
        let file = IndexFile::decode(&bytes, &self.path)?;
        tracing::debug!(
            "Loaded index with {} chunks ({}, dimension {}) from {}",
            file.chunks.len(),
            file.model_info,
            file.dimension,
            self.path.display()
        );
        Ok(file)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> IndexFile {
        IndexFile {
            chunks: vec![
                Chunk::new("a.md", "alpha", "A", 0),
                Chunk::new("a.md", "beta", "B", 12),
                Chunk::new("b.md", "gamma", "", 0),
            ],
            vectors: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.6, 0.8]],
            model_info: "hash-embedder-v1-d2".to_string(),
            dimension: 2,
        }
    }

    #[tokio::test]
    async fn test_save_and_load() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = IndexFileStore::new(dir.path().join("index.bin"));

        store.save(&sample()).await?;
        let loaded = store.load().await?;

        assert_eq!(loaded, sample());
        assert_eq!(loaded.document_count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_contents() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("index.bin");

        let mut broken = sample();
        broken.vectors[1] = vec![1.0];
        tokio::fs::write(&path, broken.encode()?).await?;
        let err = IndexFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, RetrieverError::InvariantViolation { .. }));

        tokio::fs::write(&path, b"MRCP\x01\x00\x00\x00").await?;
        let err = IndexFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, RetrieverError::CorruptFile { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_index() {
        let dir = tempdir().unwrap();
        let store = IndexFileStore::new(dir.path().join("index.bin"));

        assert!(!store.exists());
        let err = store.load().await.unwrap_err();
        assert!(err.to_string().contains("minirag generate"));
    }

    #[test]
    fn test_from_vector_index() {
        let (index, model_info) = sample().into_index().unwrap();

        assert_eq!(IndexFile::new(&index, model_info), sample());
    }

    #[test]
    fn test_into_index() {
        let (index, model_info) = sample().into_index().unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.dimension(), 2);
        assert_eq!(model_info, "hash-embedder-v1-d2");
    }
}
