//! minirag-retriever: semantic search over a markdown documentation tree
//!
//! This crate turns a directory of markdown files into an in-memory vector index and answers
//! free-text queries against it with exact cosine similarity. Index generation is a resumable
//! batch job: embeddings are produced with bounded concurrency and progress is checkpointed,
//! so an interrupted or partially failed run continues where it stopped.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: document loading, the embedding pipeline, the vector index and search
//! - **[`storage`]**: the persisted index file format
//! - **[`config`]**: settings for the `minirag` binary
//! - **[`error`]**: the crate error type and its classification
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use minirag_embed::HashEmbedProvider;
//! use minirag_retriever::retrieval::{
//!     checkpoint::CheckpointStore,
//!     chunking_strategy::{ChunkingConfig, ChunkingStrategy},
//!     embedding_pipeline::{EmbeddingPipeline, PipelineConfig, PipelineOutcome},
//!     search::search,
//! };
//! use minirag_retriever::storage::IndexFileStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let chunks = ChunkingStrategy::new(ChunkingConfig::new("docs")).load_chunks()?;
//! let provider = Arc::new(HashEmbedProvider::new(256)?);
//! let pipeline = EmbeddingPipeline::new(
//!     provider.clone(),
//!     PipelineConfig::default(),
//!     CheckpointStore::new("embeddings/checkpoint.bin"),
//!     IndexFileStore::new("embeddings/index.bin"),
//! );
//!
//! let (_shutdown, signal) = tokio::sync::watch::channel(false);
//! if let PipelineOutcome::Completed { index, .. } = pipeline.run(chunks, signal).await? {
//!     let (index, _model) = index.into_index()?;
//!     let query = provider.embed_sync("how do I configure logging")?;
//!     for result in search(&index, &query, 5, 0.0) {
//!         println!("{:.2} {}", result.score, result.chunk.path);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! docs/*.md → ChunkingStrategy → EmbeddingPipeline ⇄ Checkpoint
//!                                       ↓
//!                    query → IndexFile → VectorIndex → search
//! ```

pub mod config;
pub mod error;
pub mod retrieval;
pub mod storage;

pub use error::{ErrorKind, Result, RetrieverError};
