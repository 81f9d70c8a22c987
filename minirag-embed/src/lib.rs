//! # minirag-embed
//!
//! Text embedding providers for the minirag retrieval layer. A provider turns a piece of text
//! into a fixed-length, L2-normalized `f32` vector, or fails.
//!
//! ## Providers
//!
//! - [`OpenAiProvider`]: remote OpenAI-compatible HTTP API with a per-request timeout
//! - [`HashEmbedProvider`]: deterministic token-hashing stand-in, pure and reproducible,
//!   used by the test suites and for offline runs
//!
//! ## Quick Start
//!
//! ```
//! use minirag_embed::{EmbedConfig, EmbeddingProvider};
//!
//! # async fn example() -> minirag_embed::Result<()> {
//! let provider = EmbedConfig::hash(64).build_provider()?;
//!
//! let vector = provider.embed_text("How do I configure the cache?").await?;
//! assert_eq!(vector.len(), provider.embedding_dimension());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`config`]: provider selection and parameters, deserializable from a config file
//! - [`provider`]: the [`EmbeddingProvider`] trait and the hash provider
//! - [`openai`]: the remote provider
//! - [`error`]: [`EmbedError`] and the crate [`Result`] alias

pub mod config;
pub mod error;
pub mod openai;
pub mod provider;

// Re-export main types for easy access
pub use config::{EmbedConfig, ProviderKind};
pub use error::{EmbedError, Result};
pub use openai::OpenAiProvider;
pub use provider::{EmbeddingProvider, EmbeddingResult, HashEmbedProvider, l2_normalize};
