//! Configuration for embedding providers

use crate::error::{EmbedError, Result};
use crate::openai::OpenAiProvider;
use crate::provider::{EmbeddingProvider, HashEmbedProvider};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default remote embedding model.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Dimension used by the hash provider when none is configured.
pub const DEFAULT_HASH_DIMENSION: usize = 256;

/// Which embedding provider implementation to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Remote OpenAI-compatible HTTP API
    #[default]
    OpenAi,
    /// Local deterministic hash embeddings (tests, offline use)
    Hash,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "hash" => Ok(ProviderKind::Hash),
            _ => Err(format!("Invalid provider: {s} (expected 'openai' or 'hash')")),
        }
    }
}

/// Known output dimensions of OpenAI embedding models.
pub fn default_dimension_for_model(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

/// Configuration for embedding providers
///
/// Deserializes from the `[embedding]` table of a config file; every field has a default so
/// an empty table is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Provider implementation
    pub provider: ProviderKind,
    /// Name of the embedding model (remote provider only)
    pub model: String,
    /// Output dimension; inferred from the model name when absent
    pub dimension: Option<usize>,
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// Maximum number of texts sent in one request
    pub batch_size: usize,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            model: DEFAULT_MODEL.to_string(),
            dimension: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_ms: 30_000,
            batch_size: 16,
        }
    }
}

impl EmbedConfig {
    /// Configuration for a remote OpenAI model
    pub fn openai(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Configuration for the deterministic hash provider
    pub fn hash(dimension: usize) -> Self {
        Self {
            provider: ProviderKind::Hash,
            dimension: Some(dimension),
            ..Self::default()
        }
    }

    /// Set the provider kind (builder style)
    pub fn with_provider(self, provider: ProviderKind) -> Self {
        Self { provider, ..self }
    }

    /// Set an explicit output dimension (builder style)
    pub fn with_dimension(self, dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            ..self
        }
    }

    /// Set the API base URL (builder style)
    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..self
        }
    }

    /// Set the per-request timeout (builder style)
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            ..self
        }
    }

    /// Set the maximum request batch size (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The dimension vectors from this configuration will have.
    pub fn resolved_dimension(&self) -> Result<usize> {
        match (self.dimension, self.provider) {
            (Some(dimension), _) => Ok(dimension),
            (None, ProviderKind::Hash) => Ok(DEFAULT_HASH_DIMENSION),
            (None, ProviderKind::OpenAi) => default_dimension_for_model(&self.model)
                .ok_or_else(|| {
                    EmbedError::invalid_config(format!(
                        "unknown dimension for model '{}'; set `dimension` explicitly",
                        self.model
                    ))
                }),
        }
    }

    /// The `dimensions` parameter to send to the remote API.
    ///
    /// Only set when it differs from the model's native size; older models such as
    /// `text-embedding-ada-002` reject the parameter outright.
    pub fn requested_dimensions(&self) -> Option<usize> {
        self.dimension
            .filter(|&dimension| default_dimension_for_model(&self.model) != Some(dimension))
    }

    /// Validate the configuration without creating a provider
    pub fn validate(&self) -> Result<()> {
        if self.resolved_dimension()? == 0 {
            return Err(EmbedError::invalid_config("dimension must be positive"));
        }
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch_size must be positive"));
        }
        if self.timeout_ms == 0 {
            return Err(EmbedError::invalid_config("timeout_ms must be positive"));
        }
        if self.provider == ProviderKind::OpenAi && self.model.trim().is_empty() {
            return Err(EmbedError::invalid_config("model name is empty"));
        }
        Ok(())
    }

    /// Create the configured provider.
    ///
    /// The remote provider reads its API key from the environment variable named by
    /// [`api_key_env`](Self::api_key_env).
    pub fn build_provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        self.validate()?;
        let provider: Arc<dyn EmbeddingProvider> = match self.provider {
            ProviderKind::Hash => Arc::new(HashEmbedProvider::new(self.resolved_dimension()?)?),
            ProviderKind::OpenAi => Arc::new(OpenAiProvider::from_env(self)?),
        };
        tracing::debug!(
            "Created embedding provider {} (dimension {})",
            provider.model_info(),
            provider.embedding_dimension()
        );
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmbedConfig::default();

        assert_eq!(config.provider, ProviderKind::OpenAi);
        assert_eq!(config.model, "text-embedding-3-small");
        assert_eq!(config.resolved_dimension().unwrap(), 1536);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_requested_dimensions() {
        assert_eq!(EmbedConfig::openai("text-embedding-ada-002").requested_dimensions(), None);
        assert_eq!(
            EmbedConfig::openai("text-embedding-ada-002")
                .with_dimension(1536)
                .requested_dimensions(),
            None
        );
        assert_eq!(
            EmbedConfig::openai("text-embedding-3-large")
                .with_dimension(256)
                .requested_dimensions(),
            Some(256)
        );
        assert_eq!(
            EmbedConfig::openai("custom-model")
                .with_dimension(3)
                .requested_dimensions(),
            Some(3)
        );
    }

    #[test]
    fn test_model_dimensions() {
        assert_eq!(
            EmbedConfig::openai("text-embedding-3-large")
                .resolved_dimension()
                .unwrap(),
            3072
        );
        assert!(EmbedConfig::openai("my-model").resolved_dimension().is_err());
        assert_eq!(
            EmbedConfig::openai("my-model")
                .with_dimension(768)
                .resolved_dimension()
                .unwrap(),
            768
        );
        assert_eq!(
            EmbedConfig::default()
                .with_provider(ProviderKind::Hash)
                .resolved_dimension()
                .unwrap(),
            DEFAULT_HASH_DIMENSION
        );
    }

    #[test]
    fn test_validation_errors() {
        assert!(EmbedConfig::hash(0).validate().is_err());
        assert!(EmbedConfig::hash(8).with_batch_size(0).validate().is_err());
        assert!(
            EmbedConfig::hash(8)
                .with_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("openai".parse::<ProviderKind>(), Ok(ProviderKind::OpenAi));
        assert_eq!("HASH".parse::<ProviderKind>(), Ok(ProviderKind::Hash));
        assert!("fastembed".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_deserialize_partial_table() {
        let config: EmbedConfig =
            serde_json::from_str(r#"{"provider": "hash", "dimension": 32}"#).unwrap();

        assert_eq!(config.provider, ProviderKind::Hash);
        assert_eq!(config.dimension, Some(32));
        assert_eq!(config.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_build_hash_provider() {
        let provider = EmbedConfig::hash(16).build_provider().unwrap();

        assert_eq!(provider.embedding_dimension(), 16);
        assert_eq!(provider.model_info(), "hash-embedder-v1-d16");
    }
}
