//! OpenAI-compatible remote embedding provider.

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, l2_normalize};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Async embeddings client that talks to OpenAI-compatible endpoints.
///
/// Every returned vector is checked against the configured dimension and normalized. Calls
/// are not retried here: a failed call surfaces to the caller, which decides whether the
/// work is attempted again.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
    requested_dimensions: Option<usize>,
    timeout: Duration,
    batch_size: usize,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiProvider {
    /// Builds a client using an explicit API key.
    pub fn new(api_key: &str, config: &EmbedConfig) -> Result<Self> {
        config.validate()?;
        if api_key.trim().is_empty() {
            return Err(EmbedError::unavailable("missing OpenAI API key"));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| EmbedError::invalid_config("API key is not a valid header value"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            dimension: config.resolved_dimension()?,
            requested_dimensions: config.requested_dimensions(),
            timeout: config.timeout(),
            batch_size: config.batch_size,
        })
    }

    /// Builds a client reading the API key from the configured environment variable.
    pub fn from_env(config: &EmbedConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            EmbedError::unavailable(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;
        Self::new(&api_key, config)
    }

    /// Sends one request for `inputs` and returns their vectors in input order.
    async fn request(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        if inputs.iter().any(|text| text.trim().is_empty()) {
            return Err(EmbedError::EmptyInput);
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.requested_dimensions,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbedError::provider(format!(
                "embeddings request failed ({status}): {body}"
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(e))?;
        parsed.data.sort_by_key(|entry| entry.index);

        if parsed.data.len() != inputs.len() {
            return Err(EmbedError::provider(format!(
                "provider returned {} embeddings for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }

        parsed
            .data
            .into_iter()
            .map(|entry| {
                let mut embedding = entry.embedding;
                if embedding.len() != self.dimension {
                    return Err(EmbedError::DimensionMismatch {
                        expected: self.dimension,
                        actual: embedding.len(),
                    });
                }
                l2_normalize(&mut embedding);
                Ok(embedding)
            })
            .collect()
    }

    fn transport_error(&self, err: reqwest::Error) -> EmbedError {
        if err.is_timeout() {
            EmbedError::Timeout {
                after: self.timeout,
            }
        } else if err.is_connect() {
            EmbedError::unavailable(err.to_string())
        } else if err.is_decode() {
            EmbedError::provider(format!("failed to parse embedding response: {err}"))
        } else {
            EmbedError::Http { source: err }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.request(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::provider("no embedding data returned"))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let inputs: Vec<&str> = batch.iter().map(String::as_str).collect();
            tracing::debug!("Requesting embeddings for batch of {} texts", inputs.len());
            embeddings.extend(self.request(&inputs).await?);
        }
        Ok(EmbeddingResult::new(embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn model_info(&self) -> String {
        format!("openai-{}", self.model)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
