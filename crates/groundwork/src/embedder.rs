//! Embedding backends.
//!
//! The default `hash` backend computes the deterministic feature vector
//! in-process. The `remote` backend posts batches to an external embedding
//! service with exponential-backoff retries; it exists so a learned model
//! can be swapped in behind the same contract. Either way, embedding
//! failures are recoverable: the orchestrator logs them and the affected
//! chunks stay keyword-searchable without a vector.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use groundwork_core::error::EmbeddingError;
use groundwork_core::features;

use crate::config::EmbeddingConfig;

#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Backend identifier for logs.
    fn name(&self) -> &str;
    /// Vector dimensionality this backend produces.
    fn dims(&self) -> usize;
    /// Embed one batch; `ids` parallel `texts` and identify the chunks the
    /// vectors will attach to. Returns one vector per text, in order.
    async fn embed_batch(
        &self,
        ids: &[String],
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Build the backend selected by the configuration.
pub fn create_backend(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingBackend>> {
    match config.backend.as_str() {
        "hash" => Ok(Box::new(HashBackend { dims: config.dims })),
        "remote" => Ok(Box::new(RemoteBackend::new(config)?)),
        "disabled" => Ok(Box::new(DisabledBackend)),
        other => anyhow::bail!("Unknown embedding backend: {}", other),
    }
}

/// In-process deterministic feature-hash embedding.
pub struct HashBackend {
    dims: usize,
}

#[async_trait]
impl EmbeddingBackend for HashBackend {
    fn name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(
        &self,
        _ids: &[String],
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|t| features::embed_with_dims(t, self.dims))
            .collect())
    }
}

/// Backend that always declines. Documents still complete; retrieval runs
/// on keywords alone.
pub struct DisabledBackend;

#[async_trait]
impl EmbeddingBackend for DisabledBackend {
    fn name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed_batch(
        &self,
        _ids: &[String],
        _texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Disabled)
    }
}

#[derive(Serialize)]
struct RemoteRequest<'a> {
    ids: &'a [String],
    texts: &'a [String],
}

#[derive(Deserialize)]
struct RemoteResponse {
    vectors: Vec<Vec<f32>>,
}

/// HTTP batch embedding client.
///
/// Retries rate limits (429), server errors (5xx), and network failures
/// with exponential backoff (1s, 2s, 4s, …, capped at 2^5); any other 4xx
/// fails immediately.
pub struct RemoteBackend {
    client: reqwest::Client,
    endpoint: String,
    dims: usize,
    max_retries: u32,
}

impl RemoteBackend {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.endpoint is required for remote backend"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for RemoteBackend {
    fn name(&self) -> &str {
        "remote"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(
        &self,
        ids: &[String],
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let payload = RemoteRequest { ids, texts };
        let mut last_error = String::new();

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_secs(1u64 << attempt.min(5));
                tokio::time::sleep(backoff).await;
            }

            let response = match self
                .client
                .post(&self.endpoint)
                .json(&payload)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_error = e.to_string();
                    tracing::warn!(attempt, error = %last_error, "embedding request failed");
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                last_error = format!("http {status}");
                tracing::warn!(attempt, %status, "embedding service busy, backing off");
                continue;
            }
            if !status.is_success() {
                return Err(EmbeddingError::Request(format!("http {status}")));
            }

            let body: RemoteResponse = response
                .json()
                .await
                .map_err(|e| EmbeddingError::BadResponse(e.to_string()))?;
            if body.vectors.len() != texts.len() {
                return Err(EmbeddingError::BadResponse(format!(
                    "expected {} vectors, got {}",
                    texts.len(),
                    body.vectors.len()
                )));
            }
            return Ok(body.vectors);
        }

        Err(EmbeddingError::Exhausted {
            attempts: self.max_retries + 1,
            detail: last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_backend_matches_core_embed() {
        let backend = HashBackend { dims: 384 };
        let out = backend
            .embed_batch(
                &["c1".to_string()],
                &["deterministic feature vector".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(out[0], features::embed("deterministic feature vector"));
    }

    #[tokio::test]
    async fn disabled_backend_declines() {
        let backend = DisabledBackend;
        let err = backend
            .embed_batch(&["c1".to_string()], &["text".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Disabled));
    }

    #[test]
    fn create_backend_rejects_unknown() {
        let config = EmbeddingConfig {
            backend: "quantum".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_backend(&config).is_err());
    }
}
