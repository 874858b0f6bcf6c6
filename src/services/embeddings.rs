use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MatchError, Result};
use crate::services::transport::{bounded, check_status, estimate_tokens, http_client, transport_error, CancelToken};

const SERVICE: &str = "embedding service";

/// A single embedded text
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub tokens: u32,
}

/// Vectors for a batch of texts, in input order
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingBatch {
    pub vectors: Vec<Vec<f32>>,
    pub total_tokens: u32,
}

/// Text embedding service
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed_batch(
        &self,
        texts: &[String],
        cancel: Option<&CancelToken>,
    ) -> Result<EmbeddingBatch>;

    async fn embed(&self, text: &str, cancel: Option<&CancelToken>) -> Result<Embedding> {
        let batch = self.embed_batch(&[text.to_string()], cancel).await?;
        let vector = batch.vectors.into_iter().next().ok_or_else(|| MatchError::Upstream {
            service: SERVICE,
            message: "empty embedding response".to_string(),
        })?;
        Ok(Embedding {
            vector,
            tokens: batch.total_tokens,
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingUsage {
    total_tokens: u32,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint
pub struct HttpEmbeddingClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl HttpEmbeddingClient {
    pub fn new(endpoint: String, api_key: String, model: String, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(MatchError::Configuration(
                "embedding service API key is not set".to_string(),
            ));
        }

        Ok(Self {
            client: http_client()?,
            endpoint,
            api_key,
            model,
            timeout,
        })
    }

    async fn send(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        let url = format!("{}/embeddings", self.endpoint.trim_end_matches('/'));

        tracing::debug!("Embedding {} texts with {}", texts.len(), self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let response = check_status(SERVICE, response).await?;
        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        if body.data.len() != texts.len() {
            return Err(MatchError::Upstream {
                service: SERVICE,
                message: format!(
                    "received {} vectors for {} inputs",
                    body.data.len(),
                    texts.len()
                ),
            });
        }

        let mut data = body.data;
        data.sort_by_key(|d| d.index);

        let total_tokens = body
            .usage
            .map(|u| u.total_tokens)
            .unwrap_or_else(|| texts.iter().map(|t| estimate_tokens(t)).sum());

        Ok(EmbeddingBatch {
            vectors: data.into_iter().map(|d| d.embedding).collect(),
            total_tokens,
        })
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbeddingClient {
    async fn embed_batch(
        &self,
        texts: &[String],
        cancel: Option<&CancelToken>,
    ) -> Result<EmbeddingBatch> {
        if texts.is_empty() {
            return Ok(EmbeddingBatch {
                vectors: vec![],
                total_tokens: 0,
            });
        }
        bounded(SERVICE, self.timeout, cancel, self.send(texts)).await
    }
}
