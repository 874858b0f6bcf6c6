use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MatchError, Result};
use crate::models::QueryWeights;
use crate::services::transport::{bounded, check_status, http_client, transport_error, CancelToken};

const SERVICE: &str = "vector store";

/// Query vectors for one profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryVectors {
    pub task: Vec<f32>,
    pub narrative: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<f32>>,
}

/// One nearest-neighbour hit
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoredSlug {
    pub slug: String,
    pub similarity: f64,
}

/// Nearest-neighbour search over the catalog vectors
///
/// Stores cannot filter on eligibility; callers over-fetch and filter.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn query(
        &self,
        vectors: &QueryVectors,
        weights: QueryWeights,
        limit: usize,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<ScoredSlug>>;
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    vectors: &'a QueryVectors,
    weights: QueryWeights,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<ScoredSlug>,
}

/// HTTP vector store client
pub struct HttpVectorStore {
    client: Client,
    endpoint: String,
    api_key: String,
    collection: String,
    timeout: Duration,
}

impl HttpVectorStore {
    pub fn new(
        endpoint: String,
        api_key: String,
        collection: String,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(MatchError::Configuration(
                "vector store API key is not set".to_string(),
            ));
        }

        Ok(Self {
            client: http_client()?,
            endpoint,
            api_key,
            collection,
            timeout,
        })
    }

    async fn send(
        &self,
        vectors: &QueryVectors,
        weights: QueryWeights,
        limit: usize,
    ) -> Result<Vec<ScoredSlug>> {
        let url = format!(
            "{}/collections/{}/query",
            self.endpoint.trim_end_matches('/'),
            self.collection
        );

        tracing::debug!("Querying vector store collection {} (limit {})", self.collection, limit);

        let response = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&QueryRequest {
                vectors,
                weights,
                limit,
            })
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let response = check_status(SERVICE, response).await?;
        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        Ok(body.results)
    }
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn query(
        &self,
        vectors: &QueryVectors,
        weights: QueryWeights,
        limit: usize,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<ScoredSlug>> {
        bounded(SERVICE, self.timeout, cancel, self.send(vectors, weights, limit)).await
    }
}
