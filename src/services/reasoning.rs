//! Generative reasoning client.
//!
//! Wraps the Anthropic Messages API. There is no retry loop: a 429 is
//! surfaced to the caller as `RateLimited` with the service's retry hint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MatchError, Result};
use crate::models::ModelTier;
use crate::services::transport::{bounded, check_status, estimate_tokens, http_client, transport_error, CancelToken};

const SERVICE: &str = "reasoning service";
pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_API_VERSION: &str = "2023-06-01";

/// Text returned by the reasoning service, with token usage for costing
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn complete(
        &self,
        tier: ModelTier,
        system: &str,
        payload: &str,
        cancel: Option<&CancelToken>,
    ) -> Result<Completion>;
}

/// Model name and output budget for one tier
#[derive(Debug, Clone, PartialEq)]
pub struct TierModel {
    pub model: String,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

pub struct AnthropicClient {
    client: Client,
    api_url: String,
    api_version: String,
    api_key: String,
    full: TierModel,
    light: TierModel,
    timeout: Duration,
}

impl AnthropicClient {
    pub fn new(
        api_url: String,
        api_version: String,
        api_key: String,
        full: TierModel,
        light: TierModel,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(MatchError::Configuration(
                "reasoning service API key is not set".to_string(),
            ));
        }

        Ok(Self {
            client: http_client()?,
            api_url,
            api_version,
            api_key,
            full,
            light,
            timeout,
        })
    }

    fn tier_model(&self, tier: ModelTier) -> &TierModel {
        match tier {
            ModelTier::Full => &self.full,
            ModelTier::Light => &self.light,
        }
    }

    async fn send(&self, tier: ModelTier, system: &str, payload: &str) -> Result<Completion> {
        let model = self.tier_model(tier);
        let request = MessagesRequest {
            model: &model.model,
            max_tokens: model.max_tokens,
            system,
            messages: vec![Message {
                role: "user",
                content: payload,
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let response = check_status(SERVICE, response).await?;
        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let text = body
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(MatchError::parse("reasoning service returned no text", ""));
        }

        let (input_tokens, output_tokens) = match body.usage {
            Some(usage) => (usage.input_tokens, usage.output_tokens),
            None => (
                estimate_tokens(system) + estimate_tokens(payload),
                estimate_tokens(&text),
            ),
        };

        tracing::debug!(
            "Reasoning call succeeded: model={}, input_tokens={}, output_tokens={}",
            model.model,
            input_tokens,
            output_tokens
        );

        Ok(Completion {
            text,
            input_tokens,
            output_tokens,
        })
    }
}

#[async_trait]
impl ReasoningService for AnthropicClient {
    async fn complete(
        &self,
        tier: ModelTier,
        system: &str,
        payload: &str,
        cancel: Option<&CancelToken>,
    ) -> Result<Completion> {
        bounded(SERVICE, self.timeout, cancel, self.send(tier, system, payload)).await
    }
}
