//! HTTP-backed embedding and summarization client
//!
//! Talks to an OpenAI-compatible endpoint. Both capabilities are optional at
//! configuration level: when disabled (or when the API key is absent from
//! the environment) the pipeline runs without them rather than failing.

use std::time::Duration;

use async_trait::async_trait;
use anyhow::{Context, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::services::{EmbeddingService, SummarizationService};
use crate::infrastructure::config::LlmConfig;

const SUMMARY_SYSTEM_PROMPT: &str = "You summarize laptop catalog data. Given raw \
product records or drift reports, produce a short, factual summary of prices, \
availability and notable changes. Do not invent data.";

pub struct HttpLlmClient {
    client: Client,
    base_url: String,
    embedding_model: String,
    summary_model: String,
    max_retries: u32,
}

impl HttpLlmClient {
    /// Build a client from configuration. Returns `None` when the LLM
    /// integration is disabled or no API key is available.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }

        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => {
                warn!(
                    env_var = %config.api_key_env,
                    "LLM enabled but API key not set; embeddings and summaries disabled"
                );
                return Ok(None);
            }
        };

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()
            .context("failed to build LLM HTTP client")?;

        Ok(Some(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            embedding_model: config.embedding_model.clone(),
            summary_model: config.summary_model.clone(),
            max_retries: config.max_retries.max(1),
        }))
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let url = format!("{}{path}", self.base_url);
        let mut attempt = 0u32;

        loop {
            let response = self.client.post(&url).json(body).send().await;
            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp
                            .json::<R>()
                            .await
                            .with_context(|| format!("failed to parse response from {url}"));
                    }

                    let body_text = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    anyhow::bail!("request to {url} failed ({status}): {body_text}");
                }
                Err(err) => {
                    if (err.is_timeout() || err.is_connect()) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    return Err(err).with_context(|| format!("request to {url} failed"));
                }
            }
        }
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500 * u64::from(attempt))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingService for HttpLlmClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
        };
        let response: EmbeddingResponse = self.post_json("/embeddings", &request).await?;
        let entry = response
            .data
            .into_iter()
            .next()
            .context("embedding response contained no vectors")?;
        debug!(dimensions = entry.embedding.len(), "embedding computed");
        Ok(entry.embedding)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[async_trait]
impl SummarizationService for HttpLlmClient {
    async fn summarize(&self, text: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.summary_model,
            temperature: 0.3,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SUMMARY_SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
        };
        let response: ChatResponse = self.post_json("/chat/completions", &request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .context("summary response contained no choices")?;
        Ok(choice.message.content.trim().to_string())
    }
}
