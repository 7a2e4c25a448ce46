//! Candidate generator backed by an OpenAI-compatible chat-completions API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rescuelink_core::{AppConfig, MatchCriteria, Position};
use serde::{Deserialize, Serialize};

use crate::error::GeneratorError;
use crate::payload::{parse_completion, system_prompt, user_prompt};
use crate::retry::{parse_retry_after, retry_with_backoff, RetryPolicy};
use crate::{CandidateBatch, CandidateGenerator};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub candidate_count: usize,
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("api_key", &"[redacted]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("candidate_count", &self.candidate_count)
            .field("retry", &self.retry)
            .finish()
    }
}

impl OpenAiSettings {
    /// Settings from application config, or `None` when no API key is set.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let api_key = config.openai_api_key.clone()?;
        Some(Self {
            api_key,
            base_url: config.openai_base_url.clone(),
            model: config.openai_model.clone(),
            timeout: Duration::from_secs(config.generator_timeout_secs),
            candidate_count: config.candidate_count,
            retry: RetryPolicy {
                max_retries: config.generator_max_retries,
                backoff_base_ms: config.generator_backoff_base_ms,
            },
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiGenerator {
    client: Client,
    settings: OpenAiSettings,
    endpoint: String,
}

impl OpenAiGenerator {
    /// # Errors
    ///
    /// Returns [`GeneratorError::Http`] if the HTTP client cannot be built and
    /// [`GeneratorError::Config`] if the key or candidate count is unusable.
    pub fn new(settings: OpenAiSettings) -> Result<Self, GeneratorError> {
        if settings.api_key.trim().is_empty() {
            return Err(GeneratorError::Config("API key is empty".to_string()));
        }
        if settings.candidate_count == 0 {
            return Err(GeneratorError::Config(
                "candidate count must be at least 1".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("rescuelink/0.1 (candidate-generator)")
            .build()?;

        let endpoint = format!("{}/chat/completions", settings.base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            settings,
            endpoint,
        })
    }

    async fn complete(&self, request: &ChatCompletionRequest<'_>) -> Result<String, GeneratorError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.settings.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Status {
                status: status.as_u16(),
                body,
                retry_after,
            });
        }

        let body: serde_json::Value = response.json().await?;
        let parsed: ChatCompletionResponse =
            serde_json::from_value(body).map_err(|e| GeneratorError::Deserialize {
                context: "chat completion envelope".to_string(),
                source: e,
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(GeneratorError::EmptyCompletion)
    }
}

#[async_trait]
impl CandidateGenerator for OpenAiGenerator {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(
        &self,
        position: Option<&Position>,
        criteria: &MatchCriteria,
    ) -> Result<CandidateBatch, GeneratorError> {
        let count = self.settings.candidate_count;
        let request = ChatCompletionRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt(position, criteria, count),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(criteria, count),
                },
            ],
            temperature: 0.7,
            max_tokens: 2000,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let content = retry_with_backoff(self.settings.retry, || self.complete(&request)).await?;
        let batch = parse_completion(&content)?;

        tracing::debug!(
            model = %self.settings.model,
            providers = batch.providers.len(),
            has_guidance = batch.guidance.is_some(),
            "generated candidate batch"
        );
        Ok(batch)
    }
}
