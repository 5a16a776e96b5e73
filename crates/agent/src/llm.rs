use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use boardsight_core::config::{ConfigError, LlmConfig};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn model(&self) -> &str;
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode model response: {0}")]
    Decode(String),
    #[error("model returned an empty completion")]
    EmptyCompletion,
}

impl LlmError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(error) => error.is_timeout() || error.is_connect(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) | Self::EmptyCompletion => false,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

/// OpenAI-compatible `/chat/completions` client (OpenRouter, OpenAI, Ollama).
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
    app_title: Option<String>,
    referer: Option<String>,
    max_retries: u32,
}

impl ChatCompletionsClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, ConfigError> {
        let api_key = config.require_api_key()?.cloned();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| ConfigError::Validation(format!("llm http client: {error}")))?;

        Ok(Self {
            client,
            endpoint: completions_endpoint(config.base_url()),
            model: config.model.clone(),
            api_key,
            app_title: config.app_title.clone(),
            referer: config.referer.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn send_once(&self, prompt: &str) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }
        if let Some(referer) = &self.referer {
            request = request.header("HTTP-Referer", referer);
        }
        if let Some(app_title) = &self.app_title {
            request = request.header("X-Title", app_title);
        }

        let response = request.send().await.map_err(LlmError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let payload: Value =
            response.json().await.map_err(|error| LlmError::Decode(error.to_string()))?;
        extract_content(&payload)
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.send_once(prompt).await {
                Ok(content) => return Ok(content),
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "boardsight.llm.retry",
                        attempt,
                        error = %error,
                        "retrying model request"
                    );
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }
}

fn completions_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim().trim_end_matches('/'))
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(250 * 2u64.pow(attempt.min(5)))
}

fn extract_content(payload: &Value) -> Result<String, LlmError> {
    if let Some(message) = payload.pointer("/error/message").and_then(Value::as_str) {
        return Err(LlmError::Decode(format!("provider error: {message}")));
    }

    let content = payload
        .pointer("/choices/0/message/content")
        .ok_or_else(|| LlmError::Decode("missing choices[0].message.content".to_string()))?;

    match content.as_str().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(LlmError::EmptyCompletion),
    }
}
