use crate::prompt::{build_messages, ChatMessage};
use merge_engine::Generator;
use mergeclaw_core::config::ModelSettings;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generation server returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("generation server returned no message content")]
    EmptyResponse,
}

/// Source of JSON-shaped analyses for the reasoning layers.
#[async_trait::async_trait]
pub trait JsonGenerator: Send + Sync {
    async fn generate_json(&self, system: &str, prompt: &str) -> anyhow::Result<Value>;
}

/// Client for an OpenAI-compatible chat completions server.
///
/// Calls are serialized through a throttle so that at most
/// `rate_limit_qps` requests start per second.
pub struct GenerationClient {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    api_key: Option<String>,
    min_interval: Option<Duration>,
    last_call: Mutex<Option<Instant>>,
}

impl GenerationClient {
    pub fn from_settings(settings: &ModelSettings) -> Result<Self, ClientError> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::debug!(var = %settings.api_key_env, "No API key set; sending unauthenticated requests");
        }

        Ok(Self {
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(settings.timeout_secs))
                .build()?,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            api_key,
            min_interval: min_interval(settings.rate_limit_qps),
            last_call: Mutex::new(None),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check if the generation server is reachable.
    pub async fn health_check(&self) -> Result<(), ClientError> {
        let resp = self
            .http_client
            .get(format!("{}/v1/models", self.endpoint))
            .timeout(Duration::from_secs(5))
            .send()
            .await?;
        // 404 means the server is up but does not list models.
        if resp.status().is_success() || resp.status().as_u16() == 404 {
            Ok(())
        } else {
            Err(ClientError::Status {
                status: resp.status(),
                body: String::new(),
            })
        }
    }

    /// Wait until the next request is allowed to start.
    async fn throttle(&self) {
        let Some(interval) = self.min_interval else {
            return;
        };
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Send one chat completion and return the assistant's text.
    pub async fn chat(&self, messages: &[ChatMessage], max_tokens: u32) -> Result<String, ClientError> {
        self.throttle().await;

        let request_body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": max_tokens.min(self.max_tokens),
            "stream": false
        });

        let mut request = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.endpoint))
            .json(&request_body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { status, body });
        }

        let body: Value = response.json().await?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or(ClientError::EmptyResponse)
    }

    /// Generate and parse a JSON object, keeping unparseable replies as
    /// `{"raw": text}`.
    pub async fn generate_json(&self, system: &str, prompt: &str) -> Result<Value, ClientError> {
        let text = self.chat(&build_messages(system, prompt), self.max_tokens).await?;
        Ok(parse_json_reply(&text))
    }
}

#[async_trait::async_trait]
impl Generator for GenerationClient {
    async fn generate(&self, prompt: &str, size_hint: usize) -> anyhow::Result<String> {
        let system = format!(
            "You condense source code for a merge reviewer. Reply with plain text of at most {} characters.",
            size_hint
        );
        // Roughly four characters per token.
        let tokens = u32::try_from(size_hint / 4).unwrap_or(u32::MAX).max(1);
        Ok(self.chat(&build_messages(&system, prompt), tokens).await?)
    }
}

#[async_trait::async_trait]
impl JsonGenerator for GenerationClient {
    async fn generate_json(&self, system: &str, prompt: &str) -> anyhow::Result<Value> {
        Ok(GenerationClient::generate_json(self, system, prompt).await?)
    }
}

fn min_interval(qps: f64) -> Option<Duration> {
    if qps > 0.0 && qps.is_finite() {
        Some(Duration::from_secs_f64(1.0 / qps))
    } else {
        None
    }
}

/// Parse a model reply as JSON, tolerating a surrounding markdown fence.
pub fn parse_json_reply(text: &str) -> Value {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    serde_json::from_str(unfenced).unwrap_or_else(|_| serde_json::json!({ "raw": text }))
}
