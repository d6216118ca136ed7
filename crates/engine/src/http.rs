//! OpenAI-compatible HTTP backend.
//!
//! Talks to a model runtime on the same machine (llama.cpp server, Ollama,
//! vLLM, LM Studio...) through its `/chat/completions` endpoint. Loading
//! checks `/models` so an unreachable runtime fails the handshake instead of
//! the first generation.
//!
//! The completion body is returned unparsed; shape validation happens on the
//! pipeline side of the worker boundary.

use async_trait::async_trait;
use evoweb_core::engine::{CompletionPayload, ModelBackend};
use evoweb_core::error::{EngineError, EngineInitError};
use evoweb_core::message::Message;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-request ceiling enforced by the HTTP client itself.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct HttpBackend {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    model: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, EngineInitError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EngineInitError::WorkerSpawn(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            client,
            model: None,
        })
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {key}")),
            None => request,
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, String> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| format!("runtime unreachable at {url}: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("runtime answered {status} for {url}"));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("invalid model list: {e}"))?;

        Ok(body["data"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m["id"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl ModelBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn load(&mut self, model_id: &str) -> Result<(), EngineInitError> {
        let models = self.list_models().await.map_err(|reason| EngineInitError::ModelLoad {
            model_id: model_id.into(),
            reason,
        })?;

        // Single-model servers often report a file name rather than the id
        // they were started with, so a mismatch is only a warning.
        if !models.is_empty() && !models.iter().any(|m| m == model_id) {
            warn!(model = %model_id, available = ?models, "Runtime does not list the requested model");
        }

        debug!(model = %model_id, url = %self.base_url, "HTTP runtime reachable");
        self.model = Some(model_id.to_string());
        Ok(())
    }

    async fn chat_completion(
        &mut self,
        payload: CompletionPayload,
    ) -> Result<serde_json::Value, EngineError> {
        let model = self
            .model
            .as_deref()
            .ok_or_else(|| EngineError::Backend("no model loaded".into()))?;

        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model,
            messages: &payload.messages,
            temperature: payload.temperature,
            max_tokens: payload.max_tokens,
            stream: false,
        };

        debug!(model = %model, messages = payload.messages.len(), "Sending completion request");

        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Backend(format!("request failed: {e}")))?;

        let status = response.status().as_u16();
        if status == 429 {
            return Err(EngineError::Backend("runtime is rate limiting requests".into()));
        }
        if status == 401 || status == 403 {
            return Err(EngineError::Backend(
                "runtime rejected the credentials".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Runtime returned error");
            return Err(EngineError::Backend(format!("status {status}: {error_body}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| EngineError::Backend(format!("failed to read response: {e}")))?;

        // A body that is not JSON is still a reply; the shape check rejects it.
        match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(error = %e, "Runtime reply is not JSON");
                Ok(serde_json::Value::String(text))
            }
        }
    }
}
