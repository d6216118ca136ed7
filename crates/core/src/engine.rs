//! Model engine abstraction and the worker message protocol.
//!
//! The model runs behind a worker boundary: the pipeline never touches the
//! backend directly, it exchanges [`WorkerMessage`]s and [`WorkerReply`]s with
//! the worker that owns it. Replies carry the backend's raw JSON; it is only
//! trusted after [`RawModelResponse::completion_text`] has validated its shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{EngineError, EngineInitError};
use crate::message::Message;

/// A chat-completion request as sent across the worker boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionPayload {
    /// The ordered conversation (system instruction, then the user prompt)
    pub messages: Vec<Message>,

    /// Sampling temperature (0.0 = deterministic)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

/// A request message: `{operation, payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload")]
pub enum WorkerMessage {
    /// Handshake: load the model and report readiness.
    #[serde(rename = "engine.load", rename_all = "camelCase")]
    Load { model_id: String },

    /// One chat completion.
    #[serde(rename = "chat.completions.create")]
    ChatCompletion(CompletionPayload),
}

impl WorkerMessage {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Load { .. } => "engine.load",
            Self::ChatCompletion(_) => "chat.completions.create",
        }
    }
}

/// A reply message from the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerReply {
    /// The model is loaded and accepts requests.
    Ready,

    /// Raw, unvalidated completion response.
    Completion { response: serde_json::Value },

    /// The worker could not serve the message.
    Failed { error: String },
}

/// The worker's raw JSON reply to a chat request.
#[derive(Debug, Clone, PartialEq)]
pub struct RawModelResponse(pub serde_json::Value);

/// The response did not carry `choices[0].message.content`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed model response: {0}")]
pub struct MalformedResponse(pub String);

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl RawModelResponse {
    /// Validate the response shape and return the first choice's content.
    ///
    /// Malformed when the value is not a completion object, when `choices` is
    /// empty, or when `choices[0].message.content` is absent.
    pub fn completion_text(&self) -> Result<String, MalformedResponse> {
        let parsed: ChatCompletionResponse = serde_json::from_value(self.0.clone())
            .map_err(|e| MalformedResponse(format!("unexpected shape: {e}")))?;

        let first = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| MalformedResponse("no choices in response".into()))?;

        first
            .message
            .content
            .ok_or_else(|| MalformedResponse("choices[0].message.content is absent".into()))
    }

    /// Build a well-formed response around `content` (`{choices:[{message:{content}}]}`).
    pub fn from_content(content: impl Into<String>) -> Self {
        Self(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content.into() } }]
        }))
    }
}

/// A model runtime hosted inside the worker.
///
/// The worker owns its backend exclusively and serves one message at a time,
/// hence `&mut self`. Implementations: OpenAI-compatible local server,
/// in-process Candle model, deterministic echo.
#[async_trait]
pub trait ModelBackend: Send {
    /// A human-readable name for this backend (e.g. "http", "local").
    fn name(&self) -> &str;

    /// Load `model_id` so that later completions can be served.
    async fn load(&mut self, model_id: &str) -> std::result::Result<(), EngineInitError>;

    /// Run one chat completion and return the runtime's raw JSON response.
    async fn chat_completion(
        &mut self,
        payload: CompletionPayload,
    ) -> std::result::Result<serde_json::Value, EngineError>;
}

/// Constructs a fresh backend for each worker the gateway spawns.
pub trait BackendFactory: Send + Sync {
    fn create(&self) -> std::result::Result<Box<dyn ModelBackend>, EngineInitError>;
}
