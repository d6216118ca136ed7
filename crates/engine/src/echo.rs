//! Deterministic offline backend.
//!
//! Answers every request with a small, fenced HTML page built from the user
//! prompt. Useful for demos and for running the whole pipeline without a
//! model runtime.

use async_trait::async_trait;
use evoweb_core::engine::{CompletionPayload, ModelBackend, RawModelResponse};
use evoweb_core::error::{EngineError, EngineInitError};
use evoweb_core::message::Role;

#[derive(Debug, Default)]
pub struct EchoBackend {
    model: Option<String>,
}

impl EchoBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn render(model: &str, prompt: &str) -> String {
        let summary: String = prompt
            .chars()
            .take(280)
            .collect::<String>()
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;");
        format!(
            "```html\n<section style=\"font-family:sans-serif;padding:1rem\">\
             <h1>Your page</h1><p>{summary}</p>\
             <small>offline preview ({model})</small></section>\n```"
        )
    }
}

#[async_trait]
impl ModelBackend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    async fn load(&mut self, model_id: &str) -> Result<(), EngineInitError> {
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
        let prompt = payload
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        Ok(RawModelResponse::from_content(Self::render(model, prompt)).0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evoweb_core::message::Message;

    fn payload(user: &str) -> CompletionPayload {
        CompletionPayload {
            messages: vec![Message::system("Return HTML."), Message::user(user)],
            temperature: 0.7,
            max_tokens: 100,
        }
    }

    #[tokio::test]
    async fn answers_with_fenced_html() {
        let mut backend = EchoBackend::new();
        backend.load("phi-2").await.unwrap();

        let raw = RawModelResponse(backend.chat_completion(payload("Visitor likes hiking")).await.unwrap());
        let text = raw.completion_text().unwrap();
        assert!(text.starts_with("```html\n"));
        assert!(text.contains("Visitor likes hiking"));
        assert!(text.contains("offline preview (phi-2)"));
    }

    #[tokio::test]
    async fn prompt_text_is_escaped() {
        let mut backend = EchoBackend::new();
        backend.load("phi-2").await.unwrap();

        let raw = RawModelResponse(backend.chat_completion(payload("<script>x</script>")).await.unwrap());
        let text = raw.completion_text().unwrap();
        assert!(!text.contains("<script>"));
        assert!(text.contains("&lt;script&gt;"));
    }

    #[tokio::test]
    async fn deterministic() {
        let mut backend = EchoBackend::new();
        backend.load("phi-2").await.unwrap();
        let a = backend.chat_completion(payload("same")).await.unwrap();
        let b = backend.chat_completion(payload("same")).await.unwrap();
        assert_eq!(a, b);
    }
}
