//! In-process backend running GGUF-quantized models with Candle.
//!
//! The model id is either a preset alias (`phi-2`, `tinyllama`, `smollm`,
//! `qwen:0.5b`) resolved against the HuggingFace Hub cache, or a path to a
//! local `.gguf` file with a `tokenizer.json` next to it.
//!
//! The model architecture (llama, qwen2 or phi2) is read from the GGUF
//! metadata, so preset and path models load the same way.
//!
//! Loading and inference are CPU-bound and run on the blocking pool. Replies
//! are wrapped in the same `{choices:[{message:{content}}]}` shape an HTTP
//! runtime would produce.

use async_trait::async_trait;
use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::{quantized_llama, quantized_phi2, quantized_qwen2};
use evoweb_core::engine::{CompletionPayload, ModelBackend, RawModelResponse};
use evoweb_core::error::{EngineError, EngineInitError};
use evoweb_core::message::{Message, Role};
use hf_hub::api::sync::Api;
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::{debug, info};

/// Seed for the sampler so equal inputs give equal outputs.
const SAMPLING_SEED: u64 = 42;

struct ModelPreset {
    repo: &'static str,
    gguf_file: &'static str,
    tokenizer_repo: &'static str,
    chat_template: ChatTemplate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatTemplate {
    /// `<|system|>\n{content}</s>\n<|user|>\n{content}</s>\n<|assistant|>\n`
    TinyLlama,
    /// `<|im_start|>system\n{content}<|im_end|>\n...<|im_start|>assistant\n`
    ChatML,
    /// `Instruct: {system}\n{user}\nOutput:`
    Phi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Architecture {
    Llama,
    Qwen2,
    Phi2,
}

impl Architecture {
    /// Map a GGUF `general.architecture` value.
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "llama" | "mistral" => Some(Self::Llama),
            "qwen2" => Some(Self::Qwen2),
            "phi2" => Some(Self::Phi2),
            _ => None,
        }
    }
}

enum Weights {
    Llama(quantized_llama::ModelWeights),
    Qwen2(quantized_qwen2::ModelWeights),
    Phi2(quantized_phi2::ModelWeights),
}

impl Weights {
    fn load(
        model_id: &str,
        gguf: gguf_file::Content,
        file: &mut std::fs::File,
        device: &Device,
    ) -> Result<Self, EngineInitError> {
        let name = gguf
            .metadata
            .get("general.architecture")
            .and_then(|v| v.to_string().ok())
            .cloned()
            .unwrap_or_else(|| "llama".to_string());
        let architecture = Architecture::from_name(&name)
            .ok_or_else(|| load_error(model_id, format!("unsupported architecture '{name}'")))?;
        debug!(model = model_id, ?architecture, "Loading weights");

        let weights = match architecture {
            Architecture::Llama => quantized_llama::ModelWeights::from_gguf(gguf, file, device).map(Self::Llama),
            Architecture::Qwen2 => quantized_qwen2::ModelWeights::from_gguf(gguf, file, device).map(Self::Qwen2),
            Architecture::Phi2 => quantized_phi2::ModelWeights::from_gguf(gguf, file, device).map(Self::Phi2),
        };
        weights.map_err(|e| load_error(model_id, format!("cannot load weights: {e}")))
    }

    /// Logits for the last input position, shaped `(batch, vocab)`.
    fn forward(&mut self, input: &Tensor, position: usize) -> candle_core::Result<Tensor> {
        match self {
            Self::Llama(m) => m.forward(input, position),
            Self::Qwen2(m) => m.forward(input, position),
            Self::Phi2(m) => m.forward(input, position),
        }
    }
}

fn resolve_preset(alias: &str) -> Option<ModelPreset> {
    match alias.to_lowercase().as_str() {
        "phi2" | "phi-2" => Some(ModelPreset {
            repo: "TheBloke/phi-2-GGUF",
            gguf_file: "phi-2.Q4_K_M.gguf",
            tokenizer_repo: "microsoft/phi-2",
            chat_template: ChatTemplate::Phi,
        }),
        "tinyllama" | "tiny-llama" | "tinyllama-1.1b" => Some(ModelPreset {
            repo: "TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF",
            gguf_file: "tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf",
            tokenizer_repo: "TinyLlama/TinyLlama-1.1B-Chat-v1.0",
            chat_template: ChatTemplate::TinyLlama,
        }),
        "smollm" | "smollm:360m" | "smollm-360m" => Some(ModelPreset {
            repo: "TheBloke/SmolLM-360M-Instruct-GGUF",
            gguf_file: "smollm-360m-instruct.Q4_K_M.gguf",
            tokenizer_repo: "HuggingFaceTB/SmolLM-360M-Instruct",
            chat_template: ChatTemplate::ChatML,
        }),
        "qwen:0.5b" | "qwen-0.5b" | "qwen2-0.5b" => Some(ModelPreset {
            repo: "Qwen/Qwen2-0.5B-Instruct-GGUF",
            gguf_file: "qwen2-0_5b-instruct-q4_k_m.gguf",
            tokenizer_repo: "Qwen/Qwen2-0.5B-Instruct",
            chat_template: ChatTemplate::ChatML,
        }),
        _ => None,
    }
}

/// Candle-backed model runtime.
#[derive(Default)]
pub struct LocalBackend {
    state: Option<LocalModelState>,
}

struct LocalModelState {
    model: Weights,
    tokenizer: Tokenizer,
    device: Device,
    chat_template: ChatTemplate,
    eos_token_id: u32,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn load_error(model_id: &str, reason: impl std::fmt::Display) -> EngineInitError {
    EngineInitError::ModelLoad {
        model_id: model_id.to_string(),
        reason: reason.to_string(),
    }
}

fn inference_error(e: candle_core::Error) -> EngineError {
    EngineError::Backend(format!("candle inference error: {e}"))
}

impl LocalModelState {
    fn load(model_id: &str) -> Result<Self, EngineInitError> {
        let device = Device::Cpu;
        let path = Path::new(model_id);

        let (model_path, tokenizer_path, chat_template) =
            if path.exists() && model_id.ends_with(".gguf") {
                let tokenizer_path = path.with_file_name("tokenizer.json");
                if !tokenizer_path.exists() {
                    return Err(load_error(
                        model_id,
                        format!("no tokenizer.json next to {}", path.display()),
                    ));
                }
                (path.to_path_buf(), tokenizer_path, ChatTemplate::ChatML)
            } else {
                let preset = resolve_preset(model_id).ok_or_else(|| {
                    load_error(
                        model_id,
                        "unknown model; use phi-2, tinyllama, smollm, qwen:0.5b or a .gguf path",
                    )
                })?;

                info!(model = model_id, repo = preset.repo, file = preset.gguf_file, "Fetching model files");
                let api = Api::new().map_err(|e| load_error(model_id, format!("hub unavailable: {e}")))?;
                let model_path = api
                    .model(preset.repo.to_string())
                    .get(preset.gguf_file)
                    .map_err(|e| load_error(model_id, format!("download of {} failed: {e}", preset.gguf_file)))?;
                let tokenizer_path = api
                    .model(preset.tokenizer_repo.to_string())
                    .get("tokenizer.json")
                    .map_err(|e| load_error(model_id, format!("tokenizer download failed: {e}")))?;
                (model_path, tokenizer_path, preset.chat_template)
            };

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| load_error(model_id, format!("bad tokenizer: {e}")))?;

        let mut file = std::fs::File::open(&model_path)
            .map_err(|e| load_error(model_id, format!("cannot open {}: {e}", model_path.display())))?;
        let gguf = gguf_file::Content::read(&mut file)
            .map_err(|e| load_error(model_id, format!("bad GGUF file: {e}")))?;
        let model = Weights::load(model_id, gguf, &mut file, &device)?;

        let eos_candidates: &[&str] = match chat_template {
            ChatTemplate::ChatML => &["<|im_end|>", "<|endoftext|>", "</s>"],
            ChatTemplate::TinyLlama | ChatTemplate::Phi => &["</s>", "<|endoftext|>", "<|im_end|>"],
        };
        let eos_token_id = eos_candidates
            .iter()
            .find_map(|token| tokenizer.token_to_id(token))
            .unwrap_or(2);

        info!(model = model_id, eos_token_id, "Local model loaded");
        Ok(Self {
            model,
            tokenizer,
            device,
            chat_template,
            eos_token_id,
        })
    }

    fn format_prompt(&self, messages: &[Message]) -> String {
        match self.chat_template {
            ChatTemplate::TinyLlama => format_tinyllama(messages),
            ChatTemplate::ChatML => format_chatml(messages),
            ChatTemplate::Phi => format_phi(messages),
        }
    }

    fn generate(&mut self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String, EngineError> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| EngineError::Backend(format!("tokenization failed: {e}")))?;
        let prompt_tokens = encoding.get_ids();
        debug!(prompt_tokens = prompt_tokens.len(), max_tokens, temperature, "Starting local generation");

        let mut logits_processor = if temperature <= 0.0 {
            LogitsProcessor::new(SAMPLING_SEED, None, None)
        } else {
            LogitsProcessor::new(SAMPLING_SEED, Some(temperature as f64), None)
        };

        let mut input = Tensor::new(prompt_tokens, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(inference_error)?;
        let mut position = 0;
        let mut generated: Vec<u32> = Vec::new();

        for _ in 0..max_tokens {
            let step = input.dim(1).map_err(inference_error)?;
            let logits = self.model.forward(&input, position).map_err(inference_error)?;
            position += step;

            let logits = logits.squeeze(0).map_err(inference_error)?;
            let next = logits_processor.sample(&logits).map_err(inference_error)?;
            if next == self.eos_token_id {
                break;
            }
            generated.push(next);

            input = Tensor::new(&[next][..], &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(inference_error)?;
        }

        let output = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| EngineError::Backend(format!("detokenization failed: {e}")))?;
        debug!(completion_tokens = generated.len(), "Generation complete");

        Ok(output
            .trim()
            .trim_end_matches("</s>")
            .trim_end_matches("<|im_end|>")
            .trim()
            .to_string())
    }
}

fn role_tag(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn format_tinyllama(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for msg in messages {
        prompt.push_str("<|");
        prompt.push_str(role_tag(msg.role));
        prompt.push_str("|>\n");
        prompt.push_str(&msg.content);
        prompt.push_str("</s>\n");
    }
    prompt.push_str("<|assistant|>\n");
    prompt
}

fn format_chatml(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for msg in messages {
        prompt.push_str("<|im_start|>");
        prompt.push_str(role_tag(msg.role));
        prompt.push('\n');
        prompt.push_str(&msg.content);
        prompt.push_str("<|im_end|>\n");
    }
    prompt.push_str("<|im_start|>assistant\n");
    prompt
}

/// Phi-2 has no chat format; system and user text share one instruction.
fn format_phi(messages: &[Message]) -> String {
    let instruction = messages
        .iter()
        .filter(|m| m.role != Role::Assistant)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    format!("Instruct: {instruction}\nOutput:")
}

#[async_trait]
impl ModelBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn load(&mut self, model_id: &str) -> Result<(), EngineInitError> {
        let id = model_id.to_string();
        let state = tokio::task::spawn_blocking(move || LocalModelState::load(&id))
            .await
            .map_err(|e| load_error(model_id, format!("loading task failed: {e}")))??;
        self.state = Some(state);
        Ok(())
    }

    async fn chat_completion(
        &mut self,
        payload: CompletionPayload,
    ) -> Result<serde_json::Value, EngineError> {
        let mut state = self
            .state
            .take()
            .ok_or_else(|| EngineError::Backend("no model loaded".into()))?;

        let (state, output) = tokio::task::spawn_blocking(move || {
            let prompt = state.format_prompt(&payload.messages);
            let output = state.generate(&prompt, payload.max_tokens, payload.temperature);
            (state, output)
        })
        .await
        .map_err(|e| EngineError::Backend(format!("inference task panicked: {e}")))?;

        self.state = Some(state);
        Ok(RawModelResponse::from_content(output?).0)
    }
}
