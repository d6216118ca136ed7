//! One generation attempt: what goes in, what comes out.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;
use crate::profile::{InterestSet, UserProfile};
use crate::signals::{DeviceInfo, VisitState};

/// The prompt for one attempt: system instruction plus user text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// Chat messages in send order.
    pub fn messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }
}

/// Everything a single attempt needs. Built fresh per attempt, never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Correlation id for logs
    pub id: String,
    pub profile: UserProfile,
    pub visit_state: VisitState,
    pub device: DeviceInfo,
    pub interests: InterestSet,
    pub prompt: Prompt,
}

impl GenerationRequest {
    pub fn new(
        profile: UserProfile,
        visit_state: VisitState,
        device: DeviceInfo,
        interests: InterestSet,
        prompt: Prompt,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            profile,
            visit_state,
            device,
            interests,
            prompt,
        }
    }
}

/// Why a result is degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedReason {
    /// The engine did not answer within the generation timeout.
    Timeout,
    /// The engine failed to initialize or rejected the request.
    EngineError,
    /// The engine answered with something that is not a usable completion.
    MalformedResponse,
}

impl std::fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::EngineError => "engine_error",
            Self::MalformedResponse => "malformed_response",
        };
        f.write_str(s)
    }
}

/// Outcome of `generate`: always renderable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationResult {
    Success { html: String },
    Degraded { html: String, reason: DegradedReason },
}

impl GenerationResult {
    pub fn html(&self) -> &str {
        match self {
            Self::Success { html } | Self::Degraded { html, .. } => html,
        }
    }

    pub fn into_html(self) -> String {
        match self {
            Self::Success { html } | Self::Degraded { html, .. } => html,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn degraded_reason(&self) -> Option<DegradedReason> {
        match self {
            Self::Success { .. } => None,
            Self::Degraded { reason, .. } => Some(*reason),
        }
    }
}
