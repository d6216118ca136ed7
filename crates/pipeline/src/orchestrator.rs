//! Generation orchestrator.
//!
//! Runs one attempt against the engine and always comes back with something
//! renderable. Engine start-up is bounded by `init_timeout`, the completion by
//! `timeout`. Whichever settles first wins; a completion that arrives after
//! the deadline lands on a dropped reply channel and is never applied.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use evoweb_config::EngineConfig;
use evoweb_core::engine::CompletionPayload;
use evoweb_core::error::{EngineInitError, GenerationError};
use evoweb_core::generation::{DegradedReason, GenerationRequest, GenerationResult};
use evoweb_engine::EngineGateway;
use tracing::{debug, info, warn};

use crate::extract::extract;
use crate::fallback::static_fallback;

/// Default bound on a single completion.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on engine start-up (model download and load).
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Requesting,
    Succeeded,
    Degraded,
}

pub struct GenerationOrchestrator {
    gateway: EngineGateway,
    timeout: Duration,
    init_timeout: Duration,
    temperature: f32,
    max_tokens: u32,
    state: Mutex<OrchestratorState>,
}

/// Holds the orchestrator's single generation slot.
///
/// Taken by [`GenerationOrchestrator::reserve`] and consumed by
/// [`Reservation::generate`]. Dropped without settling (never used, or the
/// caller was cancelled mid-attempt), it returns the orchestrator to `Idle`.
pub struct Reservation<'a> {
    orchestrator: &'a GenerationOrchestrator,
}

impl Reservation<'_> {
    /// Run one generation attempt in the reserved slot.
    ///
    /// Every engine-side problem is turned into a degraded result carrying a
    /// static page.
    pub async fn generate(self, request: &GenerationRequest) -> GenerationResult {
        let orch = self.orchestrator;
        info!(request_id = %request.id, visit_count = request.visit_state.visit_count, "Generation started");

        let result = orch.attempt(request).await;

        match &result {
            GenerationResult::Success { html } => {
                info!(request_id = %request.id, bytes = html.len(), "Generation succeeded");
                self.settle(OrchestratorState::Succeeded);
            }
            GenerationResult::Degraded { reason, .. } => {
                warn!(request_id = %request.id, reason = %reason, "Generation degraded to static page");
                self.settle(OrchestratorState::Degraded);
            }
        }
        result
    }

    fn settle(&self, outcome: OrchestratorState) {
        *lock(&self.orchestrator.state) = outcome;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        let mut state = lock(&self.orchestrator.state);
        if *state == OrchestratorState::Requesting {
            *state = OrchestratorState::Idle;
        }
    }
}

fn lock(state: &Mutex<OrchestratorState>) -> MutexGuard<'_, OrchestratorState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl GenerationOrchestrator {
    pub fn new(gateway: EngineGateway) -> Self {
        Self {
            gateway,
            timeout: DEFAULT_TIMEOUT,
            init_timeout: DEFAULT_INIT_TIMEOUT,
            temperature: 0.7,
            max_tokens: 1000,
            state: Mutex::new(OrchestratorState::Idle),
        }
    }

    pub fn from_config(gateway: EngineGateway, config: &EngineConfig) -> Self {
        Self::new(gateway)
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_init_timeout(Duration::from_secs(config.init_timeout_secs))
            .with_sampling(config.temperature, config.max_tokens)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn gateway(&self) -> &EngineGateway {
        &self.gateway
    }

    pub fn state(&self) -> OrchestratorState {
        *lock(&self.state)
    }

    /// Run one generation attempt.
    ///
    /// Fails only with [`GenerationError::Busy`] when another attempt is in
    /// flight on this orchestrator.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, GenerationError> {
        Ok(self.reserve()?.generate(request).await)
    }

    /// Claim the generation slot without starting an attempt.
    ///
    /// Lets a caller refuse overlapping work before doing any side effects of
    /// its own.
    pub fn reserve(&self) -> Result<Reservation<'_>, GenerationError> {
        let mut state = lock(&self.state);
        if *state == OrchestratorState::Requesting {
            debug!("Rejecting overlapping generation");
            return Err(GenerationError::Busy);
        }
        *state = OrchestratorState::Requesting;
        Ok(Reservation { orchestrator: self })
    }

    async fn attempt(&self, request: &GenerationRequest) -> GenerationResult {
        let degrade = |reason| GenerationResult::Degraded {
            html: static_fallback(request, reason),
            reason,
        };

        let engine = match tokio::time::timeout(self.init_timeout, self.gateway.get_engine()).await {
            Ok(Ok(engine)) => engine,
            Ok(Err(e)) => {
                warn!(request_id = %request.id, error = %e, "Engine unavailable");
                return degrade(DegradedReason::EngineError);
            }
            Err(_) => {
                let e = EngineInitError::TimedOut {
                    timeout_secs: self.init_timeout.as_secs(),
                };
                warn!(request_id = %request.id, error = %e, "Engine still initializing");
                return degrade(DegradedReason::Timeout);
            }
        };

        let payload = CompletionPayload {
            messages: request.prompt.messages(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let raw = match tokio::time::timeout(self.timeout, engine.invoke(payload)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(request_id = %request.id, error = %e, "Engine request failed");
                return degrade(DegradedReason::EngineError);
            }
            Err(_) => {
                warn!(
                    request_id = %request.id,
                    timeout_secs = self.timeout.as_secs(),
                    "Engine did not answer in time"
                );
                return degrade(DegradedReason::Timeout);
            }
        };

        let content = match raw.completion_text() {
            Ok(content) => content,
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "Unusable engine reply");
                return degrade(DegradedReason::MalformedResponse);
            }
        };

        let html = extract(&content);
        if html.is_empty() {
            warn!(request_id = %request.id, "Engine reply contained no markup");
            return degrade(DegradedReason::MalformedResponse);
        }
        GenerationResult::Success { html }
    }
}
