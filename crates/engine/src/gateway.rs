//! Engine gateway: lazily creates the worker and shares it.
//!
//! The first caller of [`EngineGateway::get_engine`] starts initialization
//! (construct backend, spawn worker, `engine.load` handshake). Initialization
//! runs in its own task, so a caller that gives up waiting does not cancel it.
//! Callers arriving while it is in flight join the same attempt. After a
//! failure the next caller starts a fresh attempt.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use evoweb_core::engine::{BackendFactory, CompletionPayload, RawModelResponse, WorkerMessage, WorkerReply};
use evoweb_core::error::{EngineError, EngineInitError};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::{debug, error, info};

use crate::worker::WorkerClient;

type PendingInit = Shared<BoxFuture<'static, Result<EngineHandle, EngineInitError>>>;

/// A ready engine. Clones share the same worker.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    client: WorkerClient,
    model_id: Arc<str>,
}

impl EngineHandle {
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn backend_name(&self) -> &str {
        self.client.backend_name()
    }

    /// Send one chat completion to the worker and await the raw reply.
    ///
    /// Unbounded; the orchestrator races this against its timeout.
    pub async fn invoke(&self, payload: CompletionPayload) -> Result<RawModelResponse, EngineError> {
        match self.client.send(WorkerMessage::ChatCompletion(payload)).await? {
            WorkerReply::Completion { response } => Ok(RawModelResponse(response)),
            WorkerReply::Failed { error } => Err(EngineError::Backend(error)),
            WorkerReply::Ready => Err(EngineError::Backend(
                "worker answered a completion with a readiness reply".into(),
            )),
        }
    }
}

/// Observable lifecycle of the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Uninitialized,
    Initializing,
    Ready { model_id: String, backend: String },
    Failed(EngineInitError),
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initializing => write!(f, "initializing"),
            Self::Ready { model_id, backend } => write!(f, "ready ({model_id} via {backend})"),
            Self::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

enum EngineState {
    Uninitialized,
    Initializing(PendingInit),
    Ready(EngineHandle),
    Failed(EngineInitError),
}

struct GatewayInner {
    factory: Arc<dyn BackendFactory>,
    model_id: String,
    state: Mutex<EngineState>,
}

impl GatewayInner {
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, outcome: &Result<EngineHandle, EngineInitError>) {
        let mut state = self.lock_state();
        *state = match outcome {
            Ok(handle) => EngineState::Ready(handle.clone()),
            Err(e) => EngineState::Failed(e.clone()),
        };
    }
}

/// Owns the engine lifecycle. Cheap to clone; clones share one engine.
#[derive(Clone)]
pub struct EngineGateway {
    inner: Arc<GatewayInner>,
}

impl EngineGateway {
    pub fn new(factory: Arc<dyn BackendFactory>, model_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                factory,
                model_id: model_id.into(),
                state: Mutex::new(EngineState::Uninitialized),
            }),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.inner.model_id
    }

    pub fn status(&self) -> EngineStatus {
        match &*self.inner.lock_state() {
            EngineState::Uninitialized => EngineStatus::Uninitialized,
            EngineState::Initializing(_) => EngineStatus::Initializing,
            EngineState::Ready(handle) => EngineStatus::Ready {
                model_id: handle.model_id().to_string(),
                backend: handle.backend_name().to_string(),
            },
            EngineState::Failed(e) => EngineStatus::Failed(e.clone()),
        }
    }

    /// Return the ready engine, initializing it on first use.
    ///
    /// Concurrent callers during initialization share one attempt and
    /// observe the same outcome. At most one worker exists once ready.
    pub async fn get_engine(&self) -> Result<EngineHandle, EngineInitError> {
        let pending = {
            let mut state = self.inner.lock_state();
            match &*state {
                EngineState::Ready(handle) => return Ok(handle.clone()),
                EngineState::Initializing(pending) => {
                    debug!(model = %self.inner.model_id, "Joining in-flight engine initialization");
                    pending.clone()
                }
                EngineState::Uninitialized | EngineState::Failed(_) => {
                    let pending = self.start_initialization();
                    *state = EngineState::Initializing(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    fn start_initialization(&self) -> PendingInit {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let outcome = initialize(inner.factory.as_ref(), &inner.model_id).await;
            inner.settle(&outcome);
            outcome
        });

        let inner = Arc::clone(&self.inner);
        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let err = EngineInitError::Aborted(e.to_string());
                    error!(error = %err, "Engine initialization task died");
                    let outcome = Err(err);
                    inner.settle(&outcome);
                    outcome
                }
            }
        }
        .boxed()
        .shared()
    }
}

async fn initialize(
    factory: &dyn BackendFactory,
    model_id: &str,
) -> Result<EngineHandle, EngineInitError> {
    info!(model = %model_id, "Initializing model engine");
    let backend = factory.create()?;
    let client = WorkerClient::spawn(backend);

    let reply = client
        .send(WorkerMessage::Load {
            model_id: model_id.to_string(),
        })
        .await
        .map_err(|_| EngineInitError::HandshakeClosed)?;

    match reply {
        WorkerReply::Ready => {
            info!(model = %model_id, backend = client.backend_name(), "Model engine ready");
            Ok(EngineHandle {
                client,
                model_id: Arc::from(model_id),
            })
        }
        WorkerReply::Failed { error } => {
            error!(model = %model_id, error = %error, "Model load failed");
            Err(EngineInitError::ModelLoad {
                model_id: model_id.to_string(),
                reason: error,
            })
        }
        WorkerReply::Completion { .. } => Err(EngineInitError::Aborted(
            "worker answered the handshake with a completion".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use evoweb_core::engine::ModelBackend;
    use evoweb_core::message::Message;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Loads after `load_delay`, failing when `fail_load` is set.
    struct ScriptedBackend {
        load_delay: Duration,
        fail_load: bool,
    }

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn load(&mut self, model_id: &str) -> Result<(), EngineInitError> {
            tokio::time::sleep(self.load_delay).await;
            if self.fail_load {
                return Err(EngineInitError::ModelLoad {
                    model_id: model_id.into(),
                    reason: "weights missing".into(),
                });
            }
            Ok(())
        }

        async fn chat_completion(
            &mut self,
            payload: CompletionPayload,
        ) -> Result<serde_json::Value, EngineError> {
            let last = payload.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            if last == "explode" {
                return Err(EngineError::Backend("out of memory".into()));
            }
            Ok(RawModelResponse::from_content(last).0)
        }
    }

    struct CountingFactory {
        created: AtomicUsize,
        load_delay: Duration,
        failures: usize,
    }

    impl CountingFactory {
        fn new(load_delay: Duration, failures: usize) -> Arc<Self> {
            Arc::new(Self {
                created: AtomicUsize::new(0),
                load_delay,
                failures,
            })
        }

        fn created(&self) -> usize {
            self.created.load(Ordering::SeqCst)
        }
    }

    impl BackendFactory for CountingFactory {
        fn create(&self) -> Result<Box<dyn ModelBackend>, EngineInitError> {
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedBackend {
                load_delay: self.load_delay,
                fail_load: n < self.failures,
            }))
        }
    }

    struct BrokenFactory;

    impl BackendFactory for BrokenFactory {
        fn create(&self) -> Result<Box<dyn ModelBackend>, EngineInitError> {
            Err(EngineInitError::WorkerSpawn("no runtime available".into()))
        }
    }

    fn payload(text: &str) -> CompletionPayload {
        CompletionPayload {
            messages: vec![Message::user(text)],
            temperature: 0.7,
            max_tokens: 32,
        }
    }

    #[tokio::test]
    async fn first_call_initializes_and_later_calls_reuse() {
        let factory = CountingFactory::new(Duration::ZERO, 0);
        let gateway = EngineGateway::new(factory.clone(), "phi-2");
        assert_eq!(gateway.status(), EngineStatus::Uninitialized);

        let a = gateway.get_engine().await.unwrap();
        let b = gateway.get_engine().await.unwrap();
        assert_eq!(a.model_id(), "phi-2");
        assert_eq!(b.backend_name(), "scripted");
        assert_eq!(factory.created(), 1);
        assert!(matches!(gateway.status(), EngineStatus::Ready { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_initialization() {
        let factory = CountingFactory::new(Duration::from_secs(5), 0);
        let gateway = EngineGateway::new(factory.clone(), "phi-2");

        let (a, b, c) = tokio::join!(
            gateway.get_engine(),
            gateway.get_engine(),
            gateway.get_engine()
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(factory.created(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_failure() {
        let factory = CountingFactory::new(Duration::from_secs(5), 1);
        let gateway = EngineGateway::new(factory.clone(), "phi-2");

        let (a, b) = tokio::join!(gateway.get_engine(), gateway.get_engine());
        let expected = EngineInitError::ModelLoad {
            model_id: "phi-2".into(),
            reason: "weights missing".into(),
        };
        assert_eq!(a.unwrap_err(), expected);
        assert_eq!(b.unwrap_err(), expected);
        assert_eq!(factory.created(), 1);
        assert_eq!(gateway.status(), EngineStatus::Failed(expected));
    }

    #[tokio::test]
    async fn failed_initialization_is_retried() {
        let factory = CountingFactory::new(Duration::ZERO, 1);
        let gateway = EngineGateway::new(factory.clone(), "phi-2");

        assert!(gateway.get_engine().await.is_err());
        assert!(gateway.get_engine().await.is_ok());
        assert_eq!(factory.created(), 2);
    }

    #[tokio::test]
    async fn factory_error_surfaces() {
        let gateway = EngineGateway::new(Arc::new(BrokenFactory), "phi-2");
        let err = gateway.get_engine().await.unwrap_err();
        assert!(matches!(err, EngineInitError::WorkerSpawn(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_wait_does_not_cancel_initialization() {
        let factory = CountingFactory::new(Duration::from_secs(10), 0);
        let gateway = EngineGateway::new(factory.clone(), "phi-2");

        let waited = tokio::time::timeout(Duration::from_secs(1), gateway.get_engine()).await;
        assert!(waited.is_err());
        assert_eq!(gateway.status(), EngineStatus::Initializing);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(matches!(gateway.status(), EngineStatus::Ready { .. }));
        assert!(gateway.get_engine().await.is_ok());
        assert_eq!(factory.created(), 1);
    }

    #[tokio::test]
    async fn invoke_returns_raw_response() {
        let gateway = EngineGateway::new(CountingFactory::new(Duration::ZERO, 0), "phi-2");
        let engine = gateway.get_engine().await.unwrap();

        let raw = engine.invoke(payload("<p>hi</p>")).await.unwrap();
        assert_eq!(raw.completion_text().unwrap(), "<p>hi</p>");
    }

    #[tokio::test]
    async fn backend_failure_is_an_engine_error() {
        let gateway = EngineGateway::new(CountingFactory::new(Duration::ZERO, 0), "phi-2");
        let engine = gateway.get_engine().await.unwrap();

        let err = engine.invoke(payload("explode")).await.unwrap_err();
        assert!(matches!(err, EngineError::Backend(ref m) if m == "out of memory"));

        // The worker survives a failed request.
        assert!(engine.invoke(payload("again")).await.is_ok());
    }

    #[test]
    fn status_display() {
        let status = EngineStatus::Ready {
            model_id: "phi-2".into(),
            backend: "http".into(),
        };
        assert_eq!(status.to_string(), "ready (phi-2 via http)");
        assert_eq!(EngineStatus::Initializing.to_string(), "initializing");
    }
}
