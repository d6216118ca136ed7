//! The worker boundary.
//!
//! A model backend lives inside its own task and is only reachable through
//! messages: each request travels over an `mpsc` queue together with a
//! `oneshot` sender for its reply. The worker serves one message at a time, in
//! arrival order.
//!
//! A request cannot be withdrawn once queued. If the requester stops waiting
//! (e.g. it timed out), the worker still runs the request to completion and
//! its reply is dropped because nobody holds the receiving end any more.

use evoweb_core::engine::{ModelBackend, WorkerMessage, WorkerReply};
use evoweb_core::error::{EngineError, EngineInitError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Pending requests a worker will buffer before senders wait.
const WORKER_QUEUE_DEPTH: usize = 16;

struct Envelope {
    message: WorkerMessage,
    reply: oneshot::Sender<WorkerReply>,
}

/// Sending side of a running worker. Cheap to clone.
#[derive(Clone)]
pub struct WorkerClient {
    tx: mpsc::Sender<Envelope>,
    backend: String,
}

impl std::fmt::Debug for WorkerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerClient")
            .field("backend", &self.backend)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl WorkerClient {
    /// Spawn a worker task that takes ownership of `backend`.
    ///
    /// The worker exits once every `WorkerClient` clone has been dropped.
    pub fn spawn(backend: Box<dyn ModelBackend>) -> Self {
        let (tx, rx) = mpsc::channel(WORKER_QUEUE_DEPTH);
        let name = backend.name().to_string();
        info!(backend = %name, "Spawning model worker");
        tokio::spawn(run_worker(backend, rx));
        Self { tx, backend: name }
    }

    /// Name of the hosted backend.
    pub fn backend_name(&self) -> &str {
        &self.backend
    }

    /// Send one message and await its reply.
    ///
    /// May wait indefinitely if the backend never answers; bounding the wait
    /// is the caller's job.
    pub async fn send(&self, message: WorkerMessage) -> Result<WorkerReply, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                message,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::WorkerGone("worker stopped accepting messages".into()))?;

        reply_rx
            .await
            .map_err(|_| EngineError::WorkerGone("worker dropped the request".into()))
    }
}

async fn run_worker(mut backend: Box<dyn ModelBackend>, mut rx: mpsc::Receiver<Envelope>) {
    while let Some(Envelope { message, reply }) = rx.recv().await {
        let operation = message.operation();
        debug!(backend = backend.name(), operation, "Worker received message");

        let outcome = match message {
            WorkerMessage::Load { model_id } => match backend.load(&model_id).await {
                Ok(()) => WorkerReply::Ready,
                Err(EngineInitError::ModelLoad { reason, .. }) => WorkerReply::Failed { error: reason },
                Err(e) => WorkerReply::Failed {
                    error: e.to_string(),
                },
            },
            WorkerMessage::ChatCompletion(payload) => {
                match backend.chat_completion(payload).await {
                    Ok(response) => WorkerReply::Completion { response },
                    Err(e) => {
                        warn!(backend = backend.name(), error = %e, "Backend completion failed");
                        let error = match e {
                            EngineError::Backend(message) => message,
                            other => other.to_string(),
                        };
                        WorkerReply::Failed { error }
                    }
                }
            }
        };

        if reply.send(outcome).is_err() {
            debug!(operation, "Requester stopped waiting, discarding worker reply");
        }
    }
    debug!(backend = backend.name(), "Worker queue closed, exiting");
}
