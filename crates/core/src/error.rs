//! Error types for the EvoWeb domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Note that generation failures (timeout, engine error, malformed response)
//! are *not* errors at the API surface: the orchestrator turns them into a
//! degraded result. Only contract violations reach the caller of `generate`.

use thiserror::Error;

/// The top-level error type for all EvoWeb operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Profile errors ---
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    // --- Engine errors ---
    #[error("Engine initialization failed: {0}")]
    EngineInit(#[from] EngineInitError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    // --- Generation errors ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    // --- Storage errors ---
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    /// Bad caller input. Not retried.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Profile catalog is empty")]
    EmptyCatalog,
}

/// Failure to bring the model engine up.
///
/// `Clone` because a single initialization attempt is shared by every caller
/// that arrived while it was pending; each of them receives the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineInitError {
    #[error("Failed to construct model worker: {0}")]
    WorkerSpawn(String),

    #[error("Failed to load model '{model_id}': {reason}")]
    ModelLoad { model_id: String, reason: String },

    #[error("Model worker closed before completing the handshake")]
    HandshakeClosed,

    #[error("Engine initialization aborted: {0}")]
    Aborted(String),

    #[error("Engine initialization timed out after {timeout_secs}s")]
    TimedOut { timeout_secs: u64 },
}

/// Failure of a single request sent across the worker boundary.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Model worker is gone: {0}")]
    WorkerGone(String),

    #[error("Model backend failed: {0}")]
    Backend(String),

    #[error("Engine unavailable: {0}")]
    Init(#[from] EngineInitError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Another generation is still in flight on the same engine handle.
    /// Callers must wait for it to settle before trying again.
    #[error("A generation is already in flight")]
    Busy,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O failed at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Stored value for '{key}' could not be (de)serialized: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Storage backend error: {0}")]
    Backend(String),
}
