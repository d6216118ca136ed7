//! # EvoWeb Core
//!
//! Domain types, traits, and error definitions for the EvoWeb personalization
//! pipeline. This crate performs no I/O; it defines the domain model that
//! all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator is defined as a trait here (profile catalog, model
//! backend, key/value store). Implementations live in their respective crates.
//! This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod signals;
pub mod profile;
pub mod engine;
pub mod generation;
pub mod storage;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, Role};
pub use signals::{BrowserFamily, DeviceClass, DeviceInfo, UserSignals, Viewport, VisitState};
pub use profile::{ContentPreferences, DevicePreferences, InterestSet, ProfileCatalog, UserProfile};
pub use engine::{
    BackendFactory, CompletionPayload, MalformedResponse, ModelBackend, RawModelResponse,
    WorkerMessage, WorkerReply,
};
pub use generation::{DegradedReason, GenerationRequest, GenerationResult, Prompt};
pub use storage::{CachedContent, KeyValueStore};
