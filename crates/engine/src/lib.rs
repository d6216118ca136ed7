//! # EvoWeb Engine
//!
//! Hosts the language model behind a worker boundary.
//!
//! - [`WorkerClient`] spawns a task that owns a [`ModelBackend`] and speaks
//!   the `engine.load` / `chat.completions.create` message protocol.
//! - [`EngineGateway`] initializes the worker once and hands out
//!   [`EngineHandle`]s that forward completion requests to it.
//!
//! Backends: [`HttpBackend`] (OpenAI-compatible local runtime),
//! [`EchoBackend`] (offline), and `LocalBackend` (Candle, `local` feature).
//!
//! [`ModelBackend`]: evoweb_core::engine::ModelBackend

pub mod echo;
pub mod factory;
pub mod gateway;
pub mod http;
#[cfg(feature = "local")]
pub mod local;
pub mod worker;

pub use echo::EchoBackend;
pub use factory::{BackendKind, ConfiguredFactory, build_from_config};
pub use gateway::{EngineGateway, EngineHandle, EngineStatus};
pub use http::HttpBackend;
#[cfg(feature = "local")]
pub use local::LocalBackend;
pub use worker::WorkerClient;
