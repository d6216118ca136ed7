//! Build the configured backend factory.

use std::sync::Arc;

use evoweb_config::EngineConfig;
use evoweb_core::engine::{BackendFactory, ModelBackend};
use evoweb_core::error::EngineInitError;

use crate::echo::EchoBackend;
use crate::gateway::EngineGateway;
use crate::http::HttpBackend;

/// Which runtime the worker hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Http,
    Local,
    Echo,
}

impl BackendKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "http" => Some(Self::Http),
            "local" => Some(Self::Local),
            "echo" => Some(Self::Echo),
            _ => None,
        }
    }
}

/// Creates a fresh backend of one kind for every worker spawn.
#[derive(Debug, Clone)]
pub struct ConfiguredFactory {
    kind: BackendKind,
    api_url: String,
    api_key: Option<String>,
}

impl ConfiguredFactory {
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineInitError> {
        let kind = BackendKind::parse(&config.backend).ok_or_else(|| {
            EngineInitError::WorkerSpawn(format!("unknown engine backend '{}'", config.backend))
        })?;
        Ok(Self {
            kind,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }
}

impl BackendFactory for ConfiguredFactory {
    fn create(&self) -> Result<Box<dyn ModelBackend>, EngineInitError> {
        match self.kind {
            BackendKind::Http => {
                let mut backend = HttpBackend::new(&self.api_url)?;
                if let Some(key) = &self.api_key {
                    backend = backend.with_api_key(key);
                }
                Ok(Box::new(backend))
            }
            BackendKind::Echo => Ok(Box::new(EchoBackend::new())),
            #[cfg(feature = "local")]
            BackendKind::Local => Ok(Box::new(crate::local::LocalBackend::new())),
            #[cfg(not(feature = "local"))]
            BackendKind::Local => Err(EngineInitError::WorkerSpawn(
                "local backend requires building with the `local` feature".into(),
            )),
        }
    }
}

/// Build an engine gateway from configuration.
pub fn build_from_config(config: &EngineConfig) -> Result<EngineGateway, EngineInitError> {
    let factory = ConfiguredFactory::from_config(config)?;
    tracing::debug!(backend = ?factory.kind(), model = %config.model_id, "Configured engine");
    Ok(EngineGateway::new(Arc::new(factory), config.model_id.clone()))
}
