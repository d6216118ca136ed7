//! Configuration loading, validation, and management for EvoWeb.
//!
//! Loads configuration from `~/.evoweb/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.evoweb/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Persistence configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Profile selection configuration
    #[serde(default)]
    pub profile: ProfileConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Which model backend the worker hosts: "http", "local" or "echo"
    #[serde(default = "default_engine_backend")]
    pub backend: String,

    /// Model identifier loaded during the worker handshake
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Base URL of an OpenAI-compatible runtime (http backend only)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer token for runtimes that require one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Bound on a single generation, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Bound on worker construction + model load, in seconds
    #[serde(default = "default_init_timeout_secs")]
    pub init_timeout_secs: u64,
}

fn default_engine_backend() -> String {
    "http".into()
}
fn default_model_id() -> String {
    "phi-2".into()
}
fn default_api_url() -> String {
    "http://localhost:8080/v1".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_init_timeout_secs() -> u64 {
    300
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: default_engine_backend(),
            model_id: default_model_id(),
            api_url: default_api_url(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            init_timeout_secs: default_init_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "file", "memory" or "sqlite"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Location of the store (file path or SQLite database path)
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

fn default_storage_backend() -> String {
    "file".into()
}
fn default_storage_path() -> PathBuf {
    AppConfig::config_dir().join("store.json")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: default_storage_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Pin a catalog profile instead of rotating by visit count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit_profile_id: Option<String>,

    /// JSON array of profiles replacing the built-in catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    4173
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

const ENGINE_BACKENDS: &[&str] = &["http", "local", "echo"];
const STORAGE_BACKENDS: &[&str] = &["file", "memory", "sqlite"];

impl AppConfig {
    /// Load configuration from the default path (~/.evoweb/config.toml).
    ///
    /// Environment variables override file values:
    /// - `EVOWEB_ENGINE_BACKEND`
    /// - `EVOWEB_MODEL`
    /// - `EVOWEB_API_URL`
    /// - `EVOWEB_API_KEY`
    /// - `EVOWEB_PROFILE`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(backend) = std::env::var("EVOWEB_ENGINE_BACKEND") {
            config.engine.backend = backend;
        }
        if let Ok(model) = std::env::var("EVOWEB_MODEL") {
            config.engine.model_id = model;
        }
        if let Ok(url) = std::env::var("EVOWEB_API_URL") {
            config.engine.api_url = url;
        }
        if let Ok(key) = std::env::var("EVOWEB_API_KEY") {
            config.engine.api_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Ok(profile) = std::env::var("EVOWEB_PROFILE") {
            config.profile.explicit_profile_id = Some(profile).filter(|p| !p.is_empty());
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".evoweb")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;

        if !ENGINE_BACKENDS.contains(&engine.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "engine.backend must be one of {ENGINE_BACKENDS:?}, got '{}'",
                engine.backend
            )));
        }
        if engine.model_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "engine.model_id must not be empty".into(),
            ));
        }
        if engine.temperature < 0.0 || engine.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "engine.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if engine.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "engine.max_tokens must be > 0".into(),
            ));
        }
        if engine.timeout_secs == 0 || engine.init_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "engine timeouts must be > 0".into(),
            ));
        }
        if !STORAGE_BACKENDS.contains(&self.storage.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "storage.backend must be one of {STORAGE_BACKENDS:?}, got '{}'",
                self.storage.backend
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.timeout_secs, 30);
        assert_eq!(config.engine.max_tokens, 1000);
        assert_eq!(config.gateway.port, 4173);
        assert!(config.profile.explicit_profile_id.is_none());
        assert!(config.profile.catalog_path.is_none());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.engine.model_id, config.engine.model_id);
        assert_eq!(parsed.storage.backend, config.storage.backend);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.engine.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_backend_rejected() {
        let mut config = AppConfig::default();
        config.engine.backend = "cloud".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("engine.backend"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = AppConfig::default();
        config.engine.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.engine.backend, "http");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[engine]
backend = "echo"
timeout_secs = 5

[profile]
explicit_profile_id = "tech-professional"
catalog_path = "/srv/evoweb/profiles.json"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.engine.backend, "echo");
        assert_eq!(config.engine.timeout_secs, 5);
        assert_eq!(config.engine.max_tokens, 1000);
        assert_eq!(
            config.profile.explicit_profile_id.as_deref(),
            Some("tech-professional")
        );
        assert_eq!(
            config.profile.catalog_path.as_deref(),
            Some(Path::new("/srv/evoweb/profiles.json"))
        );
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[engine\nbackend = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("phi-2"));
        assert!(toml_str.contains("4173"));
    }
}
