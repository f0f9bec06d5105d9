use crate::error::{VersoError, VersoResult};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    /// Allowed CORS origins. Empty means permissive.
    pub cors_origins: Vec<String>,
    /// Content stream used by routes that do not name one.
    pub default_content_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout_secs: 30,
            cors_origins: Vec::new(),
            default_content_id: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    Memory,
    Rocksdb,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Memory,
            path: PathBuf::from("./data/verso"),
        }
    }
}

/// Input ceilings enforced by the version store and tag index.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_content_bytes: usize,
    pub max_message_chars: usize,
    pub max_tag_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_content_bytes: 1_000_000,
            max_message_chars: 500,
            max_tag_chars: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "verso=info,tower_http=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> VersoResult<AppConfig> {
    let mut builder = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::with_prefix("VERSO").separator("__"));

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }

    let config = builder
        .build()
        .map_err(|err| VersoError::ConfigError(err.to_string()))?;

    let parsed: AppConfig = config
        .try_deserialize()
        .map_err(|err| VersoError::ConfigError(err.to_string()))?;

    validate(&parsed)?;
    Ok(parsed)
}

fn validate(config: &AppConfig) -> VersoResult<()> {
    let limits = &config.limits;
    if limits.max_content_bytes == 0 || limits.max_message_chars == 0 || limits.max_tag_chars == 0
    {
        return Err(VersoError::ConfigError(
            "limits must all be greater than zero".to_string(),
        ));
    }

    if config.server.default_content_id.trim().is_empty() {
        return Err(VersoError::ConfigError(
            "server.default_content_id must not be empty".to_string(),
        ));
    }

    #[cfg(not(feature = "rocksdb-storage"))]
    if config.storage.backend == StorageBackendKind::Rocksdb {
        return Err(VersoError::ConfigError(
            "storage.backend 'rocksdb' requires the rocksdb-storage feature".to_string(),
        ));
    }

    Ok(())
}
