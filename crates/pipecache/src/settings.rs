//! Cache settings and store provider selection.
//!
//! Settings are read from an optional `pipecache.toml` and then from
//! `PIPECACHE__*` environment variables:
//!
//! ```toml
//! provider = "redis"
//! connection = "redis://127.0.0.1:6379"
//! lookup = "propagate"
//! ```

use std::sync::Arc;

use config::{Config, Environment, File};
use pipecache_store::{KeyValueStore, MemoryStore, RedisStore, StoreError};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::cache::LookupPolicy;

const LOCAL_CONFIG_BASENAME: &str = "pipecache";
const ENV_PREFIX: &str = "PIPECACHE";

/// Which store backs the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreProvider {
    /// In-process store.
    #[default]
    Memory,
    /// Redis store.
    Redis,
}

/// Resolved cache settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSettings {
    pub provider: StoreProvider,
    pub connection: Option<String>,
    pub lookup: LookupPolicy,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("failed to connect store: {0}")]
    Store(#[from] StoreError),
}

impl SettingsError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    provider: Option<String>,
    connection: Option<String>,
    lookup: Option<String>,
}

impl CacheSettings {
    /// Load settings using the configured precedence (file → environment).
    pub fn load() -> Result<Self, SettingsError> {
        let config = Config::builder()
            .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Self::from_config(config)
    }

    /// Resolves settings from an already built configuration.
    pub fn from_config(config: Config) -> Result<Self, SettingsError> {
        let raw: RawSettings = config.try_deserialize()?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSettings) -> Result<Self, SettingsError> {
        let provider = match non_blank(raw.provider) {
            None => StoreProvider::Memory,
            Some(name) if name.eq_ignore_ascii_case("memory") => StoreProvider::Memory,
            Some(name) if name.eq_ignore_ascii_case("redis") => StoreProvider::Redis,
            Some(name) => {
                return Err(SettingsError::invalid(
                    "provider",
                    format!("unknown provider `{name}`, expected `memory` or `redis`"),
                ));
            },
        };

        let connection = non_blank(raw.connection);
        if provider == StoreProvider::Redis && connection.is_none() {
            return Err(SettingsError::invalid(
                "connection",
                "required when provider is `redis`",
            ));
        }

        let lookup = match non_blank(raw.lookup) {
            None => LookupPolicy::Propagate,
            Some(value) if value.eq_ignore_ascii_case("propagate") => LookupPolicy::Propagate,
            Some(value) if value.eq_ignore_ascii_case("treat_as_miss") => LookupPolicy::TreatAsMiss,
            Some(value) => {
                return Err(SettingsError::invalid(
                    "lookup",
                    format!("unknown policy `{value}`, expected `propagate` or `treat_as_miss`"),
                ));
            },
        };

        Ok(Self {
            provider,
            connection,
            lookup,
        })
    }

    /// Builds the configured store.
    pub async fn connect(&self) -> Result<Arc<dyn KeyValueStore>, SettingsError> {
        match self.provider {
            StoreProvider::Memory => {
                info!("Using in-process cache store");
                Ok(Arc::new(MemoryStore::new()))
            },
            StoreProvider::Redis => {
                let url = self
                    .connection
                    .as_deref()
                    .ok_or_else(|| SettingsError::invalid("connection", "missing redis url"))?;
                let store = RedisStore::connect(url).await?;
                info!("Using redis cache store");
                Ok(Arc::new(store))
            },
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
