use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::service::date_range::MAX_RANGE_DAYS;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub checklist: ChecklistConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// e.g. `http://127.0.0.1:8000/api/v1`
    pub base_url: String,
    pub api_key: String,
    /// Per-request timeout; also bounds each day of a range fetch
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistConfig {
    pub max_range_days: usize,
    /// Refuse to generate while local menu edits are not on the server
    pub require_synced_menu: bool,
}

impl Default for ChecklistConfig {
    fn default() -> Self {
        Self {
            max_range_days: MAX_RANGE_DAYS,
            require_synced_menu: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            backend: BackendConfig {
                base_url: "http://127.0.0.1:8000/api/v1".to_string(),
                api_key: "dev-api-key".to_string(),
                timeout_secs: 30,
            },
            checklist: ChecklistConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the optional TOML file (`COOKOPS_CONFIG`, default
    /// `config/cookops.toml`), then `COOKOPS__SECTION__KEY` variables, then the
    /// legacy unprefixed variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", defaults.server.port as i64)?
            .set_default("backend.base_url", defaults.backend.base_url)?
            .set_default("backend.api_key", defaults.backend.api_key)?
            .set_default("backend.timeout_secs", defaults.backend.timeout_secs as i64)?
            .set_default("checklist.max_range_days", defaults.checklist.max_range_days as i64)?
            .set_default("checklist.require_synced_menu", defaults.checklist.require_synced_menu)?;

        let path = std::env::var("COOKOPS_CONFIG").unwrap_or_else(|_| "config/cookops.toml".to_string());
        if Path::new(&path).exists() {
            builder = builder.add_source(File::with_name(&path));
        }

        builder = builder.add_source(
            Environment::with_prefix("COOKOPS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        for (var, key) in [
            ("SERVER_HOST", "server.host"),
            ("SERVER_PORT", "server.port"),
            ("COOKOPS_API_BASE", "backend.base_url"),
            ("COOKOPS_API_KEY", "backend.api_key"),
        ] {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        builder.build()?.try_deserialize()
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
