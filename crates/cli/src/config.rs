//! CLI configuration

use fetchkit_common::{ApiConfig, FetchOptions, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding the configured auth token
pub const AUTH_TOKEN_ENV: &str = "FETCHKIT_AUTH_TOKEN";

/// Fetchkit configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchkitConfig {
    /// REST API client settings
    pub api: ApiConfig,

    /// Defaults for `fetchkit get`
    pub fetch: FetchOptions,

    /// Defaults for `fetchkit retry`
    pub retry: RetryPolicy,
}

impl FetchkitConfig {
    /// Load configuration from file, falling back to defaults if absent
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        if let Ok(token) = std::env::var(AUTH_TOKEN_ENV) {
            if !token.is_empty() {
                config.api.auth_token = Some(token);
            }
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
