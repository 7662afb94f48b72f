//! Configuration management
//!
//! 設定は以下の優先順位で読み込まれます:
//! 1. 環境変数
//! 2. デフォルト値

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Port the HTTP server listens on
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding the persisted WhatsApp Web credentials
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    /// Bound on the graceful sign-out attempt during logout, in seconds
    #[serde(default = "default_logout_timeout_secs")]
    pub logout_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            logout_timeout_secs: default_logout_timeout_secs(),
        }
    }
}

/// Main configuration for wa-gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Session lifecycle configuration
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_api_port() -> u16 {
    3000
}

fn default_storage_path() -> PathBuf {
    std::env::temp_dir().join("whatsapp-session")
}

fn default_logout_timeout_secs() -> u64 {
    5
}

impl Config {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("PORT") {
            config.api.port = port
                .parse()
                .map_err(|_| Error::Config(format!("Invalid PORT value: {}", port)))?;
        }

        if let Ok(path) = std::env::var("WA_SESSION_PATH") {
            config.session.storage_path = PathBuf::from(path);
        }

        if let Ok(secs) = std::env::var("WA_LOGOUT_TIMEOUT_SECS") {
            config.session.logout_timeout_secs = secs.parse().map_err(|_| {
                Error::Config(format!("Invalid WA_LOGOUT_TIMEOUT_SECS value: {}", secs))
            })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.api.port, 3000);
        assert_eq!(config.session.logout_timeout_secs, 5);
        assert!(config.session.storage_path.ends_with("whatsapp-session"));
    }

    #[test]
    fn test_session_config_default_path_is_under_tmp() {
        let config = SessionConfig::default();
        assert!(config.storage_path.starts_with(std::env::temp_dir()));
    }
}
