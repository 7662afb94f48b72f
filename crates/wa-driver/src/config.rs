//! ブリッジプロセス設定
//!
//! Node.js ブリッジの起動方法を環境変数で調整できます。

use std::env;
use std::path::PathBuf;

use serde::Deserialize;

/// How the Node.js bridge process is launched
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Node binary used to run the bridge
    #[serde(default = "default_node_binary")]
    pub node_binary: String,

    /// Path to the bridge script
    #[serde(default = "default_script_path")]
    pub script_path: PathBuf,

    /// Directory holding persisted session credentials; handed to the
    /// bridge, which reads and writes it through its auth strategy
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    /// Run the browser headless
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Arguments passed through to the browser
    #[serde(default = "default_browser_args")]
    pub browser_args: Vec<String>,

    /// Seconds to wait for a bridge reply before giving up
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_node_binary() -> String {
    "node".to_string()
}

fn default_script_path() -> PathBuf {
    PathBuf::from("bridge/whatsapp-bridge.js")
}

fn default_storage_path() -> PathBuf {
    env::temp_dir().join("whatsapp-session")
}

fn default_headless() -> bool {
    true
}

fn default_browser_args() -> Vec<String> {
    vec![
        "--no-sandbox".to_string(),
        "--disable-setuid-sandbox".to_string(),
        "--disable-gpu".to_string(),
        "--disable-dev-shm-usage".to_string(),
    ]
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            node_binary: default_node_binary(),
            script_path: default_script_path(),
            storage_path: default_storage_path(),
            headless: default_headless(),
            browser_args: default_browser_args(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl BridgeConfig {
    /// Build a config from environment variables, falling back to
    /// defaults for anything unset
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(node_binary) = env::var("WA_NODE_BIN") {
            config.node_binary = node_binary;
        }
        if let Ok(script_path) = env::var("WA_BRIDGE_SCRIPT") {
            config.script_path = PathBuf::from(script_path);
        }
        if let Ok(headless) = env::var("WA_HEADLESS") {
            config.headless = !matches!(headless.as_str(), "false" | "0" | "no");
        }
        if let Ok(timeout) = env::var("WA_BRIDGE_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                config.request_timeout_secs = secs;
            }
        }

        config
    }
}
