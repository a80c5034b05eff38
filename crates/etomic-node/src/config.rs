//! Node configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use etomic_core::{Address, Asset, EngineConfig};

/// Full configuration for the Etomic node.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EtomicConfig {
    /// Escrow engine parameters.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Height clock settings, used when the engine locks by height.
    #[serde(default)]
    pub clock: ClockConfig,

    /// API server settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Reference asset ledger settings.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// In-process relay settings.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Milliseconds between two heights.
    #[serde(default = "default_block_interval_ms")]
    pub block_interval_ms: u64,
    /// Height the node starts counting from.
    #[serde(default)]
    pub start_height: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API listen address.
    #[serde(default = "default_api_addr")]
    pub listen_addr: String,
    /// API port.
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the data directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LedgerConfig {
    /// Balances credited when the node starts.
    #[serde(default)]
    pub accounts: Vec<GenesisBalance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisBalance {
    pub address: Address,
    #[serde(default = "default_asset")]
    pub asset: Asset,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Whether the node runs the relay worker.
    #[serde(default)]
    pub enabled: bool,
    /// JSON-RPC endpoint of the foreign ledger node.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default)]
    pub rpc_user: Option<String>,
    #[serde(default)]
    pub rpc_password: Option<String>,
    /// File holding the hex-encoded ed25519 secret key of the relay.
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_block_interval_ms() -> u64 {
    1000
}
fn default_api_addr() -> String {
    "127.0.0.1".into()
}
fn default_api_port() -> u16 {
    9001
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_asset() -> Asset {
    Asset::Native
}
fn default_rpc_url() -> String {
    "http://127.0.0.1:8332".into()
}
fn default_poll_interval_secs() -> u64 {
    10
}
fn default_max_backoff_secs() -> u64 {
    300
}
fn default_rpc_timeout_secs() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            block_interval_ms: default_block_interval_ms(),
            start_height: 0,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_api_addr(),
            port: default_api_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rpc_url: default_rpc_url(),
            rpc_user: None,
            rpc_password: None,
            key_path: None,
            poll_interval_secs: default_poll_interval_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            rpc_timeout_secs: default_rpc_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl RelayConfig {
    pub fn worker_config(&self) -> etomic_relay::RelayConfig {
        etomic_relay::RelayConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            max_backoff: Duration::from_secs(self.max_backoff_secs.max(self.poll_interval_secs)),
        }
    }

    pub fn rpc_auth(&self) -> Option<etomic_relay::RpcAuth> {
        self.rpc_user.as_ref().map(|user| etomic_relay::RpcAuth {
            user: user.clone(),
            password: self.rpc_password.clone().unwrap_or_default(),
        })
    }
}

impl EtomicConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: EtomicConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Full API listen address.
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.listen_addr, self.api.port)
    }

    pub fn block_interval(&self) -> Duration {
        Duration::from_millis(self.clock.block_interval_ms.max(1))
    }
}
