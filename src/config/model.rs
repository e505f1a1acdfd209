// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::download::InstalledBinary;
use crate::engine::OrchestratorOptions;
use crate::exec::{
    Launchers, LocalProcessLauncher, OutputStream, ProcessSpec, ReadinessDetector,
};
use crate::settings::{MemorySettings, SettingValue};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [paths]
/// bin_dir = "."
/// log_dir = "./logs"
///
/// [rpc]
/// binary = "geth"
/// port = 8545
///
/// [connector]
/// binary = "emerald"
/// ready_pattern = "Connector started on"
/// ready_timeout = "60s"
///
/// [settings]
/// rpcType = "local"
/// chain = "morden"
/// chainId = 62
/// ```
///
/// Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub paths: PathsSection,

    #[serde(default)]
    pub rpc: RpcSection,

    #[serde(default)]
    pub connector: ConnectorSection,

    #[serde(default)]
    pub shutdown: ShutdownSection,

    /// Initial values for the settings source (`rpcType`, `chain`, `chainId`).
    #[serde(default)]
    pub settings: BTreeMap<String, SettingValue>,
}

/// `[paths]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsSection {
    /// Directory holding the service binaries.
    #[serde(default = "default_bin_dir")]
    pub bin_dir: PathBuf,

    /// Directory handed to the connector for its own logs.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_bin_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            bin_dir: default_bin_dir(),
            log_dir: default_log_dir(),
        }
    }
}

/// `[rpc]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcSection {
    #[serde(default = "default_rpc_binary")]
    pub binary: String,

    /// Argument template; `{chain}`, `{chain_id}`, `{port}`, `{log_dir}`
    /// are expanded at launch.
    #[serde(default = "default_rpc_args")]
    pub args: Vec<String>,

    /// Port of the local JSON-RPC endpoint.
    #[serde(default = "default_rpc_port")]
    pub port: u16,

    /// Endpoint used in remote mode.
    #[serde(default = "default_remote_url")]
    pub remote_url: String,
}

fn default_rpc_binary() -> String {
    "geth".to_string()
}

fn default_rpc_args() -> Vec<String> {
    ["--chain", "{chain}", "--rpc", "--rpcport", "{port}", "--rpccorsdomain", "*"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_rpc_port() -> u16 {
    8545
}

fn default_remote_url() -> String {
    "https://mewapi.epool.io".to_string()
}

impl Default for RpcSection {
    fn default() -> Self {
        Self {
            binary: default_rpc_binary(),
            args: default_rpc_args(),
            port: default_rpc_port(),
            remote_url: default_remote_url(),
        }
    }
}

/// `[connector]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectorSection {
    #[serde(default = "default_connector_binary")]
    pub binary: String,

    #[serde(default = "default_connector_args")]
    pub args: Vec<String>,

    /// Regex marking the connector as ready.
    #[serde(default = "default_ready_pattern")]
    pub ready_pattern: String,

    /// Upper bound for the readiness wait, e.g. `"60s"`.
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout: String,

    /// `"stdout"` or `"stderr"`.
    #[serde(default = "default_ready_stream")]
    pub ready_stream: String,
}

fn default_connector_binary() -> String {
    "emerald".to_string()
}

fn default_connector_args() -> Vec<String> {
    ["--chain-id", "{chain_id}", "--log-dir", "{log_dir}", "server"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_ready_pattern() -> String {
    regex::escape(crate::exec::readiness::CONNECTOR_BANNER)
}

fn default_ready_timeout() -> String {
    "60s".to_string()
}

fn default_ready_stream() -> String {
    "stderr".to_string()
}

impl Default for ConnectorSection {
    fn default() -> Self {
        Self {
            binary: default_connector_binary(),
            args: default_connector_args(),
            ready_pattern: default_ready_pattern(),
            ready_timeout: default_ready_timeout(),
            ready_stream: default_ready_stream(),
        }
    }
}

/// `[shutdown]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShutdownSection {
    /// How long a killed process may take to go away.
    #[serde(default = "default_shutdown_timeout")]
    pub timeout: String,
}

fn default_shutdown_timeout() -> String {
    "10s".to_string()
}

impl Default for ShutdownSection {
    fn default() -> Self {
        Self {
            timeout: default_shutdown_timeout(),
        }
    }
}

/// Validated configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)`, which
/// compiles the readiness pattern and parses every duration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub bin_dir: PathBuf,
    pub log_dir: PathBuf,
    pub rpc: RpcConfig,
    pub connector: ConnectorConfig,
    pub shutdown_timeout: Duration,
    pub settings: BTreeMap<String, SettingValue>,
}

#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub binary: String,
    pub args: Vec<String>,
    pub port: u16,
    pub remote_url: String,
}

#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub binary: String,
    pub args: Vec<String>,
    pub readiness: ReadinessDetector,
    pub ready_timeout: Duration,
    pub ready_stream: OutputStream,
}

impl ConfigFile {
    /// Full path of a binary inside `bin_dir`.
    pub fn binary_path(&self, name: &str) -> PathBuf {
        self.bin_dir
            .join(format!("{name}{}", std::env::consts::EXE_SUFFIX))
    }

    pub fn rpc_binary_path(&self) -> PathBuf {
        self.binary_path(&self.rpc.binary)
    }

    pub fn connector_binary_path(&self) -> PathBuf {
        self.binary_path(&self.connector.binary)
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            rpc_port: self.rpc.port,
            remote_rpc_url: self.rpc.remote_url.clone(),
            readiness: self.connector.readiness.clone(),
            ready_timeout: self.connector.ready_timeout,
            log_dir: Some(self.log_dir.clone()),
        }
    }

    /// Process launchers for both services.
    pub fn launchers(&self) -> Launchers {
        let rpc = LocalProcessLauncher::new(ProcessSpec {
            program: self.rpc_binary_path(),
            args: self.rpc.args.clone(),
            // geth logs to stderr; nothing is matched on it.
            forward_stream: OutputStream::Stderr,
            ready_pattern: None,
            shutdown_timeout: self.shutdown_timeout,
        });
        let connector = LocalProcessLauncher::new(ProcessSpec {
            program: self.connector_binary_path(),
            args: self.connector.args.clone(),
            forward_stream: self.connector.ready_stream,
            ready_pattern: Some(self.connector.readiness.clone()),
            shutdown_timeout: self.shutdown_timeout,
        });
        Launchers::new(rpc, connector)
    }

    pub fn downloader(&self) -> InstalledBinary {
        InstalledBinary::new(self.rpc_binary_path())
    }

    /// Settings source seeded from `[settings]`.
    pub fn initial_settings(&self) -> MemorySettings {
        MemorySettings::from(self.settings.clone())
    }
}
