// crates/vigil-daemon/src/config.rs
//
// Runtime configuration for the Vigil daemon.
// Loaded from a TOML file or populated with sensible defaults.

use serde::Deserialize;
use std::fs;

use vigil_core::{EngineConfig, NodeId, VigilError};
use vigil_economics::MappedPayout;

use crate::engine::DEFAULT_EVENT_BUFFER;

/// Where submitted reports are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local; lost on exit.
    Memory,
    /// RocksDB under `data_dir/reports`.
    Rocksdb,
}

/// A node whose rewards are credited to another identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Beneficiary {
    pub node: NodeId,
    pub beneficiary: NodeId,
}

/// Runtime configuration for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory for local data storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Report store backend.
    #[serde(default = "default_store")]
    pub store: StoreBackend,

    /// Capacity of the engine event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Settle every round as soon as it is reached, under the same target
    /// lock, so the paid contributor set is exactly the announced one.
    #[serde(default)]
    pub settle_on_consensus: bool,

    /// Reward routing overrides. Unlisted nodes are paid themselves.
    #[serde(default)]
    pub beneficiaries: Vec<Beneficiary>,

    /// Consensus and reward parameters.
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> String {
    "~/.vigil/data".to_string()
}

fn default_store() -> StoreBackend {
    StoreBackend::Memory
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
            store: default_store(),
            event_buffer: default_event_buffer(),
            settle_on_consensus: false,
            beneficiaries: Vec::new(),
            engine: EngineConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// engine parameters are invalid.
    pub fn load(path: &str) -> Result<Self, VigilError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| VigilError::Configuration(format!("{}: {}", path, e)))?;
        Self::parse(&contents)
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self, VigilError> {
        let config: DaemonConfig =
            toml::from_str(contents).map_err(|e| VigilError::Configuration(e.to_string()))?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Payout routing table built from `beneficiaries`.
    pub fn payout_resolver(&self) -> MappedPayout {
        self.beneficiaries
            .iter()
            .fold(MappedPayout::new(), |payout, b| {
                payout.with_beneficiary(b.node, b.beneficiary)
            })
    }
}
