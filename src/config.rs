//! Configuration management for RageChain

use crate::error::ChainError;
use crate::persistence::{Database, InMemoryPersistence, JsonFilePersistence, Persistence};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeConfig {
    /// Fixed node identifier. A fresh one is generated when unset, which
    /// also means the node starts from a new snapshot file.
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    /// Human-readable duration, e.g. `"5s"` or `"1500ms"`.
    #[serde(default = "default_peer_timeout")]
    pub peer_timeout: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            bootstrap_peers: Vec::new(),
            peer_timeout: default_peer_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Json,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl Config {
    /// Configured node id, or a new UUID in simple form.
    pub fn node_id(&self) -> String {
        match &self.node.id {
            Some(id) => id.clone(),
            None => uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn peer_timeout(&self) -> Result<Duration, ChainError> {
        humantime::parse_duration(self.network.peer_timeout.trim()).map_err(|e| {
            ChainError::ConfigError(format!(
                "network.peer_timeout '{}': {}",
                self.network.peer_timeout, e
            ))
        })
    }

    /// Opens the configured snapshot backend for `node_id`.
    pub fn open_persistence(&self, node_id: &str) -> Result<Box<dyn Persistence>, ChainError> {
        let data_dir = PathBuf::from(&self.storage.data_dir);
        match self.storage.backend {
            StorageBackend::Json => Ok(Box::new(JsonFilePersistence::new(data_dir, node_id))),
            StorageBackend::Sqlite => {
                fs::create_dir_all(&data_dir)?;
                let path = data_dir.join("ragechain.db");
                let db = Database::open(&path.to_string_lossy(), node_id)?;
                Ok(Box::new(db))
            }
            StorageBackend::Memory => Ok(Box::new(InMemoryPersistence::new())),
        }
    }

    fn validate(&self) -> Result<(), ChainError> {
        if self.storage.backend != StorageBackend::Memory && self.storage.data_dir.is_empty() {
            return Err(ChainError::ConfigError(
                "storage.data_dir must be set in config.toml".to_string(),
            ));
        }
        if matches!(&self.node.id, Some(id) if id.trim().is_empty()) {
            return Err(ChainError::ConfigError(
                "node.id must not be empty when set".to_string(),
            ));
        }
        self.peer_timeout()?;
        Ok(())
    }
}

/// Loads `config.toml` from the working directory, falling back to defaults
/// when the file is absent.
pub fn load_config() -> Result<Config, ChainError> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    let config = if path.exists() {
        let config_str = fs::read_to_string(path)?;
        parse_config(&config_str)?
    } else {
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

pub fn parse_config(config_str: &str) -> Result<Config, ChainError> {
    toml::from_str(config_str).map_err(|e| ChainError::ConfigError(e.to_string()))
}

fn default_api_port() -> u16 {
    5000
}

fn default_peer_timeout() -> String {
    "5s".to_string()
}

fn default_data_dir() -> String {
    "blockchain_data".to_string()
}
