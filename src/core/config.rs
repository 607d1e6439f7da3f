//! Configuration management for the block-document engine
//!
//! Settings load from an optional TOML file, then environment overrides,
//! then validation.

use crate::constants::{
    DEFAULT_CONFIG_FILE, DEFAULT_DATA_DIR, DEFAULT_REVISION_LIST_LIMIT, DEFAULT_SNAPSHOT_INTERVAL,
};
use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Engine behaviour
    pub engine: EngineConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Identifier generation
    pub ids: IdConfig,

    /// Content hashing
    pub hashing: HashConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Create a snapshot whenever `head % snapshot_interval == 0` (0 disables)
    pub snapshot_interval: u64,

    /// Default limit for revision listings
    pub revision_list_limit: usize,

    /// Keep soft-deleted blocks in rendered trees
    pub include_deleted_in_render: bool,
}

/// Storage backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// In-memory store (non-durable)
    #[default]
    Memory,
    /// JSON files under `data_dir`
    File,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend to use
    pub storage_type: StorageType,

    /// Data directory path (file backend)
    pub data_dir: PathBuf,
}

/// Identifier generation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// Random UUID v4
    #[default]
    Uuid,
    /// Random 16-character base62 string
    Base62,
}

/// Identifier configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IdConfig {
    /// Strategy for new document and block ids
    pub strategy: IdStrategy,
}

/// Content hash algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// BLAKE3 (cryptographic)
    #[default]
    Blake3,
    /// FNV-1a 64-bit (fast, non-cryptographic)
    Fnv1a,
}

/// Hashing configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HashConfig {
    /// Algorithm for block content hashes
    pub algorithm: HashAlgorithm,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            revision_list_limit: DEFAULT_REVISION_LIST_LIMIT,
            include_deleted_in_render: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Memory,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default config file (if present) and environment variables
    pub fn load() -> Result<Self> {
        let mut config = if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::from_file(DEFAULT_CONFIG_FILE)?
        } else {
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment in production)
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(interval) = lookup("BD_SNAPSHOT_INTERVAL") {
            self.engine.snapshot_interval = interval
                .parse()
                .map_err(|e| Error::config(format!("Invalid snapshot interval: {}", e)))?;
        }

        if let Some(limit) = lookup("BD_REVISION_LIST_LIMIT") {
            self.engine.revision_list_limit = limit
                .parse()
                .map_err(|e| Error::config(format!("Invalid revision list limit: {}", e)))?;
        }

        if let Some(storage_type) = lookup("BD_STORAGE_TYPE") {
            self.storage.storage_type = match storage_type.as_str() {
                "memory" => StorageType::Memory,
                "file" => StorageType::File,
                other => return Err(Error::config(format!("Invalid storage type: {}", other))),
            };
        }

        if let Some(data_dir) = lookup("BD_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Some(strategy) = lookup("BD_ID_STRATEGY") {
            self.ids.strategy = match strategy.as_str() {
                "uuid" => IdStrategy::Uuid,
                "base62" => IdStrategy::Base62,
                other => return Err(Error::config(format!("Invalid id strategy: {}", other))),
            };
        }

        if let Some(algorithm) = lookup("BD_HASH_ALGORITHM") {
            self.hashing.algorithm = match algorithm.as_str() {
                "blake3" => HashAlgorithm::Blake3,
                "fnv1a" => HashAlgorithm::Fnv1a,
                other => return Err(Error::config(format!("Invalid hash algorithm: {}", other))),
            };
        }

        if let Some(level) = lookup("BD_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = lookup("BD_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.engine.revision_list_limit == 0 {
            return Err(Error::config("Revision list limit must be at least 1"));
        }

        if self.storage.storage_type == StorageType::File
            && self.storage.data_dir.as_os_str().is_empty()
        {
            return Err(Error::config("File storage requires a data directory"));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(Error::config("Invalid log level")),
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            _ => return Err(Error::config("Invalid log format")),
        }

        Ok(())
    }
}
