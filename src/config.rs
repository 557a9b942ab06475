//! YAML configuration for sidfp.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//!
//! store:
//!   backend: "redb"          # in_memory | redb
//!   path: "/data/sid.redb"
//!   compression: "zstd"      # none | zstd
//!   compression_level: 3
//!
//! batch:
//!   page_size: 23
//!
//! ranker:
//!   page_size: 89
//!   top_k: 8
//!   # threshold: 0.35        # switches ranking to the threshold policy
//!
//! bitshred:
//!   m: 8192
//!   n: 4
//!   hash: "jenkins"          # jenkins | djb2 | djb2xor | sbox
//!
//! logging:
//!   level: "info"
//!   json: false
//! ```

use std::fs;
use std::path::Path;

use fingerprint::{BitshredConfig, HashFunction};
use matcher::{Policy, RankOptions};
use serde::{Deserialize, Serialize};
use store::{
    BackendConfig, CompressionCodec, CompressionConfig, DEFAULT_COMPUTE_PAGE, DEFAULT_RANK_PAGE,
    StoreConfig,
};
use thiserror::Error;

use crate::batch::BatchOptions;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level configuration of the fingerprint tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SidfpConfig {
    /// Configuration format version
    pub version: String,

    #[serde(default)]
    pub store: StoreYamlConfig,

    #[serde(default)]
    pub batch: BatchYamlConfig,

    #[serde(default)]
    pub ranker: RankerYamlConfig,

    #[serde(default)]
    pub bitshred: BitshredYamlConfig,

    #[serde(default)]
    pub logging: LoggingYamlConfig,
}

impl SidfpConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: SidfpConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.store.validate()?;
        self.batch.validate()?;
        self.ranker.validate()?;
        self.bitshred.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

impl Default for SidfpConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            store: StoreYamlConfig::default(),
            batch: BatchYamlConfig::default(),
            ranker: RankerYamlConfig::default(),
            bitshred: BitshredYamlConfig::default(),
            logging: LoggingYamlConfig::default(),
        }
    }
}

/// Store selection and blob compression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreYamlConfig {
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Database file, required for `redb`
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default = "default_compression")]
    pub compression: String,

    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

impl StoreYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        let valid_backends = ["in_memory", "redb"];
        if !valid_backends.contains(&self.backend.as_str()) {
            return Err(ConfigLoadError::Validation(format!(
                "store.backend must be one of: {valid_backends:?}"
            )));
        }
        if self.backend == "redb" && self.path.is_none() {
            return Err(ConfigLoadError::Validation(
                "store.path is required when backend is 'redb'".to_string(),
            ));
        }
        let valid_codecs = ["none", "zstd"];
        if !valid_codecs.contains(&self.compression.as_str()) {
            return Err(ConfigLoadError::Validation(format!(
                "store.compression must be one of: {valid_codecs:?}"
            )));
        }
        self.to_store_config()
            .compression
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("store.{e}")))
    }

    /// Store config for tools whose runs must see each other's writes.
    ///
    /// An in-memory store forgets everything when the process exits, so it is
    /// rejected here.
    pub fn persistent_store_config(&self) -> Result<StoreConfig, ConfigLoadError> {
        if self.backend != "redb" {
            return Err(ConfigLoadError::Validation(format!(
                "store.backend '{}' does not persist between runs, use 'redb' with store.path",
                self.backend
            )));
        }
        Ok(self.to_store_config())
    }

    pub fn to_store_config(&self) -> StoreConfig {
        let backend = match (self.backend.as_str(), &self.path) {
            ("redb", Some(path)) => BackendConfig::redb(path.clone()),
            _ => BackendConfig::in_memory(),
        };
        let codec = if self.compression == "none" {
            CompressionCodec::None
        } else {
            CompressionCodec::Zstd
        };
        StoreConfig::new()
            .with_backend(backend)
            .with_compression(CompressionConfig::new(codec, self.compression_level))
    }
}

impl Default for StoreYamlConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
            compression: default_compression(),
            compression_level: default_compression_level(),
        }
    }
}

/// Batch fingerprint computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchYamlConfig {
    #[serde(default = "default_compute_page")]
    pub page_size: usize,
}

impl BatchYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.page_size == 0 {
            return Err(ConfigLoadError::Validation(
                "batch.page_size must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_options(&self) -> BatchOptions {
        BatchOptions::default().with_page_size(self.page_size)
    }
}

impl Default for BatchYamlConfig {
    fn default() -> Self {
        Self {
            page_size: default_compute_page(),
        }
    }
}

/// Similarity ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankerYamlConfig {
    #[serde(default = "default_rank_page")]
    pub page_size: usize,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// When set, rankings keep every match at distance `<= threshold`
    /// instead of the `top_k` closest.
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl RankerYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.page_size == 0 {
            return Err(ConfigLoadError::Validation(
                "ranker.page_size must be >= 1".to_string(),
            ));
        }
        self.policy()
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("ranker: {e}")))
    }

    pub fn to_options(&self) -> RankOptions {
        RankOptions::default().with_page_size(self.page_size)
    }

    pub fn policy(&self) -> Policy {
        match self.threshold {
            Some(delta) => Policy::threshold(delta),
            None => Policy::top_k(self.top_k),
        }
    }
}

impl Default for RankerYamlConfig {
    fn default() -> Self {
        Self {
            page_size: default_rank_page(),
            top_k: default_top_k(),
            threshold: None,
        }
    }
}

/// Bitshred backend parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitshredYamlConfig {
    #[serde(default = "default_m")]
    pub m: u32,

    #[serde(default = "default_n")]
    pub n: u32,

    #[serde(default = "default_hash")]
    pub hash: String,
}

impl BitshredYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        self.to_config()?
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("bitshred: {e}")))
    }

    pub fn to_config(&self) -> Result<BitshredConfig, ConfigLoadError> {
        let hash: HashFunction = self
            .hash
            .parse()
            .map_err(|e| ConfigLoadError::Validation(format!("bitshred.hash: {e}")))?;
        Ok(BitshredConfig::new()
            .with_m(self.m)
            .with_n(self.n)
            .with_hash(hash))
    }
}

impl Default for BitshredYamlConfig {
    fn default() -> Self {
        let defaults = BitshredConfig::default();
        Self {
            m: defaults.m,
            n: defaults.n,
            hash: defaults.hash.name().to_string(),
        }
    }
}

/// Log output of the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingYamlConfig {
    /// `tracing` env-filter directive, e.g. `info` or `sidfp=debug,store=warn`
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl LoggingYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.level.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "logging.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LoggingYamlConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_backend() -> String {
    "in_memory".to_string()
}
fn default_compression() -> String {
    "zstd".to_string()
}
fn default_compression_level() -> i32 {
    3
}
fn default_compute_page() -> usize {
    DEFAULT_COMPUTE_PAGE
}
fn default_rank_page() -> usize {
    DEFAULT_RANK_PAGE
}
fn default_top_k() -> usize {
    8
}
fn default_m() -> u32 {
    BitshredConfig::default().m
}
fn default_n() -> u32 {
    BitshredConfig::default().n
}
fn default_hash() -> String {
    HashFunction::default().name().to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
