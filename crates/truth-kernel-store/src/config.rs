//! Adapter configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PersistError, Result};

/// Default lock acquisition timeout.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default maximum encoded envelope size (50 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Configuration shared by every adapter.
///
/// Construct through [`AdapterConfig::builder`] or deserialize from TOML;
/// both paths reject invalid values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawAdapterConfig")]
pub struct AdapterConfig {
    /// Root directory (file adapter) or database location (sqlite adapter).
    pub base_path: PathBuf,
    /// Identifies this replica in envelope metadata.
    pub instance_id: String,
    /// How long `save` waits for the per-key lock.
    pub lock_timeout: Duration,
    /// Largest encoded envelope accepted by `save`.
    pub max_file_size: u64,
    /// Caller schema version stamped into each envelope.
    pub schema_version: u32,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./.truth-data"),
            instance_id: "default".to_string(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            schema_version: 1,
        }
    }
}

impl AdapterConfig {
    pub fn builder() -> AdapterConfigBuilder {
        AdapterConfigBuilder {
            config: Self::default(),
        }
    }

    fn validate(self) -> Result<Self> {
        if self.instance_id.trim().is_empty() {
            return Err(PersistError::InvalidData("instance_id must not be empty".into()));
        }
        if self.lock_timeout.is_zero() {
            return Err(PersistError::InvalidData("lock_timeout must be positive".into()));
        }
        if self.max_file_size == 0 {
            return Err(PersistError::InvalidData("max_file_size must be positive".into()));
        }
        Ok(self)
    }
}

/// Builder for [`AdapterConfig`].
#[derive(Debug, Clone)]
pub struct AdapterConfigBuilder {
    config: AdapterConfig,
}

impl AdapterConfigBuilder {
    pub fn base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.base_path = path.into();
        self
    }

    pub fn instance_id(mut self, id: impl Into<String>) -> Self {
        self.config.instance_id = id.into();
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = timeout;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn schema_version(mut self, version: u32) -> Self {
        self.config.schema_version = version;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<AdapterConfig> {
        self.config.validate()
    }
}

/// On-disk shape of [`AdapterConfig`]. Missing fields take defaults.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawAdapterConfig {
    base_path: PathBuf,
    instance_id: String,
    lock_timeout_ms: u64,
    max_file_size: u64,
    schema_version: u32,
}

impl Default for RawAdapterConfig {
    fn default() -> Self {
        let d = AdapterConfig::default();
        Self {
            base_path: d.base_path,
            instance_id: d.instance_id,
            lock_timeout_ms: d.lock_timeout.as_millis() as u64,
            max_file_size: d.max_file_size,
            schema_version: d.schema_version,
        }
    }
}

impl TryFrom<RawAdapterConfig> for AdapterConfig {
    type Error = PersistError;

    fn try_from(raw: RawAdapterConfig) -> Result<Self> {
        AdapterConfig {
            base_path: raw.base_path,
            instance_id: raw.instance_id,
            lock_timeout: Duration::from_millis(raw.lock_timeout_ms),
            max_file_size: raw.max_file_size,
            schema_version: raw.schema_version,
        }
        .validate()
    }
}
