//! Kernel configuration.
//!
//! One TOML file names both replicas:
//!
//! ```toml
//! [local]
//! base_path = "./data/local"
//! instance_id = "laptop"
//! lock_timeout_ms = 2000
//!
//! [remote]
//! base_path = "/mnt/share/truth"
//! instance_id = "share"
//! ```
//!
//! Omitted adapter fields take the [`AdapterConfig`] defaults.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use truth_kernel_store::AdapterConfig;

use crate::error::{KernelError, Result};

/// Adapter settings for both replicas.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KernelConfig {
    pub local: AdapterConfig,
    pub remote: AdapterConfig,
}

impl KernelConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| KernelError::Config(e.to_string()))?;
        if config.local.base_path == config.remote.base_path {
            return Err(KernelError::Config(format!(
                "local and remote share base_path {}",
                config.local.base_path.display()
            )));
        }
        Ok(config)
    }
}

/// Read and parse the configuration file at `path`.
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<KernelConfig> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    KernelConfig::from_toml_str(&contents)
        .with_context(|| format!("failed to parse {}", path.display()))
}
