//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use truth_kernel_store::{AdapterConfig, FileAdapter, MemoryAdapter, Result};
use truth_kernel_sync::SyncEngine;

/// Lock timeout used by fixtures, short so contention tests finish fast.
pub const FIXTURE_LOCK_TIMEOUT: Duration = Duration::from_millis(500);

/// Adapter config rooted at `dir` with the given replica id.
pub fn adapter_config(dir: &Path, instance_id: &str) -> Result<AdapterConfig> {
    AdapterConfig::builder()
        .base_path(dir)
        .instance_id(instance_id)
        .lock_timeout(FIXTURE_LOCK_TIMEOUT)
        .build()
}

/// Two file-backed replicas under one temporary directory.
///
/// The directory is removed when the fixture drops.
pub struct ReplicaPair {
    pub dir: TempDir,
    pub local: FileAdapter,
    pub remote: FileAdapter,
}

impl ReplicaPair {
    /// Replicas `local` and `remote` in `<tmp>/local` and `<tmp>/remote`.
    pub fn new() -> Result<Self> {
        let dir = TempDir::new().map_err(|e| {
            truth_kernel_store::PersistError::WriteFailed(format!("create temp dir: {e}"))
        })?;
        let local = FileAdapter::new(adapter_config(&dir.path().join("local"), "local")?)?;
        let remote = FileAdapter::new(adapter_config(&dir.path().join("remote"), "remote")?)?;
        Ok(Self { dir, local, remote })
    }

    /// Reopen the local replica from disk, as after a process restart.
    pub fn reopen_local(&self) -> Result<FileAdapter> {
        FileAdapter::new(self.local.config().clone())
    }

    /// Hand both replicas to a sync engine. Keep the `TempDir` alive as
    /// long as the engine.
    pub fn into_engine(self) -> (TempDir, SyncEngine<FileAdapter, FileAdapter>) {
        (self.dir, SyncEngine::new(self.local, self.remote))
    }
}

/// A sync engine over two fresh in-memory replicas.
pub fn memory_engine() -> SyncEngine<MemoryAdapter, MemoryAdapter> {
    SyncEngine::new(
        MemoryAdapter::with_instance_id("local"),
        MemoryAdapter::with_instance_id("remote"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_layout() {
        let pair = ReplicaPair::new().unwrap();
        assert!(pair.dir.path().join("local").is_dir());
        assert!(pair.dir.path().join("remote").is_dir());
        assert_eq!(pair.local.config().instance_id, "local");
        assert_eq!(pair.remote.config().lock_timeout, FIXTURE_LOCK_TIMEOUT);
    }
}
