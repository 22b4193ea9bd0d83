//! In-memory implementation of the adapter contract.
//!
//! Primarily for tests. Stores the same canonical bytes the durable
//! adapters would, so integrity checks behave identically. All data is
//! lost when the adapter is dropped.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use truth_kernel_core::RootHash;

use crate::config::AdapterConfig;
use crate::envelope::{
    now_millis, open, seal, validate_key, LoadOptions, PersistSource, Predecessor, SealParams,
    Sequencer,
};
use crate::error::{PersistError, Result};
use crate::traits::{
    DeleteResult, ListResult, LoadResult, PersistenceAdapter, SaveOptions, SaveResult, VerifyResult,
};

/// In-memory adapter. Thread-safe via RwLock.
#[derive(Debug)]
pub struct MemoryAdapter {
    config: AdapterConfig,
    sequence: Sequencer,
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryAdapter {
    pub fn new(config: AdapterConfig) -> Self {
        Self {
            config,
            sequence: Sequencer::new(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// An adapter with default settings and the given replica id.
    pub fn with_instance_id(instance_id: impl Into<String>) -> Self {
        Self::new(AdapterConfig {
            instance_id: instance_id.into(),
            ..AdapterConfig::default()
        })
    }

    /// Overwrite the raw stored bytes for `key`, bypassing the envelope.
    ///
    /// Lets tests model on-disk corruption.
    pub fn put_raw(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.write()?.insert(key.to_string(), bytes);
        Ok(())
    }

    /// The raw stored bytes for `key`.
    pub fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.entries
            .read()
            .map_err(|e| PersistError::Adapter(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.entries
            .write()
            .map_err(|e| PersistError::Adapter(format!("lock poisoned: {e}")))
    }

    fn location(&self, key: &str) -> String {
        format!("memory://{}/{key}", self.config.instance_id)
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new(AdapterConfig::default())
    }
}

#[async_trait]
impl PersistenceAdapter for MemoryAdapter {
    fn instance_id(&self) -> &str {
        &self.config.instance_id
    }

    async fn save(
        &self,
        key: &str,
        data: &Value,
        source: &PersistSource,
        options: &SaveOptions,
    ) -> Result<SaveResult> {
        validate_key(key)?;
        // The write guard is the per-key lock: held from read-previous to commit.
        let mut entries = self.write()?;

        let existing = entries.get(key);
        if existing.is_some() && !options.overwrite {
            return Err(PersistError::WriteFailed(format!(
                "{key} exists and overwrite is disabled"
            )));
        }
        let predecessor = existing.and_then(|bytes| Predecessor::from_bytes(key, bytes));
        let sequence = self
            .sequence
            .next(predecessor.as_ref().map_or(0, |p| p.sequence));
        let now = now_millis();
        let sealed = seal(
            data.clone(),
            SealParams {
                key,
                source,
                instance_id: &self.config.instance_id,
                schema_version: self.config.schema_version,
                sequence,
                tags: &options.tags,
                predecessor: predecessor.as_ref(),
                now,
            },
        )?;

        let size = sealed.bytes.len() as u64;
        if size > self.config.max_file_size {
            return Err(PersistError::StorageFull(format!(
                "{key}: {size} bytes exceeds limit of {}",
                self.config.max_file_size
            )));
        }
        if let Some(expected) = options.expected_hash {
            if expected != sealed.envelope_hash {
                return Err(PersistError::HashMismatch {
                    expected,
                    actual: sealed.envelope_hash,
                });
            }
        }

        entries.insert(key.to_string(), sealed.bytes);
        debug!(key, sequence, instance = %self.config.instance_id, "saved in memory");
        Ok(SaveResult {
            key: key.to_string(),
            location: self.location(key),
            bytes_written: size,
            envelope_hash: sealed.envelope_hash,
            timestamp: now,
            sequence,
        })
    }

    async fn load(&self, key: &str, options: &LoadOptions) -> Result<LoadResult> {
        validate_key(key)?;
        let bytes = self
            .get_raw(key)?
            .ok_or_else(|| PersistError::NotFound(key.to_string()))?;
        let opened = open(&bytes, options)?;
        if opened.envelope.key != key {
            return Err(PersistError::Corrupted(format!(
                "entry {key} holds envelope for {}",
                opened.envelope.key
            )));
        }
        Ok(LoadResult {
            key: key.to_string(),
            location: self.location(key),
            bytes_read: bytes.len() as u64,
            envelope_hash: opened.envelope_hash,
            envelope: opened.envelope,
            verified: opened.verified,
        })
    }

    async fn verify(&self, key: &str, expected_hash: Option<&RootHash>) -> Result<VerifyResult> {
        validate_key(key)?;
        Ok(match self.get_raw(key)? {
            Some(bytes) => VerifyResult::from_bytes(key, &bytes, expected_hash),
            None => VerifyResult::missing(key, expected_hash),
        })
    }

    async fn list(&self, prefix: Option<&str>) -> Result<ListResult> {
        let keys = self.read()?.keys().cloned().collect();
        Ok(ListResult::new(keys, prefix))
    }

    async fn delete(&self, key: &str) -> Result<DeleteResult> {
        validate_key(key)?;
        let deleted = self.write()?.remove(key).is_some();
        Ok(DeleteResult { deleted })
    }

    async fn exists(&self, key: &str) -> bool {
        validate_key(key).is_ok() && matches!(self.get_raw(key), Ok(Some(_)))
    }
}
