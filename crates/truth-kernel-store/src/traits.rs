//! The persistence adapter contract.
//!
//! Every backend (file, SQLite, memory) implements [`PersistenceAdapter`].
//! Callers store their own state through it and never canonicalize or hash
//! anything themselves.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use truth_kernel_core::{RootHash, to_canon_value};

use crate::envelope::{LoadOptions, PersistEnvelope, PersistSource};
use crate::error::{PersistError, Result};

/// Options for `save`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOptions {
    /// Replace an existing value. When false, an existing key is `WRITE_FAILED`.
    pub overwrite: bool,
    /// Free-form tags stored in envelope metadata.
    pub tags: Vec<String>,
    /// Refuse the write with `HASH_MISMATCH` unless the new envelope hashes to this.
    pub expected_hash: Option<RootHash>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            overwrite: true,
            tags: Vec::new(),
            expected_hash: None,
        }
    }
}

impl SaveOptions {
    /// Options that refuse to replace an existing value.
    pub fn create_only() -> Self {
        Self {
            overwrite: false,
            ..Self::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_expected_hash(mut self, hash: RootHash) -> Self {
        self.expected_hash = Some(hash);
        self
    }
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveResult {
    pub key: String,
    /// Backend-specific location of the committed bytes.
    pub location: String,
    pub bytes_written: u64,
    /// Hash of the whole encoded envelope.
    pub envelope_hash: RootHash,
    pub timestamp: DateTime<Utc>,
    pub sequence: u64,
}

/// Result of a successful load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    pub key: String,
    pub location: String,
    pub bytes_read: u64,
    pub envelope_hash: RootHash,
    pub envelope: PersistEnvelope,
    /// Whether the stored data hash was recomputed and matched.
    pub verified: bool,
}

impl LoadResult {
    pub fn data(&self) -> &Value {
        &self.envelope.data
    }

    pub fn data_hash(&self) -> &RootHash {
        &self.envelope.data_hash
    }

    pub fn sequence(&self) -> u64 {
        self.envelope.metadata.sequence
    }
}

/// Integrity report for one key. Never an error for missing or damaged data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyResult {
    pub key: String,
    pub valid: bool,
    /// The hash the caller asked for, if any.
    pub expected_hash: Option<RootHash>,
    /// Hash of the stored bytes; `None` when nothing is stored.
    pub actual_hash: Option<RootHash>,
    pub errors: Vec<String>,
}

impl VerifyResult {
    pub(crate) fn missing(key: &str, expected: Option<&RootHash>) -> Self {
        Self {
            key: key.to_string(),
            valid: false,
            expected_hash: expected.copied(),
            actual_hash: None,
            errors: vec!["key not found".to_string()],
        }
    }

    pub(crate) fn from_bytes(key: &str, bytes: &[u8], expected: Option<&RootHash>) -> Self {
        let (actual, _data_hash, errors) = crate::envelope::inspect(bytes, expected);
        Self {
            key: key.to_string(),
            valid: errors.is_empty(),
            expected_hash: expected.copied(),
            actual_hash: Some(actual),
            errors,
        }
    }
}

/// Result of listing keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResult {
    /// Sorted.
    pub keys: Vec<String>,
    pub count: usize,
    pub prefix: Option<String>,
}

impl ListResult {
    pub(crate) fn new(mut keys: Vec<String>, prefix: Option<&str>) -> Self {
        if let Some(p) = prefix {
            keys.retain(|k| k.starts_with(p));
        }
        keys.sort();
        keys.dedup();
        Self {
            count: keys.len(),
            keys,
            prefix: prefix.map(str::to_string),
        }
    }
}

/// Result of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteResult {
    /// False when the key did not exist.
    pub deleted: bool,
}

/// The async adapter contract.
///
/// Per key, `save` is serialized by the adapter's own lock; calls on
/// different keys proceed independently.
///
/// # Invariants
///
/// - A failed or interrupted `save` leaves the previously committed value
///   intact. A later `load` sees the old envelope or the new one, never a mix.
/// - Invalid keys fail with `INVALID_KEY` before any I/O.
/// - A missing key is `NOT_FOUND` from `load`, and `valid: false` from `verify`.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// The replica identity written into envelope metadata.
    fn instance_id(&self) -> &str;

    /// Wrap `data` in a new envelope and commit it.
    async fn save(
        &self,
        key: &str,
        data: &Value,
        source: &PersistSource,
        options: &SaveOptions,
    ) -> Result<SaveResult>;

    /// Read and check the current envelope for `key`.
    async fn load(&self, key: &str, options: &LoadOptions) -> Result<LoadResult>;

    /// Report on the stored envelope without failing for missing or damaged data.
    async fn verify(&self, key: &str, expected_hash: Option<&RootHash>) -> Result<VerifyResult>;

    /// List live keys, optionally filtered by prefix.
    async fn list(&self, prefix: Option<&str>) -> Result<ListResult>;

    /// Remove `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<DeleteResult>;

    /// Whether `key` currently holds a value. Invalid keys never exist.
    async fn exists(&self, key: &str) -> bool;
}

/// Typed convenience over any adapter.
pub trait AdapterExt: PersistenceAdapter {
    /// Serialize `value` and save it with default options.
    fn save_typed<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        source: &PersistSource,
    ) -> impl std::future::Future<Output = Result<SaveResult>> + Send;

    /// Load `key` strictly and deserialize its data.
    fn load_typed<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<T>> + Send;
}

impl<A: PersistenceAdapter + ?Sized> AdapterExt for A {
    async fn save_typed<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        source: &PersistSource,
    ) -> Result<SaveResult> {
        // Going through the canonical value rejects NaN instead of storing null.
        to_canon_value(value)?;
        let data = serde_json::to_value(value).map_err(|e| PersistError::InvalidData(e.to_string()))?;
        self.save(key, &data, source, &SaveOptions::default()).await
    }

    async fn load_typed<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let loaded = self.load(key, &LoadOptions::strict()).await?;
        serde_json::from_value(loaded.envelope.data).map_err(|e| PersistError::InvalidData(e.to_string()))
    }
}
