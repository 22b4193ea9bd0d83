//! Single-writer local file adapter.
//!
//! One file per key under `base_path`:
//!
//! ```text
//! <key>.omega.json             committed envelope
//! <key>_<rand>.omega.tmp       in-flight write, never read
//! <key>.omega.lock             per-key lock
//! .deleted_<millis>_<key>.omega.json   soft-deleted envelope
//! ```
//!
//! A save writes the temp file, fsyncs it, renames it over the committed
//! file, then fsyncs the directory on a best-effort basis. The rename is the
//! only step that makes the new version visible.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use truth_kernel_core::RootHash;

use crate::config::AdapterConfig;
use crate::envelope::{
    now_millis, open, seal, validate_key, LoadOptions, PersistSource, Predecessor, SealParams,
    Sequencer,
};
use crate::error::{PersistError, Result};
use crate::lock::KeyLock;
use crate::traits::{
    DeleteResult, ListResult, LoadResult, PersistenceAdapter, SaveOptions, SaveResult, VerifyResult,
};

pub const FILE_EXTENSION: &str = ".omega.json";
pub const TEMP_EXTENSION: &str = ".omega.tmp";
pub const LOCK_EXTENSION: &str = ".omega.lock";
pub const DELETED_PREFIX: &str = ".deleted_";

/// File-backed persistence adapter.
#[derive(Debug)]
pub struct FileAdapter {
    config: AdapterConfig,
    sequence: Sequencer,
}

impl FileAdapter {
    /// Create the adapter, creating `base_path` if needed.
    pub fn new(config: AdapterConfig) -> Result<Self> {
        fs::create_dir_all(&config.base_path).map_err(|e| {
            PersistError::io(
                format!("create {}", config.base_path.display()),
                &e,
                PersistError::WriteFailed,
            )
        })?;
        Ok(Self {
            config,
            sequence: Sequencer::new(),
        })
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    /// Path of the committed file for `key`.
    pub fn data_path(&self, key: &str) -> PathBuf {
        self.config.base_path.join(format!("{key}{FILE_EXTENSION}"))
    }

    /// A fresh temp path for `key`. Random so concurrent writers never share one.
    pub fn temp_path(&self, key: &str) -> PathBuf {
        let suffix: [u8; 4] = rand::random();
        self.config
            .base_path
            .join(format!("{key}_{}{TEMP_EXTENSION}", hex::encode(suffix)))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.config.base_path.join(format!("{key}{LOCK_EXTENSION}"))
    }

    async fn read_existing(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.data_path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistError::io(
                format!("read {}", path.display()),
                &e,
                PersistError::ReadFailed,
            )),
        }
    }
}

/// Write `bytes` to `tmp` and flush them to stable storage.
pub fn write_temp(tmp: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(tmp)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn sync_dir(dir: &Path) -> io::Result<()> {
    #[cfg(unix)]
    File::open(dir)?.sync_all()?;
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}

/// Temp file, fsync, rename, best-effort directory fsync.
///
/// On any failure before the rename the temp file is removed and the
/// committed file is untouched.
fn atomic_write(dir: &Path, tmp: &Path, dest: &Path, bytes: &[u8]) -> Result<()> {
    if let Err(e) = write_temp(tmp, bytes) {
        let _ = fs::remove_file(tmp);
        return Err(PersistError::io(
            format!("write {}", tmp.display()),
            &e,
            PersistError::WriteFailed,
        ));
    }
    if let Err(e) = fs::rename(tmp, dest) {
        let _ = fs::remove_file(tmp);
        return Err(PersistError::io(
            format!("rename {} -> {}", tmp.display(), dest.display()),
            &e,
            PersistError::AtomicRenameFailed,
        ));
    }
    if let Err(e) = sync_dir(dir) {
        warn!(dir = %dir.display(), error = %e, "directory fsync failed");
    }
    Ok(())
}

fn join_error(e: tokio::task::JoinError) -> PersistError {
    PersistError::Adapter(format!("spawn_blocking failed: {e}"))
}

#[async_trait]
impl PersistenceAdapter for FileAdapter {
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
        let _lock = KeyLock::acquire(self.lock_path(key), key, self.config.lock_timeout).await?;

        let existing = self.read_existing(key).await?;
        if existing.is_some() && !options.overwrite {
            return Err(PersistError::WriteFailed(format!(
                "{key} exists and overwrite is disabled"
            )));
        }
        let predecessor = existing
            .as_deref()
            .and_then(|bytes| Predecessor::from_bytes(key, bytes));

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

        let dir = self.config.base_path.clone();
        let tmp = self.temp_path(key);
        let dest = self.data_path(key);
        let location = dest.display().to_string();
        let bytes = sealed.bytes;
        tokio::task::spawn_blocking(move || atomic_write(&dir, &tmp, &dest, &bytes))
            .await
            .map_err(join_error)??;

        debug!(key, sequence, hash = %sealed.envelope_hash, bytes = size, "saved");
        Ok(SaveResult {
            key: key.to_string(),
            location,
            bytes_written: size,
            envelope_hash: sealed.envelope_hash,
            timestamp: now,
            sequence,
        })
    }

    async fn load(&self, key: &str, options: &LoadOptions) -> Result<LoadResult> {
        validate_key(key)?;
        let bytes = self
            .read_existing(key)
            .await?
            .ok_or_else(|| PersistError::NotFound(key.to_string()))?;

        let opened = open(&bytes, options)?;
        if opened.envelope.key != key {
            return Err(PersistError::Corrupted(format!(
                "file for {key} holds envelope for {}",
                opened.envelope.key
            )));
        }

        debug!(key, verified = opened.verified, "loaded");
        Ok(LoadResult {
            key: key.to_string(),
            location: self.data_path(key).display().to_string(),
            bytes_read: bytes.len() as u64,
            envelope_hash: opened.envelope_hash,
            envelope: opened.envelope,
            verified: opened.verified,
        })
    }

    async fn verify(&self, key: &str, expected_hash: Option<&RootHash>) -> Result<VerifyResult> {
        validate_key(key)?;
        Ok(match self.read_existing(key).await? {
            Some(bytes) => VerifyResult::from_bytes(key, &bytes, expected_hash),
            None => VerifyResult::missing(key, expected_hash),
        })
    }

    async fn list(&self, prefix: Option<&str>) -> Result<ListResult> {
        let base = &self.config.base_path;
        let mut entries = match tokio::fs::read_dir(base).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ListResult::new(Vec::new(), prefix)),
            Err(e) => {
                return Err(PersistError::io(
                    format!("list {}", base.display()),
                    &e,
                    PersistError::ReadFailed,
                ))
            }
        };

        let mut keys = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|e| {
                PersistError::io(format!("list {}", base.display()), &e, PersistError::ReadFailed)
            })?;
            let Some(entry) = entry else { break };
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(DELETED_PREFIX) {
                continue;
            }
            if let Some(key) = name.strip_suffix(FILE_EXTENSION) {
                keys.push(key.to_string());
            }
        }
        Ok(ListResult::new(keys, prefix))
    }

    async fn delete(&self, key: &str) -> Result<DeleteResult> {
        validate_key(key)?;
        let _lock = KeyLock::acquire(self.lock_path(key), key, self.config.lock_timeout).await?;

        let path = self.data_path(key);
        let tombstone = self.config.base_path.join(format!(
            "{DELETED_PREFIX}{}_{key}{FILE_EXTENSION}",
            chrono::Utc::now().timestamp_millis()
        ));
        match tokio::fs::rename(&path, &tombstone).await {
            Ok(()) => {
                debug!(key, to = %tombstone.display(), "soft-deleted");
                Ok(DeleteResult { deleted: true })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(DeleteResult { deleted: false }),
            Err(e) => Err(PersistError::io(
                format!("delete {}", path.display()),
                &e,
                PersistError::WriteFailed,
            )),
        }
    }

    async fn exists(&self, key: &str) -> bool {
        if validate_key(key).is_err() {
            return false;
        }
        tokio::fs::try_exists(self.data_path(key)).await.unwrap_or(false)
    }
}
