//! SQLite implementation of the adapter contract.
//!
//! A second durable backend for the same envelope format. Each save runs
//! in one SQLite transaction: the commit plays the role the rename plays
//! for the file adapter, so a crash leaves either the old row or the new
//! one. rusqlite calls run on `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde_json::Value;
use tracing::debug;
use truth_kernel_core::RootHash;

use crate::config::AdapterConfig;
use crate::envelope::{
    now_millis, open, seal, validate_key, LoadOptions, PersistSource, Predecessor, SealParams,
    Sequencer,
};
use crate::error::{PersistError, Result};
use crate::migration;
use crate::traits::{
    DeleteResult, ListResult, LoadResult, PersistenceAdapter, SaveOptions, SaveResult, VerifyResult,
};

/// Database file created under `base_path` by [`SqliteAdapter::open`].
pub const DATABASE_FILE: &str = "truth-kernel.db";

/// SQLite-backed adapter.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteAdapter {
    conn: Arc<Mutex<Connection>>,
    config: Arc<AdapterConfig>,
    sequence: Arc<Sequencer>,
    location: String,
}

impl SqliteAdapter {
    /// Open (or create) `base_path/truth-kernel.db` and run migrations.
    pub fn open(config: AdapterConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.base_path).map_err(|e| {
            PersistError::io(
                format!("create {}", config.base_path.display()),
                &e,
                PersistError::WriteFailed,
            )
        })?;
        let path = config.base_path.join(DATABASE_FILE);
        let conn = Connection::open(&path)?;
        Self::with_connection(conn, config, &path)
    }

    /// Open an in-memory database. Useful for testing.
    pub fn open_memory(config: AdapterConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, config, Path::new(":memory:"))
    }

    fn with_connection(mut conn: Connection, config: AdapterConfig, path: &Path) -> Result<Self> {
        conn.busy_timeout(config.lock_timeout)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
            sequence: Arc::new(Sequencer::new()),
            location: format!("sqlite:{}", path.display()),
        })
    }

    fn location(&self, key: &str) -> String {
        format!("{}#{key}", self.location)
    }

    /// Run `f` on the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| PersistError::Adapter(format!("spawn_blocking failed: {e}")))?
    }

    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = key.to_string();
        self.blocking(move |conn| {
            conn.query_row(
                "SELECT bytes FROM envelopes WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| PersistError::ReadFailed(e.to_string()))
        })
        .await
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| PersistError::LockFailed(format!("connection mutex poisoned: {e}")))
}

/// Busy/locked database past the busy timeout is a lock timeout.
fn classify(err: rusqlite::Error, key: &str, config: &AdapterConfig) -> PersistError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => PersistError::LockTimeout {
            key: key.to_string(),
            waited_ms: config.lock_timeout.as_millis() as u64,
        },
        Some(ErrorCode::DiskFull) => PersistError::StorageFull(err.to_string()),
        Some(ErrorCode::PermissionDenied) | Some(ErrorCode::ReadOnly) => {
            PersistError::PermissionDenied(err.to_string())
        }
        _ => PersistError::WriteFailed(err.to_string()),
    }
}

#[async_trait]
impl PersistenceAdapter for SqliteAdapter {
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

        let config = Arc::clone(&self.config);
        let sequencer = Arc::clone(&self.sequence);
        let key_owned = key.to_string();
        let data = data.clone();
        let source = source.clone();
        let options = options.clone();

        let (sealed, sequence, now) = self
            .blocking(move |conn| {
                let key = key_owned.as_str();
                let fail = |e: rusqlite::Error| classify(e, key, &config);
                let tx = conn.transaction().map_err(fail)?;

                let existing: Option<Vec<u8>> = tx
                    .query_row(
                        "SELECT bytes FROM envelopes WHERE key = ?1",
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(|e| PersistError::ReadFailed(e.to_string()))?;
                if existing.is_some() && !options.overwrite {
                    return Err(PersistError::WriteFailed(format!(
                        "{key} exists and overwrite is disabled"
                    )));
                }
                let predecessor = existing
                    .as_deref()
                    .and_then(|bytes| Predecessor::from_bytes(key, bytes));

                let sequence = sequencer.next(predecessor.as_ref().map_or(0, |p| p.sequence));
                let now = now_millis();
                let sealed = seal(
                    data,
                    SealParams {
                        key,
                        source: &source,
                        instance_id: &config.instance_id,
                        schema_version: config.schema_version,
                        sequence,
                        tags: &options.tags,
                        predecessor: predecessor.as_ref(),
                        now,
                    },
                )?;

                let size = sealed.bytes.len() as u64;
                if size > config.max_file_size {
                    return Err(PersistError::StorageFull(format!(
                        "{key}: {size} bytes exceeds limit of {}",
                        config.max_file_size
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

                tx.execute(
                    "INSERT INTO envelopes (key, bytes, envelope_hash, sequence, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(key) DO UPDATE SET
                        bytes = excluded.bytes,
                        envelope_hash = excluded.envelope_hash,
                        sequence = excluded.sequence,
                        updated_at = excluded.updated_at",
                    params![
                        key,
                        sealed.bytes,
                        sealed.envelope_hash.to_hex(),
                        sequence as i64,
                        now.timestamp_millis(),
                    ],
                )
                .map_err(fail)?;
                tx.commit().map_err(fail)?;
                Ok((sealed, sequence, now))
            })
            .await?;

        debug!(key, sequence, hash = %sealed.envelope_hash, "saved to sqlite");
        Ok(SaveResult {
            key: key.to_string(),
            location: self.location(key),
            bytes_written: sealed.bytes.len() as u64,
            envelope_hash: sealed.envelope_hash,
            timestamp: now,
            sequence,
        })
    }

    async fn load(&self, key: &str, options: &LoadOptions) -> Result<LoadResult> {
        validate_key(key)?;
        let bytes = self
            .read_bytes(key)
            .await?
            .ok_or_else(|| PersistError::NotFound(key.to_string()))?;
        let opened = open(&bytes, options)?;
        if opened.envelope.key != key {
            return Err(PersistError::Corrupted(format!(
                "row for {key} holds envelope for {}",
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
        Ok(match self.read_bytes(key).await? {
            Some(bytes) => VerifyResult::from_bytes(key, &bytes, expected_hash),
            None => VerifyResult::missing(key, expected_hash),
        })
    }

    async fn list(&self, prefix: Option<&str>) -> Result<ListResult> {
        let keys = self
            .blocking(|conn| {
                let mut stmt = conn.prepare("SELECT key FROM envelopes ORDER BY key")?;
                let keys = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(keys)
            })
            .await
            .map_err(|e| match e {
                PersistError::Database(db) => PersistError::ReadFailed(db.to_string()),
                other => other,
            })?;
        Ok(ListResult::new(keys, prefix))
    }

    async fn delete(&self, key: &str) -> Result<DeleteResult> {
        validate_key(key)?;
        let config = Arc::clone(&self.config);
        let key_owned = key.to_string();
        let deleted = self
            .blocking(move |conn| {
                let key = key_owned.as_str();
                let fail = |e: rusqlite::Error| classify(e, key, &config);
                let tx = conn.transaction().map_err(fail)?;
                let moved = tx
                    .execute(
                        "INSERT OR REPLACE INTO deleted_envelopes (key, bytes, deleted_at)
                         SELECT key, bytes, ?2 FROM envelopes WHERE key = ?1",
                        params![key, chrono::Utc::now().timestamp_millis()],
                    )
                    .map_err(fail)?;
                tx.execute("DELETE FROM envelopes WHERE key = ?1", params![key])
                    .map_err(fail)?;
                tx.commit().map_err(fail)?;
                Ok(moved > 0)
            })
            .await?;
        Ok(DeleteResult { deleted })
    }

    async fn exists(&self, key: &str) -> bool {
        validate_key(key).is_ok() && matches!(self.read_bytes(key).await, Ok(Some(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PersistErrorCode;
    use serde_json::json;
    use tempfile::TempDir;
    use truth_kernel_core::encode_with_hash;

    fn memory() -> SqliteAdapter {
        SqliteAdapter::open_memory(AdapterConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_round_trip() {
        let a = memory();
        let data = json!({"list": [3, 1, 2], "flag": false});
        let saved = a
            .save("k", &data, &PersistSource::CANON_CORE, &SaveOptions::default())
            .await
            .unwrap();
        assert_eq!(saved.location, "sqlite::memory:#k");

        let loaded = a.load("k", &LoadOptions::strict()).await.unwrap();
        assert!(loaded.verified);
        assert_eq!(loaded.data(), &data);
        assert_eq!(*loaded.data_hash(), encode_with_hash(&data).unwrap().hash);
        assert_eq!(loaded.envelope_hash, saved.envelope_hash);
    }

    #[tokio::test]
    async fn test_lineage_across_versions() {
        let a = memory();
        let first = a
            .save("k", &json!(1), &PersistSource::USER, &SaveOptions::default())
            .await
            .unwrap();
        let second = a
            .save("k", &json!(2), &PersistSource::USER, &SaveOptions::default())
            .await
            .unwrap();
        assert!(second.sequence > first.sequence);

        let loaded = a.load("k", &LoadOptions::default()).await.unwrap();
        assert_eq!(loaded.envelope.metadata.previous_hash, Some(first.envelope_hash));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let config = AdapterConfig::builder().base_path(dir.path()).build().unwrap();
        {
            let a = SqliteAdapter::open(config.clone()).unwrap();
            a.save("k", &json!({"durable": true}), &PersistSource::USER, &SaveOptions::default())
                .await
                .unwrap();
        }
        let reopened = SqliteAdapter::open(config).unwrap();
        let loaded = reopened.load("k", &LoadOptions::default()).await.unwrap();
        assert_eq!(loaded.data(), &json!({"durable": true}));
        assert!(dir.path().join(DATABASE_FILE).exists());
    }

    #[tokio::test]
    async fn test_guards() {
        let a = memory();
        assert_eq!(
            a.save("a/b", &json!(1), &PersistSource::USER, &SaveOptions::default())
                .await
                .unwrap_err()
                .code(),
            PersistErrorCode::InvalidKey
        );

        a.save("k", &json!(1), &PersistSource::USER, &SaveOptions::create_only())
            .await
            .unwrap();
        let err = a
            .save("k", &json!(2), &PersistSource::USER, &SaveOptions::create_only())
            .await
            .unwrap_err();
        assert_eq!(err.code(), PersistErrorCode::WriteFailed);

        assert_eq!(
            a.load("missing", &LoadOptions::default()).await.unwrap_err().code(),
            PersistErrorCode::NotFound
        );
    }

    #[tokio::test]
    async fn test_list_delete_exists() {
        let a = memory();
        for key in ["x.2", "x.1", "y"] {
            a.save(key, &json!(key), &PersistSource::USER, &SaveOptions::default())
                .await
                .unwrap();
        }
        assert_eq!(a.list(Some("x.")).await.unwrap().keys, vec!["x.1", "x.2"]);

        assert!(a.delete("x.1").await.unwrap().deleted);
        assert!(!a.delete("x.1").await.unwrap().deleted);
        assert!(!a.exists("x.1").await);
        assert_eq!(a.list(None).await.unwrap().keys, vec!["x.2", "y"]);

        let report = a.verify("x.1", None).await.unwrap();
        assert!(!report.valid);
    }
}
