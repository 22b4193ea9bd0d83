//! Per-key advisory lock files.
//!
//! A lock is a sibling file created with `create_new`; whoever creates it
//! holds the key. Contenders poll until the configured timeout. The file is
//! removed when the guard drops.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{PersistError, Result};

/// Interval between acquisition attempts.
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Guard for an exclusively held key.
#[derive(Debug)]
pub struct KeyLock {
    path: PathBuf,
    released: bool,
}

impl KeyLock {
    /// Acquire the lock file at `path`, waiting up to `timeout`.
    ///
    /// Contention past the timeout is `LOCK_TIMEOUT`; any other failure to
    /// create the file is `LOCK_FAILED`.
    pub async fn acquire(path: impl Into<PathBuf>, key: &str, timeout: Duration) -> Result<Self> {
        let path = path.into();
        let deadline = Instant::now() + timeout;

        loop {
            match try_create(&path).await {
                Ok(()) => {
                    debug!(key, path = ?path, "lock acquired");
                    return Ok(Self {
                        path,
                        released: false,
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        warn!(key, path = ?path, timeout_ms = timeout.as_millis() as u64, "lock timeout");
                        return Err(PersistError::LockTimeout {
                            key: key.to_string(),
                            waited_ms: timeout.as_millis() as u64,
                        });
                    }
                    tokio::time::sleep(LOCK_POLL_INTERVAL).await;
                }
                Err(err) => {
                    return Err(PersistError::io(
                        format!("create lock {}", path.display()),
                        &err,
                        PersistError::LockFailed,
                    ));
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the lock file now, reporting failure.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        std::fs::remove_file(&self.path).map_err(|e| {
            PersistError::io(
                format!("remove lock {}", self.path.display()),
                &e,
                PersistError::LockFailed,
            )
        })
    }
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

async fn try_create(path: &Path) -> io::Result<()> {
    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    stamp(path, file).await
}

/// Write the holder identity into a freshly created lock file.
///
/// On failure the file is removed, otherwise the key would stay locked.
async fn stamp<W: AsyncWrite + Unpin>(path: &Path, mut out: W) -> io::Result<()> {
    let line = format!("{} {}\n", std::process::id(), chrono::Utc::now().to_rfc3339());
    let written = match out.write_all(line.as_bytes()).await {
        Ok(()) => out.flush().await,
        Err(err) => Err(err),
    };
    if let Err(err) = written {
        if let Err(rm) = std::fs::remove_file(path) {
            warn!(path = ?path, error = %rm, "failed to remove unstamped lock");
        }
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_acquire_and_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("k.omega.lock");
        {
            let lock = KeyLock::acquire(&path, "k", Duration::from_millis(200)).await.unwrap();
            assert!(lock.path().exists());
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_contention_times_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("k.omega.lock");
        let _held = KeyLock::acquire(&path, "k", Duration::from_millis(200)).await.unwrap();

        let err = KeyLock::acquire(&path, "k", Duration::from_millis(120)).await.unwrap_err();
        assert_eq!(err.code(), crate::PersistErrorCode::LockTimeout);
        // the holder's lock is untouched
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_waiter_gets_lock_after_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("k.omega.lock");
        let held = KeyLock::acquire(&path, "k", Duration::from_millis(200)).await.unwrap();

        let waiter = {
            let path = path.clone();
            tokio::spawn(async move { KeyLock::acquire(path, "k", Duration::from_secs(2)).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        held.release().unwrap();

        let lock = waiter.await.unwrap().unwrap();
        assert!(lock.path().exists());
    }

    #[tokio::test]
    async fn test_failed_stamp_removes_lock_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("k.omega.lock");
        std::fs::write(&path, b"").unwrap();
        // read-only handle, so the write fails
        let read_only = tokio::fs::File::open(&path).await.unwrap();

        assert!(stamp(&path, read_only).await.is_err());
        assert!(!path.exists());
        let lock = KeyLock::acquire(&path, "k", Duration::from_millis(100)).await.unwrap();
        assert!(lock.path().exists());
    }

    #[tokio::test]
    async fn test_missing_directory_is_lock_failed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope").join("k.omega.lock");
        let err = KeyLock::acquire(&path, "k", Duration::from_millis(100)).await.unwrap_err();
        assert_eq!(err.code(), crate::PersistErrorCode::LockFailed);
    }
}
