//! Error types for the persistence layer.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use truth_kernel_core::{CanonError, RootHash};

/// Stable, wire-level error codes.
///
/// The sync codes are raised by the sync engine, never by an adapter, but
/// share this namespace so callers can match on a single enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersistErrorCode {
    // Write path
    WriteFailed,
    AtomicRenameFailed,
    LockFailed,
    LockTimeout,
    // Read path
    NotFound,
    ReadFailed,
    ParseFailed,
    // Integrity
    HashMismatch,
    MagicMismatch,
    VersionMismatch,
    Corrupted,
    // Sync
    ConflictDetected,
    MergeFailed,
    Divergence,
    // General
    InvalidKey,
    InvalidData,
    StorageFull,
    PermissionDenied,
    AdapterError,
}

impl PersistErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WriteFailed => "WRITE_FAILED",
            Self::AtomicRenameFailed => "ATOMIC_RENAME_FAILED",
            Self::LockFailed => "LOCK_FAILED",
            Self::LockTimeout => "LOCK_TIMEOUT",
            Self::NotFound => "NOT_FOUND",
            Self::ReadFailed => "READ_FAILED",
            Self::ParseFailed => "PARSE_FAILED",
            Self::HashMismatch => "HASH_MISMATCH",
            Self::MagicMismatch => "MAGIC_MISMATCH",
            Self::VersionMismatch => "VERSION_MISMATCH",
            Self::Corrupted => "CORRUPTED",
            Self::ConflictDetected => "CONFLICT_DETECTED",
            Self::MergeFailed => "MERGE_FAILED",
            Self::Divergence => "DIVERGENCE",
            Self::InvalidKey => "INVALID_KEY",
            Self::InvalidData => "INVALID_DATA",
            Self::StorageFull => "STORAGE_FULL",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::AdapterError => "ADAPTER_ERROR",
        }
    }

    /// Lock failures never touch stored state, so the caller may retry.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::LockTimeout | Self::LockFailed)
    }
}

impl fmt::Display for PersistErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("atomic rename failed: {0}")]
    AtomicRenameFailed(String),

    #[error("lock failed: {0}")]
    LockFailed(String),

    #[error("lock on {key:?} not acquired within {waited_ms} ms")]
    LockTimeout { key: String, waited_ms: u64 },

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("parse failed: {0}")]
    ParseFailed(String),

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: RootHash, actual: RootHash },

    #[error("magic mismatch: expected {expected:?}, got {actual:?}")]
    MagicMismatch { expected: String, actual: String },

    #[error("version mismatch: expected {expected:?}, got {actual:?}")]
    VersionMismatch { expected: String, actual: String },

    #[error("corrupted envelope: {0}")]
    Corrupted(String),

    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("storage full: {0}")]
    StorageFull(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("adapter error: {0}")]
    Adapter(String),
}

impl PersistError {
    /// The wire code of this error.
    pub fn code(&self) -> PersistErrorCode {
        match self {
            Self::WriteFailed(_) => PersistErrorCode::WriteFailed,
            Self::AtomicRenameFailed(_) => PersistErrorCode::AtomicRenameFailed,
            Self::LockFailed(_) => PersistErrorCode::LockFailed,
            Self::LockTimeout { .. } => PersistErrorCode::LockTimeout,
            Self::NotFound(_) => PersistErrorCode::NotFound,
            Self::ReadFailed(_) => PersistErrorCode::ReadFailed,
            Self::ParseFailed(_) => PersistErrorCode::ParseFailed,
            Self::HashMismatch { .. } => PersistErrorCode::HashMismatch,
            Self::MagicMismatch { .. } => PersistErrorCode::MagicMismatch,
            Self::VersionMismatch { .. } => PersistErrorCode::VersionMismatch,
            Self::Corrupted(_) => PersistErrorCode::Corrupted,
            Self::InvalidKey { .. } => PersistErrorCode::InvalidKey,
            Self::InvalidData(_) => PersistErrorCode::InvalidData,
            Self::StorageFull(_) => PersistErrorCode::StorageFull,
            Self::PermissionDenied(_) => PersistErrorCode::PermissionDenied,
            Self::Database(_) | Self::Adapter(_) => PersistErrorCode::AdapterError,
        }
    }

    /// Classify an I/O error, falling back to the operation's own code.
    pub(crate) fn io(context: impl fmt::Display, err: &io::Error, fallback: fn(String) -> Self) -> Self {
        let msg = format!("{context}: {err}");
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(msg),
            io::ErrorKind::StorageFull => Self::StorageFull(msg),
            _ => fallback(msg),
        }
    }
}

impl From<CanonError> for PersistError {
    fn from(err: CanonError) -> Self {
        Self::InvalidData(err.to_string())
    }
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistError>;
