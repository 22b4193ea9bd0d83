//! Error types for the sync module.

use thiserror::Error;
use truth_kernel_store::{PersistError, PersistErrorCode};

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Adapter operation failed.
    #[error("adapter error: {0}")]
    Persist(#[from] PersistError),

    /// Both replicas changed independently; the conflict must be resolved first.
    #[error("cannot push {key}: divergence detected, resolve the conflict first")]
    ConflictDetected { key: String },

    /// Remote holds newer data; pull before pushing.
    #[error("cannot push {key}: remote is ahead, pull first")]
    RemoteAhead { key: String },

    /// No conflict is recorded for the key.
    #[error("no conflict recorded for {key}")]
    NoConflict { key: String },

    /// `Winner::Merge` without merged data.
    #[error("merged data is required to resolve {key} with a merge")]
    MergeDataRequired { key: String },

    /// The merged value could not be accepted.
    #[error("merge failed for {key}: {reason}")]
    MergeFailed { key: String, reason: String },
}

impl SyncError {
    /// The wire-level code for this error.
    pub fn code(&self) -> PersistErrorCode {
        match self {
            Self::Persist(e) => e.code(),
            Self::ConflictDetected { .. } => PersistErrorCode::ConflictDetected,
            Self::RemoteAhead { .. } => PersistErrorCode::Divergence,
            Self::NoConflict { .. } => PersistErrorCode::NotFound,
            Self::MergeDataRequired { .. } => PersistErrorCode::InvalidData,
            Self::MergeFailed { .. } => PersistErrorCode::MergeFailed,
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let key = || "k".to_string();
        assert_eq!(
            SyncError::ConflictDetected { key: key() }.code(),
            PersistErrorCode::ConflictDetected
        );
        assert_eq!(SyncError::RemoteAhead { key: key() }.code(), PersistErrorCode::Divergence);
        assert_eq!(SyncError::NoConflict { key: key() }.code(), PersistErrorCode::NotFound);
        assert_eq!(
            SyncError::from(PersistError::NotFound("k".into())).code(),
            PersistErrorCode::NotFound
        );
    }
}
