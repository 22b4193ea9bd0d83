//! Error types for the Kernel.

use thiserror::Error;
use truth_kernel_core::{CanonError, CoreError};
use truth_kernel_store::{PersistError, PersistErrorCode};
use truth_kernel_sync::SyncError;

/// Errors that can occur during Kernel operations.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Core computation error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Persist(#[from] PersistError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Configuration could not be parsed or validated.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A stored ledger failed verification.
    #[error("ledger {key} is broken at entry {index}")]
    ChainBroken { key: String, index: usize },
}

impl From<CanonError> for KernelError {
    fn from(e: CanonError) -> Self {
        Self::Core(e.into())
    }
}

impl KernelError {
    /// The wire-level code for this error.
    pub fn code(&self) -> PersistErrorCode {
        match self {
            Self::Core(_) => PersistErrorCode::InvalidData,
            Self::Persist(e) => e.code(),
            Self::Sync(e) => e.code(),
            Self::Config(_) => PersistErrorCode::InvalidData,
            Self::ChainBroken { .. } => PersistErrorCode::Corrupted,
        }
    }
}

/// Result type for Kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;
