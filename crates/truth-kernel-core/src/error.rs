//! Error types for the Truth Kernel Core.

use thiserror::Error;

/// Failures raised while producing a canonical form.
///
/// These are programmer errors: the value handed to the canonicalizer is
/// outside the supported universe. The call is aborted, never coerced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonError {
    #[error("undefined is not canonicalizable at {path}")]
    Undefined { path: String },

    #[error("non-finite number at {path}: {repr}")]
    NonFiniteNumber { path: String, repr: String },

    #[error("invalid date at {path}: {input}")]
    InvalidDate { path: String, input: String },

    #[error("unsupported value at {path}: {reason}")]
    Unsupported { path: String, reason: String },
}

/// Core errors that can occur outside canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("canonicalization failed: {0}")]
    Canon(#[from] CanonError),

    #[error("invalid root hash: {0:?}")]
    InvalidRootHash(String),

    #[error("invalid identifier: {0:?}")]
    InvalidId(String),

    #[error("invalid transaction: {0}")]
    InvalidTx(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("non-canonical encoding")]
    NonCanonical,
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
