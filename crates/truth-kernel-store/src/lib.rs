//! # Truth Kernel Store
//!
//! Durable persistence for canonical values. Every value is wrapped in a
//! [`PersistEnvelope`] carrying its data hash and lineage, encoded
//! canonically, and committed atomically through a [`PersistenceAdapter`].
//!
//! ## Key Types
//!
//! - [`PersistenceAdapter`] - The async trait every backend implements
//! - [`FileAdapter`] - One `.omega.json` file per key, lock file + temp + rename
//! - [`SqliteAdapter`] - One row per key, one transaction per save
//! - [`MemoryAdapter`] - In-memory backend for tests
//! - [`AdapterConfig`] - Base path, replica id, lock timeout, size limit
//!
//! ## Usage
//!
//! ```rust,no_run
//! use serde_json::json;
//! use truth_kernel_store::{
//!     AdapterConfig, FileAdapter, LoadOptions, PersistSource, PersistenceAdapter, SaveOptions,
//! };
//!
//! async fn example() -> truth_kernel_store::Result<()> {
//!     let config = AdapterConfig::builder()
//!         .base_path("./.truth-data")
//!         .instance_id("replica-a")
//!         .build()?;
//!     let adapter = FileAdapter::new(config)?;
//!
//!     let data = json!({"status": "active"});
//!     adapter
//!         .save("entity.1", &data, &PersistSource::USER, &SaveOptions::default())
//!         .await?;
//!     let loaded = adapter.load("entity.1", &LoadOptions::strict()).await?;
//!     assert_eq!(loaded.data(), &data);
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic commits**: a crash mid-save leaves the previous envelope intact
//! - **Single writer per key**: concurrent saves to one key are serialized
//! - **Lineage**: each envelope records the hash of the one it replaced
//! - **Monotonic sequences**: per adapter instance, never below the stored predecessor

pub mod config;
pub mod envelope;
pub mod error;
pub mod file;
pub mod lock;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use config::{AdapterConfig, AdapterConfigBuilder, DEFAULT_LOCK_TIMEOUT, DEFAULT_MAX_FILE_SIZE};
pub use envelope::{
    open, seal, validate_key, EnvelopeMetadata, LoadOptions, Opened, PersistEnvelope,
    PersistSource, Predecessor, SealParams, Sealed, Sequencer, Verification, MAX_KEY_LEN,
    PERSIST_MAGIC, PERSIST_VERSION,
};
pub use error::{PersistError, PersistErrorCode, Result};
pub use file::FileAdapter;
pub use lock::KeyLock;
pub use memory::MemoryAdapter;
pub use sqlite::SqliteAdapter;
pub use traits::{
    AdapterExt, DeleteResult, ListResult, LoadResult, PersistenceAdapter, SaveOptions, SaveResult,
    VerifyResult,
};
