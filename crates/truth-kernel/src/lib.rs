//! # Truth Kernel
//!
//! The unified API for the Truth Kernel: deterministic hashing of
//! structured values, durable integrity-checked persistence, and
//! reconciliation between two replicas.
//!
//! ## Overview
//!
//! - **Canonical form**: every hash is taken over one deterministic JSON
//!   rendering, so equal values hash equally on every machine
//! - **Envelopes**: persisted values carry their data hash, a sequence
//!   number, and the hash of the version they replaced
//! - **Atomic saves**: a crash leaves the old value or the new one, never a mix
//! - **Sync**: divergent replicas produce an explicit conflict, never a
//!   silent merge
//!
//! ## Usage
//!
//! ```rust,no_run
//! use serde_json::json;
//! use truth_kernel::{load_config, telemetry, Kernel};
//! use truth_kernel::store::{PersistSource, SaveOptions};
//!
//! async fn example() -> anyhow::Result<()> {
//!     telemetry::init();
//!     let config = load_config("truth.toml")?;
//!     let kernel = Kernel::open(&config)?;
//!
//!     kernel
//!         .save("settings", &json!({"theme": "dark"}), &PersistSource::USER, &SaveOptions::default())
//!         .await?;
//!     kernel.push("settings").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `truth_kernel::core` - Canonicalization, hashes, identifiers, chains
//! - `truth_kernel::store` - Envelopes and adapters
//! - `truth_kernel::sync` - Sync engine

pub mod config;
pub mod error;
pub mod kernel;
pub mod telemetry;

// Re-export component crates
pub use truth_kernel_core as core;
pub use truth_kernel_store as store;
pub use truth_kernel_sync as sync;

// Re-export main types for convenience
pub use config::{load_config, KernelConfig};
pub use error::{KernelError, Result};
pub use kernel::{ChainRecord, Kernel, Ledger};

// Re-export commonly used types
pub use truth_kernel_core::{
    canonicalize_json, create_id, hash_str, CanonTx, HashEntry, Rail, RootHash, GENESIS_HASH,
};
pub use truth_kernel_store::{
    AdapterConfig, FileAdapter, MemoryAdapter, PersistError, PersistErrorCode, PersistSource,
    PersistenceAdapter, SqliteAdapter,
};
pub use truth_kernel_sync::{Conflict, PullResult, SyncState, SyncStatus, Winner};
