//! # Truth Kernel Sync
//!
//! Keeps one key consistent across two replicas, each behind its own
//! [`PersistenceAdapter`](truth_kernel_store::PersistenceAdapter).
//!
//! ## Overview
//!
//! [`SyncEngine::compare`] derives a [`SyncStatus`] from the envelopes each
//! side holds: equal data is in sync, a version written on top of the
//! other side's current version is ahead, and anything else has diverged.
//! `pull` and `push` move data in the direction the status allows.
//!
//! ## Key Properties
//!
//! - **Stateless classification**: every call reloads both sides
//! - **Explicit conflicts**: divergence is recorded and returned, never merged
//! - **Resumable**: operations are not atomic across replicas; re-run
//!   `compare` after an interruption
//!
//! ## Usage
//!
//! ```rust,no_run
//! use truth_kernel_store::MemoryAdapter;
//! use truth_kernel_sync::{PullResult, SyncEngine, Winner};
//!
//! async fn example() -> truth_kernel_sync::Result<()> {
//!     let mut engine = SyncEngine::new(
//!         MemoryAdapter::with_instance_id("laptop"),
//!         MemoryAdapter::with_instance_id("server"),
//!     );
//!
//!     if let PullResult::Conflict(conflict) = engine.pull("profile").await? {
//!         println!("diverged: {}", conflict.reason);
//!         engine.resolve_conflict("profile", Winner::Local, None).await?;
//!     }
//!     engine.push("profile").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Limitations
//!
//! Lineage is checked between exactly two replicas. When three or more
//! replicas modify the same key, the classification is not meaningful.

pub mod conflict;
pub mod engine;
pub mod error;
pub mod state;

pub use conflict::{Conflict, ConflictRegistry, Winner};
pub use engine::{PullResult, SyncEngine, ALREADY_SYNCED};
pub use error::{Result, SyncError};
pub use state::{SyncState, SyncStatus};
