//! # Truth Kernel Testkit
//!
//! Testing utilities for the Truth Kernel.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Canonical strings and digests every implementation must reproduce
//! - **Generators**: Proptest strategies for JSON values, keys, and transactions
//! - **Fixtures**: Two-replica setups on disk or in memory
//!
//! ## Golden Vectors
//!
//! ```rust
//! use truth_kernel_testkit::vectors::verify_all_vectors;
//!
//! verify_all_vectors().unwrap();
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use truth_kernel_testkit::generators::json_value;
//!
//! proptest! {
//!     #[test]
//!     fn canonical_form_is_stable(v in json_value()) {
//!         let a = truth_kernel_core::canonicalize_json(&v).unwrap();
//!         let b = truth_kernel_core::canonicalize_json(&v).unwrap();
//!         prop_assert_eq!(a, b);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use truth_kernel_testkit::fixtures::ReplicaPair;
//!
//! let pair = ReplicaPair::new().unwrap();
//! let (_dir, engine) = pair.into_engine();
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{adapter_config, memory_engine, ReplicaPair};
pub use generators::{canon_tx, canon_txs, json_value, persist_key, tx_from_parts};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
