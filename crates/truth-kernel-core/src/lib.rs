//! # Truth Kernel Core
//!
//! Pure primitives for the Truth Kernel: canonicalization, hashing,
//! identifiers, transactions, and hash chains.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over content-addressed data.
//!
//! ## Key Types
//!
//! - [`CanonValue`] - The value universe accepted by the canonicalizer
//! - [`RootHash`] - A SHA-256 digest with exactly one textual form
//! - [`EntityId`], [`SchemaId`], [`OpId`], [`TxId`] - Deterministic prefixed identifiers
//! - [`CanonTx`] / [`CanonOp`] - Transactions and their operations
//! - [`HashEntry`] - One link of a transaction hash chain
//!
//! ## Canonicalization
//!
//! Every hash in the system is taken over a canonical JSON string. See the
//! [`canonical`] module. Callers never serialize for hashing by hand.

pub mod canonical;
pub mod chain;
pub mod error;
pub mod hash;
pub mod ids;
pub mod tx;

pub use canonical::{
    canonicalize, canonicalize_json, decode_with_verify, encode_with_hash, hash_canonical,
    is_canonical_encoding, to_canon_value, to_canonical_string, CanonValue, Decoded, Encoded,
};
pub use chain::{
    build_chain, build_chain_from, chain_head, compute_cumulative_hash, find_chain_break,
    find_chain_break_from, verify_chain, HashEntry, GENESIS_HASH, GENESIS_SEED,
};
pub use error::{CanonError, CoreError, Result};
pub use hash::{hash_bytes, hash_multi, hash_str, is_root_hash, verify_hash, RootHash};
pub use ids::{create_id, EntityId, OpId, SchemaId, TxId};
pub use tx::{CanonOp, CanonTx, EvidenceRef, HashableTx, OpBuilder, OpType, Rail, TxBuilder};
