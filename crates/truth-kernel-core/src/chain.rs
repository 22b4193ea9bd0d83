//! Tamper-evident hash chains over transactions.
//!
//! Building a chain is a strict left fold:
//!
//! ```text
//! cumulative[0] = H(canon({parent: GENESIS, opsHash: tx[0], rail}))
//! cumulative[i] = H(canon({parent: cumulative[i-1], opsHash: tx[i], rail}))
//! ```

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::canonical::hash_canonical;
use crate::error::CanonError;
use crate::hash::{hash_str, RootHash};
use crate::ids::TxId;
use crate::tx::{CanonTx, Rail};

/// Seed string of the genesis hash.
pub const GENESIS_SEED: &str = "OMEGA_GENESIS_2026";

/// Head of the empty chain: `H("OMEGA_GENESIS_2026")`.
pub static GENESIS_HASH: LazyLock<RootHash> = LazyLock::new(|| hash_str(GENESIS_SEED));

/// One link of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashEntry {
    pub tx_id: TxId,
    /// Content hash of the transaction.
    pub ops_hash: RootHash,
    pub parent_cumulative_hash: RootHash,
    pub cumulative_hash: RootHash,
    pub rail: Rail,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CumulativeInput<'a> {
    ops_hash: &'a RootHash,
    parent: &'a RootHash,
    rail: Rail,
}

fn fold(parent: &RootHash, ops_hash: &RootHash, rail: Rail) -> Result<RootHash, CanonError> {
    hash_canonical(&CumulativeInput {
        ops_hash,
        parent,
        rail,
    })
}

/// Fold one transaction onto `parent`.
pub fn compute_cumulative_hash(tx: &CanonTx, parent: &RootHash) -> Result<RootHash, CanonError> {
    fold(parent, &tx.content_hash(), tx.rail())
}

/// Build the chain for `txs`, rooted at [`GENESIS_HASH`].
pub fn build_chain(txs: &[CanonTx]) -> Result<Vec<HashEntry>, CanonError> {
    build_chain_from(txs, &GENESIS_HASH)
}

/// Build the chain for `txs`, rooted at `genesis`.
pub fn build_chain_from(txs: &[CanonTx], genesis: &RootHash) -> Result<Vec<HashEntry>, CanonError> {
    let mut entries = Vec::with_capacity(txs.len());
    let mut parent = *genesis;
    for tx in txs {
        let cumulative = compute_cumulative_hash(tx, &parent)?;
        entries.push(HashEntry {
            tx_id: *tx.tx_id(),
            ops_hash: tx.content_hash(),
            parent_cumulative_hash: parent,
            cumulative_hash: cumulative,
            rail: tx.rail(),
        });
        parent = cumulative;
    }
    Ok(entries)
}

/// Head of a chain: the last cumulative hash, or genesis when empty.
pub fn chain_head(entries: &[HashEntry]) -> RootHash {
    entries
        .last()
        .map(|e| e.cumulative_hash)
        .unwrap_or(*GENESIS_HASH)
}

fn entry_consistent(entry: &HashEntry) -> bool {
    fold(&entry.parent_cumulative_hash, &entry.ops_hash, entry.rail)
        .map(|h| h == entry.cumulative_hash)
        .unwrap_or(false)
}

/// Index of the first broken entry, if any.
///
/// An entry is broken when its parent does not equal its predecessor's
/// cumulative hash, or its own cumulative hash does not recompute.
pub fn find_chain_break(entries: &[HashEntry]) -> Option<usize> {
    entries.iter().enumerate().find_map(|(i, entry)| {
        let linked = i == 0 || entry.parent_cumulative_hash == entries[i - 1].cumulative_hash;
        (!linked || !entry_consistent(entry)).then_some(i)
    })
}

/// Like [`find_chain_break`], also requiring the first entry to hang off `genesis`.
pub fn find_chain_break_from(entries: &[HashEntry], genesis: &RootHash) -> Option<usize> {
    match entries.first() {
        Some(first) if first.parent_cumulative_hash != *genesis => Some(0),
        _ => find_chain_break(entries),
    }
}

/// True when no entry is broken. The empty chain is valid.
pub fn verify_chain(entries: &[HashEntry]) -> bool {
    find_chain_break(entries).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::EntityId;
    use crate::tx::{CanonOp, OpType};
    use proptest::prelude::*;
    use serde_json::json;

    fn tx(n: u64) -> CanonTx {
        let entity = EntityId::derive("chain", "test", &n).unwrap();
        CanonTx::builder("tester", Rail::Truth)
            .reason(format!("step {n}"))
            .op(CanonOp::builder(OpType::Set, entity)
                .path("n")
                .value(json!(n))
                .build()
                .unwrap())
            .build()
            .unwrap()
    }

    fn txs(len: u64) -> Vec<CanonTx> {
        (0..len).map(tx).collect()
    }

    #[test]
    fn test_genesis_constant() {
        assert_eq!(*GENESIS_HASH, hash_str("OMEGA_GENESIS_2026"));
        assert_eq!(chain_head(&[]), *GENESIS_HASH);
    }

    #[test]
    fn test_empty_chain_valid() {
        assert!(verify_chain(&[]));
        assert_eq!(find_chain_break(&[]), None);
        assert!(build_chain(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_build_is_left_fold() {
        let chain = build_chain(&txs(3)).unwrap();
        assert_eq!(chain[0].parent_cumulative_hash, *GENESIS_HASH);
        assert_eq!(chain[1].parent_cumulative_hash, chain[0].cumulative_hash);
        assert_eq!(chain[2].parent_cumulative_hash, chain[1].cumulative_hash);
        assert_eq!(chain_head(&chain), chain[2].cumulative_hash);
        assert!(verify_chain(&chain));
    }

    #[test]
    fn test_custom_genesis() {
        let root = hash_str("other root");
        let chain = build_chain_from(&txs(2), &root).unwrap();
        assert_eq!(chain[0].parent_cumulative_hash, root);
        assert!(verify_chain(&chain));
        assert_eq!(find_chain_break_from(&chain, &root), None);
        assert_eq!(find_chain_break_from(&chain, &GENESIS_HASH), Some(0));
    }

    #[test]
    fn test_tamper_head_middle_tail() {
        let chain = build_chain(&txs(5)).unwrap();
        for idx in [0, 2, 4] {
            let mut tampered = chain.clone();
            tampered[idx].parent_cumulative_hash = hash_str("forged");
            assert!(!verify_chain(&tampered));
            assert_eq!(find_chain_break(&tampered), Some(idx));
        }
    }

    #[test]
    fn test_tampered_cumulative_detected() {
        let mut chain = build_chain(&txs(3)).unwrap();
        chain[1].cumulative_hash = hash_str("forged");
        assert_eq!(find_chain_break(&chain), Some(1));
    }

    #[test]
    fn test_reordered_chain_detected() {
        let mut chain = build_chain(&txs(3)).unwrap();
        chain.swap(1, 2);
        assert_eq!(find_chain_break(&chain), Some(1));
    }

    #[test]
    fn test_entries_serde() {
        let chain = build_chain(&txs(2)).unwrap();
        let json = serde_json::to_string(&chain).unwrap();
        assert!(json.contains("parentCumulativeHash"));
        let back: Vec<HashEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chain);
        assert!(verify_chain(&back));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_built_chains_verify(len in 1u64..12) {
            prop_assert!(verify_chain(&build_chain(&txs(len)).unwrap()));
        }

        #[test]
        fn prop_single_tamper_located(len in 1u64..12, pick in any::<prop::sample::Index>()) {
            let mut chain = build_chain(&txs(len)).unwrap();
            let idx = pick.index(chain.len());
            chain[idx].parent_cumulative_hash = hash_str("tamper");
            prop_assert_eq!(find_chain_break(&chain), Some(idx));
        }
    }
}
