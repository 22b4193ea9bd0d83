//! The Kernel: unified API over a local/remote replica pair.
//!
//! The Kernel owns a [`SyncEngine`] and exposes the adapter contract of the
//! local replica alongside sync operations and a transaction ledger.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use truth_kernel_core::{
    build_chain_from, chain_head, find_chain_break_from, CanonTx, HashEntry, RootHash,
    GENESIS_HASH,
};
use truth_kernel_store::{
    AdapterExt, FileAdapter, LoadOptions, LoadResult, PersistError, PersistSource,
    PersistenceAdapter, SaveOptions, SaveResult,
};
use truth_kernel_sync::{Conflict, PullResult, SyncEngine, SyncState, Winner};

use crate::config::KernelConfig;
use crate::error::{KernelError, Result};

/// Persisted form of a transaction ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    pub genesis: RootHash,
    pub head: RootHash,
    pub entries: Vec<HashEntry>,
}

/// Result of appending to a ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRecord {
    pub save: SaveResult,
    pub head: RootHash,
    /// Entries added by this call.
    pub appended: usize,
    /// Entries in the ledger after this call.
    pub len: usize,
}

/// The main Kernel struct.
///
/// Provides a unified API for:
/// - Saving and loading values on the local replica
/// - Comparing, pulling and pushing against the remote replica
/// - Resolving conflicts
/// - Recording and verifying transaction chains
pub struct Kernel<L, R> {
    sync: SyncEngine<L, R>,
}

impl Kernel<FileAdapter, FileAdapter> {
    /// Open file adapters for both replicas described by `config`.
    pub fn open(config: &KernelConfig) -> Result<Self> {
        let local = FileAdapter::new(config.local.clone())?;
        let remote = FileAdapter::new(config.remote.clone())?;
        Ok(Self::new(local, remote))
    }
}

impl<L: PersistenceAdapter, R: PersistenceAdapter> Kernel<L, R> {
    pub fn new(local: L, remote: R) -> Self {
        Self {
            sync: SyncEngine::new(local, remote),
        }
    }

    pub fn local(&self) -> &L {
        self.sync.local()
    }

    pub fn remote(&self) -> &R {
        self.sync.remote()
    }

    pub fn sync_engine(&self) -> &SyncEngine<L, R> {
        &self.sync
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Local Replica
    // ─────────────────────────────────────────────────────────────────────────

    /// Save `data` on the local replica.
    pub async fn save(
        &self,
        key: &str,
        data: &Value,
        source: &PersistSource,
        options: &SaveOptions,
    ) -> Result<SaveResult> {
        Ok(self.local().save(key, data, source, options).await?)
    }

    /// Load `key` from the local replica.
    pub async fn load(&self, key: &str, options: &LoadOptions) -> Result<LoadResult> {
        Ok(self.local().load(key, options).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn compare(&self, key: &str) -> Result<SyncState> {
        Ok(self.sync.compare(key).await?)
    }

    pub async fn pull(&mut self, key: &str) -> Result<PullResult> {
        Ok(self.sync.pull(key).await?)
    }

    pub async fn push(&self, key: &str) -> Result<SaveResult> {
        Ok(self.sync.push(key).await?)
    }

    pub async fn resolve_conflict(
        &mut self,
        key: &str,
        winner: Winner,
        merged: Option<Value>,
    ) -> Result<SaveResult> {
        Ok(self.sync.resolve_conflict(key, winner, merged).await?)
    }

    pub fn conflicts(&self) -> Vec<&Conflict> {
        self.sync.conflicts()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ledger
    // ─────────────────────────────────────────────────────────────────────────

    /// Append `txs` to the ledger stored under `key` on the local replica.
    ///
    /// A missing ledger starts at [`GENESIS_HASH`]. An existing one is
    /// verified before anything is appended.
    pub async fn record_chain(&self, key: &str, txs: &[CanonTx]) -> Result<ChainRecord> {
        let mut ledger = match self.read_ledger(key).await {
            Ok(ledger) => ledger,
            Err(KernelError::Persist(PersistError::NotFound(_))) => Ledger {
                genesis: *GENESIS_HASH,
                head: *GENESIS_HASH,
                entries: Vec::new(),
            },
            Err(e) => return Err(e),
        };

        let appended = build_chain_from(txs, &ledger.head)?;
        let count = appended.len();
        ledger.entries.extend(appended);
        ledger.head = chain_head_from(&ledger);

        let save = self
            .local()
            .save_typed(key, &ledger, &PersistSource::CANON_CORE)
            .await?;
        debug!(key, appended = count, head = %ledger.head, "ledger extended");
        Ok(ChainRecord {
            save,
            head: ledger.head,
            appended: count,
            len: ledger.entries.len(),
        })
    }

    /// Load the ledger under `key` and verify every link.
    pub async fn load_chain(&self, key: &str) -> Result<Vec<HashEntry>> {
        Ok(self.read_ledger(key).await?.entries)
    }

    async fn read_ledger(&self, key: &str) -> Result<Ledger> {
        let ledger: Ledger = self.local().load_typed(key).await?;
        if let Some(index) = find_chain_break_from(&ledger.entries, &ledger.genesis) {
            warn!(key, index, "ledger chain broken");
            return Err(KernelError::ChainBroken {
                key: key.to_string(),
                index,
            });
        }
        if chain_head_from(&ledger) != ledger.head {
            warn!(key, "ledger head does not match its entries");
            return Err(KernelError::ChainBroken {
                key: key.to_string(),
                index: ledger.entries.len(),
            });
        }
        Ok(ledger)
    }
}

fn chain_head_from(ledger: &Ledger) -> RootHash {
    if ledger.entries.is_empty() {
        ledger.genesis
    } else {
        chain_head(&ledger.entries)
    }
}
