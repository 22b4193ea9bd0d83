//! Sync state classification.
//!
//! A key's state is derived from the two stored envelopes every time it is
//! asked for. Nothing here is cached or persisted.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use truth_kernel_core::RootHash;
use truth_kernel_store::LoadResult;

/// Relationship between the local and remote copy of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    /// Both absent, or both present with equal data hashes.
    InSync,
    /// Local descends from remote's current version (or remote is empty).
    LocalAhead,
    /// Remote descends from local's current version (or local is empty).
    RemoteAhead,
    /// Both changed independently since their last common version.
    Diverged,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InSync => "IN_SYNC",
            Self::LocalAhead => "LOCAL_AHEAD",
            Self::RemoteAhead => "REMOTE_AHEAD",
            Self::Diverged => "DIVERGED",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one key on both replicas.
///
/// Sequences are 0 and hashes `None` for a side that holds nothing. Hashes
/// are data hashes, so two replicas holding equal data agree on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub local_sequence: u64,
    pub remote_sequence: u64,
    pub local_hash: Option<RootHash>,
    pub remote_hash: Option<RootHash>,
    pub status: SyncStatus,
    pub last_sync_at: DateTime<Utc>,
}

impl SyncState {
    /// Classify a key from whatever each side currently stores.
    pub fn derive(local: Option<&LoadResult>, remote: Option<&LoadResult>, now: DateTime<Utc>) -> Self {
        Self {
            local_sequence: local.map_or(0, LoadResult::sequence),
            remote_sequence: remote.map_or(0, LoadResult::sequence),
            local_hash: local.map(|l| *l.data_hash()),
            remote_hash: remote.map(|r| *r.data_hash()),
            status: classify(local, remote),
            last_sync_at: now,
        }
    }

    pub fn is_in_sync(&self) -> bool {
        self.status == SyncStatus::InSync
    }
}

fn classify(local: Option<&LoadResult>, remote: Option<&LoadResult>) -> SyncStatus {
    match (local, remote) {
        (None, None) => SyncStatus::InSync,
        (Some(_), None) => SyncStatus::LocalAhead,
        (None, Some(_)) => SyncStatus::RemoteAhead,
        (Some(l), Some(r)) => {
            if l.data_hash() == r.data_hash() {
                return SyncStatus::InSync;
            }
            // Sequences come from different instances, so lineage decides the
            // direction. They only order an A -> B -> A flip-flop.
            match (descends_from(l, r), descends_from(r, l)) {
                (true, false) => SyncStatus::LocalAhead,
                (false, true) => SyncStatus::RemoteAhead,
                (true, true) => match l.sequence().cmp(&r.sequence()) {
                    Ordering::Greater => SyncStatus::LocalAhead,
                    Ordering::Less => SyncStatus::RemoteAhead,
                    Ordering::Equal => SyncStatus::Diverged,
                },
                (false, false) => SyncStatus::Diverged,
            }
        }
    }
}

/// Whether `child` was written on top of `parent`'s current version.
///
/// Matches either the exact envelope or, for a replica populated by a copy,
/// the same data.
fn descends_from(child: &LoadResult, parent: &LoadResult) -> bool {
    let meta = &child.envelope.metadata;
    meta.previous_hash.as_ref() == Some(&parent.envelope_hash)
        || meta.previous_data_hash.as_ref() == Some(parent.data_hash())
}
