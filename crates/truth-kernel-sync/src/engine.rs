//! Sync engine over a local and a remote adapter.
//!
//! Every operation starts from a fresh [`SyncState`]. Divergence is never
//! merged automatically: `pull` records a [`Conflict`] and returns it, and
//! `push` refuses until the conflict is resolved.
//!
//! Operations touch one adapter at a time and are not atomic across the
//! pair. After an interruption, re-run [`SyncEngine::compare`] and repeat.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};
use truth_kernel_core::canonicalize_json;
use truth_kernel_store::{
    LoadOptions, LoadResult, PersistEnvelope, PersistError, PersistSource, PersistenceAdapter,
    SaveOptions, SaveResult,
};

use crate::conflict::{Conflict, ConflictRegistry, Winner};
use crate::error::{Result, SyncError};
use crate::state::{SyncState, SyncStatus};

/// Location reported by a push that had nothing to write.
pub const ALREADY_SYNCED: &str = "already-synced";

const DIVERGENCE_REASON: &str = "divergent modifications detected";

/// Outcome of [`SyncEngine::pull`].
#[derive(Debug, Clone, PartialEq)]
pub enum PullResult {
    /// Local already holds the latest data (in sync or ahead).
    UpToDate,
    /// Remote's data was copied into local.
    Pulled {
        envelope: PersistEnvelope,
        save: SaveResult,
    },
    /// Both sides changed independently; nothing was written.
    Conflict(Conflict),
}

impl PullResult {
    /// Whether local now reflects remote without a pending conflict.
    pub fn is_merged(&self) -> bool {
        !matches!(self, Self::Conflict(_))
    }

    pub fn conflict(&self) -> Option<&Conflict> {
        match self {
            Self::Conflict(c) => Some(c),
            _ => None,
        }
    }
}

/// Current state of one key on both sides, with what was loaded.
struct Snapshot {
    state: SyncState,
    local: Option<LoadResult>,
    remote: Option<LoadResult>,
}

/// Two-replica sync engine.
///
/// `compare` and `push` borrow the engine shared; `pull` and
/// `resolve_conflict` need `&mut` because they update the conflict registry.
pub struct SyncEngine<L, R> {
    local: L,
    remote: R,
    conflicts: ConflictRegistry,
}

impl<L: PersistenceAdapter, R: PersistenceAdapter> SyncEngine<L, R> {
    pub fn new(local: L, remote: R) -> Self {
        Self {
            local,
            remote,
            conflicts: ConflictRegistry::new(),
        }
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn into_parts(self) -> (L, R) {
        (self.local, self.remote)
    }

    /// Classify `key` by loading both sides now.
    pub async fn compare(&self, key: &str) -> Result<SyncState> {
        Ok(self.snapshot(key).await?.state)
    }

    /// Bring remote's data into local when remote is ahead.
    ///
    /// A divergence is recorded in the conflict registry and returned as
    /// [`PullResult::Conflict`], not as an error.
    pub async fn pull(&mut self, key: &str) -> Result<PullResult> {
        let Snapshot { state, local, remote } = self.snapshot(key).await?;

        match (state.status, local, remote) {
            (SyncStatus::InSync | SyncStatus::LocalAhead, _, _) => Ok(PullResult::UpToDate),
            (SyncStatus::RemoteAhead, _, Some(remote)) => {
                let envelope = remote.envelope;
                let save = self
                    .local
                    .save(key, &envelope.data, &envelope.metadata.source, &SaveOptions::default())
                    .await?;
                debug!(key, sequence = save.sequence, "pulled remote into local");
                Ok(PullResult::Pulled { envelope, save })
            }
            (SyncStatus::Diverged, Some(local), Some(remote)) => {
                warn!(
                    key,
                    local_sequence = state.local_sequence,
                    remote_sequence = state.remote_sequence,
                    "divergence detected, recording conflict"
                );
                let conflict = Conflict {
                    key: key.to_string(),
                    local_envelope: local.envelope,
                    remote_envelope: remote.envelope,
                    detected_at: Utc::now(),
                    reason: DIVERGENCE_REASON.to_string(),
                };
                self.conflicts.record(conflict.clone());
                Ok(PullResult::Conflict(conflict))
            }
            (status, _, _) => Err(inconsistent(key, status)),
        }
    }

    /// Write local's data to remote when local is ahead.
    ///
    /// In sync is a no-op reporting local's current envelope hash.
    pub async fn push(&self, key: &str) -> Result<SaveResult> {
        let Snapshot { state, local, .. } = self.snapshot(key).await?;

        match (state.status, local) {
            (SyncStatus::Diverged, _) => Err(SyncError::ConflictDetected {
                key: key.to_string(),
            }),
            (SyncStatus::RemoteAhead, _) => Err(SyncError::RemoteAhead {
                key: key.to_string(),
            }),
            (SyncStatus::InSync, Some(local)) => Ok(SaveResult {
                key: key.to_string(),
                location: ALREADY_SYNCED.to_string(),
                bytes_written: 0,
                envelope_hash: local.envelope_hash,
                timestamp: Utc::now(),
                sequence: local.sequence(),
            }),
            // Nothing on either side.
            (SyncStatus::InSync, None) => Err(PersistError::NotFound(key.to_string()).into()),
            (SyncStatus::LocalAhead, Some(local)) => {
                let envelope = local.envelope;
                let save = self
                    .remote
                    .save(key, &envelope.data, &envelope.metadata.source, &SaveOptions::default())
                    .await?;
                debug!(key, sequence = save.sequence, "pushed local to remote");
                Ok(save)
            }
            (status, None) => Err(inconsistent(key, status)),
        }
    }

    /// Settle a recorded conflict by writing the chosen data to both sides.
    ///
    /// The conflict stays recorded if either write fails. Returns the local
    /// save.
    pub async fn resolve_conflict(
        &mut self,
        key: &str,
        winner: Winner,
        merged: Option<Value>,
    ) -> Result<SaveResult> {
        let conflict = self.conflicts.get(key).ok_or_else(|| SyncError::NoConflict {
            key: key.to_string(),
        })?;

        let (data, source): (Value, PersistSource) = match winner {
            Winner::Local => (
                conflict.local_envelope.data.clone(),
                conflict.local_envelope.metadata.source.clone(),
            ),
            Winner::Remote => (
                conflict.remote_envelope.data.clone(),
                conflict.remote_envelope.metadata.source.clone(),
            ),
            Winner::Merge => {
                let data = merged.ok_or_else(|| SyncError::MergeDataRequired {
                    key: key.to_string(),
                })?;
                canonicalize_json(&data).map_err(|e| SyncError::MergeFailed {
                    key: key.to_string(),
                    reason: e.to_string(),
                })?;
                (data, PersistSource::CONFLICT_RESOLVER)
            }
        };

        let options = SaveOptions::default();
        let saved = self.local.save(key, &data, &source, &options).await?;
        self.remote.save(key, &data, &source, &options).await?;
        self.conflicts.remove(key);

        info!(key, ?winner, hash = %saved.envelope_hash, "conflict resolved");
        Ok(saved)
    }

    /// All open conflicts, ordered by key.
    pub fn conflicts(&self) -> Vec<&Conflict> {
        self.conflicts.iter().collect()
    }

    pub fn conflict(&self, key: &str) -> Option<&Conflict> {
        self.conflicts.get(key)
    }

    pub fn has_conflict(&self, key: &str) -> bool {
        self.conflicts.contains(key)
    }

    pub fn clear_conflicts(&mut self) {
        self.conflicts.clear();
    }

    /// Load both sides strictly. A copy re-seals the data it moves, so
    /// anything that fails its hash check must stop here.
    async fn snapshot(&self, key: &str) -> Result<Snapshot> {
        let options = LoadOptions::strict();
        let (local, remote) = tokio::join!(
            self.local.load(key, &options),
            self.remote.load(key, &options)
        );
        let local = present(local)?;
        let remote = present(remote)?;
        let state = SyncState::derive(local.as_ref(), remote.as_ref(), Utc::now());
        debug!(key, status = %state.status, "compared replicas");
        Ok(Snapshot { state, local, remote })
    }
}

/// `NOT_FOUND` means "this side holds nothing"; every other failure is real.
fn present(result: truth_kernel_store::Result<LoadResult>) -> Result<Option<LoadResult>> {
    match result {
        Ok(loaded) => Ok(Some(loaded)),
        Err(PersistError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn inconsistent(key: &str, status: SyncStatus) -> SyncError {
    PersistError::Adapter(format!("{key}: state {status} without the envelopes it implies")).into()
}
