//! Recorded conflicts awaiting resolution.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use truth_kernel_store::PersistEnvelope;

/// Both envelopes of a diverged key, captured when the divergence was seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub key: String,
    pub local_envelope: PersistEnvelope,
    pub remote_envelope: PersistEnvelope,
    pub detected_at: DateTime<Utc>,
    pub reason: String,
}

/// Which side a resolution keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Local,
    Remote,
    /// Caller-supplied merged data replaces both sides.
    Merge,
}

/// Conflicts keyed by data key. At most one per key; a newer detection
/// replaces the older record.
///
/// Owned by a single sync engine and mutated only through `&mut`.
#[derive(Debug, Clone, Default)]
pub struct ConflictRegistry {
    entries: BTreeMap<String, Conflict>,
}

impl ConflictRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, conflict: Conflict) {
        self.entries.insert(conflict.key.clone(), conflict);
    }

    pub fn get(&self, key: &str) -> Option<&Conflict> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Conflict> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// All open conflicts, ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = &Conflict> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
