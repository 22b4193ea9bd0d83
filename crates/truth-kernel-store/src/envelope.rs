//! The persisted envelope and its codec.
//!
//! Every stored value is wrapped in a [`PersistEnvelope`] and written as
//! canonical JSON. All adapters share [`seal`] and [`open`], so the bytes a
//! key produces do not depend on which backend stores them.

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use truth_kernel_core::{
    encode_with_hash, hash_bytes, hash_str, is_canonical_encoding, to_canonical_string, RootHash,
};

use crate::error::{PersistError, Result};
use crate::file::DELETED_PREFIX;

/// Magic string identifying an envelope.
pub const PERSIST_MAGIC: &str = "OMEGA_PERSIST_V1";

/// Envelope format version written by this crate.
pub const PERSIST_VERSION: &str = "1.0.0";

/// Maximum key length in characters.
pub const MAX_KEY_LEN: usize = 200;

const FORBIDDEN_KEY_CHARS: &[char] = &['<', '>', '"', '|', '?', '*', '\\', '/'];

/// Provenance tag attached to every save.
///
/// Opaque to the kernel: stored and compared, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistSource(Cow<'static, str>);

impl PersistSource {
    pub const CANON_CORE: Self = Self(Cow::Borrowed("CANON_CORE"));
    pub const INTENT_MACHINE: Self = Self(Cow::Borrowed("INTENT_MACHINE"));
    pub const MEMORY_LAYER: Self = Self(Cow::Borrowed("MEMORY_LAYER"));
    pub const SYNC_ENGINE: Self = Self(Cow::Borrowed("SYNC_ENGINE"));
    pub const CONFLICT_RESOLVER: Self = Self(Cow::Borrowed("CONFLICT_RESOLVER"));
    pub const USER: Self = Self(Cow::Borrowed("USER"));

    pub fn new(tag: impl Into<String>) -> Self {
        Self(Cow::Owned(tag.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersistSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provenance and lineage of one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMetadata {
    pub source: PersistSource,
    pub instance_id: String,
    pub sequence: u64,
    /// Whole-envelope hash of the version this one replaced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<RootHash>,
    /// `data_hash` of the version this one replaced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_data_hash: Option<RootHash>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A versioned, hash-stamped wrapper around caller data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistEnvelope {
    pub magic: String,
    pub version: String,
    pub schema_version: u32,
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub data_hash: RootHash,
    pub data: Value,
    pub metadata: EnvelopeMetadata,
}

/// Reject keys that are empty, too long, or unsafe as file names.
pub fn validate_key(key: &str) -> Result<()> {
    let reject = |reason: &str| {
        Err(PersistError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        })
    };

    if key.is_empty() {
        return reject("key is empty");
    }
    if key.chars().count() > MAX_KEY_LEN {
        return reject("key exceeds 200 characters");
    }
    if key.chars().any(char::is_control) {
        return reject("key contains control characters");
    }
    if let Some(c) = key.chars().find(|c| FORBIDDEN_KEY_CHARS.contains(c)) {
        return Err(PersistError::InvalidKey {
            key: key.to_string(),
            reason: format!("key contains forbidden character {c:?}"),
        });
    }
    if key == "." || key == ".." {
        return reject("key is a relative path component");
    }
    if key.starts_with(DELETED_PREFIX) {
        return reject("key uses the reserved soft-delete prefix");
    }
    Ok(())
}

/// Per-adapter-instance sequence counter.
///
/// Strictly increasing across every save the instance makes, and never
/// below the sequence of the envelope being replaced.
#[derive(Debug, Default)]
pub struct Sequencer(AtomicU64);

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next sequence number, at least `floor + 1`.
    pub fn next(&self, floor: u64) -> u64 {
        let prev = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| Some(c.max(floor) + 1))
            .unwrap_or_else(|c| c);
        prev.max(floor) + 1
    }

    /// The last issued sequence number.
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// The envelope being replaced by a save.
#[derive(Debug, Clone)]
pub struct Predecessor {
    pub envelope_hash: RootHash,
    pub data_hash: RootHash,
    pub created_at: DateTime<Utc>,
    pub sequence: u64,
}

impl Predecessor {
    /// Inspect existing bytes. Unreadable predecessors are overwritten.
    pub fn from_bytes(key: &str, bytes: &[u8]) -> Option<Self> {
        match open(bytes, &LoadOptions::skip_verification()) {
            Ok(opened) => Some(Self {
                envelope_hash: opened.envelope_hash,
                data_hash: opened.envelope.data_hash,
                created_at: opened.envelope.created_at,
                sequence: opened.envelope.metadata.sequence,
            }),
            Err(err) => {
                warn!(key, error = %err, "existing envelope unreadable, overwriting");
                None
            }
        }
    }
}

/// Everything [`seal`] needs besides the data itself.
#[derive(Debug, Clone)]
pub struct SealParams<'a> {
    pub key: &'a str,
    pub source: &'a PersistSource,
    pub instance_id: &'a str,
    pub schema_version: u32,
    pub sequence: u64,
    pub tags: &'a [String],
    pub predecessor: Option<&'a Predecessor>,
    pub now: DateTime<Utc>,
}

/// Canonical bytes of an envelope, ready to commit.
#[derive(Debug, Clone)]
pub struct Sealed {
    pub envelope: PersistEnvelope,
    pub bytes: Vec<u8>,
    pub envelope_hash: RootHash,
}

/// Current time, truncated to the millisecond precision envelopes carry.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Wrap `data` in an envelope and encode it canonically.
pub fn seal(data: Value, params: SealParams<'_>) -> Result<Sealed> {
    let data_hash = encode_with_hash(&data)?.hash;
    let envelope = PersistEnvelope {
        magic: PERSIST_MAGIC.to_string(),
        version: PERSIST_VERSION.to_string(),
        schema_version: params.schema_version,
        key: params.key.to_string(),
        created_at: params.predecessor.map_or(params.now, |p| p.created_at),
        updated_at: params.now,
        data_hash,
        data,
        metadata: EnvelopeMetadata {
            source: params.source.clone(),
            instance_id: params.instance_id.to_string(),
            sequence: params.sequence,
            previous_hash: params.predecessor.map(|p| p.envelope_hash),
            previous_data_hash: params.predecessor.map(|p| p.data_hash),
            tags: params.tags.to_vec(),
        },
    };

    let text = to_canonical_string(&envelope)?;
    let envelope_hash = hash_str(&text);
    Ok(Sealed {
        envelope,
        bytes: text.into_bytes(),
        envelope_hash,
    })
}

/// How strictly `load` checks the stored data hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verification {
    /// Do not recompute; `verified` is false.
    Skip,
    /// Recompute and report the outcome in `verified`.
    #[default]
    Report,
    /// Recompute and fail with `HASH_MISMATCH` on mismatch.
    Strict,
}

/// Options for `load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub verification: Verification,
    /// Accept other versions with the same major. A different major is
    /// always rejected.
    pub allow_migration: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            verification: Verification::Report,
            allow_migration: true,
        }
    }
}

impl LoadOptions {
    pub fn strict() -> Self {
        Self {
            verification: Verification::Strict,
            ..Self::default()
        }
    }

    pub fn skip_verification() -> Self {
        Self {
            verification: Verification::Skip,
            ..Self::default()
        }
    }
}

/// A decoded, checked envelope.
#[derive(Debug, Clone)]
pub struct Opened {
    pub envelope: PersistEnvelope,
    pub envelope_hash: RootHash,
    pub verified: bool,
}

fn major(version: &str) -> Option<&str> {
    version.split('.').next().filter(|m| !m.is_empty())
}

fn check_version(actual: &str, allow_migration: bool) -> Result<()> {
    let compatible = if allow_migration {
        major(actual).is_some() && major(actual) == major(PERSIST_VERSION)
    } else {
        actual == PERSIST_VERSION
    };
    if compatible {
        Ok(())
    } else {
        Err(PersistError::VersionMismatch {
            expected: PERSIST_VERSION.to_string(),
            actual: actual.to_string(),
        })
    }
}

/// Decode stored bytes.
///
/// Checks, in order: JSON syntax (`PARSE_FAILED`), magic (`MAGIC_MISMATCH`),
/// version (`VERSION_MISMATCH`), canonical form and structure (`CORRUPTED`),
/// then the data hash according to `options.verification`.
pub fn open(bytes: &[u8], options: &LoadOptions) -> Result<Opened> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| PersistError::ParseFailed(e.to_string()))?;

    let field = |name: &str| value.get(name).and_then(Value::as_str).unwrap_or_default().to_string();

    let magic = field("magic");
    if magic != PERSIST_MAGIC {
        return Err(PersistError::MagicMismatch {
            expected: PERSIST_MAGIC.to_string(),
            actual: magic,
        });
    }
    check_version(&field("version"), options.allow_migration)?;

    if !is_canonical_encoding(&value, bytes)
        .map_err(|e| PersistError::Corrupted(e.to_string()))?
    {
        return Err(PersistError::Corrupted("bytes are not in canonical form".into()));
    }

    let envelope: PersistEnvelope =
        serde_json::from_value(value).map_err(|e| PersistError::Corrupted(e.to_string()))?;
    let envelope_hash = hash_bytes(bytes);

    let verified = match options.verification {
        Verification::Skip => false,
        Verification::Report | Verification::Strict => {
            let actual = encode_with_hash(&envelope.data)?.hash;
            let ok = actual == envelope.data_hash;
            if !ok {
                warn!(key = %envelope.key, expected = %envelope.data_hash, actual = %actual, "data hash mismatch");
                if options.verification == Verification::Strict {
                    return Err(PersistError::HashMismatch {
                        expected: envelope.data_hash,
                        actual,
                    });
                }
            }
            ok
        }
    };

    Ok(Opened {
        envelope,
        envelope_hash,
        verified,
    })
}

/// Outcome of checking stored bytes without failing.
pub(crate) fn inspect(bytes: &[u8], expected: Option<&RootHash>) -> (RootHash, Option<RootHash>, Vec<String>) {
    let actual = hash_bytes(bytes);
    let mut errors = Vec::new();

    if let Some(expected) = expected {
        if *expected != actual {
            errors.push(format!("envelope hash mismatch: expected {expected}, got {actual}"));
        }
    }

    let data_hash = match open(bytes, &LoadOptions::default()) {
        Ok(opened) => {
            if !opened.verified {
                errors.push("data hash mismatch".to_string());
            }
            Some(opened.envelope.data_hash)
        }
        Err(err) => {
            errors.push(err.to_string());
            None
        }
    };

    (actual, data_hash, errors)
}
