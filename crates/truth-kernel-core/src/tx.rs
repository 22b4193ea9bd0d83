//! Operations, transactions, and the hashable transaction view.
//!
//! A [`CanonTx`] is an ordered batch of [`CanonOp`]s. Its content hash is
//! computed over a projection that drops the audit timestamp and sorts ops
//! by `op_id` and evidence by path, so construction order never leaks into
//! the hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::hash_canonical;
use crate::error::{CoreError, Result};
use crate::hash::RootHash;
use crate::ids::{EntityId, OpId, TxId};

/// The kind of change an op applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpType {
    Set,
    Unset,
    Patch,
    Link,
    Unlink,
    Tombstone,
    Restore,
    MergeResolve,
    Promote,
}

impl OpType {
    pub const ALL: [OpType; 9] = [
        Self::Set,
        Self::Unset,
        Self::Patch,
        Self::Link,
        Self::Unlink,
        Self::Tombstone,
        Self::Restore,
        Self::MergeResolve,
        Self::Promote,
    ];

    /// Wire name of the op type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Set => "SET",
            Self::Unset => "UNSET",
            Self::Patch => "PATCH",
            Self::Link => "LINK",
            Self::Unlink => "UNLINK",
            Self::Tombstone => "TOMBSTONE",
            Self::Restore => "RESTORE",
            Self::MergeResolve => "MERGE_RESOLVE",
            Self::Promote => "PROMOTE",
        }
    }

    /// Whether ops of this type must carry a value.
    pub fn requires_value(self) -> bool {
        matches!(self, Self::Set | Self::Patch | Self::MergeResolve)
    }
}

/// Authoritative vs provisional transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rail {
    Truth,
    Interpretation,
}

impl Rail {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Truth => "truth",
            Self::Interpretation => "interpretation",
        }
    }
}

/// A pointer to supporting evidence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub path: String,
    pub hash: RootHash,
}

impl EvidenceRef {
    pub fn new(path: impl Into<String>, hash: RootHash) -> Self {
        Self {
            path: path.into(),
            hash,
        }
    }
}

fn sort_evidence(evidence: &mut [EvidenceRef]) {
    // Path first; hash breaks ties so duplicates on a path stay deterministic.
    evidence.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.hash.cmp(&b.hash)));
}

/// An atomic, immutable change to one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonOp {
    op_id: OpId,
    #[serde(rename = "type")]
    op_type: OpType,
    entity_id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    evidence: Vec<EvidenceRef>,
}

/// The part of an op its id is derived from.
#[derive(Serialize)]
struct OpContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a Value>,
    evidence: &'a [EvidenceRef],
}

impl CanonOp {
    /// Start building an op.
    pub fn builder(op_type: OpType, entity_id: EntityId) -> OpBuilder {
        OpBuilder {
            op_type,
            entity_id,
            path: None,
            value: None,
            evidence: Vec::new(),
        }
    }

    pub fn op_id(&self) -> &OpId {
        &self.op_id
    }

    pub fn op_type(&self) -> OpType {
        self.op_type
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Evidence, sorted by path.
    pub fn evidence(&self) -> &[EvidenceRef] {
        &self.evidence
    }
}

/// Builder for [`CanonOp`].
pub struct OpBuilder {
    op_type: OpType,
    entity_id: EntityId,
    path: Option<String>,
    value: Option<Value>,
    evidence: Vec<EvidenceRef>,
}

impl OpBuilder {
    /// Set the field path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the value.
    pub fn value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Add an evidence reference.
    pub fn evidence(mut self, evidence: EvidenceRef) -> Self {
        self.evidence.push(evidence);
        self
    }

    /// Derive the op id and freeze the op.
    pub fn build(mut self) -> Result<CanonOp> {
        if self.op_type.requires_value() && self.value.is_none() {
            return Err(CoreError::InvalidTx(format!(
                "{} op requires a value",
                self.op_type.as_str()
            )));
        }
        sort_evidence(&mut self.evidence);

        let content = OpContent {
            path: self.path.as_deref(),
            value: self.value.as_ref(),
            evidence: &self.evidence,
        };
        let op_id = OpId::derive(
            &self.entity_id.to_string(),
            self.op_type.as_str(),
            &content,
        )?;

        Ok(CanonOp {
            op_id,
            op_type: self.op_type,
            entity_id: self.entity_id,
            path: self.path,
            value: self.value,
            evidence: self.evidence,
        })
    }
}

/// A batch of ops with provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonTx {
    tx_id: TxId,
    ops: Vec<CanonOp>,
    actor: String,
    reason: String,
    evidence: Vec<EvidenceRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_root_hash: Option<RootHash>,
    rail: Rail,
    /// Audit only. Never hashed.
    timestamp: DateTime<Utc>,
    #[serde(skip)]
    content_hash: RootHash,
}

/// Projection of a transaction onto its hashed fields.
///
/// Ops are ordered by `op_id`, evidence by path; the timestamp is absent.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HashableTx<'a> {
    actor: &'a str,
    evidence: Vec<&'a EvidenceRef>,
    ops: Vec<&'a CanonOp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_root_hash: Option<&'a RootHash>,
    rail: Rail,
    reason: &'a str,
}

fn hashable_view<'a>(
    ops: &'a [CanonOp],
    actor: &'a str,
    reason: &'a str,
    evidence: &'a [EvidenceRef],
    parent_root_hash: Option<&'a RootHash>,
    rail: Rail,
) -> HashableTx<'a> {
    let mut ops: Vec<&CanonOp> = ops.iter().collect();
    ops.sort_by(|a, b| a.op_id.cmp(&b.op_id));
    // Evidence is kept sorted by the builder.
    HashableTx {
        actor,
        evidence: evidence.iter().collect(),
        ops,
        parent_root_hash,
        rail,
        reason,
    }
}

impl CanonTx {
    /// Start building a transaction.
    pub fn builder(actor: impl Into<String>, rail: Rail) -> TxBuilder {
        TxBuilder {
            actor: actor.into(),
            rail,
            reason: String::new(),
            evidence: Vec::new(),
            parent_root_hash: None,
            ops: Vec::new(),
            timestamp: None,
        }
    }

    pub fn tx_id(&self) -> &TxId {
        &self.tx_id
    }

    /// Ops in construction order.
    pub fn ops(&self) -> &[CanonOp] {
        &self.ops
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn evidence(&self) -> &[EvidenceRef] {
        &self.evidence
    }

    pub fn parent_root_hash(&self) -> Option<&RootHash> {
        self.parent_root_hash.as_ref()
    }

    pub fn rail(&self) -> Rail {
        self.rail
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The hashed projection of this transaction.
    pub fn hashable_view(&self) -> HashableTx<'_> {
        hashable_view(
            &self.ops,
            &self.actor,
            &self.reason,
            &self.evidence,
            self.parent_root_hash.as_ref(),
            self.rail,
        )
    }

    /// `H(canonicalize(hashable_view))`, computed once at build time.
    pub fn content_hash(&self) -> RootHash {
        self.content_hash
    }
}

/// Builder for [`CanonTx`].
pub struct TxBuilder {
    actor: String,
    rail: Rail,
    reason: String,
    evidence: Vec<EvidenceRef>,
    parent_root_hash: Option<RootHash>,
    ops: Vec<CanonOp>,
    timestamp: Option<DateTime<Utc>>,
}

impl TxBuilder {
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn evidence(mut self, evidence: EvidenceRef) -> Self {
        self.evidence.push(evidence);
        self
    }

    pub fn parent(mut self, root: RootHash) -> Self {
        self.parent_root_hash = Some(root);
        self
    }

    pub fn op(mut self, op: CanonOp) -> Self {
        self.ops.push(op);
        self
    }

    /// Set the audit timestamp. Defaults to now.
    pub fn timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts);
        self
    }

    /// Validate, hash, and freeze the transaction.
    pub fn build(mut self) -> Result<CanonTx> {
        if self.actor.is_empty() {
            return Err(CoreError::InvalidTx("actor is empty".into()));
        }
        if self.ops.is_empty() {
            return Err(CoreError::InvalidTx("transaction has no ops".into()));
        }
        sort_evidence(&mut self.evidence);

        let view = hashable_view(
            &self.ops,
            &self.actor,
            &self.reason,
            &self.evidence,
            self.parent_root_hash.as_ref(),
            self.rail,
        );
        let content_hash = hash_canonical(&view)?;
        let tx_id = TxId::derive(&self.actor, self.rail.as_str(), &view)?;

        Ok(CanonTx {
            tx_id,
            ops: self.ops,
            actor: self.actor,
            reason: self.reason,
            evidence: self.evidence,
            parent_root_hash: self.parent_root_hash,
            rail: self.rail,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            content_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_str;
    use chrono::TimeZone;
    use serde_json::json;

    fn entity(n: u32) -> EntityId {
        EntityId::derive("test", "entities", &n).unwrap()
    }

    fn set_op(entity_n: u32, path: &str, value: Value) -> CanonOp {
        CanonOp::builder(OpType::Set, entity(entity_n))
            .path(path)
            .value(value)
            .build()
            .unwrap()
    }

    fn sample_tx(actor: &str, reason: &str, rail: Rail, ts_millis: i64) -> CanonTx {
        CanonTx::builder(actor, rail)
            .reason(reason)
            .op(set_op(1, "name", json!("ada")))
            .op(set_op(2, "age", json!(36)))
            .timestamp(Utc.timestamp_millis_opt(ts_millis).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_op_type_wire_names() {
        for t in OpType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }

    #[test]
    fn test_op_id_derived_from_content() {
        let a = set_op(1, "name", json!("ada"));
        let b = set_op(1, "name", json!("ada"));
        let c = set_op(1, "name", json!("grace"));
        assert_eq!(a.op_id(), b.op_id());
        assert_ne!(a.op_id(), c.op_id());
    }

    #[test]
    fn test_op_requires_value() {
        let err = CanonOp::builder(OpType::Set, entity(1)).path("x").build();
        assert!(matches!(err, Err(CoreError::InvalidTx(_))));
        assert!(CanonOp::builder(OpType::Unset, entity(1)).path("x").build().is_ok());
    }

    #[test]
    fn test_op_evidence_sorted() {
        let op = CanonOp::builder(OpType::Link, entity(1))
            .evidence(EvidenceRef::new("z/doc", hash_str("z")))
            .evidence(EvidenceRef::new("a/doc", hash_str("a")))
            .build()
            .unwrap();
        assert_eq!(op.evidence()[0].path, "a/doc");
    }

    #[test]
    fn test_timestamp_excluded_from_hash() {
        let a = sample_tx("alice", "import", Rail::Truth, 1_000);
        let b = sample_tx("alice", "import", Rail::Truth, 9_999_999);
        assert_ne!(a.timestamp(), b.timestamp());
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.tx_id(), b.tx_id());
    }

    #[test]
    fn test_provenance_changes_hash() {
        let base = sample_tx("alice", "import", Rail::Truth, 0);
        assert_ne!(base.content_hash(), sample_tx("bob", "import", Rail::Truth, 0).content_hash());
        assert_ne!(base.content_hash(), sample_tx("alice", "fix", Rail::Truth, 0).content_hash());
        assert_ne!(
            base.content_hash(),
            sample_tx("alice", "import", Rail::Interpretation, 0).content_hash()
        );
    }

    #[test]
    fn test_op_and_evidence_order_irrelevant() {
        let op1 = set_op(1, "a", json!(1));
        let op2 = set_op(2, "b", json!(2));
        let e1 = EvidenceRef::new("doc/1", hash_str("1"));
        let e2 = EvidenceRef::new("doc/2", hash_str("2"));

        let forward = CanonTx::builder("alice", Rail::Truth)
            .op(op1.clone())
            .op(op2.clone())
            .evidence(e1.clone())
            .evidence(e2.clone())
            .build()
            .unwrap();
        let backward = CanonTx::builder("alice", Rail::Truth)
            .op(op2)
            .op(op1)
            .evidence(e2)
            .evidence(e1)
            .build()
            .unwrap();

        assert_eq!(forward.content_hash(), backward.content_hash());
        // construction order is still visible to callers
        assert_ne!(forward.ops()[0].op_id(), backward.ops()[0].op_id());
    }

    #[test]
    fn test_parent_root_changes_hash() {
        let op = set_op(1, "a", json!(1));
        let orphan = CanonTx::builder("alice", Rail::Truth).op(op.clone()).build().unwrap();
        let child = CanonTx::builder("alice", Rail::Truth)
            .op(op)
            .parent(hash_str("parent"))
            .build()
            .unwrap();
        assert_ne!(orphan.content_hash(), child.content_hash());
    }

    #[test]
    fn test_tx_validation() {
        assert!(matches!(
            CanonTx::builder("alice", Rail::Truth).build(),
            Err(CoreError::InvalidTx(_))
        ));
        assert!(matches!(
            CanonTx::builder("", Rail::Truth).op(set_op(1, "a", json!(1))).build(),
            Err(CoreError::InvalidTx(_))
        ));
    }

    #[test]
    fn test_hashable_view_shape() {
        let tx = sample_tx("alice", "import", Rail::Truth, 0);
        let canon = crate::canonical::to_canonical_string(&tx.hashable_view()).unwrap();
        assert!(canon.starts_with(r#"{"actor":"alice","evidence":[],"ops":["#));
        assert!(canon.ends_with(r#""rail":"truth","reason":"import"}"#));
        assert!(!canon.contains("timestamp"));
        assert_eq!(hash_str(&canon), tx.content_hash());
    }
}
