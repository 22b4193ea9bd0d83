//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Map, Number, Value};

use truth_kernel_core::{CanonOp, CanonTx, EntityId, OpType, Rail};

/// A finite float. NaN and infinities are not JSON values.
pub fn finite_f64() -> impl Strategy<Value = f64> {
    prop::num::f64::NORMAL | prop::num::f64::ZERO | prop::num::f64::SUBNORMAL
}

/// A scalar JSON value.
pub fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        finite_f64().prop_filter_map("finite", |f| Number::from_f64(f).map(Value::Number)),
        "[ -~é☃]{0,16}".prop_map(Value::String),
    ]
}

/// An arbitrary JSON document, up to a few levels deep.
pub fn json_value() -> impl Strategy<Value = Value> {
    json_leaf().prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..8)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// A JSON object as an insertion-ordered list of entries with distinct keys.
///
/// Shuffling the list and rebuilding the object exercises key-order invariance.
pub fn object_entries() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::btree_map("[a-z]{1,6}", json_leaf(), 1..10)
        .prop_map(|m| m.into_iter().collect::<Vec<_>>())
}

/// A key every adapter accepts.
pub fn persist_key() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9][a-zA-Z0-9._-]{0,40}".prop_map(String::from)
}

pub fn rail() -> impl Strategy<Value = Rail> {
    prop_oneof![Just(Rail::Truth), Just(Rail::Interpretation)]
}

/// A valid single-op transaction.
pub fn canon_tx() -> impl Strategy<Value = CanonTx> {
    ("[a-z]{1,8}", rail(), "[a-z ]{0,16}", any::<u32>(), json_leaf()).prop_map(
        |(actor, rail, reason, n, value)| tx_from_parts(&actor, rail, &reason, n, value),
    )
}

/// A chain of transactions.
pub fn canon_txs(max_len: usize) -> impl Strategy<Value = Vec<CanonTx>> {
    prop::collection::vec(canon_tx(), 1..=max_len.max(1))
}

/// Deterministic transaction from its parts. Panics only on inputs the
/// builders reject, which the strategies above never produce.
pub fn tx_from_parts(actor: &str, rail: Rail, reason: &str, n: u32, value: Value) -> CanonTx {
    let entity = EntityId::derive("testkit", "entity", &n).expect("u32 payload canonicalizes");
    let op = CanonOp::builder(OpType::Set, entity)
        .path("value")
        .value(value)
        .build()
        .expect("set op with value");
    CanonTx::builder(actor, rail)
        .reason(reason)
        .op(op)
        .build()
        .expect("non-empty actor and one op")
}
