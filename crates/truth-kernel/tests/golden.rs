//! Golden vectors for cross-implementation verification.
//!
//! Every implementation of the kernel must produce identical canonical
//! strings and digests for these inputs.

use serde_json::json;
use truth_kernel::core::{hash_canonical, CanonValue};
use truth_kernel::{canonicalize_json, create_id, hash_str, GENESIS_HASH};
use truth_kernel_testkit::vectors::{all_vectors, verify_all_vectors, ENTITY_ID_VECTOR, GENESIS_HEX};

#[test]
fn test_vectors_verify() {
    if let Err(msg) = verify_all_vectors() {
        panic!("golden vector mismatch: {msg}");
    }
}

#[test]
fn test_vectors_deterministic() {
    for vector in all_vectors() {
        let value: serde_json::Value = serde_json::from_str(vector.input).unwrap();
        let first = canonicalize_json(&value).unwrap();
        for _ in 0..100 {
            assert_eq!(canonicalize_json(&value).unwrap(), first, "{}", vector.name);
        }
    }
}

#[test]
fn test_key_order_literal() {
    let a = canonicalize_json(&json!({"b": 1, "a": 2})).unwrap();
    let b = canonicalize_json(&json!({"a": 2, "b": 1})).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, r#"{"a":2,"b":1}"#);
}

#[test]
fn test_genesis_and_id_vectors() {
    assert_eq!(GENESIS_HASH.to_hex(), GENESIS_HEX);
    assert_eq!(*GENESIS_HASH, hash_str("OMEGA_GENESIS_2026"));
    assert_eq!(create_id("ent", "seed", "ns", &json!({"a": 1})).unwrap(), ENTITY_ID_VECTOR);
}

#[test]
fn test_typed_and_json_paths_agree() {
    #[derive(serde::Serialize)]
    struct Point {
        y: i32,
        x: i32,
    }
    let typed = hash_canonical(&Point { y: 2, x: 1 }).unwrap();
    let json = hash_str(&canonicalize_json(&json!({"x": 1, "y": 2})).unwrap());
    assert_eq!(typed, json);
}

#[test]
fn test_forbidden_values_fail() {
    let err = truth_kernel::core::canonicalize(&CanonValue::Float(f64::NAN)).unwrap_err();
    assert!(err.to_string().contains('$'));
    assert!(truth_kernel::core::canonicalize(&CanonValue::Undefined).is_err());
}
