//! Deterministic prefixed identifiers.
//!
//! An identifier is a pure function of `(prefix, seed, namespace, payload)`:
//!
//! ```text
//! payload_hash = H(canonicalize(payload))
//! combined     = seed ":" namespace ":" payload_hash
//! id           = prefix "_" H(combined)
//! ```
//!
//! No randomness, no counters. Same inputs, same id.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::canonical::hash_canonical;
use crate::error::{CanonError, CoreError};
use crate::hash::{hash_str, is_root_hash, RootHash};

/// Derive a raw prefixed identifier string.
pub fn create_id<T: Serialize + ?Sized>(
    prefix: &str,
    seed: &str,
    namespace: &str,
    payload: &T,
) -> Result<String, CanonError> {
    Ok(format!("{prefix}_{}", id_digest(seed, namespace, payload)?))
}

/// Hash part shared by [`create_id`] and the typed identifiers.
fn id_digest<T: Serialize + ?Sized>(
    seed: &str,
    namespace: &str,
    payload: &T,
) -> Result<RootHash, CanonError> {
    let payload_hash = hash_canonical(payload)?;
    Ok(hash_str(&format!("{seed}:{namespace}:{payload_hash}")))
}

macro_rules! prefixed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(RootHash);

        impl $name {
            /// Identifier prefix, without the trailing underscore.
            pub const PREFIX: &'static str = $prefix;

            /// Derive the identifier from its inputs.
            pub fn derive<T: Serialize + ?Sized>(
                seed: &str,
                namespace: &str,
                payload: &T,
            ) -> Result<Self, CanonError> {
                id_digest(seed, namespace, payload).map(Self)
            }

            /// Parse `prefix_<64 hex>`.
            pub fn parse(s: &str) -> Result<Self, CoreError> {
                let digest = s
                    .strip_prefix($prefix)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .filter(|rest| is_root_hash(rest))
                    .ok_or_else(|| CoreError::InvalidId(s.to_string()))?;
                Ok(Self(RootHash::from_hex(digest)?))
            }

            /// The hash part of the identifier.
            pub fn hash(&self) -> &RootHash {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}_{}...)", stringify!($name), $prefix, &self.0.to_hex()[..12])
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

prefixed_id!(
    /// Identifies an entity targeted by operations.
    EntityId,
    "ent"
);
prefixed_id!(
    /// Identifies a schema.
    SchemaId,
    "sch"
);
prefixed_id!(
    /// Identifies a single operation. Derived from the op's content.
    OpId,
    "op"
);
prefixed_id!(
    /// Identifies a transaction.
    TxId,
    "tx"
);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_shape() {
        let id = create_id("ent", "seed", "users", &json!({"name": "ada"})).unwrap();
        assert!(id.starts_with("ent_"));
        assert_eq!(id.len(), 4 + 64);
        assert!(is_root_hash(&id[4..]));
    }

    #[test]
    fn test_matches_manual_derivation() {
        let payload = json!({"b": 1, "a": 2});
        let payload_hash = hash_str(r#"{"a":2,"b":1}"#);
        let expected = format!("ent_{}", hash_str(&format!("s:ns:{payload_hash}")));
        assert_eq!(create_id("ent", "s", "ns", &payload).unwrap(), expected);
    }

    #[test]
    fn test_typed_id_agrees_with_raw() {
        let payload = json!({"k": [1, 2, 3]});
        let typed = EntityId::derive("s", "ns", &payload).unwrap();
        let raw = create_id(EntityId::PREFIX, "s", "ns", &payload).unwrap();
        assert_eq!(typed.to_string(), raw);
        assert_eq!(EntityId::parse(&raw).unwrap(), typed);
    }

    #[test]
    fn test_key_order_irrelevant() {
        let a = json!({"x": 1, "y": {"p": true, "q": null}});
        let b: serde_json::Value =
            serde_json::from_str(r#"{"y":{"q":null,"p":true},"x":1}"#).unwrap();
        assert_eq!(
            TxId::derive("s", "n", &a).unwrap(),
            TxId::derive("s", "n", &b).unwrap()
        );
    }

    #[test]
    fn test_parse_rejects_wrong_prefix_and_shape() {
        let id = SchemaId::derive("s", "n", &1).unwrap().to_string();
        assert!(SchemaId::parse(&id).is_ok());
        assert!(EntityId::parse(&id).is_err());
        assert!(SchemaId::parse("sch_abc").is_err());
        assert!(SchemaId::parse(&id.to_uppercase()).is_err());
        assert!(SchemaId::parse(&id.replacen('_', "-", 1)).is_err());
    }

    #[test]
    fn test_serde_roundtrip_as_string() {
        let id = OpId::derive("s", "n", "payload").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: OpId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_non_finite_payload_fails() {
        assert!(create_id("ent", "s", "n", &f64::NAN).is_err());
    }

    proptest! {
        #[test]
        fn prop_deterministic(seed in "[a-z0-9]{0,16}", ns in "[a-z]{0,8}", n in any::<i64>(), s in ".{0,24}") {
            let payload = json!({"n": n, "s": s});
            let first = create_id("ent", &seed, &ns, &payload).unwrap();
            for _ in 0..100 {
                prop_assert_eq!(&create_id("ent", &seed, &ns, &payload).unwrap(), &first);
            }
        }

        #[test]
        fn prop_sensitive_to_each_input(seed in "[a-z]{1,8}", ns in "[a-z]{1,8}", n in any::<i32>()) {
            let base = create_id("ent", &seed, &ns, &json!({"n": n})).unwrap();
            prop_assert_ne!(&base, &create_id("ent", &format!("{seed}x"), &ns, &json!({"n": n})).unwrap());
            prop_assert_ne!(&base, &create_id("ent", &seed, &format!("{ns}x"), &json!({"n": n})).unwrap());
            prop_assert_ne!(&base, &create_id("ent", &seed, &ns, &json!({"n": i64::from(n) + 1})).unwrap());
        }
    }
}
