//! Golden test vectors for deterministic verification.
//!
//! These vectors pin the canonical form and its SHA-256 digest. Any
//! implementation that hashes the same values must reproduce them exactly.

use truth_kernel_core::{canonicalize_json, create_id, hash_str, GENESIS_HASH};

/// A golden canonicalization vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// JSON text fed to the canonicalizer.
    pub input: &'static str,
    /// Expected canonical string.
    pub canonical: &'static str,
    /// Expected SHA-256 of `canonical` (hex).
    pub hash: &'static str,
}

/// `H("OMEGA_GENESIS_2026")`.
pub const GENESIS_HEX: &str = "cf0ec626a28454d9f98b3057ee6bb4da6c3f1775e5525cf8ece84a98e23ed3e6";

/// `create_id("ent", "seed", "ns", {"a": 1})`.
pub const ENTITY_ID_VECTOR: &str =
    "ent_a58e85e9f8d15154cdfd80b42b63abc6ca94542751b01f332ca596c88b5b2369";

/// Get all golden canonicalization vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "keys sorted",
            input: r#"{"b":1,"a":2}"#,
            canonical: r#"{"a":2,"b":1}"#,
            hash: "d3626ac30a87e6f7a6428233b3c68299976865fa5508e4267c5415c76af7a772",
        },
        GoldenVector {
            name: "nested objects sorted, arrays kept in order",
            input: r#"{"z":{"y":[3,1,2],"x":null},"a":true}"#,
            canonical: r#"{"a":true,"z":{"x":null,"y":[3,1,2]}}"#,
            hash: "7890a8c7f09bdf0446c66585f175aff66fc2f159baf8333e8ec9ea7298610a67",
        },
        GoldenVector {
            name: "integral floats and negative zero",
            input: r#"{"n":1.0,"m":-0.0,"f":1.5}"#,
            canonical: r#"{"f":1.5,"m":0,"n":1}"#,
            hash: "cf191bf4b470dcd5804f3c5b53c8bf20b5788edab8d0dc9561986057d376ace2",
        },
        GoldenVector {
            name: "string escapes, non-ascii verbatim",
            input: r#"{"s":"é\n\"q\""}"#,
            canonical: r#"{"s":"é\n\"q\""}"#,
            hash: "8bd2bad512bf4ba464fd8eb07136acf712cee959b97a1b29925fedfd9a8a65ac",
        },
        GoldenVector {
            name: "empty object",
            input: "{}",
            canonical: "{}",
            hash: "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a",
        },
        GoldenVector {
            name: "empty array",
            input: "[]",
            canonical: "[]",
            hash: "4f53cda18c2baa0c0354bb5f9a3ecbe5ed12ab4d8e11ba873c2f11161202b945",
        },
        GoldenVector {
            name: "bare string",
            input: r#""plain""#,
            canonical: r#""plain""#,
            hash: "945603a8f587786b463c3f94fce115c0fae88fac2728cc96ddf5981cf7f61741",
        },
        GoldenVector {
            name: "negative integer",
            input: "-42",
            canonical: "-42",
            hash: "fec80006df0542549b4cbaafb8987eee00bb49bca396eefe9ac8be5b5928e8f6",
        },
    ]
}

/// Check one vector, describing the first mismatch.
pub fn verify_vector(vector: &GoldenVector) -> Result<(), String> {
    let value: serde_json::Value =
        serde_json::from_str(vector.input).map_err(|e| format!("{}: bad input: {e}", vector.name))?;
    let canonical = canonicalize_json(&value).map_err(|e| format!("{}: {e}", vector.name))?;
    if canonical != vector.canonical {
        return Err(format!(
            "{}: canonical {canonical} != {}",
            vector.name, vector.canonical
        ));
    }
    let hash = hash_str(&canonical).to_hex();
    if hash != vector.hash {
        return Err(format!("{}: hash {hash} != {}", vector.name, vector.hash));
    }
    Ok(())
}

/// Check every vector plus the fixed genesis and identifier values.
pub fn verify_all_vectors() -> Result<(), String> {
    for vector in all_vectors() {
        verify_vector(&vector)?;
    }
    if GENESIS_HASH.to_hex() != GENESIS_HEX {
        return Err(format!("genesis {} != {GENESIS_HEX}", GENESIS_HASH.to_hex()));
    }
    let id = create_id("ent", "seed", "ns", &serde_json::json!({"a": 1}))
        .map_err(|e| format!("create_id: {e}"))?;
    if id != ENTITY_ID_VECTOR {
        return Err(format!("create_id {id} != {ENTITY_ID_VECTOR}"));
    }
    Ok(())
}
