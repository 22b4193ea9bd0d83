//! SHA-256 hashing with a strong `RootHash` type.
//!
//! Every digest in the system is a [`RootHash`]: 32 bytes, rendered as
//! exactly 64 lowercase hex characters. Parsing is strict so that a string
//! claiming to be a hash cannot smuggle in a different shape.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Separator used by [`hash_multi`] between inputs.
pub const MULTI_SEPARATOR: u8 = 0x00;

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootHash(pub [u8; 32]);

impl RootHash {
    /// Hash raw bytes.
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Hash the UTF-8 bytes of a string.
    pub fn of_str(data: &str) -> Self {
        Self::of_bytes(data.as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to the 64-char lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the 64-char lowercase hex form.
    ///
    /// Uppercase digits are rejected: a `RootHash` has exactly one spelling.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        if !is_root_hash(s) {
            return Err(CoreError::InvalidRootHash(s.to_string()));
        }
        let mut arr = [0u8; 32];
        hex::decode_to_slice(s, &mut arr).map_err(|_| CoreError::InvalidRootHash(s.to_string()))?;
        Ok(Self(arr))
    }

    /// The zero hash (sentinel value).
    pub const ZERO: Self = Self([0u8; 32]);
}

/// Check that `s` has the exact shape of a root hash.
pub fn is_root_hash(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

impl fmt::Debug for RootHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RootHash({}...)", &self.to_hex()[..12])
    }
}

impl fmt::Display for RootHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for RootHash {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl AsRef<[u8]> for RootHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for RootHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for RootHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RootHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Hash a UTF-8 string.
pub fn hash_str(input: &str) -> RootHash {
    RootHash::of_str(input)
}

/// Hash a byte buffer.
pub fn hash_bytes(input: &[u8]) -> RootHash {
    RootHash::of_bytes(input)
}

/// Hash several inputs joined by a NUL separator.
///
/// `hash_multi(&["ab", "c"])` differs from `hash_multi(&["a", "bc"])`.
pub fn hash_multi<S: AsRef<str>>(parts: &[S]) -> RootHash {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([MULTI_SEPARATOR]);
        }
        hasher.update(part.as_ref().as_bytes());
    }
    RootHash(hasher.finalize().into())
}

/// Check `input` against an expected hex digest, ignoring the digest's case.
pub fn verify_hash(input: &[u8], expected: &str) -> bool {
    hash_bytes(input).to_hex() == expected.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    const ABC: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn test_known_vectors() {
        assert_eq!(hash_str("").to_hex(), EMPTY);
        assert_eq!(hash_str("abc").to_hex(), ABC);
        assert_eq!(hash_bytes(b"abc"), hash_str("abc"));
    }

    #[test]
    fn test_hash_multi_is_unambiguous() {
        assert_ne!(hash_multi(&["ab", "c"]), hash_multi(&["a", "bc"]));
        assert_eq!(hash_multi(&["a", "b"]), hash_bytes(b"a\0b"));
        assert_eq!(hash_multi(&["abc"]), hash_str("abc"));
    }

    #[test]
    fn test_verify_is_case_insensitive_on_expected() {
        assert!(verify_hash(b"abc", ABC));
        assert!(verify_hash(b"abc", &ABC.to_uppercase()));
        assert!(!verify_hash(b"abd", ABC));
    }

    #[test]
    fn test_from_hex_rejects_bad_shapes() {
        assert!(RootHash::from_hex(ABC).is_ok());
        assert!(RootHash::from_hex(&ABC.to_uppercase()).is_err());
        assert!(RootHash::from_hex(&ABC[..63]).is_err());
        assert!(RootHash::from_hex(&format!("{ABC}0")).is_err());
        assert!(RootHash::from_hex(&ABC.replace('a', "g")).is_err());
        assert!(RootHash::from_hex("").is_err());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let h = hash_str("abc");
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{ABC}\""));
        let back: RootHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
        assert!(serde_json::from_str::<RootHash>("\"nothex\"").is_err());
    }

    #[test]
    fn test_display_is_full_hex() {
        let h = hash_str("abc");
        assert_eq!(h.to_string(), ABC);
        assert!(format!("{:?}", h).starts_with("RootHash("));
    }
}
