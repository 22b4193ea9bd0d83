//! Canonical JSON encoding for deterministic hashing.
//!
//! This module is the only legal way to prepare a value for hashing:
//! - Object keys sorted by byte order, no whitespace
//! - Arrays keep caller order (sorting unordered collections is the caller's job)
//! - `-0` becomes `0`; non-finite numbers are rejected
//! - Dates render as their ISO-8601 instant (millisecond precision, `Z`)
//! - Big integers render as a quoted string with an `n` suffix
//! - `Undefined` is rejected, except as an object field where it is dropped
//!
//! Two values produce the same canonical string if and only if they are
//! structurally equivalent under these rules.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{self, Serialize};

use crate::error::{CanonError, CoreError};
use crate::hash::{hash_bytes, hash_str, RootHash};

/// Suffix marking a big integer in canonical form.
pub const BIGINT_MARKER: char = 'n';

/// Integral floats below this magnitude render without a fraction or exponent.
const INTEGRAL_FLOAT_LIMIT: f64 = 1e21;

/// The value universe accepted by the canonicalizer.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonValue {
    /// Absent value. Dropped as an object field, rejected anywhere else.
    Undefined,
    Null,
    Bool(bool),
    Integer(i128),
    Float(f64),
    /// Arbitrary-precision integer, never confused with a number.
    BigInt(i128),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<CanonValue>),
    Object(BTreeMap<String, CanonValue>),
}

impl CanonValue {
    /// Build an object from key/value pairs. Insertion order is irrelevant.
    pub fn object<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, CanonValue)>,
    {
        Self::Object(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Parse an RFC 3339 / ISO-8601 instant.
    pub fn date_from_iso(input: &str) -> Result<Self, CanonError> {
        DateTime::parse_from_rfc3339(input)
            .map(|dt| Self::Date(dt.with_timezone(&Utc)))
            .map_err(|_| CanonError::InvalidDate {
                path: "$".into(),
                input: input.to_string(),
            })
    }

    /// Build a date from Unix milliseconds.
    pub fn date_from_millis(millis: i64) -> Result<Self, CanonError> {
        DateTime::from_timestamp_millis(millis)
            .map(Self::Date)
            .ok_or_else(|| CanonError::InvalidDate {
                path: "$".into(),
                input: millis.to_string(),
            })
    }
}

impl From<&serde_json::Value> for CanonValue {
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i.into())
                } else if let Some(u) = n.as_u64() {
                    Self::Integer(u.into())
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Object(map.iter().map(|(k, v)| (k.clone(), Self::from(v))).collect())
            }
        }
    }
}

impl From<serde_json::Value> for CanonValue {
    fn from(value: serde_json::Value) -> Self {
        Self::from(&value)
    }
}

/// Location inside the value being canonicalized, for error messages.
#[derive(Clone, Copy)]
enum Path<'a> {
    Root,
    Key(&'a Path<'a>, &'a str),
    Index(&'a Path<'a>, usize),
}

impl fmt::Display for Path<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Path::Root => f.write_str("$"),
            Path::Key(parent, key) => write!(f, "{parent}.{key}"),
            Path::Index(parent, i) => write!(f, "{parent}[{i}]"),
        }
    }
}

/// Canonicalize a value.
pub fn canonicalize(value: &CanonValue) -> Result<String, CanonError> {
    let mut out = String::new();
    write_value(&mut out, value, Path::Root)?;
    Ok(out)
}

/// Canonicalize a JSON document.
pub fn canonicalize_json(value: &serde_json::Value) -> Result<String, CanonError> {
    canonicalize(&CanonValue::from(value))
}

/// Canonicalize any serializable value.
pub fn to_canonical_string<T: Serialize + ?Sized>(value: &T) -> Result<String, CanonError> {
    canonicalize(&to_canon_value(value)?)
}

/// Canonicalize then hash.
pub fn hash_canonical<T: Serialize + ?Sized>(value: &T) -> Result<RootHash, CanonError> {
    Ok(hash_str(&to_canonical_string(value)?))
}

/// Canonical bytes together with their hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub hash: RootHash,
}

/// Encode a JSON document canonically and hash the resulting bytes.
pub fn encode_with_hash(value: &serde_json::Value) -> Result<Encoded, CanonError> {
    let text = canonicalize_json(value)?;
    let hash = hash_str(&text);
    Ok(Encoded {
        bytes: text.into_bytes(),
        hash,
    })
}

/// A document read back from canonical bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub value: serde_json::Value,
    pub hash: RootHash,
}

/// Parse canonical bytes, rejecting anything not in canonical form.
pub fn decode_with_verify(bytes: &[u8]) -> Result<Decoded, CoreError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;
    if !is_canonical_encoding(&value, bytes)? {
        return Err(CoreError::NonCanonical);
    }
    Ok(Decoded {
        value,
        hash: hash_bytes(bytes),
    })
}

/// Check whether `bytes` is exactly the canonical encoding of `value`.
pub fn is_canonical_encoding(value: &serde_json::Value, bytes: &[u8]) -> Result<bool, CoreError> {
    Ok(canonicalize_json(value)?.as_bytes() == bytes)
}

fn write_value(out: &mut String, value: &CanonValue, path: Path<'_>) -> Result<(), CanonError> {
    match value {
        CanonValue::Undefined => {
            return Err(CanonError::Undefined {
                path: path.to_string(),
            })
        }
        CanonValue::Null => out.push_str("null"),
        CanonValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        CanonValue::Integer(i) => push_display(out, i),
        CanonValue::Float(f) => write_float(out, *f, path)?,
        CanonValue::BigInt(i) => {
            out.push('"');
            push_display(out, i);
            out.push(BIGINT_MARKER);
            out.push('"');
        }
        CanonValue::String(s) => write_string(out, s, path)?,
        CanonValue::Date(dt) => {
            out.push('"');
            out.push_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true));
            out.push('"');
        }
        CanonValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item, Path::Index(&path, i))?;
            }
            out.push(']');
        }
        CanonValue::Object(map) => {
            out.push('{');
            let mut first = true;
            for (key, item) in map {
                if matches!(item, CanonValue::Undefined) {
                    continue;
                }
                if !first {
                    out.push(',');
                }
                first = false;
                write_string(out, key, path)?;
                out.push(':');
                write_value(out, item, Path::Key(&path, key))?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_float(out: &mut String, f: f64, path: Path<'_>) -> Result<(), CanonError> {
    if !f.is_finite() {
        return Err(CanonError::NonFiniteNumber {
            path: path.to_string(),
            repr: f.to_string(),
        });
    }
    if f == 0.0 {
        // covers -0
        out.push('0');
    } else if f.fract() == 0.0 && f.abs() < INTEGRAL_FLOAT_LIMIT {
        push_display(out, &(f as i128));
    } else {
        let n = serde_json::Number::from_f64(f).ok_or_else(|| CanonError::NonFiniteNumber {
            path: path.to_string(),
            repr: f.to_string(),
        })?;
        push_display(out, &n);
    }
    Ok(())
}

fn write_string(out: &mut String, s: &str, path: Path<'_>) -> Result<(), CanonError> {
    let escaped = serde_json::to_string(s).map_err(|e| CanonError::Unsupported {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    out.push_str(&escaped);
    Ok(())
}

fn push_display<T: fmt::Display>(out: &mut String, value: &T) {
    // Writing to a String cannot fail.
    let _ = write!(out, "{value}");
}

// ─────────────────────────────────────────────────────────────────────────────
// Serde bridge: any `T: Serialize` into a CanonValue
// ─────────────────────────────────────────────────────────────────────────────

impl ser::Error for CanonError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        CanonError::Unsupported {
            path: "$".into(),
            reason: msg.to_string(),
        }
    }
}

/// Convert a serializable value into the canonical value universe.
///
/// Unlike `serde_json::to_value`, non-finite floats are an error rather
/// than `null`, and `i128`/`u128` become [`CanonValue::BigInt`].
pub fn to_canon_value<T: Serialize + ?Sized>(value: &T) -> Result<CanonValue, CanonError> {
    value.serialize(ValueSerializer)
}

struct ValueSerializer;

fn non_finite(v: f64) -> CanonError {
    CanonError::NonFiniteNumber {
        path: "$".into(),
        repr: v.to_string(),
    }
}

impl ser::Serializer for ValueSerializer {
    type Ok = CanonValue;
    type Error = CanonError;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = VariantSeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = VariantMapBuilder;

    fn serialize_bool(self, v: bool) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::Integer(v.into()))
    }

    fn serialize_i16(self, v: i16) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::Integer(v.into()))
    }

    fn serialize_i32(self, v: i32) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::Integer(v.into()))
    }

    fn serialize_i64(self, v: i64) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::Integer(v.into()))
    }

    fn serialize_i128(self, v: i128) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::BigInt(v))
    }

    fn serialize_u8(self, v: u8) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::Integer(v.into()))
    }

    fn serialize_u16(self, v: u16) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::Integer(v.into()))
    }

    fn serialize_u32(self, v: u32) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::Integer(v.into()))
    }

    fn serialize_u64(self, v: u64) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::Integer(v.into()))
    }

    fn serialize_u128(self, v: u128) -> Result<CanonValue, CanonError> {
        i128::try_from(v)
            .map(CanonValue::BigInt)
            .map_err(|_| CanonError::Unsupported {
                path: "$".into(),
                reason: format!("integer {v} exceeds 128-bit signed range"),
            })
    }

    fn serialize_f32(self, v: f32) -> Result<CanonValue, CanonError> {
        self.serialize_f64(v.into())
    }

    fn serialize_f64(self, v: f64) -> Result<CanonValue, CanonError> {
        if !v.is_finite() {
            return Err(non_finite(v));
        }
        Ok(CanonValue::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::Array(
            v.iter().map(|b| CanonValue::Integer((*b).into())).collect(),
        ))
    }

    fn serialize_none(self) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<CanonValue, CanonError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<CanonValue, CanonError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<CanonValue, CanonError> {
        let inner = value.serialize(ValueSerializer)?;
        Ok(CanonValue::object([(variant, inner)]))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, CanonError> {
        Ok(SeqBuilder {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, CanonError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, CanonError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantSeqBuilder, CanonError> {
        Ok(VariantSeqBuilder {
            variant,
            seq: SeqBuilder {
                items: Vec::with_capacity(len),
            },
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapBuilder, CanonError> {
        Ok(MapBuilder::default())
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<MapBuilder, CanonError> {
        Ok(MapBuilder::default())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<VariantMapBuilder, CanonError> {
        Ok(VariantMapBuilder {
            variant,
            map: MapBuilder::default(),
        })
    }
}

struct SeqBuilder {
    items: Vec<CanonValue>,
}

impl SeqBuilder {
    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CanonError> {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = CanonValue;
    type Error = CanonError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CanonError> {
        self.push(value)
    }

    fn end(self) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::Array(self.items))
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = CanonValue;
    type Error = CanonError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CanonError> {
        self.push(value)
    }

    fn end(self) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::Array(self.items))
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = CanonValue;
    type Error = CanonError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CanonError> {
        self.push(value)
    }

    fn end(self) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::Array(self.items))
    }
}

struct VariantSeqBuilder {
    variant: &'static str,
    seq: SeqBuilder,
}

impl ser::SerializeTupleVariant for VariantSeqBuilder {
    type Ok = CanonValue;
    type Error = CanonError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CanonError> {
        self.seq.push(value)
    }

    fn end(self) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::object([(
            self.variant,
            CanonValue::Array(self.seq.items),
        )]))
    }
}

#[derive(Default)]
struct MapBuilder {
    entries: BTreeMap<String, CanonValue>,
    pending_key: Option<String>,
}

impl MapBuilder {
    fn insert<T: Serialize + ?Sized>(&mut self, key: String, value: &T) -> Result<(), CanonError> {
        let value = value.serialize(ValueSerializer)?;
        self.entries.insert(key, value);
        Ok(())
    }
}

fn map_key(key: CanonValue) -> Result<String, CanonError> {
    match key {
        CanonValue::String(s) => Ok(s),
        CanonValue::Integer(i) => Ok(i.to_string()),
        CanonValue::Bool(b) => Ok(b.to_string()),
        other => Err(CanonError::Unsupported {
            path: "$".into(),
            reason: format!("map key must be a string, got {other:?}"),
        }),
    }
}

impl ser::SerializeMap for MapBuilder {
    type Ok = CanonValue;
    type Error = CanonError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), CanonError> {
        self.pending_key = Some(map_key(key.serialize(ValueSerializer)?)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CanonError> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| <CanonError as ser::Error>::custom("map value without key"))?;
        self.insert(key, value)
    }

    fn end(self) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::Object(self.entries))
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = CanonValue;
    type Error = CanonError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), CanonError> {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::Object(self.entries))
    }
}

struct VariantMapBuilder {
    variant: &'static str,
    map: MapBuilder,
}

impl ser::SerializeStructVariant for VariantMapBuilder {
    type Ok = CanonValue;
    type Error = CanonError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), CanonError> {
        self.map.insert(key.to_string(), value)
    }

    fn end(self) -> Result<CanonValue, CanonError> {
        Ok(CanonValue::object([(
            self.variant,
            CanonValue::Object(self.map.entries),
        )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_no_whitespace() {
        let a = CanonValue::object([("b", CanonValue::Integer(1)), ("a", CanonValue::Integer(2))]);
        let b = CanonValue::object([("a", CanonValue::Integer(2)), ("b", CanonValue::Integer(1))]);
        assert_eq!(canonicalize(&a).unwrap(), r#"{"a":2,"b":1}"#);
        assert_eq!(canonicalize(&a).unwrap(), canonicalize(&b).unwrap());
    }

    #[test]
    fn test_nested_structures() {
        let v = json!({"z": [3, 1, 2], "a": {"y": null, "x": true}, "m": "hi"});
        assert_eq!(
            canonicalize_json(&v).unwrap(),
            r#"{"a":{"x":true,"y":null},"m":"hi","z":[3,1,2]}"#
        );
    }

    #[test]
    fn test_array_order_preserved() {
        let v = json!([3, 1, 2]);
        assert_eq!(canonicalize_json(&v).unwrap(), "[3,1,2]");
    }

    #[test]
    fn test_negative_zero_normalized() {
        assert_eq!(canonicalize(&CanonValue::Float(-0.0)).unwrap(), "0");
        assert_eq!(canonicalize(&CanonValue::Float(0.0)).unwrap(), "0");
    }

    #[test]
    fn test_integral_float_matches_integer() {
        assert_eq!(
            canonicalize(&CanonValue::Float(42.0)).unwrap(),
            canonicalize(&CanonValue::Integer(42)).unwrap()
        );
        assert_eq!(canonicalize(&CanonValue::Float(1.5)).unwrap(), "1.5");
        assert_eq!(canonicalize(&CanonValue::Float(-2.25)).unwrap(), "-2.25");
    }

    #[test]
    fn test_non_finite_rejected() {
        for f in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = canonicalize(&CanonValue::Float(f)).unwrap_err();
            assert!(matches!(err, CanonError::NonFiniteNumber { .. }));
        }
    }

    #[test]
    fn test_non_finite_rejected_through_serde() {
        #[derive(Serialize)]
        struct Reading {
            value: f64,
        }
        let err = to_canonical_string(&Reading { value: f64::NAN }).unwrap_err();
        assert!(matches!(err, CanonError::NonFiniteNumber { .. }));
    }

    #[test]
    fn test_undefined_dropped_as_field_rejected_elsewhere() {
        let obj = CanonValue::object([("a", CanonValue::Integer(1)), ("gone", CanonValue::Undefined)]);
        assert_eq!(canonicalize(&obj).unwrap(), r#"{"a":1}"#);

        assert!(matches!(
            canonicalize(&CanonValue::Undefined),
            Err(CanonError::Undefined { .. })
        ));

        let arr = CanonValue::Array(vec![CanonValue::Integer(1), CanonValue::Undefined]);
        match canonicalize(&arr) {
            Err(CanonError::Undefined { path }) => assert_eq!(path, "$[1]"),
            other => panic!("expected undefined error, got {other:?}"),
        }
    }

    #[test]
    fn test_error_path_points_at_field() {
        let v = CanonValue::object([(
            "outer",
            CanonValue::object([("inner", CanonValue::Float(f64::INFINITY))]),
        )]);
        match canonicalize(&v) {
            Err(CanonError::NonFiniteNumber { path, .. }) => assert_eq!(path, "$.outer.inner"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_strings_json_escaped() {
        let v = CanonValue::String("a\"b\\c\nd\u{1}".into());
        assert_eq!(canonicalize(&v).unwrap(), r#""a\"b\\c\nd\u0001""#);
    }

    #[test]
    fn test_dates_render_as_iso_instant() {
        let d = CanonValue::date_from_millis(0).unwrap();
        assert_eq!(canonicalize(&d).unwrap(), r#""1970-01-01T00:00:00.000Z""#);

        let offset = CanonValue::date_from_iso("2026-01-14T13:00:00+01:00").unwrap();
        assert_eq!(canonicalize(&offset).unwrap(), r#""2026-01-14T12:00:00.000Z""#);

        assert!(matches!(
            CanonValue::date_from_iso("not a date"),
            Err(CanonError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_bigint_distinct_from_number() {
        let big = CanonValue::BigInt(12345);
        assert_eq!(canonicalize(&big).unwrap(), r#""12345n""#);
        assert_ne!(
            canonicalize(&big).unwrap(),
            canonicalize(&CanonValue::Integer(12345)).unwrap()
        );
        assert_eq!(to_canonical_string(&7i128).unwrap(), r#""7n""#);
    }

    #[test]
    fn test_serde_struct_matches_json() {
        #[derive(Serialize)]
        struct Point {
            y: i32,
            x: i32,
            label: Option<String>,
        }
        let p = Point { y: 2, x: 1, label: None };
        assert_eq!(to_canonical_string(&p).unwrap(), r#"{"label":null,"x":1,"y":2}"#);
        assert_eq!(
            to_canonical_string(&p).unwrap(),
            canonicalize_json(&json!({"x": 1, "y": 2, "label": null})).unwrap()
        );
    }

    #[test]
    fn test_serde_enums() {
        #[derive(Serialize)]
        enum Shape {
            Dot,
            Circle(u32),
            Rect { w: u32, h: u32 },
        }
        assert_eq!(to_canonical_string(&Shape::Dot).unwrap(), r#""Dot""#);
        assert_eq!(to_canonical_string(&Shape::Circle(3)).unwrap(), r#"{"Circle":3}"#);
        assert_eq!(
            to_canonical_string(&Shape::Rect { w: 1, h: 2 }).unwrap(),
            r#"{"Rect":{"h":2,"w":1}}"#
        );
    }

    #[test]
    fn test_encode_decode_verify() {
        let v = json!({"b": [1, 2.5, "x"], "a": {"k": false}});
        let encoded = encode_with_hash(&v).unwrap();
        let decoded = decode_with_verify(&encoded.bytes).unwrap();
        assert_eq!(decoded.value, v);
        assert_eq!(decoded.hash, encoded.hash);
    }

    #[test]
    fn test_decode_rejects_non_canonical() {
        let pretty = br#"{ "b": 1, "a": 2 }"#;
        assert!(matches!(decode_with_verify(pretty), Err(CoreError::NonCanonical)));
        assert!(matches!(
            decode_with_verify(b"{not json"),
            Err(CoreError::DecodingError(_))
        ));
    }

    #[test]
    fn test_determinism_repeated() {
        let v = json!({"k": [1, {"z": 1, "a": [true, null]}], "s": "text"});
        let first = canonicalize_json(&v).unwrap();
        for _ in 0..100 {
            assert_eq!(canonicalize_json(&v).unwrap(), first);
        }
    }
}
