//! Semantic payload values.
//!
//! A `Value` is the decoded form of a payload under its `Schema`. Records are
//! keyed by member name so equality does not depend on construction order.

use std::collections::BTreeMap;
use std::fmt;

use der::asn1::ObjectIdentifier;
use der::DateTime;

pub type Record = BTreeMap<String, Value>;

/// BIT STRING contents.
#[derive(Clone, PartialEq, Eq)]
pub struct BitValue {
    pub bytes: Vec<u8>,
    pub unused_bits: u8,
}

impl BitValue {
    /// Octet-aligned bit string.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            unused_bits: 0,
        }
    }
}

impl fmt::Debug for BitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BitValue({}, unused={})",
            hex::encode(&self.bytes),
            self.unused_bits
        )
    }
}

/// INTEGER contents as minimal big-endian two's complement.
///
/// Serials and CRL or manifest numbers run to 20 octets, so the value is not
/// narrowed to a machine integer until a caller asks for one.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct IntValue(Vec<u8>);

impl IntValue {
    /// Wrap two's complement octets, dropping redundant sign octets.
    #[must_use]
    pub fn from_twos_complement(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self(vec![0]);
        }
        let mut start = 0;
        while start + 1 < bytes.len() {
            let (head, next) = (bytes[start], bytes[start + 1]);
            let redundant = (head == 0x00 && next & 0x80 == 0) || (head == 0xff && next & 0x80 != 0);
            if !redundant {
                break;
            }
            start += 1;
        }
        Self(bytes[start..].to_vec())
    }

    /// Non-negative value from unsigned big-endian magnitude octets.
    #[must_use]
    pub fn from_unsigned(magnitude: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(magnitude.len() + 1);
        bytes.push(0);
        bytes.extend_from_slice(magnitude);
        Self::from_twos_complement(&bytes)
    }

    /// Minimal two's complement content octets, as carried in DER.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.0[0] & 0x80 != 0
    }

    /// Unsigned magnitude octets without a sign octet, `None` when negative.
    #[must_use]
    pub fn to_unsigned_bytes(&self) -> Option<&[u8]> {
        if self.is_negative() {
            return None;
        }
        match self.0.as_slice() {
            [0, rest @ ..] if !rest.is_empty() => Some(rest),
            all => Some(all),
        }
    }

    #[must_use]
    pub fn to_i64(&self) -> Option<i64> {
        if self.0.len() > 8 {
            return None;
        }
        let fill = if self.is_negative() { 0xff } else { 0x00 };
        let mut buf = [fill; 8];
        buf[8 - self.0.len()..].copy_from_slice(&self.0);
        Some(i64::from_be_bytes(buf))
    }

    #[must_use]
    pub fn to_u64(&self) -> Option<u64> {
        let magnitude = self.to_unsigned_bytes()?;
        if magnitude.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[8 - magnitude.len()..].copy_from_slice(magnitude);
        Some(u64::from_be_bytes(buf))
    }
}

impl From<i64> for IntValue {
    fn from(n: i64) -> Self {
        Self::from_twos_complement(&n.to_be_bytes())
    }
}

impl From<i32> for IntValue {
    fn from(n: i32) -> Self {
        Self::from(i64::from(n))
    }
}

impl From<u64> for IntValue {
    fn from(n: u64) -> Self {
        Self::from_unsigned(&n.to_be_bytes())
    }
}

impl From<u32> for IntValue {
    fn from(n: u32) -> Self {
        Self::from(u64::from(n))
    }
}

impl From<u8> for IntValue {
    fn from(n: u8) -> Self {
        Self::from(u64::from(n))
    }
}

impl fmt::Display for IntValue {
    /// Decimal when it fits 64 bits, otherwise `0x` and the magnitude in hex.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(n) = self.to_i64() {
            return write!(f, "{n}");
        }
        match self.to_unsigned_bytes() {
            Some(magnitude) => write!(f, "0x{}", hex::encode(magnitude)),
            None => write!(f, "-0x{}", hex::encode(negate(&self.0))),
        }
    }
}

impl fmt::Debug for IntValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IntValue({self})")
    }
}

/// Two's complement negation of a big-endian octet string.
fn negate(bytes: &[u8]) -> Vec<u8> {
    let mut out: Vec<u8> = bytes.iter().map(|b| !b).collect();
    for byte in out.iter_mut().rev() {
        let (sum, carry) = byte.overflowing_add(1);
        *byte = sum;
        if !carry {
            break;
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Boolean(bool),
    Integer(IntValue),
    Utf8(String),
    Ia5(String),
    Octets(Vec<u8>),
    Bits(BitValue),
    Oid(ObjectIdentifier),
    Time(DateTime),
    Null,
    /// Complete DER TLV of an opaque element.
    Any(Vec<u8>),
    Record(Record),
    List(Vec<Value>),
    /// Selected alternative name and its value.
    Choice(String, Box<Value>),
}

impl Value {
    /// Build a record from `(name, value)` pairs.
    pub fn record<K, I>(members: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Record(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn int(n: impl Into<IntValue>) -> Self {
        Value::Integer(n.into())
    }

    pub fn utf8(text: impl Into<String>) -> Self {
        Value::Utf8(text.into())
    }

    pub fn ia5(text: impl Into<String>) -> Self {
        Value::Ia5(text.into())
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Utf8(_) => "utf8",
            Value::Ia5(_) => "ia5",
            Value::Octets(_) => "octets",
            Value::Bits(_) => "bits",
            Value::Oid(_) => "oid",
            Value::Time(_) => "time",
            Value::Null => "null",
            Value::Any(_) => "any",
            Value::Record(_) => "record",
            Value::List(_) => "list",
            Value::Choice(..) => "choice",
        }
    }

    /// Member of a record, `None` for other kinds.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(members) => members.get(name),
            _ => None,
        }
    }

    /// Integer narrowed to `i64`, `None` for other kinds or wider values.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        self.as_int().and_then(IntValue::to_i64)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&IntValue> {
        match self {
            Value::Integer(n) => Some(n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Utf8(s) | Value::Ia5(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_octets(&self) -> Option<&[u8]> {
        match self {
            Value::Octets(bytes) => Some(bytes),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bits(&self) -> Option<&BitValue> {
        match self {
            Value::Bits(bits) => Some(bits),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_oid(&self) -> Option<ObjectIdentifier> {
        match self {
            Value::Oid(oid) => Some(*oid),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_time(&self) -> Option<DateTime> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// JSON rendering used by the command-line inspector.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Boolean(b) => Json::Bool(*b),
            Value::Integer(n) => match n.to_i64() {
                Some(small) => Json::from(small),
                None => Json::String(n.to_string()),
            },
            Value::Utf8(s) | Value::Ia5(s) => Json::String(s.clone()),
            Value::Octets(bytes) | Value::Any(bytes) => Json::String(hex::encode(bytes)),
            Value::Bits(bits) if bits.unused_bits == 0 => Json::String(hex::encode(&bits.bytes)),
            Value::Bits(bits) => serde_json::json!({
                "bytes": hex::encode(&bits.bytes),
                "unused_bits": bits.unused_bits,
            }),
            Value::Oid(oid) => Json::String(oid.to_string()),
            Value::Time(t) => Json::String(t.to_string()),
            Value::Null => Json::Null,
            Value::Record(members) => Json::Object(
                members
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Choice(name, inner) => {
                let mut map = serde_json::Map::new();
                map.insert(name.clone(), inner.to_json());
                Json::Object(map)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_equality_ignores_insertion_order() {
        let a = Value::record([("x", Value::int(1i64)), ("y", Value::utf8("two"))]);
        let b = Value::record([("y", Value::utf8("two")), ("x", Value::int(1i64))]);
        assert_eq!(a, b);
        assert_eq!(a.get("x").and_then(Value::as_integer), Some(1));
        assert_eq!(a.get("y").and_then(Value::as_str), Some("two"));
        assert!(a.get("z").is_none());
    }

    #[test]
    fn json_rendering() {
        let v = Value::record([
            ("msg", Value::utf8("hello")),
            ("hash", Value::Bits(BitValue::from_bytes(vec![0xab, 0xcd]))),
            ("items", Value::List(vec![Value::int(7i64), Value::Null])),
            ("serial", Value::Integer(IntValue::from_unsigned(&[0xff; 9]))),
        ]);
        let json = v.to_json();
        assert_eq!(json["msg"], "hello");
        assert_eq!(json["hash"], "abcd");
        assert_eq!(json["items"][0], 7);
        assert!(json["items"][1].is_null());
        assert_eq!(json["serial"], "0xffffffffffffffffff");
    }

    #[test]
    fn integers_keep_minimal_twos_complement() {
        assert_eq!(IntValue::from(0i64).as_bytes(), [0x00]);
        assert_eq!(IntValue::from(127i64).as_bytes(), [0x7f]);
        assert_eq!(IntValue::from(128i64).as_bytes(), [0x00, 0x80]);
        assert_eq!(IntValue::from(-1i64).as_bytes(), [0xff]);
        assert_eq!(IntValue::from(-129i64).as_bytes(), [0xff, 0x7f]);
        assert_eq!(IntValue::from(u64::MAX).as_bytes().len(), 9);
        assert_eq!(IntValue::from(u64::MAX).to_u64(), Some(u64::MAX));
        assert_eq!(IntValue::from(u64::MAX).to_i64(), None);
        assert_eq!(IntValue::from(-5i64).to_u64(), None);
        assert_eq!(IntValue::from(-5i64).to_string(), "-5");
    }

    #[test]
    fn wide_integers_do_not_narrow() {
        let serial = IntValue::from_unsigned(&[0x80; 20]);
        assert_eq!(serial.as_bytes().len(), 21);
        assert_eq!(serial.to_unsigned_bytes(), Some(&[0x80; 20][..]));
        assert_eq!(serial.to_u64(), None);
        assert!(!serial.is_negative());

        let negative = IntValue::from_twos_complement(&[0xff, 0x80, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(negative.as_bytes().len(), 9);
        assert_eq!(negative.to_string(), "-0x800000000000000000");
        assert_eq!(Value::Integer(negative).as_integer(), None);
    }
}
