//! Decoded database values.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// A decoded MaxMind DB value.
///
/// Values form a tree: maps and arrays contain further values. Pointers in
/// the encoding are resolved during decoding and never surface here.
///
/// Unsigned integers appear as the narrowest variant the decoder selected:
/// values that fit the native word decode as [`Value::Uint64`] (or the
/// narrower typed variants), while 128-bit values that do not fit decode as
/// [`Value::Uint128`] through the wide arithmetic backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A UTF-8 string. Invalid sequences are replaced, not rejected.
    String(String),
    /// A 64-bit IEEE-754 float.
    Double(f64),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// A 16-bit unsigned integer.
    Uint16(u16),
    /// A 32-bit unsigned integer.
    Uint32(u32),
    /// A map with insertion-ordered keys.
    Map(Map),
    /// A 32-bit signed integer.
    Int32(i32),
    /// A 64-bit unsigned integer.
    Uint64(u64),
    /// A 128-bit unsigned integer that exceeded the native word.
    Uint128(u128),
    /// An array of values.
    Array(Vec<Value>),
    /// A boolean.
    Boolean(bool),
    /// A 32-bit IEEE-754 float.
    Float(f32),
}

impl Value {
    /// Returns the string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the byte value, if this is a bytes value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the map value, if this is a map.
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the array value, if this is an array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the boolean value, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns any unsigned integer variant that fits a `u64`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint16(v) => Some(u64::from(*v)),
            Value::Uint32(v) => Some(u64::from(*v)),
            Value::Uint64(v) => Some(*v),
            Value::Uint128(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Returns any unsigned integer variant widened to `u128`.
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            Value::Uint128(v) => Some(*v),
            _ => self.as_u64().map(u128::from),
        }
    }

    /// Returns the signed integer value, if this is an int32.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns either float variant widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Float(v) => Some(f64::from(*v)),
            _ => None,
        }
    }
}

/// A decoded map, preserving the key order of the encoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Map {
    entries: Vec<(String, Value)>,
}

impl Map {
    pub(crate) fn insert(&mut self, key: String, value: Value) {
        self.entries.push((key, value));
    }

    pub(crate) fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    /// Returns the value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Returns true if the map contains `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in encoding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates keys in encoding order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Uint16(v) => serializer.serialize_u16(*v),
            Value::Uint32(v) => serializer.serialize_u32(*v),
            Value::Map(m) => m.serialize(serializer),
            Value::Int32(v) => serializer.serialize_i32(*v),
            Value::Uint64(v) => serializer.serialize_u64(*v),
            Value::Uint128(v) => serializer.serialize_u128(*v),
            Value::Array(a) => {
                let mut seq = serializer.serialize_seq(Some(a.len()))?;
                for value in a {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Float(v) => serializer.serialize_f32(*v),
        }
    }
}

impl Serialize for Map {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
