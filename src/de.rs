//! Typed extraction from decoded values via serde.

use serde::de::value::BorrowedStrDeserializer;
use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::forward_to_deserialize_any;

use crate::error::MmdbError;
use crate::value::Value;

/// Deserializes a `T` out of a decoded value tree.
pub(crate) fn from_value<'de, T>(value: &'de Value) -> Result<T, MmdbError>
where
    T: de::Deserialize<'de>,
{
    T::deserialize(ValueDeserializer { value })
}

struct ValueDeserializer<'de> {
    value: &'de Value,
}

impl<'de> Deserializer<'de> for ValueDeserializer<'de> {
    type Error = MmdbError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, MmdbError>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::String(s) => visitor.visit_borrowed_str(s),
            Value::Double(v) => visitor.visit_f64(*v),
            Value::Bytes(b) => visitor.visit_borrowed_bytes(b),
            Value::Uint16(v) => visitor.visit_u16(*v),
            Value::Uint32(v) => visitor.visit_u32(*v),
            Value::Map(m) => visitor.visit_map(MapAccessor {
                entries: m.entries(),
                index: 0,
            }),
            Value::Int32(v) => visitor.visit_i32(*v),
            Value::Uint64(v) => visitor.visit_u64(*v),
            Value::Uint128(v) => visitor.visit_u128(*v),
            Value::Array(a) => visitor.visit_seq(ArrayAccess { values: a.iter() }),
            Value::Boolean(b) => visitor.visit_bool(*b),
            Value::Float(v) => visitor.visit_f32(*v),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, MmdbError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct newtype_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }
}

struct MapAccessor<'de> {
    entries: &'de [(String, Value)],
    index: usize,
}

impl<'de> MapAccess<'de> for MapAccessor<'de> {
    type Error = MmdbError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, MmdbError>
    where
        K: DeserializeSeed<'de>,
    {
        match self.entries.get(self.index) {
            Some((key, _)) => seed
                .deserialize(BorrowedStrDeserializer::new(key))
                .map(Some),
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, MmdbError>
    where
        V: DeserializeSeed<'de>,
    {
        let (_, value) = self.entries.get(self.index).ok_or_else(|| {
            MmdbError::Deserialize("map value requested past the last entry".to_owned())
        })?;
        self.index += 1;
        seed.deserialize(ValueDeserializer { value })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len() - self.index)
    }
}

struct ArrayAccess<'de> {
    values: std::slice::Iter<'de, Value>,
}

impl<'de> SeqAccess<'de> for ArrayAccess<'de> {
    type Error = MmdbError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, MmdbError>
    where
        T: DeserializeSeed<'de>,
    {
        match self.values.next() {
            Some(value) => seed.deserialize(ValueDeserializer { value }).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.values.len())
    }
}
