//! Decoding of the type-tagged value encoding.
//!
//! Every encoded value starts with a control byte carrying 3 bits of type
//! and 5 bits of size, each with extension forms. The decoder reads at
//! absolute stream offsets and returns the decoded value together with the
//! offset of the first byte past the encoding, so containers can decode
//! their fields sequentially.

use std::io::{Read, Seek};

use crate::arith::{self, Acc};
use crate::error::MmdbError;
use crate::source::Source;
use crate::value::{Map, Value};

/// Pointers in well-formed databases only reference earlier offsets, so
/// chains are finite. The cap defends against crafted cycles.
const MAX_POINTER_DEPTH: usize = 512;

fn to_usize(base: u8, bytes: &[u8]) -> usize {
    bytes
        .iter()
        .fold(usize::from(base), |acc, &b| (acc << 8) | usize::from(b))
}

pub(crate) struct Decoder<'a, S> {
    source: &'a mut Source<S>,
    /// Base for pointer resolution: the data-section base for record
    /// decoding, the metadata start for metadata decoding.
    base_offset: u64,
    pointer_depth: usize,
}

impl<'a, S: Read + Seek> Decoder<'a, S> {
    pub(crate) fn new(source: &'a mut Source<S>, base_offset: u64) -> Decoder<'a, S> {
        Decoder {
            source,
            base_offset,
            pointer_depth: 0,
        }
    }

    /// Decodes the value at the absolute `offset`.
    pub(crate) fn decode(&mut self, offset: u64) -> Result<(Value, u64), MmdbError> {
        let ctrl_byte = self.read_byte(offset)?;
        let mut new_offset = offset + 1;

        let mut type_num = u16::from(ctrl_byte >> 5);

        // Pointers carry their payload in the raw size bits; the size
        // extension modes below do not apply to them.
        if type_num == 1 {
            return self.decode_pointer(usize::from(ctrl_byte & 0x1f), new_offset);
        }

        // Extended type
        if type_num == 0 {
            type_num = 7 + u16::from(self.read_byte(new_offset)?);
            new_offset += 1;
        }

        let (size, new_offset) = self.size_from_ctrl_byte(ctrl_byte, new_offset)?;
        self.decode_from_type(type_num, size, new_offset)
    }

    fn size_from_ctrl_byte(&mut self, ctrl_byte: u8, offset: u64) -> Result<(usize, u64), MmdbError> {
        let mut size = usize::from(ctrl_byte & 0x1f);
        if size < 29 {
            return Ok((size, offset));
        }

        let bytes_to_read = size - 28;
        let size_bytes = self.read_bytes(offset, bytes_to_read)?;
        size = match size {
            29 => 29 + usize::from(size_bytes[0]),
            30 => 285 + to_usize(0, &size_bytes),
            _ => 65_821 + to_usize(0, &size_bytes),
        };
        Ok((size, offset + bytes_to_read as u64))
    }

    fn decode_from_type(
        &mut self,
        type_num: u16,
        size: usize,
        offset: u64,
    ) -> Result<(Value, u64), MmdbError> {
        match type_num {
            2 => self.decode_string(size, offset),
            3 => self.decode_double(size, offset),
            4 => self.decode_bytes(size, offset),
            5 | 6 | 9 => self.decode_uint(type_num, size, offset),
            7 => self.decode_map(size, offset),
            8 => self.decode_int(size, offset),
            10 => self.decode_uint128(size, offset),
            11 => self.decode_array(size, offset),
            14 => self.decode_bool(size, offset),
            15 => self.decode_float(size, offset),
            u => Err(MmdbError::corrupt_at(
                format!("unknown data type: {u}"),
                offset,
            )),
        }
    }

    fn decode_pointer(&mut self, size: usize, offset: u64) -> Result<(Value, u64), MmdbError> {
        const POINTER_VALUE_OFFSET: [u64; 5] = [0, 0, 2048, 526_336, 0];

        let pointer_size = ((size >> 3) & 0x3) + 1;
        let pointer_bytes = self.read_bytes(offset, pointer_size)?;
        let new_offset = offset + pointer_size as u64;

        // The low 3 bits of the size field join the payload, except in the
        // 4-byte form where they are ignored.
        let base = if pointer_size == 4 {
            0
        } else {
            (size & 0x7) as u8
        };
        let unpacked = pointer_bytes
            .iter()
            .fold(u64::from(base), |acc, &b| (acc << 8) | u64::from(b));
        let target = self.base_offset + unpacked + POINTER_VALUE_OFFSET[pointer_size];

        if self.pointer_depth >= MAX_POINTER_DEPTH {
            return Err(MmdbError::corrupt_at(
                "pointer chain too deep",
                offset,
            ));
        }
        self.pointer_depth += 1;
        let result = self.decode(target);
        self.pointer_depth -= 1;

        let (value, _) = result?;
        Ok((value, new_offset))
    }

    fn decode_string(&mut self, size: usize, offset: u64) -> Result<(Value, u64), MmdbError> {
        let bytes = self.read_bytes(offset, size)?;
        Ok((Value::String(bytes_to_string(bytes)), offset + size as u64))
    }

    fn decode_double(&mut self, size: usize, offset: u64) -> Result<(Value, u64), MmdbError> {
        if size != 8 {
            return Err(MmdbError::corrupt_at(
                format!("double of size {size}"),
                offset,
            ));
        }
        let mut buf = [0; 8];
        self.source.read_exact_at(offset, &mut buf)?;
        Ok((Value::Double(f64::from_be_bytes(buf)), offset + 8))
    }

    fn decode_float(&mut self, size: usize, offset: u64) -> Result<(Value, u64), MmdbError> {
        if size != 4 {
            return Err(MmdbError::corrupt_at(
                format!("float of size {size}"),
                offset,
            ));
        }
        let mut buf = [0; 4];
        self.source.read_exact_at(offset, &mut buf)?;
        Ok((Value::Float(f32::from_be_bytes(buf)), offset + 4))
    }

    fn decode_bytes(&mut self, size: usize, offset: u64) -> Result<(Value, u64), MmdbError> {
        let bytes = self.read_bytes(offset, size)?;
        Ok((Value::Bytes(bytes), offset + size as u64))
    }

    fn decode_uint(
        &mut self,
        type_num: u16,
        size: usize,
        offset: u64,
    ) -> Result<(Value, u64), MmdbError> {
        let max_bytes = match type_num {
            5 => 2,
            6 => 4,
            _ => 8,
        };
        if size > max_bytes {
            return Err(MmdbError::corrupt_at(
                format!("u{} of size {size}", max_bytes * 8),
                offset,
            ));
        }

        let bytes = self.read_bytes(offset, size)?;
        let value = bytes
            .iter()
            .fold(0_u64, |acc, &b| (acc << 8) | u64::from(b));
        let value = match type_num {
            5 => Value::Uint16(value as u16),
            6 => Value::Uint32(value as u32),
            _ => Value::Uint64(value),
        };
        Ok((value, offset + size as u64))
    }

    fn decode_uint128(&mut self, size: usize, offset: u64) -> Result<(Value, u64), MmdbError> {
        if size > 16 {
            return Err(MmdbError::corrupt_at(
                format!("u128 of size {size}"),
                offset,
            ));
        }

        let bytes = self.read_bytes(offset, size)?;
        let backend = arith::select(size, bytes.first().copied().unwrap_or(0))?;
        let mut acc = Acc::Native(0);
        for &b in &bytes {
            acc = backend.shift_left(acc, 8)?;
            acc = backend.add(acc, b)?;
        }

        let value = match acc {
            Acc::Native(v) => Value::Uint64(v),
            #[cfg(feature = "bigint")]
            Acc::Wide(v) => Value::Uint128(v),
        };
        Ok((value, offset + size as u64))
    }

    fn decode_int(&mut self, size: usize, offset: u64) -> Result<(Value, u64), MmdbError> {
        if size > 4 {
            return Err(MmdbError::corrupt_at(
                format!("int32 of size {size}"),
                offset,
            ));
        }

        let bytes = self.read_bytes(offset, size)?;
        // The format guarantees nonnegative values for sizes below 4, so
        // zero-extension preserves the sign.
        let mut padded = [0; 4];
        padded[4 - size..].copy_from_slice(&bytes);
        Ok((
            Value::Int32(i32::from_be_bytes(padded)),
            offset + size as u64,
        ))
    }

    fn decode_map(&mut self, size: usize, offset: u64) -> Result<(Value, u64), MmdbError> {
        let mut map = Map::default();
        let mut new_offset = offset;

        for _ in 0..size {
            let (key, val_offset) = self.decode(new_offset)?;
            let (val, next_offset) = self.decode(val_offset)?;
            new_offset = next_offset;

            match key {
                Value::String(k) => map.insert(k, val),
                v => {
                    return Err(MmdbError::corrupt(format!(
                        "map key is not a string: {v:?}"
                    )))
                }
            }
        }
        Ok((Value::Map(map), new_offset))
    }

    fn decode_array(&mut self, size: usize, offset: u64) -> Result<(Value, u64), MmdbError> {
        let mut array = Vec::new();
        let mut new_offset = offset;

        for _ in 0..size {
            let (val, next_offset) = self.decode(new_offset)?;
            new_offset = next_offset;
            array.push(val);
        }
        Ok((Value::Array(array), new_offset))
    }

    fn decode_bool(&mut self, size: usize, offset: u64) -> Result<(Value, u64), MmdbError> {
        match size {
            0 | 1 => Ok((Value::Boolean(size != 0), offset)),
            s => Err(MmdbError::corrupt_at(
                format!("bool of size {s}"),
                offset,
            )),
        }
    }

    fn read_byte(&mut self, offset: u64) -> Result<u8, MmdbError> {
        let mut buf = [0; 1];
        self.source.read_exact_at(offset, &mut buf)?;
        Ok(buf[0])
    }

    fn read_bytes(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, MmdbError> {
        self.source.read_vec_at(offset, len)
    }
}

#[cfg(not(feature = "simdutf8"))]
fn bytes_to_string(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        // Invalid sequences are replaced rather than failing the decode.
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

#[cfg(feature = "simdutf8")]
fn bytes_to_string(bytes: Vec<u8>) -> String {
    match simdutf8::basic::from_utf8(&bytes) {
        Ok(s) => s.to_owned(),
        Err(_) => String::from_utf8_lossy(&bytes).into_owned(),
    }
}
