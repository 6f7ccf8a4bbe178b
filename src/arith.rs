//! Arithmetic backends for decoding big-endian unsigned integers.
//!
//! The format encodes unsigned integers up to 128 bits wide. Values that fit
//! a native word accumulate in `u64`; wider values require the `u128`
//! backend, compiled in through the `bigint` feature (on by default).
//! Decoding a wide value without that backend fails with
//! [`MmdbError::PlatformLimit`].

use crate::error::MmdbError;

/// Width of the native accumulator word in bytes.
pub(crate) const NATIVE_WORD_BYTES: usize = std::mem::size_of::<u64>();

/// An in-progress unsigned integer accumulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Acc {
    Native(u64),
    #[cfg(feature = "bigint")]
    Wide(u128),
}

/// One big-endian accumulation step is `shift_left` by 8 followed by `add`
/// of the next byte. `bits` outside `0..=8` is a programmer error.
pub(crate) trait Arithmetic {
    fn shift_left(&self, acc: Acc, bits: u32) -> Result<Acc, MmdbError>;
    fn add(&self, acc: Acc, byte: u8) -> Result<Acc, MmdbError>;
}

/// Selects the backend for a `size`-byte unsigned integer whose most
/// significant byte is `high_byte`: native when the value provably fits a
/// signed native word, the wide backend otherwise.
pub(crate) fn select(size: usize, high_byte: u8) -> Result<&'static dyn Arithmetic, MmdbError> {
    if size < NATIVE_WORD_BYTES || (size == NATIVE_WORD_BYTES && high_byte & 0x80 == 0) {
        return Ok(&NativeArithmetic);
    }

    #[cfg(feature = "bigint")]
    {
        Ok(&WideArithmetic)
    }
    #[cfg(not(feature = "bigint"))]
    {
        Err(MmdbError::PlatformLimit(format!(
            "{size}-byte unsigned integer requires the bigint feature"
        )))
    }
}

pub(crate) struct NativeArithmetic;

impl Arithmetic for NativeArithmetic {
    fn shift_left(&self, acc: Acc, bits: u32) -> Result<Acc, MmdbError> {
        debug_assert!(bits <= 8, "shift_left by more than 8 bits");
        match acc {
            Acc::Native(v) => v
                .checked_mul(1 << bits)
                .map(Acc::Native)
                .ok_or_else(|| {
                    MmdbError::PlatformLimit("unsigned integer exceeds native word".to_owned())
                }),
            #[cfg(feature = "bigint")]
            Acc::Wide(_) => Err(MmdbError::PlatformLimit(
                "wide accumulator on native backend".to_owned(),
            )),
        }
    }

    fn add(&self, acc: Acc, byte: u8) -> Result<Acc, MmdbError> {
        match acc {
            Acc::Native(v) => v
                .checked_add(u64::from(byte))
                .map(Acc::Native)
                .ok_or_else(|| {
                    MmdbError::PlatformLimit("unsigned integer exceeds native word".to_owned())
                }),
            #[cfg(feature = "bigint")]
            Acc::Wide(_) => Err(MmdbError::PlatformLimit(
                "wide accumulator on native backend".to_owned(),
            )),
        }
    }
}

#[cfg(feature = "bigint")]
pub(crate) struct WideArithmetic;

#[cfg(feature = "bigint")]
impl WideArithmetic {
    fn widen(acc: Acc) -> u128 {
        match acc {
            Acc::Native(v) => u128::from(v),
            Acc::Wide(v) => v,
        }
    }
}

#[cfg(feature = "bigint")]
impl Arithmetic for WideArithmetic {
    fn shift_left(&self, acc: Acc, bits: u32) -> Result<Acc, MmdbError> {
        debug_assert!(bits <= 8, "shift_left by more than 8 bits");
        Self::widen(acc)
            .checked_mul(1 << bits)
            .map(Acc::Wide)
            .ok_or_else(|| MmdbError::PlatformLimit("unsigned integer exceeds 128 bits".to_owned()))
    }

    fn add(&self, acc: Acc, byte: u8) -> Result<Acc, MmdbError> {
        Self::widen(acc)
            .checked_add(u128::from(byte))
            .map(Acc::Wide)
            .ok_or_else(|| MmdbError::PlatformLimit("unsigned integer exceeds 128 bits".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accumulate(bytes: &[u8]) -> Result<Acc, MmdbError> {
        let backend = select(bytes.len(), bytes.first().copied().unwrap_or(0))?;
        let mut acc = Acc::Native(0);
        for &b in bytes {
            acc = backend.shift_left(acc, 8)?;
            acc = backend.add(acc, b)?;
        }
        Ok(acc)
    }

    #[test]
    fn test_select_native_below_word() {
        for size in 0..NATIVE_WORD_BYTES {
            assert!(select(size, 0xFF).is_ok());
        }
        assert_eq!(accumulate(&[0xFF; 7]).unwrap(), Acc::Native((1 << 56) - 1));
    }

    #[test]
    fn test_select_on_word_boundary() {
        // Eight bytes with a clear top bit fit a signed native word.
        let acc = accumulate(&[0x7F, 0, 0, 0, 0, 0, 0, 1]).unwrap();
        assert_eq!(acc, Acc::Native(0x7F00_0000_0000_0001));
    }

    #[cfg(feature = "bigint")]
    #[test]
    fn test_wide_promotion() {
        // Top bit set on the eighth byte pushes onto the wide backend.
        let acc = accumulate(&[0x80, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(acc, Acc::Wide(1 << 63));

        let mut bytes = vec![0x80];
        bytes.extend_from_slice(&[0; 15]);
        assert_eq!(accumulate(&bytes).unwrap(), Acc::Wide(1 << 127));
    }

    #[cfg(not(feature = "bigint"))]
    #[test]
    fn test_wide_unavailable() {
        let err = accumulate(&[0x80, 0, 0, 0, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, MmdbError::PlatformLimit(_)));
    }

    #[test]
    fn test_native_overflow_guard() {
        let backend = NativeArithmetic;
        let err = backend.shift_left(Acc::Native(u64::MAX), 8).unwrap_err();
        assert!(matches!(err, MmdbError::PlatformLimit(_)));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "more than 8 bits")]
    fn test_shift_out_of_range() {
        let _ = NativeArithmetic.shift_left(Acc::Native(1), 9);
    }
}
