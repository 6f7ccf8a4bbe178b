//! The crate-wide error type.

use std::fmt;
use std::io;

use ipnetwork::IpNetworkError;
use serde::de;
use thiserror::Error;

/// Everything that can go wrong while opening a database or looking up an
/// address.
///
/// Corruption errors carry the absolute stream offset of the offending
/// bytes whenever the decoder knows it; [`MmdbError::offset`] exposes it
/// regardless of variant.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MmdbError {
    /// The stream is not a well-formed MaxMind DB: some structural rule of
    /// the format was violated, or a read ran past the captured end.
    #[error("corrupt database{}: {reason}", fmt_offset(.offset))]
    Corrupt {
        /// Which rule the encoding broke.
        reason: String,
        /// Absolute stream offset of the offending bytes, when known.
        offset: Option<u64>,
    },

    /// Seeking or reading the underlying stream failed.
    #[error("stream error: {0}")]
    Io(#[from] io::Error),

    /// Mapping the database file into memory failed.
    #[cfg(feature = "mmap")]
    #[error("cannot map database: {0}")]
    Mmap(#[source] io::Error),

    /// A decoded value could not be turned into the requested Rust type.
    #[error("deserialize: {0}")]
    Deserialize(String),

    /// A matched prefix could not be expressed as a network.
    #[error(transparent)]
    Network(#[from] IpNetworkError),

    /// A caller-supplied argument was unusable (not a file, record index
    /// or node index out of range).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The decoded integer needs the wide arithmetic backend, which is not
    /// compiled in (`bigint` feature).
    #[error("platform limit: {0}")]
    PlatformLimit(String),
}

fn fmt_offset(offset: &Option<u64>) -> String {
    match offset {
        Some(off) => format!(" at byte {off}"),
        None => String::new(),
    }
}

impl MmdbError {
    /// A corruption error with no specific location.
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        MmdbError::Corrupt {
            reason: reason.into(),
            offset: None,
        }
    }

    /// A corruption error pinned to a stream offset.
    pub(crate) fn corrupt_at(reason: impl Into<String>, offset: u64) -> Self {
        MmdbError::Corrupt {
            reason: reason.into(),
            offset: Some(offset),
        }
    }

    /// The stream offset associated with this error, if it carries one.
    pub fn offset(&self) -> Option<u64> {
        match self {
            MmdbError::Corrupt { offset, .. } => *offset,
            _ => None,
        }
    }
}

impl de::Error for MmdbError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        MmdbError::Deserialize(msg.to_string())
    }
}
