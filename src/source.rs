//! Positioned reads over a seekable byte stream.

use std::io::{Read, Seek, SeekFrom};

use crate::error::MmdbError;

/// A seekable byte stream with its total length captured at construction.
///
/// The stream is owned for the lifetime of the `Source` and closed when it
/// is dropped. The cursor position between operations is unspecified; every
/// read seeks to an absolute offset first.
#[derive(Debug)]
pub(crate) struct Source<S> {
    stream: S,
    len: u64,
}

impl<S: Read + Seek> Source<S> {
    pub(crate) fn new(mut stream: S) -> Result<Source<S>, MmdbError> {
        let len = stream.seek(SeekFrom::End(0))?;
        Ok(Source { stream, len })
    }

    /// Total length of the stream, captured at construction. Offsets and
    /// sizes are validated against this value, not the live file.
    #[inline]
    pub(crate) fn len(&self) -> u64 {
        self.len
    }

    /// Reads exactly `buf.len()` bytes starting at `offset`.
    ///
    /// A read that would run past the captured end of the stream fails
    /// without touching the stream; a short read from the stream itself
    /// surfaces as an I/O error.
    pub(crate) fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), MmdbError> {
        let end = offset
            .checked_add(buf.len() as u64)
            .ok_or_else(|| MmdbError::corrupt_at("offset overflow", offset))?;
        if end > self.len {
            return Err(MmdbError::corrupt_at("read past end of database", offset));
        }
        self.stream.seek(SeekFrom::Start(offset))?;
        self.stream.read_exact(buf)?;
        Ok(())
    }

    /// Reads exactly `len` bytes starting at `offset` into a new buffer.
    pub(crate) fn read_vec_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, MmdbError> {
        let mut buf = vec![0; len];
        self.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }
}
