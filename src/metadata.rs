//! Database metadata types and discovery.

use std::collections::BTreeMap;
use std::io::{Read, Seek};

use serde::{Deserialize, Serialize};

use crate::de;
use crate::decoder::Decoder;
use crate::error::MmdbError;
use crate::source::Source;
use crate::value::{Map, Value};

/// Marker separating the data section from the metadata map.
const METADATA_START_MARKER: &[u8] = b"\xab\xcd\xefMaxMind.com";

/// The metadata map starts within the final 128 KiB of the file.
const METADATA_MAX_SIZE: u64 = 128 * 1024;

/// Metadata about the MaxMind DB file.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Metadata {
    /// Major version of the binary format (always 2).
    pub binary_format_major_version: u16,
    /// Minor version of the binary format (always 0).
    pub binary_format_minor_version: u16,
    /// Unix timestamp when the database was built.
    pub build_epoch: u64,
    /// Database type (e.g., "GeoIP2-City", "GeoLite2-Country").
    pub database_type: String,
    /// Map of language codes to database descriptions.
    pub description: BTreeMap<String, String>,
    /// IP version supported (4 or 6).
    pub ip_version: u16,
    /// Languages available in the database.
    pub languages: Vec<String>,
    /// Number of nodes in the search tree.
    pub node_count: u32,
    /// Size of each record in bits (24, 28, or 32).
    pub record_size: u16,
    #[serde(skip)]
    raw: Map,
}

impl Metadata {
    /// Decodes the metadata map starting at `metadata_start`. Pointers in
    /// the metadata section are relative to its start.
    pub(crate) fn load<S: Read + Seek>(
        source: &mut Source<S>,
        metadata_start: u64,
    ) -> Result<Metadata, MmdbError> {
        let mut decoder = Decoder::new(source, metadata_start);
        let (value, _) = decoder.decode(metadata_start)?;

        if !matches!(value, Value::Map(_)) {
            return Err(MmdbError::corrupt_at(
                format!("metadata is not a map: {value:?}"),
                metadata_start,
            ));
        }

        let mut metadata: Metadata = de::from_value(&value)?;
        let Value::Map(raw) = value else { unreachable!() };
        metadata.raw = raw;
        Ok(metadata)
    }

    pub(crate) fn validate(&self) -> Result<(), MmdbError> {
        if self.ip_version != 4 && self.ip_version != 6 {
            return Err(MmdbError::corrupt(format!(
                "ip_version must be 4 or 6, found {}",
                self.ip_version
            )));
        }
        if self.record_size != 24 && self.record_size != 28 && self.record_size != 32 {
            return Err(MmdbError::corrupt(format!(
                "record_size must be 24, 28, or 32, found {}",
                self.record_size
            )));
        }
        Ok(())
    }

    /// The full decoded metadata map, including keys this struct does not
    /// model. Key order matches the encoding.
    pub fn raw(&self) -> &Map {
        &self.raw
    }

    /// Returns the database build time as a `SystemTime`.
    #[must_use]
    pub fn build_time(&self) -> std::time::SystemTime {
        std::time::UNIX_EPOCH + std::time::Duration::from_secs(self.build_epoch)
    }
}

/// Scans the trailing window of the stream for the metadata marker and
/// returns the offset just past it: the start of the metadata map.
pub(crate) fn find_metadata_start<S: Read + Seek>(
    source: &mut Source<S>,
) -> Result<u64, MmdbError> {
    let len = source.len();
    let window_start = len.saturating_sub(METADATA_MAX_SIZE + METADATA_START_MARKER.len() as u64);
    let window = source.read_vec_at(window_start, (len - window_start) as usize)?;

    memchr::memmem::rfind(&window, METADATA_START_MARKER)
        .map(|index| window_start + (index + METADATA_START_MARKER.len()) as u64)
        .ok_or_else(|| MmdbError::corrupt("no metadata marker in the trailing 128 KiB"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scan(bytes: Vec<u8>) -> Result<u64, MmdbError> {
        let mut source = Source::new(Cursor::new(bytes)).unwrap();
        find_metadata_start(&mut source)
    }

    #[test]
    fn test_marker_at_tail() {
        let mut bytes = vec![0; 100];
        bytes.extend(METADATA_START_MARKER);
        bytes.extend([0xE0]); // empty map
        assert_eq!(scan(bytes).unwrap(), 114);
    }

    #[test]
    fn test_last_marker_wins() {
        let mut bytes = Vec::new();
        bytes.extend(METADATA_START_MARKER);
        bytes.extend(vec![0; 50]);
        bytes.extend(METADATA_START_MARKER);
        assert_eq!(scan(bytes).unwrap(), (14 + 50 + 14) as u64);
    }

    #[test]
    fn test_marker_absent() {
        let err = scan(vec![0; 4096]).unwrap_err();
        assert!(matches!(err, MmdbError::Corrupt { .. }));
    }

    #[test]
    fn test_marker_outside_window() {
        // A marker buried deeper than 128 KiB from the end is not found.
        let mut bytes = Vec::new();
        bytes.extend(METADATA_START_MARKER);
        bytes.extend(vec![0; 200 * 1024]);
        let err = scan(bytes).unwrap_err();
        assert!(matches!(err, MmdbError::Corrupt { .. }));
    }

    #[test]
    fn test_validate() {
        let metadata = Metadata {
            binary_format_major_version: 2,
            binary_format_minor_version: 0,
            build_epoch: 0,
            database_type: "Test".to_owned(),
            description: BTreeMap::new(),
            ip_version: 4,
            languages: vec![],
            node_count: 0,
            record_size: 24,
            raw: Map::default(),
        };
        assert!(metadata.validate().is_ok());

        let bad_version = Metadata {
            ip_version: 5,
            ..metadata.clone()
        };
        assert!(bad_version.validate().is_err());

        let bad_record_size = Metadata {
            record_size: 30,
            ..metadata
        };
        assert!(bad_record_size.validate().is_err());
    }
}
