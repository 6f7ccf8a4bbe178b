//! MaxMind DB reader implementation.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::net::IpAddr;
use std::path::Path;

use log::debug;

#[cfg(feature = "mmap")]
use memmap2::{Mmap, MmapOptions};
#[cfg(feature = "mmap")]
use std::io::Cursor;

use crate::decoder::Decoder;
use crate::error::MmdbError;
use crate::metadata::{self, Metadata};
use crate::result::LookupResult;
use crate::source::Source;

/// Size of the data section separator (16 zero bytes).
const DATA_SECTION_SEPARATOR_SIZE: u64 = 16;

/// A reader for the MaxMind DB format over a seekable byte stream.
///
/// The reader owns its stream exclusively and maintains a single cursor, so
/// lookups take `&mut self`. One reader serves one thread; multiple readers
/// over the same file are independent and safe. The stream is closed when
/// the reader is dropped.
#[derive(Debug)]
pub struct Reader<S> {
    source: Source<S>,
    /// Database metadata, decoded once at open.
    pub metadata: Metadata,
    /// Absolute offset of the data section (search tree plus separator).
    pointer_base: u64,
}

impl Reader<BufReader<File>> {
    /// Open a MaxMind DB database file.
    ///
    /// The file is read on demand through a buffered stream; only the
    /// metadata map is decoded up front.
    ///
    /// # Example
    ///
    /// ```no_run
    /// let reader = mmdb_stream::Reader::open("GeoIP2-City.mmdb").unwrap();
    /// ```
    pub fn open<P: AsRef<Path>>(database: P) -> Result<Reader<BufReader<File>>, MmdbError> {
        let path = database.as_ref();
        if !path.is_file() {
            return Err(MmdbError::InvalidParameter(format!(
                "not a file: {}",
                path.display()
            )));
        }
        let file = File::open(path)?;
        Reader::from_source(BufReader::new(file))
    }
}

#[cfg(feature = "mmap")]
impl Reader<Cursor<Mmap>> {
    /// Open a MaxMind DB database file by memory mapping it.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # #[cfg(feature = "mmap")]
    /// # {
    /// let reader = mmdb_stream::Reader::open_mmap("GeoIP2-City.mmdb").unwrap();
    /// # }
    /// ```
    pub fn open_mmap<P: AsRef<Path>>(database: P) -> Result<Reader<Cursor<Mmap>>, MmdbError> {
        let file = File::open(database)?;
        let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(MmdbError::Mmap)?;
        Reader::from_source(Cursor::new(mmap))
    }
}

impl<S: Read + Seek> Reader<S> {
    /// Open a MaxMind DB database from any seekable byte stream.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::io::Cursor;
    ///
    /// let buf = std::fs::read("GeoIP2-City.mmdb").unwrap();
    /// let reader = mmdb_stream::Reader::from_source(Cursor::new(buf)).unwrap();
    /// ```
    pub fn from_source(stream: S) -> Result<Reader<S>, MmdbError> {
        let mut source = Source::new(stream)?;

        let metadata_start = metadata::find_metadata_start(&mut source)?;
        debug!("metadata section starts at offset {metadata_start}");
        let metadata = Metadata::load(&mut source, metadata_start)?;
        metadata.validate()?;

        let search_tree_size =
            u64::from(metadata.node_count) * u64::from(metadata.record_size) / 4;
        if search_tree_size + DATA_SECTION_SEPARATOR_SIZE > source.len() {
            return Err(MmdbError::corrupt(
                "search tree extends past the end of the database",
            ));
        }

        Ok(Reader {
            source,
            metadata,
            pointer_base: search_tree_size + DATA_SECTION_SEPARATOR_SIZE,
        })
    }

    /// Look up an IP address.
    ///
    /// The address is adapted to the database's IP version first: an IPv6
    /// address in an IPv4-only database is truncated to its low 4 bytes,
    /// and an IPv4 address in an IPv6 database is zero-extended to 16
    /// bytes. The returned [`LookupResult`] carries the decoded record (if
    /// any) and the bit depth at which the search ended.
    ///
    /// A failed lookup leaves the reader usable.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::net::IpAddr;
    ///
    /// let mut reader = mmdb_stream::Reader::open("GeoIP2-City.mmdb").unwrap();
    /// let ip: IpAddr = "89.160.20.128".parse().unwrap();
    ///
    /// let result = reader.lookup(ip).unwrap();
    /// if let Some(value) = result.value() {
    ///     println!("{} -> {:?}", result.network().unwrap(), value);
    /// }
    /// ```
    pub fn lookup(&mut self, address: IpAddr) -> Result<LookupResult, MmdbError> {
        let ip = IpInt::for_version(address, self.metadata.ip_version);
        let (pointer, prefix_len) = self.find_address_in_tree(&ip)?;

        if pointer == 0 {
            debug!("{address}: no record (depth {prefix_len})");
            return Ok(LookupResult::new_not_found(prefix_len as u8, ip.to_addr()));
        }

        let offset = self.resolve_data_pointer(pointer)?;
        let mut decoder = Decoder::new(&mut self.source, self.pointer_base);
        let (value, _) = decoder.decode(offset)?;
        debug!("{address}: record at depth {prefix_len}");
        Ok(LookupResult::new_found(value, prefix_len as u8, ip.to_addr()))
    }

    fn find_address_in_tree(&mut self, ip: &IpInt) -> Result<(u64, usize), MmdbError> {
        let bit_count = ip.bit_count();
        let node_count = u64::from(self.metadata.node_count);

        let mut node: u64 = 0;
        let mut prefix_len = bit_count;
        for i in 0..bit_count {
            if node >= node_count {
                prefix_len = i;
                break;
            }
            let bit = ip.get_bit(i);
            node = self.read_node(node, usize::from(bit))?;
        }

        if node <= node_count {
            // Either the placeholder "empty" node, or a full-depth walk
            // that ended on an internal node; neither carries a record.
            Ok((0, prefix_len))
        } else {
            Ok((node, prefix_len))
        }
    }

    pub(crate) fn read_node(&mut self, node: u64, index: usize) -> Result<u64, MmdbError> {
        if index > 1 {
            return Err(MmdbError::InvalidParameter(format!(
                "record index {index} out of range"
            )));
        }
        if node >= u64::from(self.metadata.node_count) {
            return Err(MmdbError::InvalidParameter(format!(
                "node {node} out of range"
            )));
        }

        let record_size = self.metadata.record_size;
        let base_offset = node * u64::from(record_size) / 4;

        let val = match record_size {
            24 => {
                let mut buf = [0; 3];
                self.source
                    .read_exact_at(base_offset + index as u64 * 3, &mut buf)?;
                u64::from(buf[0]) << 16 | u64::from(buf[1]) << 8 | u64::from(buf[2])
            }
            28 => {
                // The two records share the middle byte of the 7-byte
                // node: its high nibble belongs to the left record, its
                // low nibble to the right.
                let mut buf = [0; 4];
                self.source
                    .read_exact_at(base_offset + index as u64 * 3, &mut buf)?;
                let v = u32::from_be_bytes(buf);
                let v = if index == 0 {
                    ((v & 0xF0) << 20) | (v >> 8)
                } else {
                    v
                };
                u64::from(v & 0x0FFF_FFFF)
            }
            32 => {
                let mut buf = [0; 4];
                self.source
                    .read_exact_at(base_offset + index as u64 * 4, &mut buf)?;
                u64::from(u32::from_be_bytes(buf))
            }
            s => {
                return Err(MmdbError::corrupt(format!(
                    "unknown record size: {s}"
                )))
            }
        };
        Ok(val)
    }

    /// Resolves a record value from the search tree to an absolute offset
    /// in the data section.
    fn resolve_data_pointer(&self, pointer: u64) -> Result<u64, MmdbError> {
        let search_tree_size = self.pointer_base - DATA_SECTION_SEPARATOR_SIZE;
        let resolved = pointer - u64::from(self.metadata.node_count) + search_tree_size;

        if resolved >= self.source.len() {
            return Err(MmdbError::corrupt_at(
                "record pointer outside the data section",
                resolved,
            ));
        }
        Ok(resolved)
    }
}

/// An IP address as the integer the search tree is traversed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IpInt {
    V4(u32),
    V6(u128),
}

impl IpInt {
    /// Adapts a parsed address to the database's IP version. IPv6 input to
    /// a v4 database keeps its low 4 bytes; IPv4 input to a v6 database is
    /// zero-extended (no `::ffff:` prefix is synthesized).
    fn for_version(address: IpAddr, ip_version: u16) -> IpInt {
        match (address, ip_version) {
            (IpAddr::V6(v6), 4) => IpInt::V4(u128::from(v6) as u32),
            (IpAddr::V4(v4), 6) => IpInt::V6(u128::from(u32::from(v4))),
            (IpAddr::V4(v4), _) => IpInt::V4(v4.into()),
            (IpAddr::V6(v6), _) => IpInt::V6(v6.into()),
        }
    }

    /// Bit `index` of the address, most significant first.
    #[inline(always)]
    fn get_bit(&self, index: usize) -> bool {
        match self {
            IpInt::V4(ip) => (ip >> (31 - index)) & 1 == 1,
            IpInt::V6(ip) => (ip >> (127 - index)) & 1 == 1,
        }
    }

    fn bit_count(&self) -> usize {
        match self {
            IpInt::V4(_) => 32,
            IpInt::V6(_) => 128,
        }
    }

    fn to_addr(self) -> IpAddr {
        match self {
            IpInt::V4(ip) => IpAddr::V4(ip.into()),
            IpInt::V6(ip) => IpAddr::V6(ip.into()),
        }
    }
}
