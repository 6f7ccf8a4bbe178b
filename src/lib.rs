#![deny(trivial_casts, trivial_numeric_casts, unused_import_braces)]
//! # MaxMind DB Stream Reader
//!
//! This library reads the MaxMind DB format, including the GeoIP2 and
//! GeoLite2 databases, from any seekable byte stream. Unlike readers that
//! load or map the whole database up front, lookups here issue positioned
//! reads against the stream, so memory use stays flat regardless of
//! database size.
//!
//! ## Features
//!
//! - **`bigint`** (default: enabled): wide arithmetic backend for unsigned
//!   integers beyond the native word, up to 128 bits. Without it, decoding
//!   such a value fails with [`MmdbError::PlatformLimit`].
//! - **`mmap`** (default: disabled): memory-mapped file access via
//!   [`Reader::open_mmap`].
//! - **`simdutf8`** (default: disabled): SIMD-accelerated UTF-8 validation
//!   during string decoding.
//!
//! ## Concurrency
//!
//! A reader owns its stream and cursor exclusively, so lookups take
//! `&mut self`. Use one reader per thread; readers over the same file are
//! independent.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::net::IpAddr;
//!
//! fn main() -> Result<(), mmdb_stream::MmdbError> {
//!     let mut reader = mmdb_stream::Reader::open("/path/to/GeoIP2-City.mmdb")?;
//!
//!     let ip: IpAddr = "89.160.20.128".parse().unwrap();
//!     let result = reader.lookup(ip)?;
//!
//!     if let Some(value) = result.value() {
//!         println!("{} -> {:?}", result.network()?, value);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Records decode into your own types through serde:
//!
//! ```no_run
//! use serde::Deserialize;
//! use std::net::IpAddr;
//!
//! #[derive(Deserialize)]
//! struct Country<'a> {
//!     iso_code: Option<&'a str>,
//! }
//!
//! let mut reader = mmdb_stream::Reader::open("/path/to/GeoIP2-Country.mmdb").unwrap();
//! let ip: IpAddr = "89.160.20.128".parse().unwrap();
//! let result = reader.lookup(ip).unwrap();
//! if let Some(country) = result.decode::<Country>().unwrap() {
//!     println!("{:?}", country.iso_code);
//! }
//! ```

mod arith;
mod de;
mod decoder;
mod error;
mod metadata;
mod reader;
mod result;
mod source;
mod value;

// Re-export public types
pub use error::MmdbError;
pub use metadata::Metadata;
pub use reader::Reader;
pub use result::LookupResult;
pub use value::{Map, Value};

#[cfg(feature = "mmap")]
pub use memmap2::Mmap;
