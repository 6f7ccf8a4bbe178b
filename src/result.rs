//! Lookup result types.

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::Deserialize;

use crate::de;
use crate::error::MmdbError;
use crate::value::Value;

/// The result of looking up an IP address in a MaxMind DB.
///
/// Owns the decoded record, if one was found. Nothing is cached across
/// lookups; each call to [`Reader::lookup`](crate::Reader::lookup) decodes
/// its record afresh.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResult {
    value: Option<Value>,
    prefix_len: u8,
    /// The address as it was evaluated against the search tree (truncated
    /// or zero-extended to the database's IP version).
    ip: IpAddr,
}

impl LookupResult {
    pub(crate) fn new_found(value: Value, prefix_len: u8, ip: IpAddr) -> Self {
        LookupResult {
            value: Some(value),
            prefix_len,
            ip,
        }
    }

    pub(crate) fn new_not_found(prefix_len: u8, ip: IpAddr) -> Self {
        LookupResult {
            value: None,
            prefix_len,
            ip,
        }
    }

    /// Returns true if the database contains data for this IP address.
    ///
    /// Note that `false` means the database has no data for this IP,
    /// which is different from an error during lookup.
    #[inline]
    pub fn has_data(&self) -> bool {
        self.value.is_some()
    }

    /// The decoded record, or `None` if the IP was not found.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Consumes the result, returning the decoded record.
    pub fn into_value(self) -> Option<Value> {
        self.value
    }

    /// The bit depth at which the search ended: the prefix length of the
    /// most specific network the tree holds for this address.
    #[inline]
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns the network containing the looked-up IP address, masked to
    /// the matched prefix length.
    ///
    /// The network is expressed in the database's IP version: a lookup of
    /// an IPv4 address in an IPv6 database yields the zero-extended IPv6
    /// network, and an IPv6 lookup in an IPv4-only database yields the
    /// truncated IPv4 network.
    pub fn network(&self) -> Result<IpNetwork, MmdbError> {
        let network_ip = mask_ip(self.ip, self.prefix_len);
        Ok(IpNetwork::new(network_ip, self.prefix_len)?)
    }

    /// Decodes the full record into the specified type.
    ///
    /// Returns:
    /// - `Ok(Some(T))` if found and successfully decoded
    /// - `Ok(None)` if the IP was not found in the database
    /// - `Err(...)` if deserialization fails
    ///
    /// # Example
    ///
    /// ```no_run
    /// use serde::Deserialize;
    /// use std::net::IpAddr;
    ///
    /// #[derive(Deserialize)]
    /// struct Record {
    ///     country: Option<String>,
    /// }
    ///
    /// let mut reader = mmdb_stream::Reader::open("GeoIP2-Country.mmdb").unwrap();
    /// let ip: IpAddr = "89.160.20.128".parse().unwrap();
    /// let result = reader.lookup(ip).unwrap();
    /// if let Some(record) = result.decode::<Record>().unwrap() {
    ///     println!("{:?}", record.country);
    /// }
    /// ```
    pub fn decode<'de, T>(&'de self) -> Result<Option<T>, MmdbError>
    where
        T: Deserialize<'de>,
    {
        match &self.value {
            Some(value) => de::from_value(value).map(Some),
            None => Ok(None),
        }
    }
}

/// Masks an IP address to its network address given a prefix length.
fn mask_ip(ip: IpAddr, prefix: u8) -> IpAddr {
    match ip {
        IpAddr::V4(v4) => {
            if prefix >= 32 {
                IpAddr::V4(v4)
            } else {
                let int: u32 = v4.into();
                let mask = if prefix == 0 {
                    0
                } else {
                    !0u32 << (32 - prefix)
                };
                IpAddr::V4((int & mask).into())
            }
        }
        IpAddr::V6(v6) => {
            if prefix >= 128 {
                IpAddr::V6(v6)
            } else {
                let int: u128 = v6.into();
                let mask = if prefix == 0 {
                    0
                } else {
                    !0u128 << (128 - prefix)
                };
                IpAddr::V6((int & mask).into())
            }
        }
    }
}
