//! Provides functions to parse a target network and enumerate its host addresses.

use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;
use thiserror::Error;

/// The given string could not be parsed as an IPv4/IPv6 address or CIDR block.
///
/// This is the only fatal error a sweep can produce; it is raised before any
/// probe is dispatched.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid network {input:?}: expected an IPv4/IPv6 address or CIDR block")]
pub struct InvalidNetworkError {
    input: String,
}

/// Parses a network in CIDR notation for either address family.
///
/// A bare address is accepted as a full-length prefix, and a CIDR whose
/// address is not the network's base address is normalized to the containing
/// network instead of being rejected, so `192.168.1.77/24` sweeps
/// `192.168.1.0/24`.
pub fn parse_network(input: &str) -> Result<IpNet, InvalidNetworkError> {
    if let Ok(net) = IpNet::from_str(input) {
        return Ok(net.trunc());
    }
    if let Ok(addr) = IpAddr::from_str(input) {
        let prefix = if addr.is_ipv4() { 32 } else { 128 };
        if let Ok(net) = IpNet::new(addr, prefix) {
            return Ok(net);
        }
    }

    Err(InvalidNetworkError {
        input: input.to_owned(),
    })
}

/// Lazy iterator over the usable host addresses of a network.
///
/// For IPv4 the network and broadcast addresses are skipped, except in /31
/// point-to-point networks (both addresses are hosts, RFC 3021) and /32
/// networks (the single address is the host). For IPv6 every address except
/// the subnet-router anycast address is a host; /127 and /128 yield two and
/// one address respectively.
///
/// The sequence is generated on demand. A wide IPv6 prefix enumerates an
/// astronomically long sequence, but holding the iterator costs two integers.
#[derive(Debug, Clone)]
pub enum HostIter {
    /// Cursor over an IPv4 network.
    V4 {
        /// Next address to yield.
        next: u32,
        /// Last address to yield, inclusive.
        last: u32,
        /// Set once `last` has been yielded.
        done: bool,
    },
    /// Cursor over an IPv6 network.
    V6 {
        /// Next address to yield.
        next: u128,
        /// Last address to yield, inclusive.
        last: u128,
        /// Set once `last` has been yielded.
        done: bool,
    },
}

/// Returns the host addresses of `network` in ascending numeric order.
pub fn host_iter(network: IpNet) -> HostIter {
    match network {
        IpNet::V4(net) => {
            let base = u32::from(net.network());
            let broadcast = u32::from(net.broadcast());
            let (next, last) = if net.prefix_len() >= 31 {
                (base, broadcast)
            } else {
                (base + 1, broadcast - 1)
            };
            HostIter::V4 {
                next,
                last,
                done: false,
            }
        }
        IpNet::V6(net) => {
            let base = u128::from(net.network());
            let last = u128::from(net.broadcast());
            // Skip the subnet-router anycast address unless the prefix is so
            // narrow that it occupies the only usable slot.
            let next = if net.prefix_len() >= 127 {
                base
            } else {
                base + 1
            };
            HostIter::V6 {
                next,
                last,
                done: false,
            }
        }
    }
}

impl Iterator for HostIter {
    type Item = IpAddr;

    fn next(&mut self) -> Option<IpAddr> {
        match self {
            HostIter::V4 { next, last, done } => {
                if *done {
                    return None;
                }
                let addr = IpAddr::from(std::net::Ipv4Addr::from(*next));
                if *next == *last {
                    *done = true;
                } else {
                    *next += 1;
                }
                Some(addr)
            }
            HostIter::V6 { next, last, done } => {
                if *done {
                    return None;
                }
                let addr = IpAddr::from(std::net::Ipv6Addr::from(*next));
                if *next == *last {
                    *done = true;
                } else {
                    *next += 1;
                }
                Some(addr)
            }
        }
    }
}
