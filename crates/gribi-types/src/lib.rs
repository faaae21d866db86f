//! Network primitives shared by the gRIBI scale generator.
//!
//! This crate provides type-safe representations of the addresses that
//! forwarding entries are built from:
//!
//! - [`IpAddress`]: IPv4 and IPv6 addresses, with integer offset arithmetic
//! - [`IpPrefix`]: IP network prefixes (CIDR notation)
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses

mod ip;
mod mac;

pub use ip::{IpAddress, IpPrefix, Ipv4Address, Ipv6Address};
pub use mac::MacAddress;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),
}
