//! IP address and prefix types with safe parsing and offset arithmetic.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// An IPv4 address wrapper with integer conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ipv4Address(Ipv4Addr);

impl Ipv4Address {
    pub const UNSPECIFIED: Self = Ipv4Address(Ipv4Addr::UNSPECIFIED);

    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Ipv4Address(Ipv4Addr::new(a, b, c, d))
    }

    pub const fn inner(&self) -> Ipv4Addr {
        self.0
    }

    pub const fn octets(&self) -> [u8; 4] {
        self.0.octets()
    }

    /// Returns the address as a host-order integer.
    pub fn to_bits(&self) -> u32 {
        u32::from(self.0)
    }

    pub fn from_bits(bits: u32) -> Self {
        Ipv4Address(Ipv4Addr::from(bits))
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Ipv4Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv4Addr>()
            .map(Ipv4Address)
            .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

impl From<Ipv4Addr> for Ipv4Address {
    fn from(addr: Ipv4Addr) -> Self {
        Ipv4Address(addr)
    }
}

/// An IPv6 address wrapper with integer conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ipv6Address(Ipv6Addr);

impl Ipv6Address {
    pub const UNSPECIFIED: Self = Ipv6Address(Ipv6Addr::UNSPECIFIED);

    #[allow(clippy::too_many_arguments)]
    pub const fn new(a: u16, b: u16, c: u16, d: u16, e: u16, f: u16, g: u16, h: u16) -> Self {
        Ipv6Address(Ipv6Addr::new(a, b, c, d, e, f, g, h))
    }

    pub const fn inner(&self) -> Ipv6Addr {
        self.0
    }

    pub const fn octets(&self) -> [u8; 16] {
        self.0.octets()
    }

    pub const fn segments(&self) -> [u16; 8] {
        self.0.segments()
    }

    /// Returns the address as a host-order integer.
    pub fn to_bits(&self) -> u128 {
        u128::from(self.0)
    }

    pub fn from_bits(bits: u128) -> Self {
        Ipv6Address(Ipv6Addr::from(bits))
    }

    /// Returns the upper 64 bits (the routing prefix of a /64).
    pub fn high_bits(&self) -> u64 {
        (self.to_bits() >> 64) as u64
    }

    /// Returns the lower 64 bits (the interface identifier of a /64).
    pub fn low_bits(&self) -> u64 {
        self.to_bits() as u64
    }

    /// Builds an address from its upper and lower 64-bit halves.
    pub fn from_halves(high: u64, low: u64) -> Self {
        Self::from_bits((u128::from(high) << 64) | u128::from(low))
    }
}

impl fmt::Display for Ipv6Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Ipv6Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv6Addr>()
            .map(Ipv6Address)
            .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

impl From<Ipv6Addr> for Ipv6Address {
    fn from(addr: Ipv6Addr) -> Self {
        Ipv6Address(addr)
    }
}

/// An IP address that can be either IPv4 or IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IpAddress {
    V4(Ipv4Address),
    V6(Ipv6Address),
}

impl IpAddress {
    /// Returns true if this is an IPv4 address.
    pub const fn is_ipv4(&self) -> bool {
        matches!(self, IpAddress::V4(_))
    }

    /// Returns true if this is an IPv6 address.
    pub const fn is_ipv6(&self) -> bool {
        matches!(self, IpAddress::V6(_))
    }

    /// Returns the IPv4 address if this is V4, None otherwise.
    pub const fn as_ipv4(&self) -> Option<&Ipv4Address> {
        match self {
            IpAddress::V4(addr) => Some(addr),
            IpAddress::V6(_) => None,
        }
    }

    /// Returns the IPv6 address if this is V6, None otherwise.
    pub const fn as_ipv6(&self) -> Option<&Ipv6Address> {
        match self {
            IpAddress::V4(_) => None,
            IpAddress::V6(addr) => Some(addr),
        }
    }

    /// Number of bits in the address family (32 or 128).
    pub const fn bit_width(&self) -> u8 {
        match self {
            IpAddress::V4(_) => 32,
            IpAddress::V6(_) => 128,
        }
    }

    /// Largest integer value representable in this address family.
    pub const fn max_bits(&self) -> u128 {
        match self {
            IpAddress::V4(_) => u32::MAX as u128,
            IpAddress::V6(_) => u128::MAX,
        }
    }

    /// Returns the address as an integer, widened to 128 bits for IPv4.
    pub fn to_bits(&self) -> u128 {
        match self {
            IpAddress::V4(addr) => u128::from(addr.to_bits()),
            IpAddress::V6(addr) => addr.to_bits(),
        }
    }

    /// Builds an address of the same family as `self` from an integer.
    ///
    /// Returns None if `bits` does not fit the family.
    pub fn with_bits(&self, bits: u128) -> Option<IpAddress> {
        match self {
            IpAddress::V4(_) => u32::try_from(bits)
                .ok()
                .map(|b| IpAddress::V4(Ipv4Address::from_bits(b))),
            IpAddress::V6(_) => Some(IpAddress::V6(Ipv6Address::from_bits(bits))),
        }
    }

    /// Adds `offset` to the address, returning None on family overflow.
    pub fn checked_add(&self, offset: u128) -> Option<IpAddress> {
        let bits = self.to_bits().checked_add(offset)?;
        if bits > self.max_bits() {
            return None;
        }
        self.with_bits(bits)
    }

    /// Returns true if both addresses belong to the same family.
    pub const fn same_family(&self, other: &IpAddress) -> bool {
        self.is_ipv4() == other.is_ipv4()
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpAddress::V4(addr) => addr.fmt(f),
            IpAddress::V6(addr) => addr.fmt(f),
        }
    }
}

impl FromStr for IpAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains(':') {
            s.parse::<Ipv6Address>().map(IpAddress::V6)
        } else {
            s.parse::<Ipv4Address>().map(IpAddress::V4)
        }
    }
}

impl From<Ipv4Address> for IpAddress {
    fn from(addr: Ipv4Address) -> Self {
        IpAddress::V4(addr)
    }
}

impl From<Ipv6Address> for IpAddress {
    fn from(addr: Ipv6Address) -> Self {
        IpAddress::V6(addr)
    }
}

impl From<Ipv4Addr> for IpAddress {
    fn from(addr: Ipv4Addr) -> Self {
        IpAddress::V4(Ipv4Address(addr))
    }
}

impl From<Ipv6Addr> for IpAddress {
    fn from(addr: Ipv6Addr) -> Self {
        IpAddress::V6(Ipv6Address(addr))
    }
}

/// An IP prefix in CIDR notation (e.g., 10.0.0.0/24 or 2001:db8::/32).
///
/// The address is kept exactly as written; [`IpPrefix::network`] yields the
/// masked network address. Serialized as its string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpPrefix {
    address: IpAddress,
    prefix_len: u8,
}

impl IpPrefix {
    /// Creates a new IP prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length is invalid for the address type
    /// (>32 for IPv4, >128 for IPv6).
    pub fn new(address: IpAddress, prefix_len: u8) -> Result<Self, ParseError> {
        let max_len = address.bit_width();

        if prefix_len > max_len {
            return Err(ParseError::InvalidIpPrefix(format!(
                "prefix length {} exceeds maximum {} for address type",
                prefix_len, max_len
            )));
        }

        Ok(IpPrefix {
            address,
            prefix_len,
        })
    }

    /// Creates a host route (/32 or /128) for `address`.
    pub const fn host(address: IpAddress) -> Self {
        IpPrefix {
            address,
            prefix_len: address.bit_width(),
        }
    }

    /// Creates an IPv4 prefix, clamping `prefix_len` to 32.
    pub const fn from_v4(address: Ipv4Address, prefix_len: u8) -> Self {
        IpPrefix {
            address: IpAddress::V4(address),
            prefix_len: if prefix_len > 32 { 32 } else { prefix_len },
        }
    }

    /// Creates an IPv6 prefix, clamping `prefix_len` to 128.
    pub const fn from_v6(address: Ipv6Address, prefix_len: u8) -> Self {
        IpPrefix {
            address: IpAddress::V6(address),
            prefix_len: if prefix_len > 128 { 128 } else { prefix_len },
        }
    }

    /// Parses either a CIDR prefix or a bare address, the latter becoming a
    /// host route.
    pub fn parse_host_or_prefix(s: &str) -> Result<Self, ParseError> {
        if s.contains('/') {
            s.parse()
        } else {
            s.parse::<IpAddress>().map(IpPrefix::host)
        }
    }

    /// Returns the address as written.
    pub const fn address(&self) -> &IpAddress {
        &self.address
    }

    /// Returns the prefix length in bits.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns true if this is an IPv4 prefix.
    pub const fn is_ipv4(&self) -> bool {
        self.address.is_ipv4()
    }

    /// Returns true if this is an IPv6 prefix.
    pub const fn is_ipv6(&self) -> bool {
        self.address.is_ipv6()
    }

    /// Returns true if this is a host route (/32 for IPv4, /128 for IPv6).
    pub const fn is_host_route(&self) -> bool {
        self.prefix_len == self.address.bit_width()
    }

    /// Returns true if this is the default route (0.0.0.0/0 or ::/0).
    pub fn is_default(&self) -> bool {
        self.prefix_len == 0
    }

    fn mask_bits(&self) -> u128 {
        let host_bits = u32::from(self.address.bit_width() - self.prefix_len);
        self.address.max_bits() & !(1u128.checked_shl(host_bits).map_or(u128::MAX, |b| b - 1))
    }

    /// Returns the network address (host bits cleared).
    pub fn network(&self) -> IpAddress {
        let bits = self.address.to_bits() & self.mask_bits();
        self.address.with_bits(bits).unwrap_or(self.address)
    }

    /// Number of addresses covered by the prefix, saturating at `u128::MAX`
    /// for `::/0`.
    pub fn block_size(&self) -> u128 {
        let host_bits = u32::from(self.address.bit_width() - self.prefix_len);
        1u128.checked_shl(host_bits).unwrap_or(u128::MAX)
    }

    /// Returns true if `addr` falls inside this prefix.
    pub fn contains(&self, addr: &IpAddress) -> bool {
        self.address.same_family(addr)
            && (addr.to_bits() & self.mask_bits()) == self.network().to_bits()
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for IpPrefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, len_str) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::InvalidIpPrefix(s.to_string()))?;

        let address: IpAddress = addr_str.parse()?;
        let prefix_len: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;

        IpPrefix::new(address, prefix_len)
    }
}

impl TryFrom<String> for IpPrefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        IpPrefix::parse_host_or_prefix(&s)
    }
}

impl From<IpPrefix> for String {
    fn from(prefix: IpPrefix) -> String {
        prefix.to_string()
    }
}
