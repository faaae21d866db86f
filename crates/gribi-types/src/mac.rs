//! MAC address type with parsing, formatting and 48-bit arithmetic.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MAC_SPACE_MASK: u64 = 0xffff_ffff_ffff;

/// A 48-bit Ethernet MAC address.
///
/// # Examples
///
/// ```
/// use gribi_types::MacAddress;
///
/// let mac: MacAddress = "02:00:00:00:00:ff".parse().unwrap();
/// assert_eq!(mac.wrapping_add(1).to_string(), "02:00:00:00:01:00");
///
/// // Also supports hyphen-separated format
/// let mac2: MacAddress = "02-00-00-00-00-ff".parse().unwrap();
/// assert_eq!(mac, mac2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// The zero/null MAC address (00:00:00:00:00:00).
    pub const ZERO: MacAddress = MacAddress([0, 0, 0, 0, 0, 0]);

    /// Creates a new MAC address from raw bytes.
    pub const fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    /// Returns the raw bytes of the MAC address.
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Returns the address as a big-endian 48-bit integer.
    pub fn to_u64(&self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
    }

    /// Builds an address from the low 48 bits of `value`.
    pub fn from_u64(value: u64) -> Self {
        let bytes = value.to_be_bytes();
        MacAddress([bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]])
    }

    /// Adds `offset`, wrapping around the 48-bit address space.
    pub fn wrapping_add(&self, offset: u64) -> Self {
        Self::from_u64(self.to_u64().wrapping_add(offset) & MAC_SPACE_MASK)
    }

    /// Returns true if this is a multicast address.
    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Returns true if this is a locally administered address.
    pub const fn is_local(&self) -> bool {
        self.0[0] & 0x02 != 0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let separator = if s.contains(':') { ':' } else { '-' };

        let parts: Vec<&str> = s.split(separator).collect();
        if parts.len() != 6 {
            return Err(ParseError::InvalidMacAddress(s.to_string()));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| ParseError::InvalidMacAddress(s.to_string()))?;
        }

        Ok(MacAddress(bytes))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> String {
        mac.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_colon_format() {
        let mac: MacAddress = "00:11:22:33:44:55".parse().unwrap();
        assert_eq!(mac.as_bytes(), &[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    }

    #[test]
    fn test_integer_round_trip() {
        let mac: MacAddress = "02:01:01:00:00:03".parse().unwrap();
        assert_eq!(mac.to_u64(), 0x0201_0100_0003);
        assert_eq!(MacAddress::from_u64(0x0201_0100_0003), mac);
    }

    #[test]
    fn test_wrapping_add_carries_across_octets() {
        let mac: MacAddress = "02:00:00:00:ff:ff".parse().unwrap();
        assert_eq!(mac.wrapping_add(1).to_string(), "02:00:00:01:00:00");
    }

    #[test]
    fn test_wrapping_add_wraps_48_bits() {
        let mac: MacAddress = "ff:ff:ff:ff:ff:ff".parse().unwrap();
        assert_eq!(mac.wrapping_add(2), "00:00:00:00:00:01".parse().unwrap());
    }

    #[test]
    fn test_local_and_multicast_bits() {
        let local: MacAddress = "02:00:00:00:00:01".parse().unwrap();
        assert!(local.is_local());
        assert!(!local.is_multicast());
    }

    #[test]
    fn test_invalid_format() {
        assert!("invalid".parse::<MacAddress>().is_err());
        assert!("00:11:22:33:44".parse::<MacAddress>().is_err());
        assert!("gg:11:22:33:44:55".parse::<MacAddress>().is_err());
    }
}
