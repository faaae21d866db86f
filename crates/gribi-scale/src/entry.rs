//! Forwarding entries handed to the RIB client.
//!
//! Three shapes exist: [`NextHopEntry`], [`NextHopGroupEntry`] and
//! [`RouteEntry`]. [`Entry`] wraps them for transaction payloads, and
//! [`EntryKey`] identifies an entry in confirmation results.

use gribi_types::{IpAddress, IpPrefix};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Network instance used when a segment does not name one.
pub const DEFAULT_NETWORK_INSTANCE: &str = "DEFAULT";

/// What a generated next hop does, as requested by a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextHopSemantics {
    /// Indirect next hop to an IP address.
    #[default]
    #[serde(alias = "default")]
    Plain,
    /// IP-in-IP encapsulation towards a tunnel destination.
    Encap,
    /// IP-in-IP decapsulation.
    Decap,
    /// Decapsulate, then re-encapsulate towards a tunnel destination.
    #[serde(alias = "decapEncap")]
    DecapEncap,
}

impl NextHopSemantics {
    /// Returns true if next hops of this kind consume a target address.
    pub const fn needs_target(&self) -> bool {
        !matches!(self, NextHopSemantics::Decap)
    }

    /// Returns true if next hops of this kind need a tunnel source.
    pub const fn needs_tunnel_source(&self) -> bool {
        matches!(self, NextHopSemantics::Encap | NextHopSemantics::DecapEncap)
    }
}

impl fmt::Display for NextHopSemantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NextHopSemantics::Plain => "plain",
            NextHopSemantics::Encap => "encap",
            NextHopSemantics::Decap => "decap",
            NextHopSemantics::DecapEncap => "decap_encap",
        };
        f.write_str(name)
    }
}

/// The forwarding action carried by a next-hop entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NextHopAction {
    /// Resolve through the next-hop network instance only (no address).
    Lookup,
    /// Forward to an IP address.
    Ip { address: IpAddress },
    /// Encapsulate in IP-in-IP.
    Encap {
        source: IpAddress,
        destination: IpAddress,
    },
    /// Strip the outer IP-in-IP header.
    Decap,
    /// Strip the outer header, then encapsulate again.
    DecapEncap {
        source: IpAddress,
        destination: IpAddress,
    },
}

/// A next-hop entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHopEntry {
    pub index: u64,
    pub network_instance: String,
    /// Network instance in which the next hop is resolved, if redirected.
    pub next_hop_network_instance: Option<String>,
    pub action: NextHopAction,
}

impl NextHopEntry {
    pub fn new(index: u64, network_instance: impl Into<String>, action: NextHopAction) -> Self {
        Self {
            index,
            network_instance: network_instance.into(),
            next_hop_network_instance: None,
            action,
        }
    }

    pub fn with_next_hop_network_instance(mut self, ni: impl Into<String>) -> Self {
        self.next_hop_network_instance = Some(ni.into());
        self
    }
}

/// One weighted member of a next-hop group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeightedNextHop {
    pub index: u64,
    pub weight: u64,
}

/// A next-hop group entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHopGroupEntry {
    pub id: u64,
    pub network_instance: String,
    pub next_hops: Vec<WeightedNextHop>,
    /// Fast-reroute backup group.
    pub backup_group: Option<u64>,
}

impl NextHopGroupEntry {
    pub fn new(id: u64, network_instance: impl Into<String>) -> Self {
        Self {
            id,
            network_instance: network_instance.into(),
            next_hops: Vec::new(),
            backup_group: None,
        }
    }

    pub fn with_backup(mut self, backup_group: u64) -> Self {
        self.backup_group = Some(backup_group);
        self
    }

    pub fn add_next_hop(&mut self, index: u64, weight: u64) {
        self.next_hops.push(WeightedNextHop { index, weight });
    }

    pub fn with_next_hop(mut self, index: u64, weight: u64) -> Self {
        self.add_next_hop(index, weight);
        self
    }

    /// Sum of member weights.
    pub fn total_weight(&self) -> u64 {
        self.next_hops.iter().map(|nh| nh.weight).sum()
    }
}

/// An IPv4 or IPv6 route entry; the family follows the prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub prefix: IpPrefix,
    pub network_instance: String,
    pub next_hop_group: u64,
    pub next_hop_group_network_instance: String,
}

impl RouteEntry {
    pub fn new(
        prefix: IpPrefix,
        network_instance: impl Into<String>,
        next_hop_group: u64,
        next_hop_group_network_instance: impl Into<String>,
    ) -> Self {
        Self {
            prefix,
            network_instance: network_instance.into(),
            next_hop_group,
            next_hop_group_network_instance: next_hop_group_network_instance.into(),
        }
    }
}

/// Any entry that can be submitted in a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entry {
    NextHop(NextHopEntry),
    NextHopGroup(NextHopGroupEntry),
    Route(RouteEntry),
}

impl Entry {
    /// Identity of this entry as it appears in confirmations.
    pub fn key(&self) -> EntryKey {
        match self {
            Entry::NextHop(nh) => EntryKey::NextHop(nh.index),
            Entry::NextHopGroup(nhg) => EntryKey::NextHopGroup(nhg.id),
            Entry::Route(route) if route.prefix.is_ipv6() => EntryKey::Ipv6(route.prefix),
            Entry::Route(route) => EntryKey::Ipv4(route.prefix),
        }
    }
}

impl From<NextHopEntry> for Entry {
    fn from(entry: NextHopEntry) -> Self {
        Entry::NextHop(entry)
    }
}

impl From<NextHopGroupEntry> for Entry {
    fn from(entry: NextHopGroupEntry) -> Self {
        Entry::NextHopGroup(entry)
    }
}

impl From<RouteEntry> for Entry {
    fn from(entry: RouteEntry) -> Self {
        Entry::Route(entry)
    }
}

/// Identity of an entry: NH index, NHG id, or route prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKey {
    NextHop(u64),
    NextHopGroup(u64),
    Ipv4(IpPrefix),
    Ipv6(IpPrefix),
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKey::NextHop(id) => write!(f, "NH {}", id),
            EntryKey::NextHopGroup(id) => write!(f, "NHG {}", id),
            EntryKey::Ipv4(prefix) => write!(f, "IPv4 {}", prefix),
            EntryKey::Ipv6(prefix) => write!(f, "IPv6 {}", prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entry_keys() {
        let nh: Entry = NextHopEntry::new(7, DEFAULT_NETWORK_INSTANCE, NextHopAction::Decap).into();
        assert_eq!(nh.key(), EntryKey::NextHop(7));

        let nhg: Entry = NextHopGroupEntry::new(9, DEFAULT_NETWORK_INSTANCE).with_next_hop(7, 1).into();
        assert_eq!(nhg.key(), EntryKey::NextHopGroup(9));

        let v6: IpPrefix = "2001:db8::1/128".parse().unwrap();
        let route: Entry = RouteEntry::new(v6, "VRF", 9, DEFAULT_NETWORK_INSTANCE).into();
        assert_eq!(route.key(), EntryKey::Ipv6(v6));
        assert_eq!(route.key().to_string(), "IPv6 2001:db8::1/128");
    }

    #[test]
    fn test_group_total_weight() {
        let nhg = NextHopGroupEntry::new(1, DEFAULT_NETWORK_INSTANCE)
            .with_next_hop(1, 1)
            .with_next_hop(2, 7)
            .with_backup(99);
        assert_eq!(nhg.total_weight(), 8);
        assert_eq!(nhg.backup_group, Some(99));
    }

    #[test]
    fn test_semantics_parse_aliases() {
        let plain: NextHopSemantics = serde_json::from_str("\"default\"").unwrap();
        assert_eq!(plain, NextHopSemantics::Plain);
        let both: NextHopSemantics = serde_json::from_str("\"decapEncap\"").unwrap();
        assert_eq!(both, NextHopSemantics::DecapEncap);
        assert!(both.needs_tunnel_source());
        assert!(!NextHopSemantics::Decap.needs_target());
    }
}
