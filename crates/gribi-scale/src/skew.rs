//! Skewed multi-VRF programs.
//!
//! Builds one IPv6 host route per position of a VRF assignment list (see
//! [`crate::partition::skewed_assignment`]), so VRFs that appear more often
//! carry proportionally more routes.

use crate::combine::Ordered;
use crate::entry::{Entry, NextHopAction, NextHopEntry, NextHopGroupEntry, RouteEntry};
use crate::error::{Result, ScaleError};
use crate::id_pool::IdPool;
use gribi_types::{IpAddress, IpPrefix, Ipv6Address};
use log::info;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A built skewed program.
#[derive(Debug, Clone)]
pub struct SkewedProgram {
    pub entries: Ordered<Entry>,
    /// Route count per VRF
    pub routes_per_vrf: BTreeMap<String, usize>,
}

pub struct SkewedVrfProgram {
    pool: Arc<IdPool>,
    default_network_instance: String,
    action: NextHopAction,
    base: Ipv6Address,
}

impl SkewedVrfProgram {
    pub fn new(
        pool: Arc<IdPool>,
        default_network_instance: impl Into<String>,
        action: NextHopAction,
        base: IpAddress,
    ) -> Result<Self> {
        let base = *base
            .as_ipv6()
            .ok_or_else(|| ScaleError::InvalidAddress(format!("{} is not an IPv6 base", base)))?;
        Ok(Self {
            pool,
            default_network_instance: default_network_instance.into(),
            action,
            base,
        })
    }

    /// Emits, per list position: a next hop the first time its VRF is seen,
    /// a group of its own, and a /128 route in the VRF whose low 64 bits
    /// count up from the base per VRF.
    pub fn build<S: AsRef<str>>(&self, assignments: &[S]) -> Result<SkewedProgram> {
        let ni = self.default_network_instance.as_str();
        let mut next_hops: HashMap<&str, u64> = HashMap::new();
        let mut routes_per_vrf: BTreeMap<String, usize> = BTreeMap::new();
        let mut adds = Vec::with_capacity(assignments.len() * 3);

        for vrf in assignments {
            let vrf = vrf.as_ref();
            let nh = match next_hops.get(vrf) {
                Some(&nh) => nh,
                None => {
                    let nh = self.pool.next_nh_id();
                    next_hops.insert(vrf, nh);
                    adds.push(NextHopEntry::new(nh, ni, self.action).into());
                    nh
                }
            };

            let group = self.pool.next_nhg_id();
            adds.push(NextHopGroupEntry::new(group, ni).with_next_hop(nh, 1).into());

            let count = routes_per_vrf.entry(vrf.to_string()).or_insert(0);
            let low = self
                .base
                .low_bits()
                .checked_add(*count as u64)
                .ok_or_else(|| ScaleError::Overflow(format!("route {} of {} from {}", count, vrf, self.base)))?;
            *count += 1;

            let address = Ipv6Address::from_halves(self.base.high_bits(), low);
            adds.push(RouteEntry::new(IpPrefix::host(address.into()), vrf, group, ni).into());
        }

        info!(
            "skewed program: {} VRFs, {} routes, {} entries",
            routes_per_vrf.len(),
            assignments.len(),
            adds.len()
        );
        Ok(SkewedProgram {
            entries: Ordered::from_adds(adds),
            routes_per_vrf,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryKey;
    use crate::partition::{generate_skew_pattern, skewed_assignment};
    use pretty_assertions::assert_eq;

    fn program() -> SkewedVrfProgram {
        SkewedVrfProgram::new(
            Arc::new(IdPool::new(0)),
            "DEFAULT",
            NextHopAction::Decap,
            "2001:db8:100::".parse().unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_one_next_hop_per_vrf() {
        let built = program().build(&["A", "B", "A", "A"]).unwrap();
        let keys: Vec<EntryKey> = built.entries.adds().iter().map(Entry::key).collect();
        let nh_count = keys.iter().filter(|k| matches!(k, EntryKey::NextHop(_))).count();
        let nhg_count = keys.iter().filter(|k| matches!(k, EntryKey::NextHopGroup(_))).count();
        assert_eq!(nh_count, 2);
        assert_eq!(nhg_count, 4);
        assert_eq!(built.routes_per_vrf.get("A"), Some(&3));
    }

    #[test]
    fn test_route_addresses_count_per_vrf() {
        let built = program().build(&["A", "B", "A"]).unwrap();
        let routes: Vec<(String, String)> = built
            .entries
            .adds()
            .iter()
            .filter_map(|e| match e {
                Entry::Route(r) => Some((r.network_instance.clone(), r.prefix.to_string())),
                _ => None,
            })
            .collect();
        assert_eq!(
            routes,
            vec![
                ("A".to_string(), "2001:db8:100::/128".to_string()),
                ("B".to_string(), "2001:db8:100::/128".to_string()),
                ("A".to_string(), "2001:db8:100::1/128".to_string()),
            ]
        );
    }

    #[test]
    fn test_skewed_list_drives_route_counts() {
        let vrfs: Vec<String> = (0..4).map(|i| format!("VRF_{}", i)).collect();
        let pattern = generate_skew_pattern(vrfs.len(), 10);
        let list = skewed_assignment(&vrfs, &pattern).unwrap();
        let built = program().build(&list).unwrap();

        let counts: Vec<usize> = built.routes_per_vrf.values().copied().collect();
        assert_eq!(counts, vec![4, 2, 2, 2]);
        assert_eq!(built.entries.deletes().first(), built.entries.adds().last());
    }

    #[test]
    fn test_ipv4_base_rejected() {
        let result = SkewedVrfProgram::new(
            Arc::new(IdPool::new(0)),
            "DEFAULT",
            NextHopAction::Decap,
            "10.0.0.1".parse().unwrap(),
        );
        assert!(matches!(result, Err(ScaleError::InvalidAddress(_))));
    }
}
