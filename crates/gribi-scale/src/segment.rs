//! Route segment realization.
//!
//! A [`SegmentSpec`] declares one unit of route-programming intent: the
//! prefixes to install, the next-hop targets and semantics, and the fan-out
//! shape. [`RouteSegmentBuilder`] turns it into one [`PairedEntries`] per
//! batch, allocating every identifier from a shared [`IdPool`].
//!
//! Within a batch, prefixes are spread over the batch's groups with a
//! ceiling/floor split so that group sizes differ by at most one and sum to
//! the batch size exactly.

use crate::address::generate_addresses;
use crate::entry::{
    Entry, NextHopAction, NextHopEntry, NextHopGroupEntry, NextHopSemantics, RouteEntry,
    DEFAULT_NETWORK_INSTANCE,
};
use crate::error::{Result, ScaleError};
use crate::id_pool::IdPool;
use gribi_types::{IpAddress, IpPrefix};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Declarative description of one route-programming segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSpec {
    pub name: String,
    /// IPv4 destinations. Host addresses become /32 routes; CIDR entries are
    /// installed as written and stand for `addresses_per_subnet` hosts.
    pub prefixes: Vec<IpPrefix>,
    /// Optional IPv6 destinations, paired index-by-index with `prefixes`.
    pub prefixes_v6: Vec<IpPrefix>,
    /// Candidate next-hop addresses, consumed round-robin.
    pub next_hop_targets: Vec<IpAddress>,
    pub semantics: NextHopSemantics,
    pub next_hop_network_instance: String,
    pub prefix_network_instance: String,
    pub group_count: usize,
    pub next_hops_per_group: usize,
    /// One weight per next hop of a group.
    pub weights: Vec<u64>,
    pub backup_group: Option<u64>,
    pub tunnel_source: Option<IpAddress>,
    pub addresses_per_subnet: usize,
}

impl SegmentSpec {
    /// Creates a spec with one group of one plain next hop, all in the
    /// default network instance.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefixes: Vec::new(),
            prefixes_v6: Vec::new(),
            next_hop_targets: Vec::new(),
            semantics: NextHopSemantics::Plain,
            next_hop_network_instance: DEFAULT_NETWORK_INSTANCE.to_string(),
            prefix_network_instance: DEFAULT_NETWORK_INSTANCE.to_string(),
            group_count: 1,
            next_hops_per_group: 1,
            weights: vec![1],
            backup_group: None,
            tunnel_source: None,
            addresses_per_subnet: 1,
        }
    }

    pub fn with_prefixes(mut self, prefixes: Vec<IpPrefix>) -> Self {
        self.prefixes = prefixes;
        self
    }

    /// Sets IPv4 destinations from host addresses.
    pub fn with_host_prefixes(mut self, hosts: &[IpAddress]) -> Self {
        self.prefixes = hosts.iter().copied().map(IpPrefix::host).collect();
        self
    }

    pub fn with_prefixes_v6(mut self, prefixes: Vec<IpPrefix>) -> Self {
        self.prefixes_v6 = prefixes;
        self
    }

    pub fn with_next_hop_targets(mut self, targets: Vec<IpAddress>) -> Self {
        self.next_hop_targets = targets;
        self
    }

    pub fn with_semantics(mut self, semantics: NextHopSemantics) -> Self {
        self.semantics = semantics;
        self
    }

    pub fn with_next_hop_network_instance(mut self, ni: impl Into<String>) -> Self {
        self.next_hop_network_instance = ni.into();
        self
    }

    pub fn with_prefix_network_instance(mut self, ni: impl Into<String>) -> Self {
        self.prefix_network_instance = ni.into();
        self
    }

    /// Sets the fan-out shape. Weights reset to all ones for the new width.
    pub fn with_groups(mut self, group_count: usize, next_hops_per_group: usize) -> Self {
        self.group_count = group_count;
        self.next_hops_per_group = next_hops_per_group;
        self.weights = vec![1; next_hops_per_group];
        self
    }

    pub fn with_weights(mut self, weights: Vec<u64>) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_backup_group(mut self, backup_group: u64) -> Self {
        self.backup_group = Some(backup_group);
        self
    }

    pub fn with_tunnel_source(mut self, source: IpAddress) -> Self {
        self.tunnel_source = Some(source);
        self
    }

    pub fn with_addresses_per_subnet(mut self, count: usize) -> Self {
        self.addresses_per_subnet = count;
        self
    }

    fn invalid(&self, reason: impl Into<String>) -> ScaleError {
        ScaleError::InvalidSegment {
            segment: self.name.clone(),
            reason: reason.into(),
        }
    }

    /// Checks the spec's internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.next_hops_per_group == 0 {
            return Err(self.invalid("next_hops_per_group must be positive"));
        }
        if self.weights.len() != self.next_hops_per_group {
            return Err(self.invalid(format!(
                "{} weights for {} next hops per group",
                self.weights.len(),
                self.next_hops_per_group
            )));
        }
        if self.addresses_per_subnet == 0 {
            return Err(self.invalid("addresses_per_subnet must be positive"));
        }
        if let Some(prefix) = self.prefixes.iter().find(|p| !p.is_ipv4()) {
            return Err(self.invalid(format!("{} in the IPv4 prefix list", prefix)));
        }
        if let Some(prefix) = self.prefixes_v6.iter().find(|p| !p.is_ipv6()) {
            return Err(self.invalid(format!("{} in the IPv6 prefix list", prefix)));
        }
        if !self.prefixes_v6.is_empty() && self.prefixes_v6.len() != self.prefixes.len() {
            return Err(self.invalid(format!(
                "{} IPv6 prefixes do not pair with {} IPv4 prefixes",
                self.prefixes_v6.len(),
                self.prefixes.len()
            )));
        }
        if self.semantics.needs_target()
            && self.next_hop_targets.is_empty()
            && !self.prefixes.is_empty()
        {
            return Err(ScaleError::MissingNextHopTargets {
                segment: self.name.clone(),
                semantics: self.semantics.to_string(),
            });
        }
        if self.semantics.needs_tunnel_source() && self.tunnel_source.is_none() {
            return Err(ScaleError::MissingTunnelSource {
                segment: self.name.clone(),
                semantics: self.semantics.to_string(),
            });
        }
        Ok(())
    }
}

/// Entry counts by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntryCounts {
    pub next_hops: usize,
    pub next_hop_groups: usize,
    pub v4_routes: usize,
    pub v6_routes: usize,
}

impl EntryCounts {
    pub fn total(&self) -> usize {
        self.next_hops + self.next_hop_groups + self.v4_routes + self.v6_routes
    }
}

impl std::ops::AddAssign for EntryCounts {
    fn add_assign(&mut self, other: Self) {
        self.next_hops += other.next_hops;
        self.next_hop_groups += other.next_hop_groups;
        self.v4_routes += other.v4_routes;
        self.v6_routes += other.v6_routes;
    }
}

/// The entries of one segment for one batch, plus the literal addresses the
/// batch's routes cover (used to build matching traffic).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PairedEntries {
    pub next_hops: Vec<NextHopEntry>,
    pub next_hop_groups: Vec<NextHopGroupEntry>,
    pub v4_routes: Vec<RouteEntry>,
    pub v6_routes: Vec<RouteEntry>,
    pub v4_prefixes: Vec<IpAddress>,
    pub v6_prefixes: Vec<IpAddress>,
}

impl PairedEntries {
    pub fn counts(&self) -> EntryCounts {
        EntryCounts {
            next_hops: self.next_hops.len(),
            next_hop_groups: self.next_hop_groups.len(),
            v4_routes: self.v4_routes.len(),
            v6_routes: self.v6_routes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts().total() == 0
    }

    /// All entries in dependency order: NHs, NHGs, IPv4 routes, IPv6 routes.
    pub fn to_entries(&self) -> Vec<Entry> {
        let mut entries = Vec::with_capacity(self.counts().total());
        entries.extend(self.next_hops.iter().cloned().map(Entry::NextHop));
        entries.extend(self.next_hop_groups.iter().cloned().map(Entry::NextHopGroup));
        entries.extend(self.v4_routes.iter().cloned().map(Entry::Route));
        entries.extend(self.v6_routes.iter().cloned().map(Entry::Route));
        entries
    }

    /// First consumed IPv4 address and the number consumed.
    pub fn first_v4_prefix_and_count(&self) -> Option<(IpAddress, usize)> {
        self.v4_prefixes.first().map(|p| (*p, self.v4_prefixes.len()))
    }

    /// First consumed IPv6 address and the number consumed.
    pub fn first_v6_prefix_and_count(&self) -> Option<(IpAddress, usize)> {
        self.v6_prefixes.first().map(|p| (*p, self.v6_prefixes.len()))
    }
}

/// A realized segment: one [`PairedEntries`] per batch, in batch order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltSegment {
    pub name: String,
    pub batches: Vec<PairedEntries>,
}

impl BuiltSegment {
    pub fn counts(&self) -> EntryCounts {
        let mut counts = EntryCounts::default();
        for batch in &self.batches {
            counts += batch.counts();
        }
        counts
    }

    pub fn batch(&self, index: usize) -> Option<&PairedEntries> {
        self.batches.get(index)
    }
}

/// Realizes segment specs into batch-partitioned entries.
pub struct RouteSegmentBuilder {
    pool: Arc<IdPool>,
    default_network_instance: String,
}

impl RouteSegmentBuilder {
    pub fn new(pool: Arc<IdPool>) -> Self {
        Self {
            pool,
            default_network_instance: DEFAULT_NETWORK_INSTANCE.to_string(),
        }
    }

    pub fn with_default_network_instance(mut self, ni: impl Into<String>) -> Self {
        self.default_network_instance = ni.into();
        self
    }

    pub fn pool(&self) -> &Arc<IdPool> {
        &self.pool
    }

    /// Builds `batch_count` partitions of `spec`.
    pub fn build(&self, spec: &SegmentSpec, batch_count: usize) -> Result<BuiltSegment> {
        if batch_count == 0 {
            return Err(ScaleError::InvalidSegment {
                segment: spec.name.clone(),
                reason: "batch count must be positive".to_string(),
            });
        }
        spec.validate()?;

        let total = spec.prefixes.len();
        let batch_size = total.div_ceil(batch_count);
        let targets = &spec.next_hop_targets;
        let reuse_targets = targets.len() < batch_size;
        let targets_per_batch = targets.len() / batch_count;
        if reuse_targets && spec.semantics.needs_target() {
            warn!(
                "{}: next-hop targets are fewer than the batch size ({} < {}), reusing them for all batches",
                spec.name,
                targets.len(),
                batch_size
            );
        }

        let group_count = if spec.group_count < batch_count {
            warn!(
                "{}: group count below batch count ({} < {}), raising it to {}",
                spec.name, spec.group_count, batch_count, batch_count
            );
            batch_count
        } else {
            spec.group_count
        };
        let groups_in_batch = group_count / batch_count;

        debug!(
            "{}: groups: {}, next hops per group: {}, targets per batch: {}, batch size: {}, total prefixes: {}",
            spec.name, group_count, spec.next_hops_per_group, targets_per_batch, batch_size, total
        );

        let mut batches = Vec::with_capacity(batch_count);
        for batch in 0..batch_count {
            let start = (batch * batch_size).min(total);
            let end = (start + batch_size).min(total);

            let batch_targets: &[IpAddress] = if reuse_targets || targets_per_batch == 0 {
                targets
            } else {
                &targets[batch * targets_per_batch..(batch + 1) * targets_per_batch]
            };

            let entries = self.build_batch(
                spec,
                &spec.prefixes[start..end],
                start,
                groups_in_batch,
                batch_targets,
            )?;
            debug!(
                "{}: batch {}: NHGs: {}, NHs: {}, IPv4 routes: {}, IPv6 routes: {}, prefixes: {}",
                spec.name,
                batch,
                entries.next_hop_groups.len(),
                entries.next_hops.len(),
                entries.v4_routes.len(),
                entries.v6_routes.len(),
                entries.v4_prefixes.len()
            );
            batches.push(entries);
        }

        let built = BuiltSegment {
            name: spec.name.clone(),
            batches,
        };
        let counts = built.counts();
        info!(
            "{}: built {} batches - NHs: {}, NHGs: {}, IPv4 routes: {}, IPv6 routes: {}",
            spec.name,
            batch_count,
            counts.next_hops,
            counts.next_hop_groups,
            counts.v4_routes,
            counts.v6_routes
        );
        Ok(built)
    }

    fn build_batch(
        &self,
        spec: &SegmentSpec,
        prefixes: &[IpPrefix],
        offset: usize,
        groups_in_batch: usize,
        targets: &[IpAddress],
    ) -> Result<PairedEntries> {
        let batch_entries = prefixes.len();
        let ceiling = batch_entries.div_ceil(groups_in_batch);
        let floor = batch_entries / groups_in_batch;
        let use_ceiling = batch_entries - floor * groups_in_batch;
        debug!(
            "{}: batch entries: {}, groups: {}, ceiling: {}, floor: {}, ceiling groups: {}",
            spec.name, batch_entries, groups_in_batch, ceiling, floor, use_ceiling
        );

        // Every group id of the batch is reserved even if fewer groups end up used.
        let group_ids: Vec<u64> = (0..groups_in_batch)
            .map(|_| self.pool.next_nhg_id())
            .collect();

        let mut pe = PairedEntries::default();
        let mut group_index = 0usize;
        let mut assigned = 0usize;
        let mut prefix_limit = ceiling;
        let mut current_group = 0u64;

        for (i, prefix) in prefixes.iter().enumerate() {
            if i == 0 || (prefix_limit > 0 && assigned == prefix_limit) {
                if group_index >= use_ceiling {
                    prefix_limit = floor;
                }
                current_group = group_ids[group_index % groups_in_batch];
                let group = self.build_group(spec, current_group, group_index, targets, &mut pe)?;
                pe.next_hop_groups.push(group);
                group_index += 1;
                assigned = 0;
            }
            assigned += 1;

            if prefix.is_host_route() {
                pe.v4_prefixes.push(*prefix.address());
            } else {
                pe.v4_prefixes
                    .extend(generate_addresses(prefix, spec.addresses_per_subnet));
            }
            pe.v4_routes.push(RouteEntry::new(
                *prefix,
                spec.prefix_network_instance.as_str(),
                current_group,
                self.default_network_instance.as_str(),
            ));

            if let Some(v6) = spec.prefixes_v6.get(offset + i) {
                pe.v6_routes.push(RouteEntry::new(
                    *v6,
                    spec.prefix_network_instance.as_str(),
                    current_group,
                    self.default_network_instance.as_str(),
                ));
                pe.v6_prefixes.push(*v6.address());
            }
        }

        Ok(pe)
    }

    fn build_group(
        &self,
        spec: &SegmentSpec,
        group_id: u64,
        group_index: usize,
        targets: &[IpAddress],
        pe: &mut PairedEntries,
    ) -> Result<NextHopGroupEntry> {
        let mut group = NextHopGroupEntry::new(group_id, self.default_network_instance.as_str());
        if let Some(backup) = spec.backup_group {
            group = group.with_backup(backup);
        }

        for (j, weight) in spec.weights.iter().enumerate() {
            let nh_id = self.pool.next_nh_id();
            let target = || {
                targets
                    .get((group_index * spec.next_hops_per_group + j) % targets.len().max(1))
                    .copied()
                    .ok_or_else(|| ScaleError::MissingNextHopTargets {
                        segment: spec.name.clone(),
                        semantics: spec.semantics.to_string(),
                    })
            };
            let tunnel_source = || {
                spec.tunnel_source.ok_or_else(|| ScaleError::MissingTunnelSource {
                    segment: spec.name.clone(),
                    semantics: spec.semantics.to_string(),
                })
            };

            let action = match spec.semantics {
                NextHopSemantics::Plain => NextHopAction::Ip { address: target()? },
                NextHopSemantics::Encap => NextHopAction::Encap {
                    source: tunnel_source()?,
                    destination: target()?,
                },
                NextHopSemantics::Decap => NextHopAction::Decap,
                NextHopSemantics::DecapEncap => NextHopAction::DecapEncap {
                    source: tunnel_source()?,
                    destination: target()?,
                },
            };

            pe.next_hops.push(
                NextHopEntry::new(nh_id, self.default_network_instance.as_str(), action)
                    .with_next_hop_network_instance(spec.next_hop_network_instance.as_str()),
            );
            group.add_next_hop(nh_id, *weight);
        }

        Ok(group)
    }
}
