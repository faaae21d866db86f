//! Scale profile orchestration.
//!
//! A [`ProfileOrchestrator`] is built once from a [`ProfileConfig`]: it
//! allocates the shared backup chain, resolves every segment against the
//! named-segment defaults, builds them, and combines them per batch. After
//! construction nothing is synthesized again; push and delete only replay the
//! prebuilt payloads against the configured [`RibClient`].
//!
//! Batch state is a per-index `Unconfigured`/`Configured` flag kept under a
//! mutex. The transactions themselves are not serialized by the orchestrator.

use crate::address::{generate_addresses, generate_subnet_hosts, variable_length_subnets};
use crate::client::{ClientError, RibClient};
use crate::combine::{BatchCombiner, CombinedStats, Ordered};
use crate::config::{AddressConfig, BackupRef, ProfileConfig, SegmentConfig};
use crate::entry::{Entry, NextHopAction, NextHopEntry, NextHopGroupEntry, NextHopSemantics};
use crate::error::{Result, ScaleError};
use crate::expected::{ExpectedResultMirror, ExpectedResults};
use crate::id_pool::IdPool;
use crate::segment::{BuiltSegment, RouteSegmentBuilder, SegmentSpec};
use crate::weights::generate_weights;
use gribi_types::{IpAddress, IpPrefix};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const TRANSIT_VRF: &str = "TRANSIT_VRF";
pub const REPAIRED_VRF: &str = "REPAIRED";
pub const ENCAP_VRFS: [&str; 4] = [
    "ENCAP_TE_VRF_A",
    "ENCAP_TE_VRF_B",
    "ENCAP_TE_VRF_C",
    "ENCAP_TE_VRF_D",
];
pub const DECAP_VRF: &str = "DECAP_TE_VRF";

/// The named segments of the scale profile, in canonical combine order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SegmentKind {
    PrimaryLevel1,
    PrimaryLevel2,
    PrimaryLevel3A,
    PrimaryLevel3B,
    PrimaryLevel3C,
    PrimaryLevel3D,
    Frr1Level1,
    Frr1Level2,
    DecapWan,
    DecapWanVar,
}

impl SegmentKind {
    pub const ALL: [SegmentKind; 10] = [
        SegmentKind::PrimaryLevel1,
        SegmentKind::PrimaryLevel2,
        SegmentKind::PrimaryLevel3A,
        SegmentKind::PrimaryLevel3B,
        SegmentKind::PrimaryLevel3C,
        SegmentKind::PrimaryLevel3D,
        SegmentKind::Frr1Level1,
        SegmentKind::Frr1Level2,
        SegmentKind::DecapWan,
        SegmentKind::DecapWanVar,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            SegmentKind::PrimaryLevel1 => "PrimaryLevel1",
            SegmentKind::PrimaryLevel2 => "PrimaryLevel2",
            SegmentKind::PrimaryLevel3A => "PrimaryLevel3A",
            SegmentKind::PrimaryLevel3B => "PrimaryLevel3B",
            SegmentKind::PrimaryLevel3C => "PrimaryLevel3C",
            SegmentKind::PrimaryLevel3D => "PrimaryLevel3D",
            SegmentKind::Frr1Level1 => "Frr1Level1",
            SegmentKind::Frr1Level2 => "Frr1Level2",
            SegmentKind::DecapWan => "DecapWan",
            SegmentKind::DecapWanVar => "DecapWanVar",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Index of an encap level 3 segment (A = 0 ... D = 3).
    const fn encap_index(&self) -> Option<usize> {
        match self {
            SegmentKind::PrimaryLevel3A => Some(0),
            SegmentKind::PrimaryLevel3B => Some(1),
            SegmentKind::PrimaryLevel3C => Some(2),
            SegmentKind::PrimaryLevel3D => Some(3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchState {
    Unconfigured,
    Configured,
}

/// Backup groups shared by every segment of a profile.
#[derive(Debug, Clone)]
pub struct BackupChain {
    pub decap_to_default: u64,
    pub redirect_to_repaired: u64,
    entries: Ordered<Entry>,
}

impl BackupChain {
    /// Allocates the chain: a decap next hop and its group, then the
    /// redirect group and its next hop into the repaired instance.
    pub fn build(pool: &IdPool, default_ni: &str) -> Self {
        let decap_nh = pool.next_nh_id();
        let decap_to_default = pool.next_nhg_id();
        let redirect_to_repaired = pool.next_nhg_id();
        let redirect_nh = pool.next_nh_id();

        let entries = vec![
            NextHopEntry::new(decap_nh, default_ni, NextHopAction::Decap)
                .with_next_hop_network_instance(default_ni)
                .into(),
            NextHopGroupEntry::new(decap_to_default, default_ni)
                .with_next_hop(decap_nh, 1)
                .into(),
            NextHopEntry::new(redirect_nh, default_ni, NextHopAction::Lookup)
                .with_next_hop_network_instance(REPAIRED_VRF)
                .into(),
            NextHopGroupEntry::new(redirect_to_repaired, default_ni)
                .with_next_hop(redirect_nh, 1)
                .into(),
        ];

        Self {
            decap_to_default,
            redirect_to_repaired,
            entries: Ordered::from_adds(entries),
        }
    }

    pub fn entries(&self) -> &Ordered<Entry> {
        &self.entries
    }

    pub fn group_for(&self, backup: BackupRef) -> Option<u64> {
        match backup {
            BackupRef::None => None,
            BackupRef::DecapToDefault => Some(self.decap_to_default),
            BackupRef::RedirectToRepaired => Some(self.redirect_to_repaired),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileStats {
    pub pushes: u64,
    pub deletes: u64,
    pub entries_added: u64,
    pub entries_deleted: u64,
    pub backup_installs: u64,
}

#[derive(Debug, Default)]
struct Counters {
    pushes: AtomicU64,
    deletes: AtomicU64,
    entries_added: AtomicU64,
    entries_deleted: AtomicU64,
    backup_installs: AtomicU64,
}

/// Defaults a segment falls back to, before per-field overrides.
struct SegmentDefaults {
    prefixes: Vec<IpPrefix>,
    prefixes_v6: Vec<IpPrefix>,
    targets: Vec<IpAddress>,
    semantics: NextHopSemantics,
    next_hop_ni: String,
    prefix_ni: String,
    groups: usize,
    next_hops_per_group: usize,
    weight_sum: Option<u64>,
    backup: BackupRef,
    tunnel_source: Option<IpAddress>,
}

impl SegmentDefaults {
    fn custom(default_ni: &str) -> Self {
        Self {
            prefixes: Vec::new(),
            prefixes_v6: Vec::new(),
            targets: Vec::new(),
            semantics: NextHopSemantics::Plain,
            next_hop_ni: default_ni.to_string(),
            prefix_ni: default_ni.to_string(),
            groups: 1,
            next_hops_per_group: 1,
            weight_sum: None,
            backup: BackupRef::None,
            tunnel_source: None,
        }
    }
}

fn hosts(seed: &IpPrefix, count: usize) -> Vec<IpPrefix> {
    generate_addresses(seed, count)
        .into_iter()
        .map(IpPrefix::host)
        .collect()
}

fn named_defaults(kind: SegmentKind, config: &ProfileConfig) -> Result<SegmentDefaults> {
    let addresses: &AddressConfig = &config.addresses;
    let default_ni = config.default_network_instance.as_str();
    let vips = || generate_addresses(&addresses.vip_block, addresses.vip_count);
    let frr_vips = || generate_addresses(&addresses.frr1_vip_block, addresses.vip_count);
    let tunnel_dests = || hosts(&addresses.tunnel_block, addresses.tunnel_count);
    let mut defaults = SegmentDefaults::custom(default_ni);

    if let Some(index) = kind.encap_index() {
        defaults.prefixes = addresses
            .encap_v4_blocks
            .get(index)
            .map(|block| hosts(block, addresses.encap_count))
            .unwrap_or_default();
        defaults.prefixes_v6 = match addresses.encap_v6_blocks.get(index) {
            Some(block) => generate_subnet_hosts(block, addresses.encap_count)?
                .into_iter()
                .map(IpPrefix::host)
                .collect(),
            None => Vec::new(),
        };
        defaults.targets = generate_addresses(&addresses.tunnel_block, addresses.tunnel_count);
        defaults.semantics = NextHopSemantics::Encap;
        defaults.next_hop_ni = TRANSIT_VRF.to_string();
        defaults.prefix_ni = ENCAP_VRFS[index].to_string();
        defaults.groups = 200;
        defaults.next_hops_per_group = 8;
        defaults.weight_sum = Some(8);
        defaults.tunnel_source = Some(if index < 2 {
            addresses.tunnel_source_ab
        } else {
            addresses.tunnel_source_cd
        });
        return Ok(defaults);
    }

    match kind {
        SegmentKind::PrimaryLevel1 => {
            defaults.prefixes = vips().into_iter().map(IpPrefix::host).collect();
            defaults.targets = addresses.egress_next_hops.clone();
            defaults.groups = 512;
            defaults.next_hops_per_group = 8;
            defaults.weight_sum = Some(16);
        }
        SegmentKind::PrimaryLevel2 => {
            defaults.prefixes = tunnel_dests();
            defaults.prefix_ni = TRANSIT_VRF.to_string();
            defaults.targets = vips();
            defaults.groups = 256;
            defaults.next_hops_per_group = 2;
            defaults.weight_sum = Some(8);
            if config.frr1_backup {
                defaults.backup = BackupRef::RedirectToRepaired;
            }
        }
        SegmentKind::Frr1Level1 => {
            defaults.prefixes = frr_vips().into_iter().map(IpPrefix::host).collect();
            defaults.targets = addresses.frr1_next_hops.clone();
            defaults.groups = 512;
            defaults.next_hops_per_group = 8;
            defaults.weight_sum = Some(16);
        }
        SegmentKind::Frr1Level2 => {
            defaults.prefixes = tunnel_dests();
            defaults.prefix_ni = REPAIRED_VRF.to_string();
            defaults.targets = frr_vips();
            defaults.semantics = NextHopSemantics::DecapEncap;
            defaults.groups = 256;
            defaults.next_hops_per_group = 8;
            defaults.weight_sum = Some(8);
            defaults.tunnel_source = Some(addresses.tunnel_source_cd);
            if config.frr2_backup {
                defaults.backup = BackupRef::DecapToDefault;
            }
        }
        SegmentKind::DecapWan => {
            defaults.prefixes = hosts(&addresses.decap_block, addresses.decap_count);
            defaults.prefix_ni = DECAP_VRF.to_string();
            defaults.semantics = NextHopSemantics::Decap;
            defaults.groups = 1000;
        }
        SegmentKind::DecapWanVar => {
            defaults.prefixes = variable_length_subnets(
                addresses.decap_var_subnets_per_block,
                &addresses.decap_var_blocks,
            )?;
            defaults.prefix_ni = DECAP_VRF.to_string();
            defaults.semantics = NextHopSemantics::Decap;
            defaults.groups = 48;
        }
        _ => {}
    }
    Ok(defaults)
}

/// Applies `overrides` on top of `defaults`.
fn resolve_spec(
    overrides: &SegmentConfig,
    defaults: SegmentDefaults,
    backups: &BackupChain,
) -> SegmentSpec {
    let next_hops_per_group = overrides
        .next_hops_per_group
        .unwrap_or(defaults.next_hops_per_group);
    let weights = overrides.weights.clone().unwrap_or_else(|| {
        let sum = overrides
            .weight_sum
            .or(defaults.weight_sum)
            .unwrap_or(next_hops_per_group as u64);
        generate_weights(sum, next_hops_per_group)
    });
    let backup = overrides.backup.unwrap_or(defaults.backup);

    SegmentSpec {
        name: overrides.segment.clone(),
        prefixes: overrides.prefixes.clone().unwrap_or(defaults.prefixes),
        prefixes_v6: overrides.prefixes_v6.clone().unwrap_or(defaults.prefixes_v6),
        next_hop_targets: overrides.next_hop_targets.clone().unwrap_or(defaults.targets),
        semantics: overrides.semantics.unwrap_or(defaults.semantics),
        next_hop_network_instance: overrides
            .next_hop_network_instance
            .clone()
            .unwrap_or(defaults.next_hop_ni),
        prefix_network_instance: overrides
            .prefix_network_instance
            .clone()
            .unwrap_or(defaults.prefix_ni),
        group_count: overrides.group_count.unwrap_or(defaults.groups),
        next_hops_per_group,
        weights,
        backup_group: backups.group_for(backup),
        tunnel_source: overrides.tunnel_source.or(defaults.tunnel_source),
        addresses_per_subnet: overrides.addresses_per_subnet.unwrap_or(1),
    }
}

/// Resolves the configured segments in combine order: named segments in
/// canonical order, then custom segments in declaration order.
fn resolve_segments(config: &ProfileConfig, backups: &BackupChain) -> Result<Vec<SegmentSpec>> {
    let requested: Vec<SegmentConfig> = if config.segments.is_empty() {
        SegmentKind::ALL
            .iter()
            .map(|kind| SegmentConfig::named(kind.name()))
            .collect()
    } else {
        config.segments.clone()
    };

    let mut named: Vec<(SegmentKind, SegmentSpec)> = Vec::new();
    let mut custom = Vec::new();
    for overrides in &requested {
        match SegmentKind::from_name(&overrides.segment) {
            Some(kind) => {
                let defaults = named_defaults(kind, config)?;
                named.push((kind, resolve_spec(overrides, defaults, backups)));
            }
            None => {
                let defaults = SegmentDefaults::custom(&config.default_network_instance);
                custom.push(resolve_spec(overrides, defaults, backups));
            }
        }
    }
    named.sort_by_key(|(kind, _)| *kind);

    Ok(named.into_iter().map(|(_, spec)| spec).chain(custom).collect())
}

/// Owns a built profile and replays its batches against a RIB client.
pub struct ProfileOrchestrator {
    config: ProfileConfig,
    pool: Arc<IdPool>,
    backups: BackupChain,
    use_backups: bool,
    specs: Vec<SegmentSpec>,
    segments: Vec<BuiltSegment>,
    combined: Vec<Ordered<Entry>>,
    combined_stats: CombinedStats,
    used_batches: Mutex<BTreeSet<usize>>,
    /// Held across the install so concurrent pushes submit the chain once
    backups_installed: tokio::sync::Mutex<bool>,
    counters: Counters,
    client: Option<Arc<dyn RibClient>>,
}

impl ProfileOrchestrator {
    /// Builds the whole profile. All identifiers are allocated here.
    pub fn new(config: ProfileConfig, pool: Arc<IdPool>) -> Result<Self> {
        config.validate()?;
        let default_ni = config.default_network_instance.clone();
        let batch_count = config.batch_count;

        let backups = BackupChain::build(&pool, &default_ni);
        let specs = resolve_segments(&config, &backups)?;

        let builder =
            RouteSegmentBuilder::new(Arc::clone(&pool)).with_default_network_instance(&default_ni);
        let mut segments = Vec::with_capacity(specs.len());
        for spec in &specs {
            if spec.prefixes.is_empty() {
                info!("{}: no prefixes, skipping", spec.name);
                continue;
            }
            segments.push(builder.build(spec, batch_count)?);
        }

        let built_names: HashSet<&str> = segments.iter().map(|s| s.name.as_str()).collect();
        let use_backups = specs
            .iter()
            .any(|spec| spec.backup_group.is_some() && built_names.contains(spec.name.as_str()));

        let parts: Vec<&BuiltSegment> = segments.iter().collect();
        let (combined, combined_stats) = BatchCombiner::combine(batch_count, &parts);
        for (batch, counts) in combined_stats.batches.iter().enumerate() {
            info!(
                "batch {}: NHs: {}, NHGs: {}, IPv4 routes: {}, IPv6 routes: {}",
                batch, counts.next_hops, counts.next_hop_groups, counts.v4_routes, counts.v6_routes
            );
        }
        info!(
            "profile built: {} segments, {} batches, backups {}",
            segments.len(),
            batch_count,
            if use_backups { "enabled" } else { "disabled" }
        );

        Ok(Self {
            config,
            pool,
            backups,
            use_backups,
            specs,
            segments,
            combined,
            combined_stats,
            used_batches: Mutex::new(BTreeSet::new()),
            backups_installed: tokio::sync::Mutex::new(false),
            counters: Counters::default(),
            client: None,
        })
    }

    pub fn set_client(&mut self, client: Arc<dyn RibClient>) {
        self.client = Some(client);
    }

    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<IdPool> {
        &self.pool
    }

    pub fn batch_count(&self) -> usize {
        self.config.batch_count
    }

    pub fn backup_chain(&self) -> &BackupChain {
        &self.backups
    }

    /// Backup entries in install order.
    pub fn backup_entries(&self) -> &[Entry] {
        self.backups.entries().adds()
    }

    pub fn uses_backups(&self) -> bool {
        self.use_backups
    }

    /// Resolved specs, including skipped empty ones.
    pub fn specs(&self) -> &[SegmentSpec] {
        &self.specs
    }

    /// Built segments in combine order.
    pub fn segments(&self) -> &[BuiltSegment] {
        &self.segments
    }

    pub fn segment(&self, name: &str) -> Option<&BuiltSegment> {
        self.segments.iter().find(|segment| segment.name == name)
    }

    pub fn combined_batch(&self, index: usize) -> Option<&Ordered<Entry>> {
        self.combined.get(index)
    }

    pub fn combined_stats(&self) -> &CombinedStats {
        &self.combined_stats
    }

    pub fn used_batches(&self) -> BTreeSet<usize> {
        self.used_batches.lock().clone()
    }

    pub fn is_configured(&self, index: usize) -> bool {
        self.used_batches.lock().contains(&index)
    }

    pub fn batch_state(&self, index: usize) -> Result<BatchState> {
        self.check_index(index)?;
        Ok(if self.is_configured(index) {
            BatchState::Configured
        } else {
            BatchState::Unconfigured
        })
    }

    pub fn stats(&self) -> ProfileStats {
        ProfileStats {
            pushes: self.counters.pushes.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
            entries_added: self.counters.entries_added.load(Ordering::Relaxed),
            entries_deleted: self.counters.entries_deleted.load(Ordering::Relaxed),
            backup_installs: self.counters.backup_installs.load(Ordering::Relaxed),
        }
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.config.batch_count {
            return Err(ScaleError::BatchOutOfRange {
                index,
                batch_count: self.config.batch_count,
            });
        }
        Ok(())
    }

    fn check_indices(&self, indices: &[usize]) -> Result<()> {
        let mut seen = HashSet::new();
        for &index in indices {
            self.check_index(index)?;
            if !seen.insert(index) {
                return Err(ScaleError::DuplicateBatch(index));
            }
        }
        Ok(())
    }

    /// The combined payload of `indices`, in the given order.
    pub fn payload(&self, indices: &[usize]) -> Result<Ordered<Entry>> {
        self.check_indices(indices)?;
        Ok(Ordered::concat(indices.iter().map(|&i| &self.combined[i])))
    }

    /// Expected confirmations for pushing and deleting `indices`.
    pub fn expected_results(&self, indices: &[usize]) -> Result<ExpectedResults> {
        Ok(ExpectedResultMirror::mirror(&self.payload(indices)?))
    }

    fn client(&self) -> Result<&Arc<dyn RibClient>> {
        self.client.as_ref().ok_or(ScaleError::NoClient)
    }

    fn transaction_error(phase: &str, indices: &[usize], source: ClientError) -> ScaleError {
        ScaleError::Transaction {
            phase: phase.to_string(),
            batches: indices.to_vec(),
            source,
        }
    }

    async fn install_backups(&self, client: &Arc<dyn RibClient>, indices: &[usize]) -> Result<()> {
        if !self.use_backups {
            return Ok(());
        }
        let mut installed = self.backups_installed.lock().await;
        if *installed {
            return Ok(());
        }

        let entries = self.backups.entries();
        let expected = ExpectedResultMirror::mirror(entries);
        info!("installing {} shared backup entries", entries.len());
        client
            .add_entries(entries.adds(), Some(&expected.adds))
            .await
            .map_err(|e| Self::transaction_error("backup install", indices, e))?;
        client
            .await_completion(self.config.timeouts.backup_await())
            .await
            .map_err(|e| Self::transaction_error("backup install", indices, e))?;

        *installed = true;
        self.counters.backup_installs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Installs the batches in `indices` as one transaction.
    pub async fn push_batches(&self, indices: &[usize]) -> Result<()> {
        let payload = self.payload(indices)?;
        let client = self.client()?;

        self.install_backups(client, indices).await?;

        let expected = ExpectedResultMirror::mirror(&payload);
        info!("pushing batches {:?}: {} entries", indices, payload.len());
        client
            .add_entries(payload.adds(), Some(&expected.adds))
            .await
            .map_err(|e| Self::transaction_error("push", indices, e))?;
        client
            .await_completion(self.config.timeouts.program_await())
            .await
            .map_err(|e| Self::transaction_error("push", indices, e))?;

        let mut used = self.used_batches.lock();
        for &index in indices {
            if !used.insert(index) {
                debug!("batch {} was already configured", index);
            }
        }
        drop(used);

        self.counters.pushes.fetch_add(1, Ordering::Relaxed);
        self.counters
            .entries_added
            .fetch_add(payload.len() as u64, Ordering::Relaxed);
        info!("batches {:?} configured", indices);
        Ok(())
    }

    /// Withdraws the batches in `indices` as one transaction, in teardown order.
    pub async fn delete_batches(&self, indices: &[usize]) -> Result<()> {
        let payload = self.payload(indices)?;
        let client = self.client()?;

        let configured = self.used_batches();
        if let Some(index) = indices.iter().find(|i| !configured.contains(i)) {
            warn!("deleting batch {} which is not configured", index);
        }

        let expected = ExpectedResultMirror::mirror(&payload);
        info!("deleting batches {:?}: {} entries", indices, payload.len());
        client
            .delete_entries(payload.deletes(), Some(&expected.deletes))
            .await
            .map_err(|e| Self::transaction_error("delete", indices, e))?;
        client
            .await_completion(self.config.timeouts.program_await())
            .await
            .map_err(|e| Self::transaction_error("delete", indices, e))?;

        let mut used = self.used_batches.lock();
        for index in indices {
            used.remove(index);
        }
        drop(used);

        self.counters.deletes.fetch_add(1, Ordering::Relaxed);
        self.counters
            .entries_deleted
            .fetch_add(payload.len() as u64, Ordering::Relaxed);
        info!("batches {:?} unconfigured", indices);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RecordingClient;
    use crate::entry::EntryKey;
    use crate::expected::OperationType;
    use pretty_assertions::assert_eq;

    fn small_config() -> ProfileConfig {
        let mut config = ProfileConfig::default();
        config.batch_count = 2;
        config.addresses.vip_count = 16;
        config.addresses.tunnel_count = 32;
        config.addresses.encap_count = 16;
        config.addresses.decap_count = 8;
        config.addresses.decap_var_subnets_per_block = 2;
        config
    }

    fn build(config: ProfileConfig) -> ProfileOrchestrator {
        ProfileOrchestrator::new(config, Arc::new(IdPool::new(0))).unwrap()
    }

    fn with_client(config: ProfileConfig) -> (ProfileOrchestrator, Arc<RecordingClient>) {
        let mut profile = build(config);
        let client = Arc::new(RecordingClient::new());
        profile.set_client(client.clone());
        (profile, client)
    }

    // 1. Construction Tests

    #[test]
    fn test_segment_kind_names_round_trip() {
        for kind in SegmentKind::ALL {
            assert_eq!(SegmentKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(SegmentKind::from_name("Custom"), None);
    }

    #[test]
    fn test_default_profile_canonical_order() {
        let profile = build(small_config());
        let names: Vec<&str> = profile.segments().iter().map(|s| s.name.as_str()).collect();
        let expected: Vec<&str> = SegmentKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_backup_chain_layout() {
        let profile = build(small_config());
        let chain = profile.backup_chain();
        let keys: Vec<EntryKey> = profile.backup_entries().iter().map(Entry::key).collect();
        // Pool base 0: NH 1, NHG 1 (decap), NHG 2 (redirect), NH 2.
        assert_eq!(
            keys,
            vec![
                EntryKey::NextHop(1),
                EntryKey::NextHopGroup(1),
                EntryKey::NextHop(2),
                EntryKey::NextHopGroup(2),
            ]
        );
        assert_eq!(chain.decap_to_default, 1);
        assert_eq!(chain.redirect_to_repaired, 2);
        match &profile.backup_entries()[2] {
            Entry::NextHop(nh) => {
                assert_eq!(nh.next_hop_network_instance.as_deref(), Some(REPAIRED_VRF))
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_encap_segment_defaults() {
        let profile = build(small_config());
        let spec = profile
            .specs()
            .iter()
            .find(|s| s.name == "PrimaryLevel3C")
            .unwrap();
        assert_eq!(spec.prefix_network_instance, "ENCAP_TE_VRF_C");
        assert_eq!(spec.next_hop_network_instance, TRANSIT_VRF);
        assert_eq!(spec.semantics, NextHopSemantics::Encap);
        assert_eq!(spec.tunnel_source.unwrap().to_string(), "198.51.100.222");
        assert_eq!(spec.weights, vec![1; 8]);
        assert_eq!(spec.prefixes[0].to_string(), "138.3.0.0/32");
        assert_eq!(spec.prefixes_v6[1].to_string(), "2001:db8:2:2::1/128");
    }

    #[test]
    fn test_level2_weights_follow_fan_out() {
        let profile = build(small_config());
        let spec = profile.specs().iter().find(|s| s.name == "PrimaryLevel2").unwrap();
        assert_eq!(spec.weights, vec![1, 7]);
        assert_eq!(spec.backup_group, None);
    }

    #[test]
    fn test_frr_flags_attach_backups() {
        let mut config = small_config();
        config.frr1_backup = true;
        config.frr2_backup = true;
        let profile = build(config);
        let chain = profile.backup_chain();
        assert!(profile.uses_backups());

        let level2 = profile.segment("PrimaryLevel2").unwrap();
        assert!(level2.batches[0]
            .next_hop_groups
            .iter()
            .all(|g| g.backup_group == Some(chain.redirect_to_repaired)));

        let frr2 = profile.segment("Frr1Level2").unwrap();
        assert!(frr2.batches[1]
            .next_hop_groups
            .iter()
            .all(|g| g.backup_group == Some(chain.decap_to_default)));
    }

    #[test]
    fn test_custom_segment_after_named() {
        let mut config = small_config();
        config.segments = vec![
            SegmentConfig {
                prefixes: Some(vec!["10.0.0.1/32".parse().unwrap(), "10.0.0.2/32".parse().unwrap()]),
                semantics: Some(NextHopSemantics::Decap),
                ..SegmentConfig::named("custom")
            },
            SegmentConfig::named("empty"),
            SegmentConfig::named("DecapWan"),
        ];
        let profile = build(config);
        let names: Vec<&str> = profile.segments().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["DecapWan", "custom"]);
        assert_eq!(profile.specs().len(), 3);
        assert_eq!(profile.segment("custom").unwrap().counts().v4_routes, 2);
    }

    #[tokio::test]
    async fn test_frr_flag_without_referencing_segment() {
        let mut config = small_config();
        config.frr1_backup = true;
        config.frr2_backup = true;
        config.segments = vec![SegmentConfig::named("PrimaryLevel1"), SegmentConfig::named("DecapWan")];
        let (profile, client) = with_client(config);
        assert!(!profile.uses_backups());

        profile.push_batches(&[0]).await.unwrap();
        assert_eq!(client.transactions().len(), 1);
        assert_eq!(profile.stats().backup_installs, 0);
    }

    #[test]
    fn test_overrides_replace_defaults() {
        let mut config = small_config();
        config.segments = vec![SegmentConfig {
            group_count: Some(4),
            next_hops_per_group: Some(3),
            weight_sum: Some(10),
            backup: Some(BackupRef::DecapToDefault),
            ..SegmentConfig::named("PrimaryLevel1")
        }];
        let profile = build(config);
        let spec = &profile.specs()[0];
        assert_eq!(spec.group_count, 4);
        assert_eq!(spec.weights, vec![1, 2, 7]);
        assert_eq!(spec.backup_group, Some(profile.backup_chain().decap_to_default));
        assert!(profile.uses_backups());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = small_config();
        config.batch_count = 0;
        assert!(ProfileOrchestrator::new(config, Arc::new(IdPool::new(0))).is_err());
    }

    // 2. Batch State Tests

    #[tokio::test]
    async fn test_push_marks_configured() {
        let (profile, client) = with_client(small_config());
        assert_eq!(profile.batch_state(1).unwrap(), BatchState::Unconfigured);

        profile.push_batches(&[1]).await.unwrap();
        assert_eq!(profile.batch_state(1).unwrap(), BatchState::Configured);
        assert!(!profile.is_configured(0));

        let expected = profile.expected_results(&[1]).unwrap();
        ExpectedResultMirror::verify(&expected.adds, &client.results()).unwrap();
        assert_eq!(profile.stats().pushes, 1);
    }

    #[tokio::test]
    async fn test_push_rejects_bad_indices() {
        let (profile, client) = with_client(small_config());
        assert!(matches!(
            profile.push_batches(&[2]).await,
            Err(ScaleError::BatchOutOfRange { index: 2, batch_count: 2 })
        ));
        assert!(matches!(
            profile.push_batches(&[0, 0]).await,
            Err(ScaleError::DuplicateBatch(0))
        ));
        assert!(client.transactions().is_empty());
        assert!(profile.batch_state(5).is_err());
    }

    #[tokio::test]
    async fn test_push_without_client() {
        let profile = build(small_config());
        assert!(matches!(profile.push_batches(&[0]).await, Err(ScaleError::NoClient)));
    }

    #[tokio::test]
    async fn test_backups_installed_once() {
        let mut config = small_config();
        config.frr1_backup = true;
        let (profile, client) = with_client(config);

        profile.push_batches(&[0]).await.unwrap();
        profile.push_batches(&[1]).await.unwrap();

        let transactions = client.transactions();
        assert_eq!(transactions.len(), 3);
        assert_eq!(transactions[0].entries.as_slice(), profile.backup_entries());
        assert_eq!(profile.stats().backup_installs, 1);
        assert_eq!(client.await_count(), 3);
    }

    #[tokio::test]
    async fn test_delete_uses_teardown_order() {
        let (profile, client) = with_client(small_config());
        profile.push_batches(&[0, 1]).await.unwrap();
        let pushed = client.results().len();
        profile.delete_batches(&[0, 1]).await.unwrap();

        let expected = profile.expected_results(&[0, 1]).unwrap();
        ExpectedResultMirror::verify(&expected.deletes, &client.results_since(pushed)).unwrap();
        assert!(client.results_since(pushed).iter().all(|r| r.operation == OperationType::Delete));
        assert!(profile.used_batches().is_empty());
    }
}
