//! Profile configuration.
//!
//! Loads a [`ProfileConfig`] from YAML, JSON or TOML (chosen by file
//! extension). Every field has a default, so an empty file or a missing one
//! yields the full-scale profile.

use crate::entry::{NextHopSemantics, DEFAULT_NETWORK_INSTANCE};
use crate::error::{Result, ScaleError};
use crate::id_pool::DEFAULT_ID_BASE;
use gribi_types::{IpAddress, IpPrefix, Ipv4Address, Ipv6Address};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Await timeouts for programming transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Wait after installing the shared backup chain, in seconds
    #[serde(default = "default_backup_await_secs")]
    pub backup_await_secs: u64,

    /// Wait after each push or delete transaction, in seconds
    #[serde(default = "default_program_await_secs")]
    pub program_await_secs: u64,
}

/// Rate-limited pump settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpConfig {
    /// Entries sent per tick
    #[serde(default = "default_ops_per_tick")]
    pub ops_per_tick: usize,

    /// Tick period in milliseconds
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

/// Seed blocks and endpoints the named segments draw their defaults from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressConfig {
    #[serde(default = "default_vip_block")]
    pub vip_block: IpPrefix,

    #[serde(default = "default_frr1_vip_block")]
    pub frr1_vip_block: IpPrefix,

    #[serde(default = "default_vip_count")]
    pub vip_count: usize,

    #[serde(default = "default_tunnel_block")]
    pub tunnel_block: IpPrefix,

    #[serde(default = "default_tunnel_count")]
    pub tunnel_count: usize,

    #[serde(default = "default_encap_v4_blocks")]
    pub encap_v4_blocks: Vec<IpPrefix>,

    /// One IPv6 host is taken from each consecutive block of this length
    #[serde(default = "default_encap_v6_blocks")]
    pub encap_v6_blocks: Vec<IpPrefix>,

    #[serde(default = "default_encap_count")]
    pub encap_count: usize,

    #[serde(default = "default_decap_block")]
    pub decap_block: IpPrefix,

    #[serde(default = "default_decap_count")]
    pub decap_count: usize,

    #[serde(default = "default_decap_var_blocks")]
    pub decap_var_blocks: Vec<IpPrefix>,

    #[serde(default = "default_decap_var_subnets")]
    pub decap_var_subnets_per_block: usize,

    /// Tunnel source for encap VRFs A and B
    #[serde(default = "default_tunnel_source_ab")]
    pub tunnel_source_ab: IpAddress,

    /// Tunnel source for encap VRFs C and D and the FRR level 2 segment
    #[serde(default = "default_tunnel_source_cd")]
    pub tunnel_source_cd: IpAddress,

    /// Egress next hops for the primary level 1 segment
    #[serde(default = "default_egress_next_hops")]
    pub egress_next_hops: Vec<IpAddress>,

    /// Egress next hops for the FRR level 1 segment
    #[serde(default = "default_frr1_next_hops")]
    pub frr1_next_hops: Vec<IpAddress>,
}

/// Where a segment's groups fall back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupRef {
    /// No backup group
    None,
    /// Decapsulate and forward in the default instance
    DecapToDefault,
    /// Redirect to the repaired instance
    RedirectToRepaired,
}

/// Per-segment overrides. Unset fields take the named segment's default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentConfig {
    pub segment: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefixes: Option<Vec<IpPrefix>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefixes_v6: Option<Vec<IpPrefix>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_hop_targets: Option<Vec<IpAddress>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantics: Option<NextHopSemantics>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_hop_network_instance: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_network_instance: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_hops_per_group: Option<usize>,

    /// Explicit weights; takes precedence over `weight_sum`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<u64>>,

    /// Weight sum fed to the weight generator with the resolved fan-out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_sum: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel_source: Option<IpAddress>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses_per_subnet: Option<usize>,
}

impl SegmentConfig {
    pub fn named(segment: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            ..Self::default()
        }
    }
}

/// Complete scale profile configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Number of independently programmable batches
    #[serde(default = "default_batch_count")]
    pub batch_count: usize,

    /// Base of both identifier namespaces
    #[serde(default = "default_id_base")]
    pub id_base: u64,

    #[serde(default = "default_network_instance")]
    pub default_network_instance: String,

    /// Back primary level 2 groups with the redirect-to-repaired group
    #[serde(default)]
    pub frr1_backup: bool,

    /// Back FRR level 2 groups with the decap-to-default group
    #[serde(default)]
    pub frr2_backup: bool,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub pump: PumpConfig,

    #[serde(default)]
    pub addresses: AddressConfig,

    /// Segments to build; empty means the ten named segments with defaults
    #[serde(default)]
    pub segments: Vec<SegmentConfig>,
}

// Default functions
fn default_backup_await_secs() -> u64 {
    60
}

fn default_program_await_secs() -> u64 {
    600
}

fn default_ops_per_tick() -> usize {
    10
}

fn default_tick_millis() -> u64 {
    1000
}

const fn v4(a: u8, b: u8, c: u8, d: u8, len: u8) -> IpPrefix {
    IpPrefix::from_v4(Ipv4Address::new(a, b, c, d), len)
}

const fn v6_64(group2: u16, group3: u16, group4: u16) -> IpPrefix {
    IpPrefix::from_v6(Ipv6Address::new(0x2001, group2, group3, group4, 0, 0, 0, 0), 64)
}

fn default_vip_block() -> IpPrefix {
    v4(100, 100, 100, 1, 22)
}

fn default_frr1_vip_block() -> IpPrefix {
    v4(100, 101, 100, 1, 22)
}

fn default_vip_count() -> usize {
    512
}

fn default_tunnel_block() -> IpPrefix {
    v4(200, 200, 200, 1, 16)
}

fn default_tunnel_count() -> usize {
    1600
}

fn default_encap_v4_blocks() -> Vec<IpPrefix> {
    (1..=4).map(|b| v4(138, b, 1, 1, 16)).collect()
}

fn default_encap_v6_blocks() -> Vec<IpPrefix> {
    (0..4).map(|b| v6_64(0xdb8, b, 1)).collect()
}

fn default_encap_count() -> usize {
    5000
}

fn default_decap_block() -> IpPrefix {
    v4(102, 0, 0, 1, 15)
}

fn default_decap_count() -> usize {
    1000
}

fn default_decap_var_blocks() -> Vec<IpPrefix> {
    vec![
        v4(102, 51, 100, 1, 22),
        v4(107, 51, 105, 1, 24),
        v4(112, 51, 110, 1, 26),
        v4(117, 51, 115, 1, 28),
    ]
}

fn default_decap_var_subnets() -> usize {
    12
}

fn default_tunnel_source_ab() -> IpAddress {
    Ipv4Address::new(198, 51, 100, 111).into()
}

fn default_tunnel_source_cd() -> IpAddress {
    Ipv4Address::new(198, 51, 100, 222).into()
}

// Peer side of the point-to-point egress links.
fn default_egress_next_hops() -> Vec<IpAddress> {
    [2, 6, 10, 14]
        .into_iter()
        .map(|d| Ipv4Address::new(192, 0, 2, d).into())
        .collect()
}

fn default_frr1_next_hops() -> Vec<IpAddress> {
    [18, 22]
        .into_iter()
        .map(|d| Ipv4Address::new(192, 0, 2, d).into())
        .collect()
}

fn default_batch_count() -> usize {
    4
}

fn default_id_base() -> u64 {
    DEFAULT_ID_BASE
}

fn default_network_instance() -> String {
    DEFAULT_NETWORK_INSTANCE.to_string()
}

// Default implementations
impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            backup_await_secs: default_backup_await_secs(),
            program_await_secs: default_program_await_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn backup_await(&self) -> Duration {
        Duration::from_secs(self.backup_await_secs)
    }

    pub fn program_await(&self) -> Duration {
        Duration::from_secs(self.program_await_secs)
    }
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            ops_per_tick: default_ops_per_tick(),
            tick_millis: default_tick_millis(),
        }
    }
}

impl PumpConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            vip_block: default_vip_block(),
            frr1_vip_block: default_frr1_vip_block(),
            vip_count: default_vip_count(),
            tunnel_block: default_tunnel_block(),
            tunnel_count: default_tunnel_count(),
            encap_v4_blocks: default_encap_v4_blocks(),
            encap_v6_blocks: default_encap_v6_blocks(),
            encap_count: default_encap_count(),
            decap_block: default_decap_block(),
            decap_count: default_decap_count(),
            decap_var_blocks: default_decap_var_blocks(),
            decap_var_subnets_per_block: default_decap_var_subnets(),
            tunnel_source_ab: default_tunnel_source_ab(),
            tunnel_source_cd: default_tunnel_source_cd(),
            egress_next_hops: default_egress_next_hops(),
            frr1_next_hops: default_frr1_next_hops(),
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            batch_count: default_batch_count(),
            id_base: default_id_base(),
            default_network_instance: default_network_instance(),
            frr1_backup: false,
            frr2_backup: false,
            timeouts: TimeoutConfig::default(),
            pump: PumpConfig::default(),
            addresses: AddressConfig::default(),
            segments: Vec::new(),
        }
    }
}

enum Format {
    Yaml,
    Json,
    Toml,
}

fn format_of(path: &Path) -> Result<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => Ok(Format::Yaml),
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        _ => Err(ScaleError::Config(format!(
            "unsupported config file extension: {}",
            path.display()
        ))),
    }
}

impl ProfileConfig {
    /// Parses `content` in the format implied by `path`.
    pub fn parse(path: impl AsRef<Path>, content: &str) -> Result<Self> {
        let path = path.as_ref();
        let parse_error = |e: String| {
            ScaleError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        };

        match format_of(path)? {
            // An empty YAML document is a null, not an empty mapping.
            Format::Yaml if content.trim().is_empty() => Ok(Self::default()),
            Format::Yaml => serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string())),
            Format::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
            Format::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
        }
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::parse(path, &content)
    }

    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::parse(path, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(ScaleError::Io(e)),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let serialize_error =
            |e: String| ScaleError::Config(format!("Failed to serialize config: {}", e));

        let content = match format_of(path)? {
            Format::Yaml => serde_yaml::to_string(self).map_err(|e| serialize_error(e.to_string()))?,
            Format::Json => {
                serde_json::to_string_pretty(self).map_err(|e| serialize_error(e.to_string()))?
            }
            Format::Toml => toml::to_string_pretty(self).map_err(|e| serialize_error(e.to_string()))?,
        };

        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.batch_count == 0 {
            return Err(ScaleError::Config("batch_count must be > 0".to_string()));
        }

        if self.timeouts.backup_await_secs == 0 || self.timeouts.program_await_secs == 0 {
            return Err(ScaleError::Config("await timeouts must be > 0".to_string()));
        }

        if self.pump.ops_per_tick == 0 || self.pump.tick_millis == 0 {
            return Err(ScaleError::Config(
                "pump ops_per_tick and tick_millis must be > 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for segment in &self.segments {
            if segment.segment.is_empty() {
                return Err(ScaleError::Config("segment name must not be empty".to_string()));
            }
            if !seen.insert(segment.segment.as_str()) {
                return Err(ScaleError::DuplicateSegment(segment.segment.clone()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    // 1. Default Tests

    #[test]
    fn test_default_config() {
        let config = ProfileConfig::default();
        assert_eq!(config.batch_count, 4);
        assert_eq!(config.id_base, 20000);
        assert_eq!(config.default_network_instance, "DEFAULT");
        assert!(!config.frr1_backup);
        assert!(config.segments.is_empty());
    }

    #[test]
    fn test_timeout_and_pump_defaults() {
        let config = ProfileConfig::default();
        assert_eq!(config.timeouts.backup_await(), Duration::from_secs(60));
        assert_eq!(config.timeouts.program_await(), Duration::from_secs(600));
        assert_eq!(config.pump.ops_per_tick, 10);
        assert_eq!(config.pump.tick(), Duration::from_secs(1));
    }

    #[test]
    fn test_address_defaults() {
        let addresses = AddressConfig::default();
        assert_eq!(addresses.vip_block.to_string(), "100.100.100.1/22");
        assert_eq!(addresses.encap_v6_blocks[3].to_string(), "2001:db8:3:1::/64");
        assert_eq!(addresses.decap_var_blocks.len(), 4);
        assert_eq!(addresses.tunnel_source_cd.to_string(), "198.51.100.222");
        assert_eq!(addresses.egress_next_hops.len(), 4);
        assert_eq!(addresses.frr1_next_hops[0].to_string(), "192.0.2.18");
    }

    // 2. Validation Tests

    #[test]
    fn test_validate_valid_config() {
        assert!(ProfileConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_batches() {
        let mut config = ProfileConfig::default();
        config.batch_count = 0;
        assert!(matches!(config.validate(), Err(ScaleError::Config(_))));
    }

    #[test]
    fn test_validate_zero_timeout_and_pump() {
        let mut config = ProfileConfig::default();
        config.timeouts.program_await_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ProfileConfig::default();
        config.pump.ops_per_tick = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_duplicate_segment() {
        let mut config = ProfileConfig::default();
        config.segments = vec![SegmentConfig::named("DecapWan"), SegmentConfig::named("DecapWan")];
        assert!(matches!(
            config.validate(),
            Err(ScaleError::DuplicateSegment(name)) if name == "DecapWan"
        ));
    }

    // 3. Parsing Tests

    #[test]
    fn test_yaml_deserialization() {
        let yaml = r#"
batch_count: 2
frr1_backup: true
timeouts:
  program_await_secs: 30
addresses:
  egress_next_hops: ["192.0.2.1", "192.0.2.2"]
segments:
  - segment: DecapWan
    group_count: 10
    prefix_network_instance: DECAP_VRF
  - segment: custom
    prefixes: ["10.0.0.1", "10.1.0.0/16"]
    semantics: decap
"#;
        let config = ProfileConfig::parse("profile.yaml", yaml).unwrap();
        assert_eq!(config.batch_count, 2);
        assert!(config.frr1_backup);
        assert_eq!(config.timeouts.program_await_secs, 30);
        // Unspecified values should use defaults
        assert_eq!(config.timeouts.backup_await_secs, 60);
        assert_eq!(config.addresses.egress_next_hops.len(), 2);
        assert_eq!(config.segments[0].group_count, Some(10));

        let prefixes = config.segments[1].prefixes.as_ref().unwrap();
        assert_eq!(prefixes[0].to_string(), "10.0.0.1/32");
        assert_eq!(prefixes[1].to_string(), "10.1.0.0/16");
        assert_eq!(config.segments[1].semantics, Some(NextHopSemantics::Decap));
    }

    #[test]
    fn test_json_and_toml_deserialization() {
        let json = ProfileConfig::parse("p.json", r#"{"batch_count": 8}"#).unwrap();
        assert_eq!(json.batch_count, 8);

        let toml = ProfileConfig::parse("p.toml", "id_base = 100\n[pump]\nops_per_tick = 5\n").unwrap();
        assert_eq!(toml.id_base, 100);
        assert_eq!(toml.pump.ops_per_tick, 5);
        assert_eq!(toml.pump.tick_millis, 1000);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        assert!(matches!(
            ProfileConfig::parse("profile.ini", ""),
            Err(ScaleError::Config(_))
        ));
    }

    // 4. File Tests

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = ProfileConfig::load_or_default("/nonexistent/profile.yaml").unwrap();
        assert_eq!(config, ProfileConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "batch_count: 3").unwrap();
        let config = ProfileConfig::load(file.path()).unwrap();
        assert_eq!(config.batch_count, 3);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        let mut config = ProfileConfig::default();
        config.segments.push(SegmentConfig {
            group_count: Some(4),
            ..SegmentConfig::named("PrimaryLevel2")
        });
        config.save(&path).unwrap();
        assert_eq!(ProfileConfig::load(&path).unwrap(), config);
    }
}
