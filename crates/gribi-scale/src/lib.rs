//! gRIBI Forwarding-State Scale Generator
//!
//! Synthesizes large, internally consistent sets of next-hop, next-hop-group
//! and IPv4/IPv6 route entries, partitions them into batches that can be
//! installed and withdrawn independently, and derives the exact confirmation
//! sequence a programming transaction must return.
//!
//! - [`id_pool`]: shared NH/NHG identifier allocation
//! - [`address`], [`weights`], [`partition`]: address, weight and budget arithmetic
//! - [`segment`]: realizes one segment spec into per-batch entries
//! - [`combine`]: merges segments per batch in dependency order
//! - [`expected`]: expected add/delete confirmations
//! - [`profile`]: builds a full profile and pushes/deletes batches through a [`RibClient`]
//! - [`pump`], [`skew`]: rate-limited streaming and skewed multi-VRF programs

pub mod address;
pub mod client;
pub mod combine;
pub mod config;
pub mod entry;
pub mod error;
pub mod expected;
pub mod id_pool;
pub mod partition;
pub mod profile;
pub mod pump;
pub mod segment;
pub mod skew;
pub mod weights;

pub use address::{
    generate_addresses, generate_addresses_with_step, generate_macs, generate_subnet_hosts,
    generate_subnets, variable_length_subnets, AddressPool,
};
pub use client::{ClientError, RecordedTransaction, RecordingClient, RibClient};
pub use combine::{BatchCombiner, CombinedStats, Ordered};
pub use config::{AddressConfig, BackupRef, ProfileConfig, PumpConfig, SegmentConfig, TimeoutConfig};
pub use entry::{
    Entry, EntryKey, NextHopAction, NextHopEntry, NextHopGroupEntry, NextHopSemantics, RouteEntry,
    WeightedNextHop, DEFAULT_NETWORK_INSTANCE,
};
pub use error::{Result, ScaleError};
pub use expected::{ExpectedResultMirror, ExpectedResults, OpResult, OperationType, ProgrammingResult};
pub use id_pool::{IdPool, DEFAULT_ID_BASE};
pub use partition::{
    divide_and_adjust, generate_skew_pattern, skewed_assignment, skewed_assignment_shuffled,
    Allocation,
};
pub use profile::{BackupChain, BatchState, ProfileOrchestrator, ProfileStats, SegmentKind};
pub use pump::{PumpStats, RatePump};
pub use segment::{BuiltSegment, EntryCounts, PairedEntries, RouteSegmentBuilder, SegmentSpec};
pub use skew::{SkewedProgram, SkewedVrfProgram};
pub use weights::generate_weights;
