//! Per-batch merging of built segments into ordered transaction payloads.

use crate::entry::Entry;
use crate::segment::{BuiltSegment, EntryCounts};
use log::{debug, info};
use serde::Serialize;

/// A payload paired with its teardown order.
///
/// `deletes` is always `adds` reversed, so that removing entries never
/// orphans a reference: routes go first, then groups, then next hops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ordered<T> {
    adds: Vec<T>,
    deletes: Vec<T>,
}

impl<T: Clone> Ordered<T> {
    pub fn from_adds(adds: Vec<T>) -> Self {
        let deletes = adds.iter().rev().cloned().collect();
        Self { adds, deletes }
    }

    /// Appends `others` in order; deletes become the reverse of the joined adds.
    pub fn concat<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a Ordered<T>>,
        T: 'a,
    {
        let adds = items
            .into_iter()
            .flat_map(|ordered| ordered.adds.iter().cloned())
            .collect();
        Self::from_adds(adds)
    }
}

impl<T> Ordered<T> {
    pub fn adds(&self) -> &[T] {
        &self.adds
    }

    pub fn deletes(&self) -> &[T] {
        &self.deletes
    }

    pub fn len(&self) -> usize {
        self.adds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adds.is_empty()
    }
}

impl<T: Clone> Default for Ordered<T> {
    fn default() -> Self {
        Self::from_adds(Vec::new())
    }
}

/// Entry counts of a combine run, per batch and per segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CombinedStats {
    pub batches: Vec<EntryCounts>,
    /// Totals of each segment over all batches, in combine order
    pub segments: Vec<(String, EntryCounts)>,
}

impl CombinedStats {
    pub fn total(&self) -> EntryCounts {
        let mut total = EntryCounts::default();
        for counts in &self.batches {
            total += *counts;
        }
        total
    }
}

/// Merges built segments batch by batch.
///
/// Within a batch every segment's next hops come first, then every
/// segment's groups, then IPv4 routes, then IPv6 routes. Segments keep the
/// order they are passed in within each kind; segments with no entries for a
/// batch contribute nothing.
pub struct BatchCombiner;

impl BatchCombiner {
    pub fn combine(batch_count: usize, segments: &[&BuiltSegment]) -> (Vec<Ordered<Entry>>, CombinedStats) {
        let mut combined = Vec::with_capacity(batch_count);
        let mut stats = CombinedStats::default();

        for segment in segments {
            let counts = segment.counts();
            info!(
                "segment {}: NHs: {}, NHGs: {}, IPv4 routes: {}, IPv6 routes: {}",
                segment.name, counts.next_hops, counts.next_hop_groups, counts.v4_routes, counts.v6_routes
            );
            stats.segments.push((segment.name.clone(), counts));
        }

        for batch in 0..batch_count {
            let parts: Vec<_> = segments
                .iter()
                .filter_map(|segment| segment.batch(batch))
                .filter(|entries| !entries.v4_routes.is_empty() || !entries.v6_routes.is_empty())
                .collect();

            let mut counts = EntryCounts::default();
            let mut adds = Vec::new();
            for part in &parts {
                counts += part.counts();
                adds.extend(part.next_hops.iter().cloned().map(Entry::NextHop));
            }
            for part in &parts {
                adds.extend(part.next_hop_groups.iter().cloned().map(Entry::NextHopGroup));
            }
            for part in &parts {
                adds.extend(part.v4_routes.iter().cloned().map(Entry::Route));
            }
            for part in &parts {
                adds.extend(part.v6_routes.iter().cloned().map(Entry::Route));
            }

            debug!(
                "batch {}: {} segments, NHs: {}, NHGs: {}, IPv4: {}, IPv6: {}",
                batch,
                parts.len(),
                counts.next_hops,
                counts.next_hop_groups,
                counts.v4_routes,
                counts.v6_routes
            );
            stats.batches.push(counts);
            combined.push(Ordered::from_adds(adds));
        }

        let total = stats.total();
        info!(
            "combined {} batches: NHs: {}, NHGs: {}, IPv4 routes: {}, IPv6 routes: {}",
            batch_count, total.next_hops, total.next_hop_groups, total.v4_routes, total.v6_routes
        );
        (combined, stats)
    }
}
