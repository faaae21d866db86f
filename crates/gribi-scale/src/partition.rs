//! Resource budget partitioning.
//!
//! Splits a hardware resource budget into groups that divide evenly across
//! batches, and produces deliberately skewed per-partition counts for
//! uneven-load scenarios.

use crate::error::{Result, ScaleError};
use rand::seq::SliceRandom;
use rand::Rng;

/// Batch-aligned split of a resource budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// Group count, rounded down to a multiple of the batch count.
    pub aligned_groups: usize,
    /// Resource units left for a separate, non-aligned allocation.
    pub leftover: usize,
}

/// Divides `total` resource units into groups of `per_group`, keeping the
/// group count a multiple of `batch_count`.
///
/// `aligned_groups * per_group + leftover == total` always holds.
pub fn divide_and_adjust(total: usize, per_group: usize, batch_count: usize) -> Result<Allocation> {
    if per_group == 0 {
        return Err(ScaleError::DivisionByZero("per-group size is zero".to_string()));
    }
    if batch_count == 0 {
        return Err(ScaleError::DivisionByZero("batch count is zero".to_string()));
    }

    let quotient = total / per_group;
    let remainder = total % per_group;
    let aligned_groups = quotient - quotient % batch_count;
    let leftover = remainder + (quotient - aligned_groups) * per_group;

    Ok(Allocation {
        aligned_groups,
        leftover,
    })
}

/// Returns `partitions` counts summing exactly to `total`.
///
/// The first quarter (rounded up) of the partitions carry double weight.
/// Integer-division shortfall is handed out one unit at a time from
/// partition 0 upward, wrapping.
pub fn generate_skew_pattern(partitions: usize, total: usize) -> Vec<usize> {
    if partitions == 0 {
        return Vec::new();
    }

    let heavy = partitions.div_ceil(4);
    let factor = |i: usize| if i < heavy { 2 } else { 1 };
    let factor_sum = heavy * 2 + (partitions - heavy);

    let mut pattern: Vec<usize> = (0..partitions)
        .map(|i| total * factor(i) / factor_sum)
        .collect();

    let assigned: usize = pattern.iter().sum();
    for i in 0..(total - assigned) {
        pattern[i % partitions] += 1;
    }
    pattern
}

/// Expands `pattern` into an assignment list: `items[i]` repeated
/// `pattern[i]` times, in item order.
pub fn skewed_assignment<T: Clone>(items: &[T], pattern: &[usize]) -> Result<Vec<T>> {
    if items.len() != pattern.len() {
        return Err(ScaleError::InvalidSegment {
            segment: "skew".to_string(),
            reason: format!(
                "{} items but skew pattern has {} partitions",
                items.len(),
                pattern.len()
            ),
        });
    }

    Ok(items
        .iter()
        .zip(pattern)
        .flat_map(|(item, count)| std::iter::repeat(item.clone()).take(*count))
        .collect())
}

/// As [`skewed_assignment`], then shuffled with `rng`.
pub fn skewed_assignment_shuffled<T: Clone, R: Rng + ?Sized>(
    items: &[T],
    pattern: &[usize],
    rng: &mut R,
) -> Result<Vec<T>> {
    let mut list = skewed_assignment(items, pattern)?;
    list.shuffle(rng);
    Ok(list)
}
