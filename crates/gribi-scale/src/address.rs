//! Deterministic address enumeration.
//!
//! - [`generate_addresses`]: host addresses inside a CIDR block
//! - [`generate_addresses_with_step`]: fixed-stride sequences from a seed
//! - [`generate_subnets`] / [`variable_length_subnets`]: consecutive blocks
//! - [`generate_subnet_hosts`]: one host per consecutive block
//! - [`generate_macs`]: sequential MAC addresses
//! - [`AddressPool`]: cursor over a pre-generated address list

use crate::error::{Result, ScaleError};
use gribi_types::{IpAddress, IpPrefix, MacAddress};

/// An ordered address list with a consuming cursor.
///
/// [`AddressPool::all`] never moves the cursor. Running past the end is a
/// sizing error on the caller's side and is reported as
/// [`ScaleError::PoolExhausted`].
#[derive(Debug, Clone)]
pub struct AddressPool {
    entries: Vec<IpAddress>,
    cursor: usize,
}

impl AddressPool {
    pub fn new(entries: Vec<IpAddress>) -> Self {
        Self { entries, cursor: 0 }
    }

    /// Pool of every host address generated from `seed` (see [`generate_addresses`]).
    pub fn from_prefix(seed: &IpPrefix, count: usize) -> Self {
        Self::new(generate_addresses(seed, count))
    }

    /// Returns the next address and advances the cursor.
    pub fn next_address(&mut self) -> Result<IpAddress> {
        let addr = self
            .entries
            .get(self.cursor)
            .copied()
            .ok_or(ScaleError::PoolExhausted(self.entries.len()))?;
        self.cursor += 1;
        Ok(addr)
    }

    pub fn all(&self) -> &[IpAddress] {
        &self.entries
    }

    pub fn remaining(&self) -> usize {
        self.entries.len() - self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Enumerates up to `count` addresses of `seed`, starting at its network
/// address. Returns fewer when the block is smaller than `count`.
pub fn generate_addresses(seed: &IpPrefix, count: usize) -> Vec<IpAddress> {
    let network = seed.network();
    let fit = u128::try_from(count)
        .map(|wanted| wanted.min(seed.block_size()))
        .unwrap_or_else(|_| seed.block_size());
    let fit = usize::try_from(fit).unwrap_or(count);

    (0..fit)
        .map_while(|i| network.checked_add(i as u128))
        .collect()
}

/// Emits `count` addresses starting at `seed`, each `step` above the previous.
///
/// `step` is written as an address of the same family (`"0.0.1.0"` steps by
/// 256). Fails with [`ScaleError::InvalidAddress`] on unparsable or mixed
/// family input, and with [`ScaleError::Overflow`] if the last address would
/// leave the family's range.
pub fn generate_addresses_with_step(seed: &str, count: usize, step: &str) -> Result<Vec<IpAddress>> {
    let start: IpAddress = seed
        .parse()
        .map_err(|_| ScaleError::InvalidAddress(format!("seed {}", seed)))?;
    let stride: IpAddress = step
        .parse()
        .map_err(|_| ScaleError::InvalidAddress(format!("step {}", step)))?;

    if !start.same_family(&stride) {
        return Err(ScaleError::InvalidAddress(format!(
            "seed {} and step {} are different address families",
            seed, step
        )));
    }
    if count == 0 {
        return Ok(Vec::new());
    }

    let stride = stride.to_bits();
    let span = u128::try_from(count - 1)
        .ok()
        .and_then(|n| n.checked_mul(stride))
        .ok_or_else(|| ScaleError::Overflow(format!("{} steps of {}", count, step)))?;
    start.checked_add(span).ok_or_else(|| {
        ScaleError::Overflow(format!("{} + {} x {} leaves the address range", seed, count - 1, step))
    })?;

    let mut addresses = Vec::with_capacity(count);
    let mut current = start;
    addresses.push(current);
    for _ in 1..count {
        current = current
            .checked_add(stride)
            .ok_or_else(|| ScaleError::Overflow(format!("step {} from {}", step, current)))?;
        addresses.push(current);
    }
    Ok(addresses)
}

/// Returns `count` consecutive blocks of the seed's length, starting at the
/// seed's network address.
pub fn generate_subnets(seed: &IpPrefix, count: usize) -> Result<Vec<IpPrefix>> {
    let network = seed.network();
    let block = seed.block_size();

    (0..count)
        .map(|i| {
            let offset = (i as u128)
                .checked_mul(block)
                .ok_or_else(|| ScaleError::Overflow(format!("subnet {} of {}", i, seed)))?;
            let address = network
                .checked_add(offset)
                .ok_or_else(|| ScaleError::Overflow(format!("subnet {} of {}", i, seed)))?;
            Ok(IpPrefix::new(address, seed.prefix_len())?)
        })
        .collect()
}

/// Concatenates `per_seed` consecutive subnets of every seed, in seed order.
pub fn variable_length_subnets(per_seed: usize, seeds: &[IpPrefix]) -> Result<Vec<IpPrefix>> {
    let mut subnets = Vec::with_capacity(per_seed * seeds.len());
    for seed in seeds {
        subnets.extend(generate_subnets(seed, per_seed)?);
    }
    Ok(subnets)
}

/// Returns the first host (network address + 1) of each of `count`
/// consecutive blocks of the seed's length.
pub fn generate_subnet_hosts(seed: &IpPrefix, count: usize) -> Result<Vec<IpAddress>> {
    generate_subnets(seed, count)?
        .into_iter()
        .map(|subnet| {
            subnet
                .network()
                .checked_add(1)
                .ok_or_else(|| ScaleError::Overflow(format!("host of {}", subnet)))
        })
        .collect()
}

/// Returns `count` MAC addresses starting at `seed`, wrapping at 48 bits.
pub fn generate_macs(seed: MacAddress, count: usize) -> Vec<MacAddress> {
    (0..count as u64).map(|i| seed.wrapping_add(i)).collect()
}
