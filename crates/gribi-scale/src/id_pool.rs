//! Identifier allocation for next hops and next-hop groups.

use std::sync::atomic::{AtomicU64, Ordering};

/// Base value used when no explicit base is configured.
pub const DEFAULT_ID_BASE: u64 = 20000;

/// Issues strictly increasing next-hop and next-hop-group identifiers.
///
/// The two namespaces are independent. Allocation is pre-increment: the first
/// call in each namespace returns `base + 1`. The pool is shared by reference
/// (usually behind an `Arc`) between every builder of a test run.
#[derive(Debug)]
pub struct IdPool {
    base: u64,
    nh: AtomicU64,
    nhg: AtomicU64,
}

impl IdPool {
    pub fn new(base: u64) -> Self {
        Self {
            base,
            nh: AtomicU64::new(base),
            nhg: AtomicU64::new(base),
        }
    }

    /// Allocates the next next-hop index.
    pub fn next_nh_id(&self) -> u64 {
        self.nh.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Allocates the next next-hop-group identifier.
    pub fn next_nhg_id(&self) -> u64 {
        self.nhg.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    /// Most recently issued next-hop index (`base` if none yet).
    pub fn last_nh_id(&self) -> u64 {
        self.nh.load(Ordering::SeqCst)
    }

    /// Most recently issued next-hop-group identifier (`base` if none yet).
    pub fn last_nhg_id(&self) -> u64 {
        self.nhg.load(Ordering::SeqCst)
    }
}

impl Default for IdPool {
    fn default() -> Self {
        Self::new(DEFAULT_ID_BASE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_first_id_is_base_plus_one() {
        let pool = IdPool::new(100);
        assert_eq!(pool.next_nh_id(), 101);
        assert_eq!(pool.next_nhg_id(), 101);
        assert_eq!(pool.next_nh_id(), 102);
    }

    #[test]
    fn test_namespaces_are_independent() {
        let pool = IdPool::default();
        for _ in 0..5 {
            pool.next_nh_id();
        }
        assert_eq!(pool.next_nhg_id(), DEFAULT_ID_BASE + 1);
        assert_eq!(pool.last_nh_id(), DEFAULT_ID_BASE + 5);
    }

    #[test]
    fn test_concurrent_allocation_is_unique() {
        let pool = Arc::new(IdPool::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || (0..1000).map(|_| pool.next_nhg_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            let ids = handle.join().unwrap();
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            for id in ids {
                assert!(seen.insert(id), "duplicate id {}", id);
            }
        }
        assert_eq!(seen.len(), 8000);
        assert_eq!(pool.last_nhg_id(), 8000);
    }
}
