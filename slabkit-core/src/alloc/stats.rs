//! ## slabkit-core::alloc::stats
//! **Pool and arena activity counters**
//!
//! A `MemoryStats` instance is shared through an `Arc` and attached to any number of
//! pools and arenas with `with_stats`. Counters are relaxed atomics: they are monotonic
//! tallies read for reporting, never used for synchronisation.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared memory statistics sink.
#[derive(Debug, Default)]
pub struct MemoryStats {
    pool_allocations: AtomicUsize,
    pool_deallocations: AtomicUsize,
    pool_slabs: AtomicUsize,
    arena_allocations: AtomicUsize,
    arena_resets: AtomicUsize,
    arena_slabs: AtomicUsize,
    heap_fallbacks: AtomicUsize,
}

/// Point-in-time copy of a [`MemoryStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub pool_allocations: usize,
    pub pool_deallocations: usize,
    pub pool_slabs: usize,
    pub arena_allocations: usize,
    pub arena_resets: usize,
    pub arena_slabs: usize,
    pub heap_fallbacks: usize,
}

impl MemoryStats {
    /// Creates a new `MemoryStats` instance with all counters initialized to zero.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_pool_allocations(&self) {
        self.pool_allocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_pool_deallocations(&self) {
        self.pool_deallocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_pool_slabs(&self) {
        self.pool_slabs.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_arena_allocations(&self) {
        self.arena_allocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_arena_resets(&self) {
        self.arena_resets.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_arena_slabs(&self) {
        self.arena_slabs.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a multi-unit request that a pool-backed strategy sent to the heap.
    #[inline]
    pub fn increment_heap_fallbacks(&self) {
        self.heap_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pool_allocations(&self) -> usize {
        self.pool_allocations.load(Ordering::Relaxed)
    }

    pub fn pool_deallocations(&self) -> usize {
        self.pool_deallocations.load(Ordering::Relaxed)
    }

    pub fn arena_allocations(&self) -> usize {
        self.arena_allocations.load(Ordering::Relaxed)
    }

    pub fn arena_resets(&self) -> usize {
        self.arena_resets.load(Ordering::Relaxed)
    }

    pub fn heap_fallbacks(&self) -> usize {
        self.heap_fallbacks.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pool_allocations: self.pool_allocations.load(Ordering::Relaxed),
            pool_deallocations: self.pool_deallocations.load(Ordering::Relaxed),
            pool_slabs: self.pool_slabs.load(Ordering::Relaxed),
            arena_allocations: self.arena_allocations.load(Ordering::Relaxed),
            arena_resets: self.arena_resets.load(Ordering::Relaxed),
            arena_slabs: self.arena_slabs.load(Ordering::Relaxed),
            heap_fallbacks: self.heap_fallbacks.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_stats_increment_and_read() {
        let stats = MemoryStats::new();
        assert_eq!(stats.pool_allocations(), 0);
        assert_eq!(stats.arena_allocations(), 0);

        stats.increment_pool_allocations();
        stats.increment_arena_allocations();

        assert_eq!(stats.pool_allocations(), 1);
        assert_eq!(stats.arena_allocations(), 1);
    }

    #[test]
    fn test_memory_stats_snapshot_is_detached() {
        let stats = MemoryStats::new();
        for _ in 0..100 {
            stats.increment_pool_allocations();
            stats.increment_pool_deallocations();
            stats.increment_arena_resets();
        }
        stats.increment_heap_fallbacks();

        let snapshot = stats.snapshot();
        stats.increment_pool_allocations();

        assert_eq!(snapshot.pool_allocations, 100);
        assert_eq!(snapshot.pool_deallocations, 100);
        assert_eq!(snapshot.arena_resets, 100);
        assert_eq!(snapshot.heap_fallbacks, 1);
        assert_eq!(stats.pool_allocations(), 101);
    }
}
