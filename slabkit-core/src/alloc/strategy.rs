//! ## slabkit-core::alloc::strategy
//! **Allocation strategies for containers**
//!
//! An [`AllocStrategy`] hands out storage for `n` values of `T` from some backing
//! source. Strategies are small `Copy` handles borrowing their source, so containers
//! can carry one by value. Two strategies compare equal exactly when they draw from the
//! same source instance; containers use that to decide whether a buffer may change
//! owners without copying.
//!
//! | strategy            | n == 1          | n > 1           | deallocate |
//! |---------------------|-----------------|-----------------|------------|
//! | [`PoolStrategy`]    | pool block      | heap (fallback) | both       |
//! | [`ArenaStrategy`]   | arena bump      | arena bump      | no-op      |
//! | [`TrackedStrategy`] | tracked heap    | tracked heap    | tracked    |
//! | [`HeapStrategy`]    | heap            | heap            | heap       |

use std::alloc::{self as heap, Layout};
use std::marker::PhantomData;
use std::panic::Location;
use std::ptr::{self, NonNull};

use crate::alloc::arena::Arena;
use crate::alloc::pool::BlockPool;
use crate::alloc::tracker::AllocationTracker;
use crate::error::MemoryError;

/// Storage source for a container of `T`.
pub trait AllocStrategy<T>: Clone + PartialEq {
    /// Returns uninitialised storage for `n` values. `n == 0` and zero-sized `T` yield a
    /// dangling, well-aligned pointer.
    fn allocate(&self, n: usize) -> Result<NonNull<T>, MemoryError>;

    /// Returns storage to the source.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate(n)` on a strategy equal to `self`, with the same
    /// `n`, and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<T>, n: usize);
}

fn array_layout<T>(n: usize) -> Result<Layout, MemoryError> {
    Layout::array::<T>(n).map_err(|e| MemoryError::InvalidLayout(e.to_string()))
}

fn heap_alloc<T>(
    layout: Layout,
    tracker: Option<&AllocationTracker>,
    location: &'static Location<'static>,
) -> Result<NonNull<T>, MemoryError> {
    if layout.size() == 0 {
        return Ok(NonNull::dangling());
    }
    let ptr = match tracker {
        Some(tracker) => tracker.track_alloc_at(layout, location, false)?,
        // SAFETY: layout has a non-zero size.
        None => NonNull::new(unsafe { heap::alloc(layout) })
            .ok_or_else(|| MemoryError::out_of_memory(layout))?,
    };
    Ok(ptr.cast())
}

/// # Safety
///
/// `ptr` must come from `heap_alloc` with the same layout and tracker.
unsafe fn heap_dealloc<T>(ptr: NonNull<T>, layout: Layout, tracker: Option<&AllocationTracker>) {
    if layout.size() == 0 {
        return;
    }
    match tracker {
        // SAFETY: forwarded caller contract.
        Some(tracker) => unsafe { tracker.track_free_layout(ptr.cast(), layout) },
        // SAFETY: forwarded caller contract.
        None => unsafe { heap::dealloc(ptr.as_ptr().cast(), layout) },
    }
}

/// Single values from a [`BlockPool`], arrays from the heap.
///
/// Array requests go through the pool's tracker when it has one and are counted as
/// heap fallbacks in the pool's stats.
pub struct PoolStrategy<'a, T> {
    pool: &'a BlockPool,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T> PoolStrategy<'a, T> {
    /// Fails when one `T` does not fit a block of `pool`.
    pub fn new(pool: &'a BlockPool) -> Result<Self, MemoryError> {
        let layout = Layout::new::<T>();
        if layout.size() > pool.block_size() || layout.align() > pool.block_align() {
            return Err(MemoryError::InvalidLayout(format!(
                "{} bytes aligned to {} do not fit a {}-byte block aligned to {}",
                layout.size(),
                layout.align(),
                pool.block_size(),
                pool.block_align()
            )));
        }
        Ok(Self {
            pool,
            _marker: PhantomData,
        })
    }

    pub fn pool(&self) -> &'a BlockPool {
        self.pool
    }
}

impl<T> Clone for PoolStrategy<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PoolStrategy<'_, T> {}

impl<T> PartialEq for PoolStrategy<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.pool, other.pool)
    }
}

impl<T> AllocStrategy<T> for PoolStrategy<'_, T> {
    #[track_caller]
    fn allocate(&self, n: usize) -> Result<NonNull<T>, MemoryError> {
        match n {
            0 => Ok(NonNull::dangling()),
            1 => Ok(self.pool.allocate()?.cast()),
            _ => {
                if let Some(stats) = self.pool.stats() {
                    stats.increment_heap_fallbacks();
                }
                heap_alloc(
                    array_layout::<T>(n)?,
                    self.pool.tracker().map(|t| &**t),
                    Location::caller(),
                )
            }
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<T>, n: usize) {
        match n {
            0 => {}
            // SAFETY: n == 1 storage is a block of this pool.
            1 => unsafe { self.pool.deallocate(ptr.cast()) },
            _ => {
                let Ok(layout) = array_layout::<T>(n) else {
                    return;
                };
                // SAFETY: n > 1 storage came from heap_alloc with this layout and tracker.
                unsafe { heap_dealloc(ptr, layout, self.pool.tracker().map(|t| &**t)) }
            }
        }
    }
}

/// Everything from an [`Arena`]. Deallocation is a no-op; memory comes back on reset.
pub struct ArenaStrategy<'a, T> {
    arena: &'a Arena,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T> ArenaStrategy<'a, T> {
    pub fn new(arena: &'a Arena) -> Self {
        Self {
            arena,
            _marker: PhantomData,
        }
    }

    pub fn arena(&self) -> &'a Arena {
        self.arena
    }
}

impl<T> Clone for ArenaStrategy<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArenaStrategy<'_, T> {}

impl<T> PartialEq for ArenaStrategy<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.arena, other.arena)
    }
}

impl<T> AllocStrategy<T> for ArenaStrategy<'_, T> {
    #[track_caller]
    fn allocate(&self, n: usize) -> Result<NonNull<T>, MemoryError> {
        let layout = array_layout::<T>(n)?;
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }
        Ok(self.arena.allocate_layout(layout)?.cast())
    }

    unsafe fn deallocate(&self, _ptr: NonNull<T>, _n: usize) {}
}

/// Heap memory recorded in an [`AllocationTracker`]'s ledger.
pub struct TrackedStrategy<'a, T> {
    tracker: &'a AllocationTracker,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T> TrackedStrategy<'a, T> {
    pub fn new(tracker: &'a AllocationTracker) -> Self {
        Self {
            tracker,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for TrackedStrategy<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TrackedStrategy<'_, T> {}

impl<T> PartialEq for TrackedStrategy<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.tracker, other.tracker)
    }
}

impl<T> AllocStrategy<T> for TrackedStrategy<'_, T> {
    #[track_caller]
    fn allocate(&self, n: usize) -> Result<NonNull<T>, MemoryError> {
        heap_alloc(array_layout::<T>(n)?, Some(self.tracker), Location::caller())
    }

    unsafe fn deallocate(&self, ptr: NonNull<T>, n: usize) {
        let Ok(layout) = array_layout::<T>(n) else {
            return;
        };
        // SAFETY: storage came from heap_alloc with this layout and tracker.
        unsafe { heap_dealloc(ptr, layout, Some(self.tracker)) }
    }
}

/// The global allocator. All instances are interchangeable.
pub struct HeapStrategy<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> HeapStrategy<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for HeapStrategy<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for HeapStrategy<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for HeapStrategy<T> {}

impl<T> PartialEq for HeapStrategy<T> {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl<T> AllocStrategy<T> for HeapStrategy<T> {
    #[track_caller]
    fn allocate(&self, n: usize) -> Result<NonNull<T>, MemoryError> {
        heap_alloc(array_layout::<T>(n)?, None, Location::caller())
    }

    unsafe fn deallocate(&self, ptr: NonNull<T>, n: usize) {
        let Ok(layout) = array_layout::<T>(n) else {
            return;
        };
        // SAFETY: storage came from heap_alloc with this layout.
        unsafe { heap_dealloc(ptr, layout, None) }
    }
}

impl<T> std::fmt::Debug for PoolStrategy<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PoolStrategy")
            .field(&(self.pool as *const BlockPool))
            .finish()
    }
}

impl<T> std::fmt::Debug for ArenaStrategy<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ArenaStrategy")
            .field(&(self.arena as *const Arena))
            .finish()
    }
}

impl<T> std::fmt::Debug for TrackedStrategy<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TrackedStrategy")
            .field(&(self.tracker as *const AllocationTracker))
            .finish()
    }
}

impl<T> std::fmt::Debug for HeapStrategy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HeapStrategy")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::stats::MemoryStats;
    use std::sync::Arc;

    #[test]
    fn test_pool_strategy_equality_follows_the_pool() {
        let a = BlockPool::for_type::<u64>(8).unwrap();
        let b = BlockPool::for_type::<u64>(8).unwrap();

        let s1 = PoolStrategy::<u64>::new(&a).unwrap();
        let s2 = PoolStrategy::<u64>::new(&a).unwrap();
        let s3 = PoolStrategy::<u64>::new(&b).unwrap();

        assert_eq!(s1, s2);
        assert_ne!(s1, s3);
    }

    #[test]
    fn test_pool_strategy_rejects_oversized_values() {
        let pool = BlockPool::new(8, 4).unwrap();
        assert!(PoolStrategy::<[u64; 4]>::new(&pool).is_err());
    }

    #[test]
    fn test_pool_strategy_routes_by_count() {
        let stats = Arc::new(MemoryStats::new());
        let pool = BlockPool::for_type::<u32>(4)
            .unwrap()
            .with_stats(Arc::clone(&stats));
        let strategy = PoolStrategy::<u32>::new(&pool).unwrap();

        let one = strategy.allocate(1).unwrap();
        assert!(pool.owns(one.cast()));
        assert_eq!(pool.live_blocks(), 1);

        let many = strategy.allocate(16).unwrap();
        assert!(!pool.owns(many.cast()));
        assert_eq!(stats.heap_fallbacks(), 1);

        unsafe {
            many.as_ptr().write(7);
            strategy.deallocate(many, 16);
            strategy.deallocate(one, 1);
        }
        assert_eq!(pool.live_blocks(), 0);
    }

    #[cfg(feature = "tracking")]
    #[test]
    fn test_pool_fallback_is_tracked() {
        let tracker = Arc::new(AllocationTracker::new());
        tracker.enable();
        tracker.set_capture_stacks(false);
        let pool = BlockPool::for_type::<u64>(4)
            .unwrap()
            .with_tracker(Arc::clone(&tracker));
        let strategy = PoolStrategy::<u64>::new(&pool).unwrap();

        let many = strategy.allocate(10).unwrap();
        assert_eq!(tracker.current_usage(), 80);
        unsafe { strategy.deallocate(many, 10) };
        assert_eq!(tracker.current_usage(), 0);
    }

    #[test]
    fn test_arena_strategy_never_frees() {
        let arena = Arena::new(256);
        let strategy = ArenaStrategy::<u64>::new(&arena);

        let ptr = strategy.allocate(4).unwrap();
        assert_eq!(ptr.as_ptr() as usize % std::mem::align_of::<u64>(), 0);
        let used = arena.used_memory();
        unsafe { strategy.deallocate(ptr, 4) };
        assert_eq!(arena.used_memory(), used);

        let other = Arena::new(256);
        assert_ne!(strategy, ArenaStrategy::new(&other));
    }

    #[cfg(feature = "tracking")]
    #[test]
    fn test_tracked_strategy_records_in_ledger() {
        let tracker = AllocationTracker::new();
        tracker.enable();
        tracker.set_capture_stacks(false);
        let strategy = TrackedStrategy::<u32>::new(&tracker);

        let ptr = strategy.allocate(25).unwrap();
        assert_eq!(tracker.live_allocations(), 1);
        assert_eq!(tracker.current_usage(), 100);
        unsafe { strategy.deallocate(ptr, 25) };
        assert_eq!(tracker.live_allocations(), 0);
    }

    #[test]
    fn test_heap_strategies_are_interchangeable() {
        let a = HeapStrategy::<String>::new();
        let b = HeapStrategy::<String>::default();
        assert_eq!(a, b);

        let ptr = a.allocate(3).unwrap();
        unsafe { b.deallocate(ptr, 3) };

        let empty = a.allocate(0).unwrap();
        assert_eq!(empty, NonNull::dangling());
    }
}
