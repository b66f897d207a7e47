//! ## slabkit-core::alloc::seq
//! **Strategy-backed growable sequence**
//!
//! `SeqVec<T, S>` is a contiguous growable array whose buffer comes from an
//! [`AllocStrategy`]. Capacity grows 0 → 1 → 2 → 4 → …, so a pool-backed sequence
//! keeps its first element in a pool block and moves to the heap once it holds two.
//! Every growing operation is fallible and reports allocation failure as a
//! [`MemoryError`] instead of aborting.

use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

use crate::alloc::strategy::AllocStrategy;
use crate::error::MemoryError;

pub struct SeqVec<T, S: AllocStrategy<T>> {
    ptr: NonNull<T>,
    len: usize,
    cap: usize,
    strategy: S,
}

impl<T, S: AllocStrategy<T>> SeqVec<T, S> {
    const IS_ZST: bool = mem::size_of::<T>() == 0;

    /// Creates an empty sequence. Nothing is allocated until the first push.
    pub fn new_in(strategy: S) -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
            cap: if Self::IS_ZST { usize::MAX } else { 0 },
            strategy,
        }
    }

    pub fn with_capacity_in(capacity: usize, strategy: S) -> Result<Self, MemoryError> {
        let mut seq = Self::new_in(strategy);
        if capacity > seq.cap {
            seq.grow_to(capacity)?;
        }
        Ok(seq)
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the first len slots are initialised.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: the first len slots are initialised and uniquely borrowed.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    pub fn push(&mut self, value: T) -> Result<(), MemoryError> {
        if self.len == self.cap {
            self.grow_to(self.grown_capacity(self.len + 1))?;
        }
        // SAFETY: len < cap, so the slot is in bounds and uninitialised.
        unsafe { self.ptr.as_ptr().add(self.len).write(value) };
        self.len += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: the slot at the old last index is initialised and now outside len.
        Some(unsafe { self.ptr.as_ptr().add(self.len).read() })
    }

    /// Makes room for at least `additional` more elements.
    pub fn reserve(&mut self, additional: usize) -> Result<(), MemoryError> {
        let needed = self
            .len
            .checked_add(additional)
            .ok_or_else(|| MemoryError::InvalidLayout("capacity overflow".into()))?;
        if needed > self.cap {
            self.grow_to(self.grown_capacity(needed))?;
        }
        Ok(())
    }

    /// Drops elements past `len`. Capacity is kept.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        let tail = ptr::slice_from_raw_parts_mut(
            // SAFETY: len < self.len, so the offset is in bounds.
            unsafe { self.ptr.as_ptr().add(len) },
            self.len - len,
        );
        self.len = len;
        // SAFETY: the tail slots were initialised and are no longer reachable.
        unsafe { ptr::drop_in_place(tail) };
    }

    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Replaces the contents with those of `other`, leaving `other` empty.
    ///
    /// When both sequences draw from the same source the buffer changes owners in O(1).
    /// Otherwise the elements are moved into storage from `self`'s strategy.
    pub fn take_from(&mut self, other: &mut Self) -> Result<(), MemoryError> {
        self.clear();
        if self.strategy == other.strategy {
            self.release();
            mem::swap(&mut self.ptr, &mut other.ptr);
            mem::swap(&mut self.cap, &mut other.cap);
            mem::swap(&mut self.len, &mut other.len);
            return Ok(());
        }

        self.reserve(other.len)?;
        // SAFETY: self has room for other.len elements; the source slots become
        // logically uninitialised when other.len is zeroed.
        unsafe {
            ptr::copy_nonoverlapping(other.ptr.as_ptr(), self.ptr.as_ptr(), other.len);
        }
        self.len = other.len;
        other.len = 0;
        Ok(())
    }

    fn grown_capacity(&self, needed: usize) -> usize {
        needed.max(self.cap.saturating_mul(2)).max(1)
    }

    fn grow_to(&mut self, new_cap: usize) -> Result<(), MemoryError> {
        debug_assert!(!Self::IS_ZST && new_cap > self.cap);
        let new_ptr = self.strategy.allocate(new_cap)?;
        // SAFETY: both buffers hold at least len slots and are distinct allocations.
        unsafe { ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr.as_ptr(), self.len) };
        self.release();
        self.ptr = new_ptr;
        self.cap = new_cap;
        Ok(())
    }

    /// Hands the buffer back to the strategy without touching its elements.
    fn release(&mut self) {
        if !Self::IS_ZST && self.cap > 0 {
            // SAFETY: ptr came from allocate(cap) on this strategy.
            unsafe { self.strategy.deallocate(self.ptr, self.cap) };
        }
        self.ptr = NonNull::dangling();
        self.cap = if Self::IS_ZST { usize::MAX } else { 0 };
    }
}

impl<T: Clone, S: AllocStrategy<T>> SeqVec<T, S> {
    pub fn extend_from_slice(&mut self, items: &[T]) -> Result<(), MemoryError> {
        self.reserve(items.len())?;
        for item in items {
            self.push(item.clone())?;
        }
        Ok(())
    }

    /// Grows with clones of `value` or truncates to `new_len`.
    pub fn resize(&mut self, new_len: usize, value: T) -> Result<(), MemoryError> {
        if new_len <= self.len {
            self.truncate(new_len);
            return Ok(());
        }
        self.reserve(new_len - self.len)?;
        while self.len < new_len {
            self.push(value.clone())?;
        }
        Ok(())
    }

    /// Copies the elements into a new sequence drawing from the same source.
    pub fn try_clone(&self) -> Result<Self, MemoryError> {
        let mut copy = Self::with_capacity_in(self.len, self.strategy.clone())?;
        copy.extend_from_slice(self)?;
        Ok(copy)
    }
}

impl<T, S: AllocStrategy<T>> Drop for SeqVec<T, S> {
    fn drop(&mut self) {
        self.clear();
        self.release();
    }
}

impl<T, S: AllocStrategy<T>> Deref for SeqVec<T, S> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, S: AllocStrategy<T>> DerefMut for SeqVec<T, S> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: fmt::Debug, S: AllocStrategy<T>> fmt::Debug for SeqVec<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::arena::Arena;
    use crate::alloc::pool::BlockPool;
    use crate::alloc::stats::MemoryStats;
    use crate::alloc::strategy::{ArenaStrategy, HeapStrategy, PoolStrategy};
    use std::rc::Rc;
    use std::sync::Arc;

    #[test]
    fn test_first_element_lives_in_the_pool() {
        let stats = Arc::new(MemoryStats::new());
        let pool = BlockPool::for_type::<u64>(16)
            .unwrap()
            .with_stats(Arc::clone(&stats));
        let mut seq = SeqVec::new_in(PoolStrategy::<u64>::new(&pool).unwrap());

        seq.push(1).unwrap();
        assert_eq!(seq.capacity(), 1);
        assert_eq!(pool.live_blocks(), 1);

        seq.push(2).unwrap();
        assert_eq!(seq.capacity(), 2);
        assert_eq!(pool.live_blocks(), 0);
        assert_eq!(stats.heap_fallbacks(), 1);
        assert_eq!(&seq[..], &[1, 2]);
    }

    #[test]
    fn test_growth_doubles() {
        let mut seq = SeqVec::new_in(HeapStrategy::<u32>::new());
        let mut caps = Vec::new();
        for i in 0..9 {
            seq.push(i).unwrap();
            caps.push(seq.capacity());
        }
        assert_eq!(caps, vec![1, 2, 4, 4, 8, 8, 8, 8, 16]);
        assert_eq!(seq.pop(), Some(8));
        assert_eq!(seq.len(), 8);
    }

    #[test]
    fn test_arena_backed_sequence() {
        let mut arena = Arena::new(64);
        {
            let mut seq = SeqVec::new_in(ArenaStrategy::<u16>::new(&arena));
            for i in 0..100 {
                seq.push(i).unwrap();
            }
            assert_eq!(seq.iter().map(|&v| v as u32).sum::<u32>(), 4950);
            assert!(arena.used_memory() >= 200);
        }
        arena.reset();
        assert_eq!(arena.used_memory(), 0);
    }

    #[test]
    fn test_resize_and_extend() {
        let mut seq = SeqVec::new_in(HeapStrategy::<String>::new());
        seq.resize(3, "x".to_string()).unwrap();
        seq.extend_from_slice(&["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(seq.len(), 5);
        assert_eq!(seq[4], "b");

        seq.resize(1, String::new()).unwrap();
        assert_eq!(&seq[..], &["x".to_string()]);
    }

    #[test]
    fn test_drop_runs_element_destructors() {
        let marker = Rc::new(());
        {
            let mut seq = SeqVec::new_in(HeapStrategy::<Rc<()>>::new());
            for _ in 0..5 {
                seq.push(Rc::clone(&marker)).unwrap();
            }
            seq.truncate(2);
            assert_eq!(Rc::strong_count(&marker), 3);
        }
        assert_eq!(Rc::strong_count(&marker), 1);
    }

    #[test]
    fn test_take_from_same_pool_adopts_buffer() {
        let pool = BlockPool::for_type::<u64>(4).unwrap();
        let strategy = PoolStrategy::<u64>::new(&pool).unwrap();
        let mut a = SeqVec::new_in(strategy);
        let mut b = SeqVec::new_in(strategy);
        b.extend_from_slice(&[1, 2, 3]).unwrap();
        let buffer = b.as_ptr();

        a.take_from(&mut b).unwrap();
        assert_eq!(a.as_ptr(), buffer);
        assert_eq!(&a[..], &[1, 2, 3]);
        assert!(b.is_empty());
        assert_eq!(b.capacity(), 0);
    }

    #[test]
    fn test_take_from_other_pool_moves_elements() {
        let p1 = BlockPool::for_type::<u64>(4).unwrap();
        let p2 = BlockPool::for_type::<u64>(4).unwrap();
        let mut a = SeqVec::new_in(PoolStrategy::<u64>::new(&p1).unwrap());
        let mut b = SeqVec::new_in(PoolStrategy::<u64>::new(&p2).unwrap());
        b.push(9).unwrap();

        a.take_from(&mut b).unwrap();
        assert_eq!(&a[..], &[9]);
        assert!(b.is_empty());
        assert_eq!(p1.live_blocks(), 1);
        assert_eq!(p2.live_blocks(), 1);
        drop(b);
        assert_eq!(p2.live_blocks(), 0);
    }

    #[test]
    fn test_try_clone_shares_strategy() {
        let arena = Arena::new(128);
        let mut seq = SeqVec::new_in(ArenaStrategy::<i32>::new(&arena));
        seq.extend_from_slice(&[3, 1, 2]).unwrap();
        let mut copy = seq.try_clone().unwrap();
        copy.sort_unstable();

        assert_eq!(&seq[..], &[3, 1, 2]);
        assert_eq!(&copy[..], &[1, 2, 3]);
        assert_eq!(copy.strategy(), seq.strategy());
    }

    #[test]
    fn test_zero_sized_elements_never_allocate() {
        let pool = BlockPool::new(8, 1).unwrap();
        let mut seq = SeqVec::new_in(PoolStrategy::<()>::new(&pool).unwrap());
        for _ in 0..1000 {
            seq.push(()).unwrap();
        }
        assert_eq!(seq.len(), 1000);
        assert_eq!(pool.slab_count(), 0);
    }
}
