//! ## slabkit-core::alloc::pool
//! **Fixed-size block pool**
//!
//! Blocks of one size are carved out of slabs and threaded onto an intrusive free list:
//! a free block stores the pointer to the next free block in its own first bytes.
//! Allocation pops the head, deallocation pushes it back, both in O(1). When the list
//! runs dry a new slab of `blocks_per_slab` blocks is allocated and linked in whole.
//!
//! ```text
//! slab 0: [B0][B1][B2][B3]    slab 1: [B4][B5][B6][B7]
//! free list: head -> B5 -> B6 -> B7 -> null
//! ```
//!
//! Slabs are only released when the pool is dropped, so pool memory never shrinks.
//! The pool is not synchronised: it is `Send` but not `Sync`, and every block handed
//! out dangles once the pool is gone.

use std::alloc::Layout;
use std::cell::{Cell, RefCell};
use std::mem;
use std::panic::Location;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use tracing::debug;

use crate::alloc::slab::Slab;
use crate::alloc::stats::MemoryStats;
use crate::alloc::tracker::AllocationTracker;
use crate::error::MemoryError;

/// Link stored inside every free block.
#[repr(C)]
struct FreeNode {
    next: *mut FreeNode,
}

pub struct BlockPool {
    block_size: usize,
    block_align: usize,
    blocks_per_slab: usize,
    free_head: Cell<*mut FreeNode>,
    free_count: Cell<usize>,
    live_count: Cell<usize>,
    slabs: RefCell<Vec<Slab>>,
    tracker: Option<Arc<AllocationTracker>>,
    stats: Option<Arc<MemoryStats>>,
}

// SAFETY: the pool exclusively owns its slabs and every raw pointer it stores points
// into them, so moving the whole pool to another thread moves all of that state with
// it. Cell/RefCell keep it !Sync.
unsafe impl Send for BlockPool {}

impl BlockPool {
    /// Creates a pool of `block_size`-byte blocks aligned for a pointer, growing by
    /// `blocks_per_slab` blocks at a time. The first slab is allocated on first use.
    pub fn new(block_size: usize, blocks_per_slab: usize) -> Result<Self, MemoryError> {
        let layout = Layout::from_size_align(block_size, mem::align_of::<FreeNode>())
            .map_err(|e| MemoryError::InvalidLayout(e.to_string()))?;
        Self::for_layout(layout, blocks_per_slab)
    }

    /// Creates a pool whose blocks can each hold one value of type `T`.
    pub fn for_type<T>(blocks_per_slab: usize) -> Result<Self, MemoryError> {
        Self::for_layout(Layout::new::<T>(), blocks_per_slab)
    }

    /// Creates a pool whose blocks satisfy `layout`.
    ///
    /// The block size is raised to hold a free-list link and rounded up to the block
    /// alignment so consecutive blocks stay aligned.
    pub fn for_layout(layout: Layout, blocks_per_slab: usize) -> Result<Self, MemoryError> {
        if blocks_per_slab == 0 {
            return Err(MemoryError::InvalidLayout(
                "blocks per slab must be greater than zero".into(),
            ));
        }

        let block_align = layout.align().max(mem::align_of::<FreeNode>());
        let block_size = layout
            .size()
            .max(mem::size_of::<FreeNode>())
            .checked_next_multiple_of(block_align)
            .ok_or_else(|| MemoryError::InvalidLayout("block size overflows".into()))?;
        block_size
            .checked_mul(blocks_per_slab)
            .ok_or_else(|| MemoryError::InvalidLayout("slab size overflows".into()))?;

        Ok(Self {
            block_size,
            block_align,
            blocks_per_slab,
            free_head: Cell::new(ptr::null_mut()),
            free_count: Cell::new(0),
            live_count: Cell::new(0),
            slabs: RefCell::new(Vec::new()),
            tracker: None,
            stats: None,
        })
    }

    /// Routes slab allocations through `tracker` so they appear in its ledger.
    pub fn with_tracker(mut self, tracker: Arc<AllocationTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Feeds allocation counters into a shared stats sink.
    pub fn with_stats(mut self, stats: Arc<MemoryStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Hands out one zeroed block, growing the pool by a slab if no block is free.
    #[track_caller]
    pub fn allocate(&self) -> Result<NonNull<u8>, MemoryError> {
        if self.free_head.get().is_null() {
            self.grow(Location::caller())?;
        }

        let head = self.free_head.get();
        // SAFETY: grow() left at least one free block, and every node on the list is a
        // block inside a slab this pool owns.
        let block = unsafe {
            self.free_head.set((*head).next);
            NonNull::new_unchecked(head.cast::<u8>())
        };
        // SAFETY: the block spans block_size bytes inside an owned slab.
        unsafe { ptr::write_bytes(block.as_ptr(), 0, self.block_size) };

        self.free_count.set(self.free_count.get() - 1);
        self.live_count.set(self.live_count.get() + 1);
        if let Some(stats) = &self.stats {
            stats.increment_pool_allocations();
        }
        Ok(block)
    }

    /// Returns a block to the head of the free list.
    ///
    /// # Safety
    ///
    /// `block` must have been returned by [`allocate`](Self::allocate) on this same pool
    /// and not already deallocated. The pool does not check either condition in release
    /// builds; violating them corrupts the free list.
    pub unsafe fn deallocate(&self, block: NonNull<u8>) {
        debug_assert!(self.owns(block), "block does not belong to this pool");

        let node = block.cast::<FreeNode>().as_ptr();
        // SAFETY: caller guarantees node is a live block of this pool, which is large
        // and aligned enough to hold a FreeNode.
        unsafe {
            ptr::write(
                node,
                FreeNode {
                    next: self.free_head.get(),
                },
            )
        };
        self.free_head.set(node);

        self.free_count.set(self.free_count.get() + 1);
        self.live_count.set(self.live_count.get().saturating_sub(1));
        if let Some(stats) = &self.stats {
            stats.increment_pool_deallocations();
        }
    }

    fn grow(&self, location: &'static Location<'static>) -> Result<(), MemoryError> {
        let slab_bytes = self.block_size * self.blocks_per_slab;
        let slab = Slab::new(slab_bytes, self.block_align, self.tracker.as_ref(), location)?;
        let base = slab.base();

        // Link back to front so blocks are handed out in address order.
        let mut head = self.free_head.get();
        for i in (0..self.blocks_per_slab).rev() {
            // SAFETY: i * block_size + block_size <= slab_bytes, and every block offset
            // is a multiple of block_align.
            unsafe {
                let node = base.add(i * self.block_size).cast::<FreeNode>();
                ptr::write(node, FreeNode { next: head });
                head = node;
            }
        }
        self.free_head.set(head);
        self.free_count
            .set(self.free_count.get() + self.blocks_per_slab);

        let mut slabs = self.slabs.borrow_mut();
        slabs.push(slab);
        debug!(
            block_size = self.block_size,
            slabs = slabs.len(),
            "block pool grew by one slab"
        );
        if let Some(stats) = &self.stats {
            stats.increment_pool_slabs();
        }
        Ok(())
    }

    /// Whether `ptr` is the start of a block inside one of this pool's slabs.
    pub fn owns(&self, ptr: NonNull<u8>) -> bool {
        let address = ptr.as_ptr() as usize;
        self.slabs.borrow().iter().any(|slab| {
            slab.contains(address, self.block_size)
                && (address - slab.base() as usize) % self.block_size == 0
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn block_align(&self) -> usize {
        self.block_align
    }

    pub fn blocks_per_slab(&self) -> usize {
        self.blocks_per_slab
    }

    /// Layout of a single block.
    pub fn block_layout(&self) -> Layout {
        // block_size is a non-zero multiple of the power-of-two block_align.
        Layout::from_size_align(self.block_size, self.block_align)
            .unwrap_or_else(|_| Layout::new::<FreeNode>())
    }

    pub fn slab_count(&self) -> usize {
        self.slabs.borrow().len()
    }

    /// Total blocks across all slabs, free or live.
    pub fn capacity(&self) -> usize {
        self.slab_count() * self.blocks_per_slab
    }

    pub fn free_blocks(&self) -> usize {
        self.free_count.get()
    }

    pub fn live_blocks(&self) -> usize {
        self.live_count.get()
    }

    /// Bytes held in slabs.
    pub fn total_memory(&self) -> usize {
        self.capacity() * self.block_size
    }

    pub fn tracker(&self) -> Option<&Arc<AllocationTracker>> {
        self.tracker.as_ref()
    }

    pub fn stats(&self) -> Option<&Arc<MemoryStats>> {
        self.stats.as_ref()
    }
}

impl std::fmt::Debug for BlockPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockPool")
            .field("block_size", &self.block_size)
            .field("block_align", &self.block_align)
            .field("slabs", &self.slab_count())
            .field("live", &self.live_count.get())
            .field("free", &self.free_count.get())
            .finish()
    }
}
