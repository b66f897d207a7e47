//! ## slabkit-core::alloc::arena
//! **Growable bump allocator**
//!
//! Allocation advances a cursor through the current slab, inserting padding to honour
//! the requested alignment. When the slab cannot fit the request, a new slab of at
//! least `max(2 × previous slab, size + padding)` bytes is appended and the request is
//! retried once; the new slab is aligned for the request, so the retry always fits.
//! Doubling keeps the slab count logarithmic in the bytes ever requested.
//!
//! There is no per-object free. [`Arena::reset`] rewinds every slab and keeps them for
//! reuse, [`Arena::clear`] gives them back to the heap. Both take `&mut self`, so no
//! reference returned by [`Arena::alloc`] can survive them.

use std::alloc::Layout;
use std::cell::RefCell;
use std::panic::Location;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use tracing::debug;

use crate::alloc::slab::Slab;
use crate::alloc::stats::MemoryStats;
use crate::alloc::tracker::AllocationTracker;
use crate::error::MemoryError;

/// Minimum alignment of every slab base address.
pub const SLAB_ALIGN: usize = 16;

struct ArenaState {
    slabs: Vec<Slab>,
    current: usize,
    next_slab_size: usize,
}

impl ArenaState {
    /// Bumps inside the current slab, moving on to slabs retained by a reset when it
    /// runs out. Never allocates.
    fn bump(&mut self, size: usize, align: usize) -> Option<NonNull<u8>> {
        while let Some(slab) = self.slabs.get_mut(self.current) {
            if let Some(ptr) = bump_in(slab, size, align) {
                return Some(ptr);
            }
            if self.current + 1 >= self.slabs.len() {
                break;
            }
            self.current += 1;
        }
        None
    }

    /// Padding the current slab would need before an `align`-aligned allocation.
    fn padding(&self, align: usize) -> usize {
        self.slabs.get(self.current).map_or(0, |slab| {
            let cursor = slab.base() as usize + slab.used();
            cursor.next_multiple_of(align) - cursor
        })
    }
}

fn bump_in(slab: &mut Slab, size: usize, align: usize) -> Option<NonNull<u8>> {
    let base = slab.base() as usize;
    let cursor = base.checked_add(slab.used())?;
    let start = cursor.checked_next_multiple_of(align)?;
    let end = (start - base).checked_add(size)?;
    if end > slab.capacity() {
        return None;
    }
    slab.set_used(end);

    // SAFETY: start - base + size <= capacity, so the range is inside the slab.
    unsafe {
        let ptr = slab.base().add(start - base);
        ptr::write_bytes(ptr, 0, size);
        Some(NonNull::new_unchecked(ptr))
    }
}

pub struct Arena {
    initial_slab_size: usize,
    state: RefCell<ArenaState>,
    tracker: Option<Arc<AllocationTracker>>,
    stats: Option<Arc<MemoryStats>>,
}

// SAFETY: the arena exclusively owns its slabs; moving it moves every pointer target
// with it. RefCell keeps it !Sync.
unsafe impl Send for Arena {}

impl Arena {
    /// Creates an empty arena whose first slab holds `initial_slab_size` bytes.
    /// The first slab is allocated on first use.
    pub fn new(initial_slab_size: usize) -> Self {
        let initial_slab_size = initial_slab_size.max(1);
        Self {
            initial_slab_size,
            state: RefCell::new(ArenaState {
                slabs: Vec::new(),
                current: 0,
                next_slab_size: initial_slab_size,
            }),
            tracker: None,
            stats: None,
        }
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

    /// Bump-allocates `size` zeroed bytes aligned to `align`.
    ///
    /// Zero-sized requests return a dangling, well-aligned pointer and leave the cursor
    /// alone. The returned memory stays valid until the next [`reset`](Self::reset),
    /// [`clear`](Self::clear) or drop.
    #[track_caller]
    pub fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>, MemoryError> {
        if !align.is_power_of_two() {
            return Err(MemoryError::InvalidLayout(format!(
                "alignment {align} is not a power of two"
            )));
        }
        if size == 0 {
            return NonNull::new(align as *mut u8)
                .ok_or_else(|| MemoryError::InvalidLayout("zero alignment".into()));
        }

        let mut state = self.state.borrow_mut();
        let ptr = match state.bump(size, align) {
            Some(ptr) => ptr,
            None => {
                let padding = state.padding(align);
                let needed = size.checked_add(padding).ok_or_else(|| {
                    MemoryError::InvalidLayout(format!("request of {size} bytes overflows"))
                })?;
                self.grow(&mut state, needed, align, Location::caller())?;
                state.bump(size, align).ok_or(MemoryError::OutOfMemory { size, align })?
            }
        };

        if let Some(stats) = &self.stats {
            stats.increment_arena_allocations();
        }
        Ok(ptr)
    }

    /// Bump-allocates memory for `layout`.
    #[track_caller]
    pub fn allocate_layout(&self, layout: Layout) -> Result<NonNull<u8>, MemoryError> {
        self.allocate(layout.size(), layout.align())
    }

    /// Moves `value` into the arena. Its destructor never runs.
    #[track_caller]
    #[allow(clippy::mut_from_ref)]
    pub fn alloc<T>(&self, value: T) -> Result<&mut T, MemoryError> {
        let ptr = self.allocate_layout(Layout::new::<T>())?.cast::<T>();
        // SAFETY: ptr is aligned for T, sized for T and exclusively ours until reset,
        // which needs &mut self and therefore ends this borrow first.
        unsafe {
            ptr.as_ptr().write(value);
            Ok(&mut *ptr.as_ptr())
        }
    }

    /// Copies `src` into the arena.
    #[track_caller]
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_copy<T: Copy>(&self, src: &[T]) -> Result<&mut [T], MemoryError> {
        let layout = Layout::array::<T>(src.len())
            .map_err(|e| MemoryError::InvalidLayout(e.to_string()))?;
        let ptr = self.allocate_layout(layout)?.cast::<T>();
        // SAFETY: ptr is valid for src.len() elements and does not overlap src.
        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), ptr.as_ptr(), src.len());
            Ok(std::slice::from_raw_parts_mut(ptr.as_ptr(), src.len()))
        }
    }

    fn grow(
        &self,
        state: &mut ArenaState,
        needed: usize,
        align: usize,
        location: &'static Location<'static>,
    ) -> Result<(), MemoryError> {
        let size = state.next_slab_size.max(needed);
        let slab = Slab::new(
            size,
            align.max(SLAB_ALIGN),
            self.tracker.as_ref(),
            location,
        )?;
        state.slabs.push(slab);
        state.current = state.slabs.len() - 1;
        state.next_slab_size = size.saturating_mul(2);

        debug!(slab_size = size, slabs = state.slabs.len(), "arena grew by one slab");
        if let Some(stats) = &self.stats {
            stats.increment_arena_slabs();
        }
        Ok(())
    }

    /// Rewinds every slab's cursor. Slabs stay allocated for reuse; their contents are
    /// zeroed again only when handed out.
    pub fn reset(&mut self) {
        let state = self.state.get_mut();
        for slab in &mut state.slabs {
            slab.set_used(0);
        }
        state.current = 0;

        debug!(slabs = state.slabs.len(), "arena reset");
        if let Some(stats) = &self.stats {
            stats.increment_arena_resets();
        }
    }

    /// Releases every slab and restarts growth from the initial slab size.
    pub fn clear(&mut self) {
        let state = self.state.get_mut();
        state.slabs.clear();
        state.current = 0;
        state.next_slab_size = self.initial_slab_size;
    }

    pub fn initial_slab_size(&self) -> usize {
        self.initial_slab_size
    }

    pub fn slab_count(&self) -> usize {
        self.state.borrow().slabs.len()
    }

    /// Capacity of every slab, in bytes.
    pub fn total_memory(&self) -> usize {
        self.state.borrow().slabs.iter().map(Slab::capacity).sum()
    }

    /// Bytes consumed by allocations, including alignment padding.
    pub fn used_memory(&self) -> usize {
        self.state.borrow().slabs.iter().map(Slab::used).sum()
    }

    /// Total minus used: alignment padding plus unused slab tails.
    pub fn wasted_memory(&self) -> usize {
        self.total_memory() - self.used_memory()
    }

    /// Index of the slab that holds all of `[ptr, ptr + len)`, if any.
    pub fn slab_containing(&self, ptr: NonNull<u8>, len: usize) -> Option<usize> {
        let address = ptr.as_ptr() as usize;
        self.state
            .borrow()
            .slabs
            .iter()
            .position(|slab| slab.contains(address, len))
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("slabs", &self.slab_count())
            .field("total", &self.total_memory())
            .field("used", &self.used_memory())
            .finish()
    }
}
