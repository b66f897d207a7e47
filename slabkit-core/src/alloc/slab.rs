//! Raw, zero-initialised memory blocks owned by a pool or arena.

use std::alloc::{self as heap, Layout};
use std::panic::Location;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::alloc::tracker::AllocationTracker;
use crate::error::MemoryError;

/// A contiguous block of raw memory with a used-bytes cursor.
///
/// The cursor is only meaningful to arenas; pools carve the whole slab into blocks up
/// front and leave it at zero. Memory goes back to the heap (through the tracker, when
/// one is attached) when the slab is dropped.
pub(crate) struct Slab {
    ptr: NonNull<u8>,
    layout: Layout,
    used: usize,
    tracker: Option<Arc<AllocationTracker>>,
}

impl Slab {
    pub(crate) fn new(
        size: usize,
        align: usize,
        tracker: Option<&Arc<AllocationTracker>>,
        location: &'static Location<'static>,
    ) -> Result<Self, MemoryError> {
        let layout = Layout::from_size_align(size.max(1), align)
            .map_err(|e| MemoryError::InvalidLayout(e.to_string()))?;

        let ptr = match tracker {
            Some(tracker) => tracker.track_alloc_at(layout, location, true)?,
            // SAFETY: layout has a non-zero size.
            None => NonNull::new(unsafe { heap::alloc_zeroed(layout) })
                .ok_or_else(|| MemoryError::out_of_memory(layout))?,
        };

        Ok(Self {
            ptr,
            layout,
            used: 0,
            tracker: tracker.cloned(),
        })
    }

    #[inline]
    pub(crate) fn base(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.layout.size()
    }

    #[inline]
    pub(crate) fn used(&self) -> usize {
        self.used
    }

    #[inline]
    pub(crate) fn set_used(&mut self, used: usize) {
        debug_assert!(used <= self.capacity());
        self.used = used;
    }

    /// Whether `[address, address + len)` lies entirely inside this slab.
    pub(crate) fn contains(&self, address: usize, len: usize) -> bool {
        let start = self.base() as usize;
        let end = start + self.capacity();
        address >= start && address.checked_add(len).is_some_and(|e| e <= end)
    }
}

impl Drop for Slab {
    fn drop(&mut self) {
        match &self.tracker {
            // SAFETY: ptr was allocated for self.layout by this tracker.
            Some(tracker) => unsafe { tracker.track_free_layout(self.ptr, self.layout) },
            // SAFETY: ptr was allocated for self.layout by the global allocator.
            None => unsafe { heap::dealloc(self.ptr.as_ptr(), self.layout) },
        }
    }
}
