//! ## slabkit-core::alloc::tracker
//! **Instrumented allocation ledger**
//!
//! `AllocationTracker` hands out heap memory and, while enabled, records every live
//! allocation in a ledger keyed by address. The ledger is guarded by a single mutex so
//! report, leak and fragmentation passes see a consistent snapshot; the counters are
//! independent atomics updated outside the lock.
//!
//! Frees of addresses that have no ledger entry (double frees, memory obtained while the
//! tracker was disabled) still release the memory but leave the counters untouched.
//!
//! The tracker is an explicit instance. Share it with `Arc` and pass it to whatever
//! should be measured; the lifecycle is enable → accumulate → report → reset.

use std::alloc::{self as heap, Layout};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::panic::Location;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::MemoryError;

/// Alignment used by the size-only entry points, matching what `malloc` guarantees.
pub const DEFAULT_ALIGN: usize = 16;

/// Frames kept per captured call stack unless configured otherwise.
pub const DEFAULT_STACK_DEPTH: usize = 10;

/// One live tracked allocation.
#[derive(Debug, Clone)]
pub struct AllocationRecord {
    pub address: usize,
    pub size: usize,
    pub align: usize,
    pub location: &'static Location<'static>,
    /// Microseconds since the UNIX epoch.
    pub timestamp_micros: u64,
    pub stack_trace: Option<Vec<String>>,
}

impl AllocationRecord {
    /// One past the last byte of the allocation.
    pub fn end(&self) -> usize {
        self.address + self.size
    }
}

/// Point-in-time copy of the tracker counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerSnapshot {
    pub total_allocated: u64,
    pub total_freed: u64,
    pub current_usage: u64,
    pub peak_usage: u64,
    pub allocation_count: u64,
    pub live_allocations: usize,
    pub fragmentation_bytes: u64,
}

pub struct AllocationTracker {
    enabled: AtomicBool,
    capture_stacks: AtomicBool,
    max_stack_depth: usize,
    ledger: Mutex<HashMap<usize, AllocationRecord>>,
    total_allocated: AtomicU64,
    total_freed: AtomicU64,
    peak_usage: AtomicU64,
    current_usage: AtomicU64,
    allocation_count: AtomicU64,
    fragmentation: AtomicU64,
}

impl AllocationTracker {
    /// Creates a disabled tracker that captures call stacks of up to
    /// [`DEFAULT_STACK_DEPTH`] frames once enabled.
    pub fn new() -> Self {
        Self::with_stack_depth(DEFAULT_STACK_DEPTH)
    }

    /// Creates a disabled tracker keeping at most `max_stack_depth` frames per record.
    pub fn with_stack_depth(max_stack_depth: usize) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            capture_stacks: AtomicBool::new(true),
            max_stack_depth,
            ledger: Mutex::new(HashMap::new()),
            total_allocated: AtomicU64::new(0),
            total_freed: AtomicU64::new(0),
            peak_usage: AtomicU64::new(0),
            current_usage: AtomicU64::new(0),
            allocation_count: AtomicU64::new(0),
            fragmentation: AtomicU64::new(0),
        }
    }

    pub fn enable(&self) {
        if cfg!(feature = "tracking") {
            self.enabled.store(true, Ordering::Release);
        }
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    /// Always `false` when the crate is built without the `tracking` feature.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        cfg!(feature = "tracking") && self.enabled.load(Ordering::Acquire)
    }

    /// Turns call-stack capture on or off. Capturing resolves symbols on every tracked
    /// allocation and dominates the cost of tracking.
    pub fn set_capture_stacks(&self, capture: bool) {
        self.capture_stacks.store(capture, Ordering::Relaxed);
    }

    /// Clears the ledger and every counter. No memory is released.
    pub fn reset(&self) {
        let mut ledger = self.ledger.lock();
        ledger.clear();
        self.total_allocated.store(0, Ordering::Relaxed);
        self.total_freed.store(0, Ordering::Relaxed);
        self.peak_usage.store(0, Ordering::Relaxed);
        self.current_usage.store(0, Ordering::Relaxed);
        self.allocation_count.store(0, Ordering::Relaxed);
        self.fragmentation.store(0, Ordering::Relaxed);
    }

    /// Allocates `size` bytes aligned to [`DEFAULT_ALIGN`], recording the caller's location.
    #[track_caller]
    pub fn track_alloc(&self, size: usize) -> Result<NonNull<u8>, MemoryError> {
        self.track_alloc_layout(size_layout(size)?)
    }

    /// Allocates memory for `layout`, recording the caller's location.
    #[track_caller]
    pub fn track_alloc_layout(&self, layout: Layout) -> Result<NonNull<u8>, MemoryError> {
        self.track_alloc_at(layout, Location::caller(), false)
    }

    /// Allocates memory for `layout` on behalf of `location`, optionally zero-filled.
    pub fn track_alloc_at(
        &self,
        layout: Layout,
        location: &'static Location<'static>,
        zeroed: bool,
    ) -> Result<NonNull<u8>, MemoryError> {
        let heap_layout = heap_layout(layout);
        // SAFETY: heap_layout has a non-zero size.
        let raw = unsafe {
            if zeroed {
                heap::alloc_zeroed(heap_layout)
            } else {
                heap::alloc(heap_layout)
            }
        };
        let ptr = NonNull::new(raw).ok_or_else(|| MemoryError::out_of_memory(layout))?;

        if self.is_enabled() {
            self.record(ptr, layout, location);
        }
        Ok(ptr)
    }

    /// Releases memory obtained from [`track_alloc`](Self::track_alloc).
    ///
    /// # Safety
    ///
    /// `ptr` must come from the global allocator with a size-only layout of `size` bytes
    /// (as produced by `track_alloc(size)`) and must not be used afterwards.
    pub unsafe fn track_free(&self, ptr: NonNull<u8>, size: usize) {
        let layout = match size_layout(size) {
            Ok(layout) => layout,
            Err(_) => return,
        };
        // SAFETY: forwarded caller contract.
        unsafe { self.track_free_layout(ptr, layout) }
    }

    /// Releases memory obtained with `layout`.
    ///
    /// # Safety
    ///
    /// `ptr` must have been allocated by the global allocator for `layout` (directly or
    /// through this tracker) and must not be used afterwards.
    pub unsafe fn track_free_layout(&self, ptr: NonNull<u8>, layout: Layout) {
        if self.is_enabled() {
            self.forget(ptr);
        }
        // SAFETY: caller guarantees ptr was allocated for this layout.
        unsafe { heap::dealloc(ptr.as_ptr(), heap_layout(layout)) }
    }

    fn record(&self, ptr: NonNull<u8>, layout: Layout, location: &'static Location<'static>) {
        let stack_trace = if self.capture_stacks.load(Ordering::Relaxed) {
            Some(capture_stack(self.max_stack_depth))
        } else {
            None
        };
        let record = AllocationRecord {
            address: ptr.as_ptr() as usize,
            size: layout.size(),
            align: layout.align(),
            location,
            timestamp_micros: now_micros(),
            stack_trace,
        };
        let size = layout.size() as u64;

        {
            // Counters change under the ledger lock, ordered against reset().
            let mut ledger = self.ledger.lock();
            if let Some(stale) = ledger.insert(record.address, record) {
                // The previous owner of this address was released while untracked.
                debug!(address = stale.address, size = stale.size, "dropping stale ledger entry");
                self.sub_usage(stale.size as u64);
            }

            self.total_allocated.fetch_add(size, Ordering::Relaxed);
            self.allocation_count.fetch_add(1, Ordering::Relaxed);
            let current = self
                .current_usage
                .fetch_add(size, Ordering::Relaxed)
                .saturating_add(size);
            self.peak_usage.fetch_max(current, Ordering::Relaxed);
        }

        trace!(
            address = ptr.as_ptr() as usize,
            size = layout.size(),
            location = %location,
            "tracked allocation"
        );
    }

    fn forget(&self, ptr: NonNull<u8>) {
        let address = ptr.as_ptr() as usize;
        let removed = {
            let mut ledger = self.ledger.lock();
            let removed = ledger.remove(&address);
            if let Some(record) = &removed {
                self.total_freed.fetch_add(record.size as u64, Ordering::Relaxed);
                self.sub_usage(record.size as u64);
            }
            removed
        };
        match removed {
            Some(record) => trace!(address, size = record.size, "tracked free"),
            None => debug!(address, "free of untracked address ignored"),
        }
    }

    /// Lowers `current_usage` without wrapping. Call with the ledger lock held.
    fn sub_usage(&self, size: u64) {
        let _ = self
            .current_usage
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(size))
            });
    }

    pub fn total_allocated(&self) -> u64 {
        self.total_allocated.load(Ordering::Relaxed)
    }

    pub fn total_freed(&self) -> u64 {
        self.total_freed.load(Ordering::Relaxed)
    }

    pub fn peak_usage(&self) -> u64 {
        self.peak_usage.load(Ordering::Relaxed)
    }

    pub fn current_usage(&self) -> u64 {
        self.current_usage.load(Ordering::Relaxed)
    }

    pub fn allocation_count(&self) -> u64 {
        self.allocation_count.load(Ordering::Relaxed)
    }

    /// Number of records currently in the ledger.
    pub fn live_allocations(&self) -> usize {
        self.ledger.lock().len()
    }

    /// Gap bytes computed by the last [`analyze_fragmentation`](Self::analyze_fragmentation).
    pub fn fragmentation_bytes(&self) -> u64 {
        self.fragmentation.load(Ordering::Relaxed)
    }

    /// Last fragmentation figure as a percentage of peak usage.
    pub fn fragmentation_percentage(&self) -> f64 {
        let peak = self.peak_usage();
        if peak == 0 {
            return 0.0;
        }
        self.fragmentation_bytes() as f64 / peak as f64 * 100.0
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            total_allocated: self.total_allocated(),
            total_freed: self.total_freed(),
            current_usage: self.current_usage(),
            peak_usage: self.peak_usage(),
            allocation_count: self.allocation_count(),
            live_allocations: self.live_allocations(),
            fragmentation_bytes: self.fragmentation_bytes(),
        }
    }

    /// Copies the live records, ordered by address.
    pub fn records(&self) -> Vec<AllocationRecord> {
        let mut records: Vec<AllocationRecord> = self.ledger.lock().values().cloned().collect();
        records.sort_by_key(|r| r.address);
        records
    }

    /// Sums the address gaps between consecutive live allocations and stores the result.
    ///
    /// This is a proxy for external fragmentation over the tracked set only; it knows
    /// nothing about pages the allocator holds for other callers.
    pub fn analyze_fragmentation(&self) -> u64 {
        let mut spans: Vec<(usize, usize)> = {
            let ledger = self.ledger.lock();
            ledger.values().map(|r| (r.address, r.end())).collect()
        };
        spans.sort_unstable();

        let gaps = spans
            .windows(2)
            .map(|pair| pair[1].0.saturating_sub(pair[0].1) as u64)
            .sum();
        self.fragmentation.store(gaps, Ordering::Relaxed);
        gaps
    }

    /// Writes the counters and every live record.
    pub fn generate_report<W: Write>(&self, out: &mut W) -> Result<(), MemoryError> {
        let records = self.records();
        let snapshot = self.snapshot();

        writeln!(out, "=== Memory Usage Report ===")?;
        writeln!(out, "Total Allocated: {} bytes", snapshot.total_allocated)?;
        writeln!(out, "Total Freed: {} bytes", snapshot.total_freed)?;
        writeln!(out, "Current Usage: {} bytes", snapshot.current_usage)?;
        writeln!(out, "Peak Usage: {} bytes", snapshot.peak_usage)?;
        writeln!(out, "Allocation Count: {}", snapshot.allocation_count)?;
        writeln!(out, "Fragmentation: {:.2}%", self.fragmentation_percentage())?;
        writeln!(out, "Active Allocations: {}", records.len())?;
        writeln!(out)?;

        if !records.is_empty() {
            writeln!(out, "=== Active Allocations ===")?;
            for record in &records {
                writeln!(
                    out,
                    "Ptr: {:#x} | Size: {} bytes | File: {}:{}",
                    record.address,
                    record.size,
                    record.location.file(),
                    record.location.line()
                )?;
            }
        }
        out.flush()?;
        Ok(())
    }

    /// Writes every live record as a leak, with its captured call stack.
    pub fn generate_leak_report<W: Write>(&self, out: &mut W) -> Result<(), MemoryError> {
        let records = self.records();
        let leaked: u64 = records.iter().map(|r| r.size as u64).sum();

        writeln!(out, "=== Memory Leak Report ===")?;
        writeln!(out, "Total Leaks: {}", records.len())?;
        writeln!(out, "Total Leaked Memory: {} bytes", leaked)?;
        writeln!(out)?;

        for record in &records {
            writeln!(
                out,
                "Leak at {}:{}",
                record.location.file(),
                record.location.line()
            )?;
            writeln!(out, "Size: {} bytes", record.size)?;
            writeln!(out, "Address: {:#x}", record.address)?;
            writeln!(out, "Stack Trace:")?;
            match &record.stack_trace {
                Some(frames) if !frames.is_empty() => {
                    for frame in frames {
                        writeln!(out, "  {frame}")?;
                    }
                }
                _ => writeln!(out, "  <not captured>")?,
            }
            writeln!(out, "-------------------")?;
        }
        out.flush()?;
        Ok(())
    }

    /// Writes [`generate_report`](Self::generate_report) output to `path`.
    pub fn write_report<P: AsRef<Path>>(&self, path: P) -> Result<(), MemoryError> {
        let mut out = BufWriter::new(File::create(path)?);
        self.generate_report(&mut out)
    }

    /// Writes [`generate_leak_report`](Self::generate_leak_report) output to `path`.
    pub fn write_leak_report<P: AsRef<Path>>(&self, path: P) -> Result<(), MemoryError> {
        let mut out = BufWriter::new(File::create(path)?);
        self.generate_leak_report(&mut out)
    }
}

impl Default for AllocationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AllocationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocationTracker")
            .field("enabled", &self.is_enabled())
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

fn size_layout(size: usize) -> Result<Layout, MemoryError> {
    Layout::from_size_align(size, DEFAULT_ALIGN)
        .map_err(|e| MemoryError::InvalidLayout(e.to_string()))
}

/// The global allocator must never see a zero-sized request.
fn heap_layout(layout: Layout) -> Layout {
    if layout.size() == 0 {
        // align is a valid power of two, and 1 <= align rounds up within isize::MAX.
        Layout::from_size_align(1, layout.align()).unwrap_or(layout)
    } else {
        layout
    }
}

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(feature = "tracking")]
fn capture_stack(max_depth: usize) -> Vec<String> {
    let bt = backtrace::Backtrace::new();
    bt.frames()
        .iter()
        .filter_map(|frame| {
            frame.symbols().first().map(|symbol| {
                let name = symbol
                    .name()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "<unknown>".to_string());
                match (symbol.filename(), symbol.lineno()) {
                    (Some(file), Some(line)) => format!("{} ({}:{})", name, file.display(), line),
                    _ => name,
                }
            })
        })
        .filter(|frame| {
            !frame.contains("backtrace::")
                && !frame.contains("AllocationTracker")
                && !frame.contains("capture_stack")
        })
        .take(max_depth)
        .collect()
}

#[cfg(not(feature = "tracking"))]
fn capture_stack(_max_depth: usize) -> Vec<String> {
    Vec::new()
}

#[cfg(all(test, feature = "tracking"))]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn quiet_tracker() -> AllocationTracker {
        let tracker = AllocationTracker::new();
        tracker.set_capture_stacks(false);
        tracker.enable();
        tracker
    }

    #[test]
    fn test_disabled_tracker_keeps_no_records() {
        let tracker = AllocationTracker::new();
        assert!(!tracker.is_enabled());

        let ptr = tracker.track_alloc(128).unwrap();
        assert_eq!(tracker.allocation_count(), 0);
        assert_eq!(tracker.live_allocations(), 0);
        unsafe { tracker.track_free(ptr, 128) };
        assert_eq!(tracker.total_freed(), 0);
    }

    #[test]
    fn test_alloc_and_free_update_counters() {
        let tracker = quiet_tracker();
        let a = tracker.track_alloc(100).unwrap();
        let b = tracker.track_alloc(50).unwrap();
        assert_eq!(tracker.current_usage(), 150);
        assert_eq!(tracker.peak_usage(), 150);
        assert_eq!(tracker.allocation_count(), 2);

        unsafe { tracker.track_free(a, 100) };
        assert_eq!(tracker.current_usage(), 50);
        assert_eq!(tracker.total_freed(), 100);
        assert_eq!(tracker.peak_usage(), 150);
        assert_eq!(tracker.live_allocations(), 1);

        unsafe { tracker.track_free(b, 50) };
        assert_eq!(tracker.current_usage(), 0);
        assert_eq!(tracker.total_allocated(), 150);
    }

    #[test]
    fn test_free_of_untracked_pointer_is_silent() {
        let tracker = quiet_tracker();
        let tracked = tracker.track_alloc(256).unwrap();

        let layout = Layout::from_size_align(32, DEFAULT_ALIGN).unwrap();
        let foreign = NonNull::new(unsafe { heap::alloc(layout) }).unwrap();
        unsafe { tracker.track_free_layout(foreign, layout) };

        assert_eq!(tracker.current_usage(), 256);
        assert_eq!(tracker.allocation_count(), 1);
        assert_eq!(tracker.total_freed(), 0);

        unsafe { tracker.track_free(tracked, 256) };
    }

    #[test]
    fn test_record_captures_caller_location() {
        let tracker = quiet_tracker();
        let line = line!() + 1;
        let ptr = tracker.track_alloc(8).unwrap();

        let records = tracker.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].location.file(), file!());
        assert_eq!(records[0].location.line(), line);
        assert!(records[0].timestamp_micros > 0);

        unsafe { tracker.track_free(ptr, 8) };
    }

    #[test]
    fn test_stack_capture_respects_depth() {
        let tracker = AllocationTracker::with_stack_depth(3);
        tracker.enable();
        let ptr = tracker.track_alloc(16).unwrap();
        let records = tracker.records();
        let frames = records[0].stack_trace.as_ref().unwrap();
        assert!(frames.len() <= 3);
        unsafe { tracker.track_free(ptr, 16) };
    }

    #[test]
    fn test_reset_clears_ledger_and_counters() {
        let tracker = quiet_tracker();
        let ptr = tracker.track_alloc(64).unwrap();
        tracker.analyze_fragmentation();
        tracker.reset();

        assert_eq!(tracker.snapshot(), TrackerSnapshot::default());
        // The memory itself is still owned by the caller; the free is now a miss.
        unsafe { tracker.track_free(ptr, 64) };
        assert_eq!(tracker.total_freed(), 0);
    }

    #[test]
    fn test_fragmentation_sums_gaps_between_live_records() {
        let tracker = quiet_tracker();
        let ptrs: Vec<_> = (0..8).map(|_| tracker.track_alloc(64).unwrap()).collect();
        for ptr in ptrs.iter().step_by(2) {
            unsafe { tracker.track_free(*ptr, 64) };
        }

        let records = tracker.records();
        let expected: u64 = records
            .windows(2)
            .map(|w| w[1].address.saturating_sub(w[0].end()) as u64)
            .sum();
        assert_eq!(tracker.analyze_fragmentation(), expected);
        assert_eq!(tracker.fragmentation_bytes(), expected);

        for ptr in ptrs.iter().skip(1).step_by(2) {
            unsafe { tracker.track_free(*ptr, 64) };
        }
        assert_eq!(tracker.analyze_fragmentation(), 0);
    }

    #[test]
    fn test_usage_report_format() {
        let tracker = quiet_tracker();
        let ptr = tracker.track_alloc(24).unwrap();

        let mut out = Vec::new();
        tracker.generate_report(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("=== Memory Usage Report ===\n"));
        assert!(text.contains("Total Allocated: 24 bytes"));
        assert!(text.contains("Allocation Count: 1"));
        assert!(text.contains("Active Allocations: 1"));
        assert!(text.contains("=== Active Allocations ==="));
        assert!(text.contains(&format!("Ptr: {:#x} | Size: 24 bytes", ptr.as_ptr() as usize)));
        assert!(text.contains("tracker.rs:"));

        unsafe { tracker.track_free(ptr, 24) };
    }

    #[test]
    fn test_leak_report_lists_every_live_record() {
        let tracker = AllocationTracker::new();
        tracker.enable();
        let a = tracker.track_alloc(10).unwrap();
        let b = tracker.track_alloc(20).unwrap();

        let mut out = Vec::new();
        tracker.generate_leak_report(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("=== Memory Leak Report ==="));
        assert!(text.contains("Total Leaks: 2"));
        assert!(text.contains("Total Leaked Memory: 30 bytes"));
        assert_eq!(text.matches("Stack Trace:").count(), 2);
        assert_eq!(text.matches("-------------------").count(), 2);

        unsafe {
            tracker.track_free(a, 10);
            tracker.track_free(b, 20);
        }
    }

    #[test]
    fn test_concurrent_tracking_is_consistent() {
        let tracker = Arc::new(quiet_tracker());
        std::thread::scope(|scope| {
            for _ in 0..4 {
                let tracker = Arc::clone(&tracker);
                scope.spawn(move || {
                    for i in 1..=100usize {
                        let ptr = tracker.track_alloc(i).unwrap();
                        if i % 2 == 0 {
                            unsafe { tracker.track_free(ptr, i) };
                        }
                    }
                });
            }
        });

        let odd_sum: u64 = (1..=100u64).filter(|i| i % 2 == 1).sum();
        assert_eq!(tracker.allocation_count(), 400);
        assert_eq!(tracker.current_usage(), odd_sum * 4);
        assert_eq!(tracker.live_allocations(), 200);

        for record in tracker.records() {
            let ptr = NonNull::new(record.address as *mut u8).unwrap();
            unsafe { tracker.track_free(ptr, record.size) };
        }
        assert_eq!(tracker.current_usage(), 0);
    }

    #[test]
    fn test_reset_during_concurrent_tracking_keeps_counters_sane() {
        let tracker = Arc::new(quiet_tracker());
        std::thread::scope(|scope| {
            let worker = Arc::clone(&tracker);
            scope.spawn(move || {
                for _ in 0..20_000 {
                    let ptr = worker.track_alloc(64).unwrap();
                    unsafe { worker.track_free(ptr, 64) };
                }
            });
            let resetter = Arc::clone(&tracker);
            scope.spawn(move || {
                for _ in 0..20_000 {
                    resetter.reset();
                }
            });
        });

        assert_eq!(tracker.live_allocations(), 0);
        assert_eq!(tracker.current_usage(), 0);
        assert!(tracker.peak_usage() <= 64);
        assert!(tracker.total_freed() <= tracker.total_allocated());
    }

    proptest! {
        #[test]
        fn current_usage_matches_unfreed_sizes(
            sizes in proptest::collection::vec(1usize..512, 1..40),
            freed in 0usize..40,
        ) {
            let tracker = quiet_tracker();
            let ptrs: Vec<_> = sizes.iter().map(|&s| tracker.track_alloc(s).unwrap()).collect();
            let freed = freed.min(sizes.len());
            for (ptr, &size) in ptrs.iter().zip(&sizes).take(freed) {
                unsafe { tracker.track_free(*ptr, size) };
            }

            let remaining: u64 = sizes[freed..].iter().map(|&s| s as u64).sum();
            prop_assert_eq!(tracker.allocation_count(), sizes.len() as u64);
            prop_assert_eq!(tracker.current_usage(), remaining);
            prop_assert_eq!(tracker.live_allocations(), sizes.len() - freed);

            for (ptr, &size) in ptrs.iter().zip(&sizes).skip(freed) {
                unsafe { tracker.track_free(*ptr, size) };
            }
        }
    }
}

#[cfg(all(test, not(feature = "tracking")))]
mod untracked_tests {
    use super::*;

    #[test]
    fn test_tracked_calls_are_plain_heap_calls() {
        let tracker = AllocationTracker::new();
        tracker.enable();
        assert!(!tracker.is_enabled());

        let ptr = tracker.track_alloc(96).unwrap();
        unsafe { ptr.as_ptr().write_bytes(0xAB, 96) };
        assert_eq!(tracker.allocation_count(), 0);
        assert_eq!(tracker.live_allocations(), 0);
        assert_eq!(tracker.current_usage(), 0);

        unsafe { tracker.track_free(ptr, 96) };
        assert_eq!(tracker.total_freed(), 0);
        assert!(tracker.records().is_empty());
    }
}
