//! Shared setup for the search routines.
//!
//! A `SearchContext` decides how big pools and arenas are, which tracker they report
//! to and where per-run reports go. Every routine builds its own pool or arena from
//! it, so one tracker sees all three workloads.

use std::alloc::Layout;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use slabkit_config::{ArenaConfig, MemoryConfig, PoolConfig};
use slabkit_core::alloc::{AllocationTracker, Arena, BlockPool, MemoryStats};
use tracing::{debug, info};

use crate::{Routine, SearchError};

#[derive(Debug, Clone)]
pub struct SearchContext {
    pool: PoolConfig,
    arena: ArenaConfig,
    tracker: Option<Arc<AllocationTracker>>,
    stats: Arc<MemoryStats>,
    report_dir: Option<PathBuf>,
}

impl SearchContext {
    pub fn new(memory: &MemoryConfig) -> Self {
        Self {
            pool: memory.pool.clone(),
            arena: memory.arena.clone(),
            tracker: None,
            stats: Arc::new(MemoryStats::new()),
            report_dir: None,
        }
    }

    /// Attaches `tracker` to every pool and arena built from now on. While the tracker
    /// is enabled, each run writes a usage report into `report_dir`.
    pub fn with_tracker(mut self, tracker: Arc<AllocationTracker>, report_dir: impl Into<PathBuf>) -> Self {
        self.tracker = Some(tracker);
        self.report_dir = Some(report_dir.into());
        self
    }

    pub fn tracker(&self) -> Option<&Arc<AllocationTracker>> {
        self.tracker.as_ref()
    }

    pub fn stats(&self) -> &Arc<MemoryStats> {
        &self.stats
    }

    pub fn report_dir(&self) -> Option<&Path> {
        self.report_dir.as_deref()
    }

    fn tracking(&self) -> Option<&Arc<AllocationTracker>> {
        self.tracker.as_ref().filter(|t| t.is_enabled())
    }

    /// Builds a pool whose blocks hold one `T`, never smaller than the configured
    /// block size.
    pub fn block_pool_for<T>(&self) -> Result<BlockPool, SearchError> {
        let element = Layout::new::<T>();
        let layout = Layout::from_size_align(
            self.pool.block_size.max(element.size()),
            element.align(),
        )
        .map_err(|e| SearchError::Config(e.to_string()))?;
        let mut pool = BlockPool::for_layout(layout, self.pool.blocks_per_slab)?
            .with_stats(Arc::clone(&self.stats));
        if let Some(tracker) = &self.tracker {
            pool = pool.with_tracker(Arc::clone(tracker));
        }
        Ok(pool)
    }

    pub fn arena(&self) -> Arena {
        let mut arena =
            Arena::new(self.arena.initial_slab_size).with_stats(Arc::clone(&self.stats));
        if let Some(tracker) = &self.tracker {
            arena = arena.with_tracker(Arc::clone(tracker));
        }
        arena
    }

    /// Clears the ledger so the next report covers one run only.
    pub(crate) fn begin_run(&self) {
        if let Some(tracker) = self.tracking() {
            tracker.reset();
        }
    }

    /// Analyzes fragmentation of the ledger, then writes `<routine>_memory_N<n>.txt`.
    /// Returns the report path when one was written.
    pub(crate) fn finish_run(
        &self,
        routine: Routine,
        board_size: usize,
    ) -> Result<Option<PathBuf>, SearchError> {
        let (Some(tracker), Some(dir)) = (self.tracking(), self.report_dir()) else {
            return Ok(None);
        };

        fs::create_dir_all(dir)?;
        let gap_bytes = tracker.analyze_fragmentation();
        let path = dir.join(routine.memory_report_file(board_size));
        tracker.write_report(&path)?;

        info!(
            %routine,
            n = board_size,
            current = tracker.current_usage(),
            peak = tracker.peak_usage(),
            gap_bytes,
            fragmentation_pct = tracker.fragmentation_percentage(),
            "memory report written to {}",
            path.display()
        );
        Ok(Some(path))
    }

    /// Writes `<routine>_final_leaks.txt` with whatever the ledger still holds.
    pub fn write_leak_report(&self, routine: Routine) -> Result<Option<PathBuf>, SearchError> {
        let (Some(tracker), Some(dir)) = (self.tracking(), self.report_dir()) else {
            return Ok(None);
        };

        fs::create_dir_all(dir)?;
        let path = dir.join(routine.leak_report_file());
        tracker.write_leak_report(&path)?;
        debug!(%routine, leaks = tracker.live_allocations(), "leak report written");
        Ok(Some(path))
    }
}
