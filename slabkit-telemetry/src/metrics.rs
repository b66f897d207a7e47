//! ## slabkit-telemetry::metrics
//! **Prometheus gauges for allocator activity**
//!
//! Counters live in `MemoryStats` and `AllocationTracker`; this module mirrors their
//! snapshots into gauges and renders the text exposition format on demand. Search run
//! durations go into a histogram labelled by routine.

use prometheus::{HistogramOpts, HistogramVec, IntGauge, Opts, Registry};
use slabkit_core::alloc::{StatsSnapshot, TrackerSnapshot};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub pool_allocations: IntGauge,
    pub pool_deallocations: IntGauge,
    pub pool_slabs: IntGauge,
    pub arena_allocations: IntGauge,
    pub arena_resets: IntGauge,
    pub arena_slabs: IntGauge,
    pub heap_fallbacks: IntGauge,
    pub tracked_current_bytes: IntGauge,
    pub tracked_peak_bytes: IntGauge,
    pub tracked_live_allocations: IntGauge,
    pub tracked_fragmentation_bytes: IntGauge,
    pub run_duration: HistogramVec,
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, prometheus::Error> {
    let gauge = IntGauge::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn to_i64<T: TryInto<i64>>(value: T) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let run_duration = HistogramVec::new(
            HistogramOpts::new(
                "slabkit_search_duration_seconds",
                "Wall-clock time of one search run",
            )
            .buckets(vec![0.001, 0.01, 0.1, 1.0, 10.0, 60.0]),
            &["routine"],
        )?;
        registry.register(Box::new(run_duration.clone()))?;

        Ok(Self {
            pool_allocations: gauge(&registry, "slabkit_pool_allocations", "Blocks handed out by pools")?,
            pool_deallocations: gauge(&registry, "slabkit_pool_deallocations", "Blocks returned to pools")?,
            pool_slabs: gauge(&registry, "slabkit_pool_slabs", "Slabs allocated by pools")?,
            arena_allocations: gauge(&registry, "slabkit_arena_allocations", "Bump allocations served by arenas")?,
            arena_resets: gauge(&registry, "slabkit_arena_resets", "Arena resets")?,
            arena_slabs: gauge(&registry, "slabkit_arena_slabs", "Slabs allocated by arenas")?,
            heap_fallbacks: gauge(&registry, "slabkit_heap_fallbacks", "Multi-element pool requests sent to the heap")?,
            tracked_current_bytes: gauge(&registry, "slabkit_tracked_current_bytes", "Bytes currently live in the tracker ledger")?,
            tracked_peak_bytes: gauge(&registry, "slabkit_tracked_peak_bytes", "Peak live bytes seen by the tracker")?,
            tracked_live_allocations: gauge(&registry, "slabkit_tracked_live_allocations", "Live tracked allocations")?,
            tracked_fragmentation_bytes: gauge(&registry, "slabkit_tracked_fragmentation_bytes", "Gap bytes between live tracked allocations")?,
            run_duration,
            registry,
        })
    }

    pub fn record_stats(&self, stats: &StatsSnapshot) {
        self.pool_allocations.set(to_i64(stats.pool_allocations));
        self.pool_deallocations.set(to_i64(stats.pool_deallocations));
        self.pool_slabs.set(to_i64(stats.pool_slabs));
        self.arena_allocations.set(to_i64(stats.arena_allocations));
        self.arena_resets.set(to_i64(stats.arena_resets));
        self.arena_slabs.set(to_i64(stats.arena_slabs));
        self.heap_fallbacks.set(to_i64(stats.heap_fallbacks));
    }

    pub fn record_tracker(&self, tracker: &TrackerSnapshot) {
        self.tracked_current_bytes.set(to_i64(tracker.current_usage));
        self.tracked_peak_bytes.set(to_i64(tracker.peak_usage));
        self.tracked_live_allocations.set(to_i64(tracker.live_allocations));
        self.tracked_fragmentation_bytes.set(to_i64(tracker.fragmentation_bytes));
    }

    pub fn observe_run(&self, routine: &str, seconds: f64) {
        self.run_duration.with_label_values(&[routine]).observe(seconds);
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
