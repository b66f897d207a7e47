//! # Slabkit Telemetry
//!
//! Logging setup and Prometheus gauges for pool, arena and tracker activity.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
