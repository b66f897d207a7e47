//! ## slabkit-telemetry::logging
//! **Structured logging with `tracing`**
//!
//! `EventLogger::init` installs the process-wide fmt subscriber. The filter comes from
//! `RUST_LOG` and defaults to `info`; `RUST_LOG=slabkit_core=trace` shows every tracked
//! allocation and free.

use tracing::info_span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. Does nothing if one is already set.
    pub fn init() {
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .try_init();
    }

    /// Emits one record for a finished search run inside a `search_run` span.
    #[inline]
    pub fn log_run(routine: &str, board_size: usize, seconds: f64, outcome: &str) {
        let span = info_span!("search_run", routine = routine, n = board_size);
        let _guard = span.enter();
        tracing::info!(seconds, outcome, "Search run finished");
    }
}
