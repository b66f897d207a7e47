//! # slabkit-core
//!
//! Foundation layer for instrumented, pool- and arena-backed memory management.
//!
//! ### Key Submodules:
//! - `alloc::tracker`: thread-safe allocation ledger with usage, leak and fragmentation reports
//! - `alloc::pool`: fixed-size block pool with an intrusive free list
//! - `alloc::arena`: growable bump allocator with bulk reset
//! - `alloc::strategy`: allocation-strategy handles injected into containers
//! - `alloc::seq`: `SeqVec`, a growable sequence that draws storage from a strategy
//! - `alloc::stats`: shared counters for pool/arena activity
//!
//! The ledger is compiled in by the `tracking` feature (on by default). Without it,
//! tracked calls degrade to plain heap calls.

pub mod alloc;
pub mod error;

pub mod prelude {
    pub use crate::alloc::*;
    pub use crate::error::*;
}

pub use error::MemoryError;
