//! ## slabkit-core::alloc
//! **Block pools, bump arenas and an instrumented allocation ledger**
//!
//! ### Key Submodules:
//! - `pool`: fixed-size block pool, O(1) allocate/free, grows by whole slabs
//! - `arena`: bump allocation across doubling slabs, reset-only reclamation
//! - `tracker`: allocation ledger guarded by one lock with atomic counters
//! - `strategy`: `AllocStrategy` handles binding containers to a pool, arena or tracker
//! - `seq`: `SeqVec`, the container side of the strategy contract
//! - `stats`: shared atomic counters fed by pools and arenas
//!
//! Pools and arenas are single-threaded (`Send`, not `Sync`). The tracker is `Sync`
//! and is shared between threads and collaborators through an `Arc`.

pub mod arena;
pub mod pool;
pub mod seq;
pub mod stats;
pub mod strategy;
pub mod tracker;

mod slab;

pub use arena::Arena;
pub use pool::BlockPool;
pub use seq::SeqVec;
pub use stats::{MemoryStats, StatsSnapshot};
pub use strategy::{AllocStrategy, ArenaStrategy, HeapStrategy, PoolStrategy, TrackedStrategy};
pub use tracker::{AllocationRecord, AllocationTracker, TrackerSnapshot};
