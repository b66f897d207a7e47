//! Memory subsystem configuration.
//!
//! Sizing for the block pools and arenas the search routines build, plus the
//! allocation tracker switches:
//! - Pool block size and slab granularity
//! - Arena initial slab size
//! - Tracking, call-stack capture and report output

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

#[derive(Default, Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct MemoryConfig {
    #[serde(default)]
    #[validate(nested)]
    pub pool: PoolConfig,

    #[serde(default)]
    #[validate(nested)]
    pub arena: ArenaConfig,

    #[serde(default)]
    #[validate(nested)]
    pub tracker: TrackerConfig,
}

/// Fixed-size block pool parameters.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct PoolConfig {
    /// Bytes per block. Pools raise it to fit a free-list link and the element they store.
    #[serde(default = "default_block_size")]
    #[validate(range(min = 8, max = 65536))]
    pub block_size: usize,

    /// Blocks carved out of each slab.
    #[serde(default = "default_blocks_per_slab")]
    #[validate(range(min = 1, max = 1048576))]
    pub blocks_per_slab: usize,
}

fn default_block_size() -> usize {
    64
}

fn default_blocks_per_slab() -> usize {
    1000
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            blocks_per_slab: default_blocks_per_slab(),
        }
    }
}

/// Bump arena parameters.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct ArenaConfig {
    /// Size of the first slab in bytes. Later slabs double.
    #[serde(default = "default_initial_slab_size")]
    #[validate(range(min = 64, max = 67108864))]
    pub initial_slab_size: usize,
}

fn default_initial_slab_size() -> usize {
    8192
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            initial_slab_size: default_initial_slab_size(),
        }
    }
}

/// Allocation tracker switches.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct TrackerConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Record a call stack with every tracked allocation.
    #[serde(default = "default_true")]
    pub capture_stacks: bool,

    #[serde(default = "default_max_stack_depth")]
    #[validate(range(min = 1, max = 64))]
    pub max_stack_depth: usize,

    /// Directory that usage and leak reports are written into.
    #[serde(default = "default_report_dir")]
    #[validate(custom(function = validation::validate_report_dir))]
    pub report_dir: String,
}

fn default_true() -> bool {
    true
}

fn default_max_stack_depth() -> usize {
    10
}

fn default_report_dir() -> String {
    "reports".into()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capture_stacks: default_true(),
            max_stack_depth: default_max_stack_depth(),
            report_dir: default_report_dir(),
        }
    }
}
