//! N-Queens search configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct SearchConfig {
    /// Board sizes every routine is run over, in order.
    #[serde(default = "default_board_sizes")]
    #[validate(custom(function = validation::validate_board_sizes))]
    pub board_sizes: Vec<usize>,

    /// Step limit for min-conflicts hill climbing.
    #[serde(default = "default_hill_climb_max_steps")]
    #[validate(range(min = 1))]
    pub hill_climb_max_steps: usize,

    /// Node budget for blind DFS. `None` enumerates to completion.
    #[serde(default = "default_dfs_node_limit")]
    pub dfs_node_limit: Option<u64>,

    /// RNG seed for hill climbing. `None` seeds from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_board_sizes() -> Vec<usize> {
    vec![4, 8, 16, 32, 64, 128, 256, 512, 1024]
}

fn default_hill_climb_max_steps() -> usize {
    1_000_000
}

fn default_dfs_node_limit() -> Option<u64> {
    Some(50_000_000)
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            board_sizes: default_board_sizes(),
            hill_climb_max_steps: default_hill_climb_max_steps(),
            dfs_node_limit: default_dfs_node_limit(),
            seed: None,
        }
    }
}
