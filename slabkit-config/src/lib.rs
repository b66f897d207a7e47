//! # Slabkit Configuration System
//!
//! Hierarchical configuration for the memory subsystem and the N-Queens search
//! routines that exercise it.
//!
//! ## Features
//! - **Layered sources**: defaults, YAML files and `SLABKIT_*` environment variables
//! - **Validation**: range and shape checks run after every load
//! - **Environment awareness**: `SLABKIT_ENV` selects an override file

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod memory;
mod search;
mod validation;

pub use error::ConfigError;
pub use memory::{ArenaConfig, MemoryConfig, PoolConfig, TrackerConfig};
pub use search::SearchConfig;
pub use validation::MAX_BOARD_SIZE;

const BASE_FILE: &str = "config/slabkit.yaml";
const ENV_PREFIX: &str = "SLABKIT_";

/// Top-level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone, PartialEq)]
pub struct SlabkitConfig {
    /// Pool, arena and tracker settings.
    #[serde(default)]
    #[validate(nested)]
    pub memory: MemoryConfig,

    /// Board sizes and limits for the search routines.
    #[serde(default)]
    #[validate(nested)]
    pub search: SearchConfig,
}

impl SlabkitConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/slabkit.yaml`, skipped when missing
    /// 3. `config/<SLABKIT_ENV>.yaml`, skipped when missing or `SLABKIT_ENV` is unset
    /// 4. `SLABKIT_*` environment variables, `__` separating nested keys
    ///    (`SLABKIT_MEMORY__POOL__BLOCK_SIZE=128`)
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(SlabkitConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        }

        if let Ok(env) = std::env::var("SLABKIT_ENV") {
            let env_file = format!("config/{}.yaml", env);
            if Path::new(&env_file).exists() {
                figment = figment.merge(Yaml::file(env_file));
            }
        }

        Self::finish(figment)
    }

    /// Load configuration from a specific file layered over the defaults, then the
    /// environment.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let figment = Figment::from(Serialized::defaults(SlabkitConfig::default()))
            .merge(Yaml::file(path));
        Self::finish(figment)
    }

    fn finish(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    // Every loader merges `SLABKIT_*` variables, so tests that load run inside a
    // `Jail`, which serializes them and restores the environment afterwards.

    fn load_in(jail: &Jail, contents: &str) -> Result<SlabkitConfig, ConfigError> {
        let path = jail.directory().join("slabkit.yaml");
        std::fs::write(&path, contents).map_err(ConfigError::Io)?;
        SlabkitConfig::load_from_path(path)
    }

    #[test]
    fn full_config_validation() {
        let config = SlabkitConfig::default();
        config.validate().expect("Default config should validate");
        assert_eq!(config.memory.pool.block_size, 64);
        assert_eq!(config.memory.pool.blocks_per_slab, 1000);
        assert_eq!(config.memory.arena.initial_slab_size, 8192);
        assert!(!config.memory.tracker.enabled);
        assert_eq!(config.search.board_sizes.last(), Some(&1024));
    }

    #[test]
    fn load_partial_file_keeps_defaults() {
        Jail::expect_with(|jail| {
            let config = load_in(
                jail,
                "memory:\n  arena:\n    initial_slab_size: 4096\nsearch:\n  board_sizes: [4, 6]\n  seed: 7\n",
            )
            .unwrap();

            assert_eq!(config.memory.arena.initial_slab_size, 4096);
            assert_eq!(config.memory.pool.block_size, 64);
            assert_eq!(config.search.board_sizes, vec![4, 6]);
            assert_eq!(config.search.seed, Some(7));
            Ok(())
        });
    }

    #[test]
    fn load_rejects_out_of_range_values() {
        Jail::expect_with(|jail| {
            let err = load_in(
                jail,
                "memory:\n  pool:\n    block_size: 4\nsearch:\n  board_sizes: [0]\n",
            )
            .unwrap_err();

            let message = err.to_string();
            assert!(matches!(err, ConfigError::Validation(_)));
            assert!(message.contains("memory.pool.block_size"), "{message}");
            assert!(message.contains("search.board_sizes"), "{message}");
            Ok(())
        });
    }

    #[test]
    fn load_missing_file() {
        let err = SlabkitConfig::load_from_path("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn load_malformed_file() {
        Jail::expect_with(|jail| {
            let err = load_in(jail, "memory: [not, a, map\n").unwrap_err();
            assert!(matches!(err, ConfigError::Parsing(_)));
            Ok(())
        });
    }

    #[test]
    fn environment_override() {
        Jail::expect_with(|jail| {
            jail.set_env("SLABKIT_MEMORY__TRACKER__MAX_STACK_DEPTH", "32");
            let config = SlabkitConfig::load().unwrap();
            assert_eq!(config.memory.tracker.max_stack_depth, 32);
            Ok(())
        });
    }

    #[test]
    fn environment_wins_over_file() {
        Jail::expect_with(|jail| {
            jail.set_env("SLABKIT_MEMORY__POOL__BLOCK_SIZE", "256");
            let config = load_in(jail, "memory:\n  pool:\n    block_size: 128\n").unwrap();
            assert_eq!(config.memory.pool.block_size, 256);
            Ok(())
        });
    }
}
