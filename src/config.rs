//! Backend configuration: a struct of plain tunables with a sane `Default`, optionally overridden
//! from a config file or environment via the `config` crate.

use ::config::{Config, ConfigError, Environment, File};

/// Tunables for the allocators and scheduler. None of these affect correctness, only how
/// aggressively backing memory is reused versus released.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// Frames an idle pool/heap entry is kept before being released to the device.
    pub allocator_max_age_frames: u64,
    /// Size in bytes of each block the sub-buffer allocator carves scratch allocations out of.
    pub sub_buffer_block_size: u64,
    /// Resource count above which the generator emits a scoped barrier instead of enumerating
    /// resources individually.
    pub scoped_barrier_resource_threshold: usize,
    /// Number of frames of heap-slot history kept before a guard fence is allowed to be dropped.
    pub heap_history_depth: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            allocator_max_age_frames: 3,
            sub_buffer_block_size: 4 * 1024 * 1024,
            scoped_barrier_resource_threshold: 8,
            heap_history_depth: 3,
        }
    }
}

impl BackendConfig {
    /// Starts from an empty `Config`, merges an optional `rendergraph.toml` in the current
    /// directory, merges `RENDERGRAPH_*` environment variables over it, then reads each tunable
    /// back out, falling back to the built-in default for anything neither source set.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = Config::default();
        cfg.merge(File::with_name("rendergraph").required(false))?;
        cfg.merge(Environment::with_prefix("RENDERGRAPH"))?;

        let defaults = BackendConfig::default();
        Ok(BackendConfig {
            allocator_max_age_frames: cfg
                .get::<u64>("allocator_max_age_frames")
                .unwrap_or(defaults.allocator_max_age_frames),
            sub_buffer_block_size: cfg
                .get::<u64>("sub_buffer_block_size")
                .unwrap_or(defaults.sub_buffer_block_size),
            scoped_barrier_resource_threshold: cfg
                .get::<usize>("scoped_barrier_resource_threshold")
                .unwrap_or(defaults.scoped_barrier_resource_threshold),
            heap_history_depth: cfg
                .get::<usize>("heap_history_depth")
                .unwrap_or(defaults.heap_history_depth),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let config = BackendConfig::default();
        assert!(config.sub_buffer_block_size > 0);
        assert!(config.scoped_barrier_resource_threshold > 0);
    }
}
