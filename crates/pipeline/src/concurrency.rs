//! Worker pool planning.
//!
//! Derives the image-processing pool size from configuration and the
//! available logical CPU count.

use slidecast_config::Config;

/// Worker plan derived from configuration and system resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPlan {
    /// Total logical CPU cores available
    pub logical_cores: u32,
    /// Image-processing pool size
    pub pool_size: u32,
}

impl WorkerPlan {
    /// Derive a worker plan from configuration
    ///
    /// Uses an explicit non-zero `workers.pool_size` unchanged; otherwise
    /// derives 2 threads per logical core, with a floor of 4.
    pub fn derive(cfg: &Config) -> Self {
        Self::derive_with_cores(cfg, num_cpus::get() as u32)
    }

    /// Derive a worker plan for a known core count (used in tests).
    pub fn derive_with_cores(cfg: &Config, logical_cores: u32) -> Self {
        let pool_size = if cfg.workers.pool_size > 0 {
            cfg.workers.pool_size
        } else {
            derive_pool_size(logical_cores)
        };

        Self {
            logical_cores,
            pool_size,
        }
    }
}

/// Derive pool size from core count: 2x cores, minimum 4.
fn derive_pool_size(cores: u32) -> u32 {
    cores.saturating_mul(2).max(4)
}

/// Public function to derive a worker plan from configuration
pub fn derive_plan(cfg: &Config) -> WorkerPlan {
    WorkerPlan::derive(cfg)
}
