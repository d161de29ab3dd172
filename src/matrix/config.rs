//! Configuration and system parameters for the engine

/// System parameters for performance tuning
#[derive(Debug, Clone)]
pub struct SystemParameters {
    /// Size of L2 cache in bytes
    pub l2_cache_size: usize,
    /// Number of threads in each worker's kernel pool
    pub n_threads: usize,
}

impl Default for SystemParameters {
    fn default() -> Self {
        Self {
            l2_cache_size: 256_000,     // 256KB L2 cache (conservative default)
            n_threads: num_cpus::get(), // Use all available cores
        }
    }
}

/// Bytes per column of a dense accumulator: the value slot plus its
/// occupancy index
const DENSE_BYTES_PER_COLUMN: usize = 16;

impl SystemParameters {
    /// Widest output row whose dense accumulator still fits in L2
    pub fn dense_columns_in_l2(&self) -> usize {
        self.l2_cache_size / DENSE_BYTES_PER_COLUMN
    }
}

/// Average-density thresholds for mini-warp width selection
///
/// A matrix whose average non-zeros per row is below `t2` gets groups of 2
/// lanes, below `t4` groups of 4, and so on up to 32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiniWarpThresholds {
    pub t2: usize,
    pub t4: usize,
    pub t8: usize,
    pub t16: usize,
}

impl Default for MiniWarpThresholds {
    fn default() -> Self {
        Self {
            t2: 3,
            t4: 6,
            t8: 12,
            t16: 24,
        }
    }
}

impl MiniWarpThresholds {
    /// Maps an average row density to a lane count
    pub fn width_for(&self, density: usize) -> usize {
        if density < self.t2 {
            2
        } else if density < self.t4 {
            4
        } else if density < self.t8 {
            8
        } else if density < self.t16 {
            16
        } else {
            32
        }
    }
}

/// Configuration for a worker's kernels
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// System parameters for performance tuning
    pub system_params: SystemParameters,

    /// Density thresholds for the adaptive SpMV
    pub mini_warp: MiniWarpThresholds,

    /// Output column count up to which products use the dense accumulator
    pub dense_accum_threshold: usize,

    /// Overlap the owned-column SpMV pass with the halo exchange
    pub overlap_halo: bool,

    /// Validate column order before building communication plans
    pub check_inputs: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let system_params = SystemParameters::default();
        Self {
            dense_accum_threshold: system_params.dense_columns_in_l2(),
            system_params,
            mini_warp: MiniWarpThresholds::default(),
            overlap_halo: true,
            check_inputs: true,
        }
    }
}

impl EngineConfig {
    /// Sets the kernel pool size
    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.system_params.n_threads = n_threads.max(1);
        self
    }

    /// Sets the mini-warp thresholds
    pub fn with_mini_warp(mut self, thresholds: MiniWarpThresholds) -> Self {
        self.mini_warp = thresholds;
        self
    }

    /// Sets the dense accumulator threshold
    pub fn with_dense_threshold(mut self, threshold: usize) -> Self {
        self.dense_accum_threshold = threshold;
        self
    }

    /// Enables or disables SpMV/halo overlap
    pub fn with_overlap(mut self, overlap: bool) -> Self {
        self.overlap_halo = overlap;
        self
    }

    /// Enables or disables input validation before plan construction
    pub fn with_input_checks(mut self, check: bool) -> Self {
        self.check_inputs = check;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_for_density() {
        let t = MiniWarpThresholds::default();
        assert_eq!(t.width_for(0), 2);
        assert_eq!(t.width_for(2), 2);
        assert_eq!(t.width_for(3), 4);
        assert_eq!(t.width_for(11), 8);
        assert_eq!(t.width_for(12), 16);
        assert_eq!(t.width_for(100), 32);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::default().with_threads(0).with_overlap(false);
        assert_eq!(config.system_params.n_threads, 1);
        assert!(!config.overlap_halo);
        assert!(config.check_inputs);
        assert_eq!(config.dense_accum_threshold, 16_000);
    }
}
