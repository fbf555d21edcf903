//! Simulation configuration.
//!
//! This module provides [`SimulationConfig`] and its builder. Path counts
//! and block sizes are whole multiples of the SIMD width so every block is
//! a rectangle of full lanes.

use crate::lanes::LANES;
use pricer_core::types::DayCountConvention;
use thiserror::Error;

/// Maximum number of simulation paths allowed.
pub const MAX_PATHS: usize = 10_000_000;

/// Default number of paths per block.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Default number of training paths for regression payoffs.
pub const DEFAULT_TRAINING_PATHS: usize = 4096;

/// Default seed.
pub const DEFAULT_SEED: u64 = 20_240_601;

/// Configuration error.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Path count outside [LANES, 10_000_000] or not a multiple of LANES.
    #[error("Invalid path count {0}: must be a multiple of the lane width, at most 10_000_000")]
    InvalidPathCount(usize),
    /// Block size zero or not a multiple of LANES.
    #[error("Invalid block size {0}: must be a positive multiple of the lane width")]
    InvalidBlockSize(usize),
    /// Invalid parameter value with name and description.
    #[error("Invalid parameter '{name}': {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Description of the invalid value.
        value: String,
    },
}

/// Monte Carlo simulation configuration.
///
/// Immutable; use [`SimulationConfigBuilder`] to construct instances.
///
/// # Examples
///
/// ```rust
/// use pricer_mc::SimulationConfig;
///
/// let config = SimulationConfig::builder()
///     .n_paths(10_000)
///     .block_size(512)
///     .seed(42)
///     .build()
///     .expect("valid configuration");
///
/// assert_eq!(config.n_paths(), 10_000);
/// assert_eq!(config.n_blocks(), 20);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationConfig {
    n_paths: usize,
    block_size: usize,
    seed: u64,
    training_paths: usize,
    day_count: DayCountConvention,
    parallel: bool,
}

impl SimulationConfig {
    /// Creates a new configuration builder.
    #[inline]
    pub fn builder() -> SimulationConfigBuilder {
        SimulationConfigBuilder::default()
    }

    /// Total number of simulated paths.
    #[inline]
    pub fn n_paths(&self) -> usize {
        self.n_paths
    }

    /// Paths per block.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks; the last one may be shorter.
    #[inline]
    pub fn n_blocks(&self) -> usize {
        self.n_paths.div_ceil(self.block_size)
    }

    /// Seed for the pricing draws.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Paths simulated to fit regression estimators.
    #[inline]
    pub fn training_paths(&self) -> usize {
        self.training_paths
    }

    /// Day count used to place grid dates in time.
    #[inline]
    pub fn day_count(&self) -> DayCountConvention {
        self.day_count
    }

    /// Whether blocks run on the rayon pool.
    #[inline]
    pub fn parallel(&self) -> bool {
        self.parallel
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `n_paths` is not a multiple of the lane width or exceeds 10,000,000
    /// - `block_size` is zero or not a multiple of the lane width
    /// - `training_paths` is zero or not a multiple of the lane width
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_paths < LANES || self.n_paths > MAX_PATHS || self.n_paths % LANES != 0 {
            return Err(ConfigError::InvalidPathCount(self.n_paths));
        }
        if self.block_size == 0 || self.block_size % LANES != 0 {
            return Err(ConfigError::InvalidBlockSize(self.block_size));
        }
        if self.training_paths == 0 || self.training_paths % LANES != 0 {
            return Err(ConfigError::InvalidParameter {
                name: "training_paths",
                value: format!("{} is not a positive multiple of {}", self.training_paths, LANES),
            });
        }
        Ok(())
    }
}

/// Builder for [`SimulationConfig`].
///
/// ```rust
/// use pricer_mc::SimulationConfig;
///
/// let result = SimulationConfig::builder().n_paths(1001).build();
/// assert!(result.is_err());
/// ```
#[derive(Clone, Debug)]
pub struct SimulationConfigBuilder {
    n_paths: Option<usize>,
    block_size: usize,
    seed: u64,
    training_paths: usize,
    day_count: DayCountConvention,
    parallel: bool,
}

impl Default for SimulationConfigBuilder {
    fn default() -> Self {
        Self {
            n_paths: None,
            block_size: DEFAULT_BLOCK_SIZE,
            seed: DEFAULT_SEED,
            training_paths: DEFAULT_TRAINING_PATHS,
            day_count: DayCountConvention::default(),
            parallel: true,
        }
    }
}

impl SimulationConfigBuilder {
    /// Sets the number of simulation paths.
    #[inline]
    pub fn n_paths(mut self, n_paths: usize) -> Self {
        self.n_paths = Some(n_paths);
        self
    }

    /// Sets the number of paths per block.
    #[inline]
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Sets the seed for reproducibility.
    #[inline]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the number of regression training paths.
    #[inline]
    pub fn training_paths(mut self, training_paths: usize) -> Self {
        self.training_paths = training_paths;
        self
    }

    /// Sets the day count convention.
    #[inline]
    pub fn day_count(mut self, day_count: DayCountConvention) -> Self {
        self.day_count = day_count;
        self
    }

    /// Enables or disables parallel block execution.
    #[inline]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// `ConfigError` when `n_paths` is missing or any value fails
    /// [`SimulationConfig::validate`].
    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let n_paths = self.n_paths.ok_or(ConfigError::InvalidParameter {
            name: "n_paths",
            value: "must be specified".to_string(),
        })?;

        let config = SimulationConfig {
            n_paths,
            block_size: self.block_size,
            seed: self.seed,
            training_paths: self.training_paths,
            day_count: self.day_count,
            parallel: self.parallel,
        };

        config.validate()?;
        Ok(config)
    }
}
