//! Pseudo-random number generation for path blocks.
//!
//! This module provides [`PricerRng`], a seeded PRNG wrapper. Each block is
//! driven by its own generator derived from the run seed and the block
//! index, so results do not depend on how blocks are scheduled across
//! threads.

use crate::lanes::{Lane, LANES};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

/// Monte Carlo simulation random number generator.
///
/// # Examples
///
/// ```rust
/// use pricer_mc::rng::PricerRng;
///
/// let mut a = PricerRng::for_block(7, 3);
/// let mut b = PricerRng::for_block(7, 3);
/// assert_eq!(a.gen_normal(), b.gen_normal());
///
/// let mut buffer = vec![0.0; 16];
/// a.fill_normal(&mut buffer);
/// ```
pub struct PricerRng {
    inner: StdRng,
    seed: u64,
}

impl PricerRng {
    /// Creates a new RNG initialised with the given seed.
    #[inline]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Generator for one block of a run.
    ///
    /// The stream seed is a SplitMix64 mix of the run seed and the block
    /// index.
    #[inline]
    pub fn for_block(seed: u64, block_index: usize) -> Self {
        Self::from_seed(splitmix64(
            seed ^ (block_index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15),
        ))
    }

    /// Returns the seed used for initialisation.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generates a single uniform random value in [0, 1).
    #[inline]
    pub fn gen_uniform(&mut self) -> f64 {
        self.inner.gen()
    }

    /// Generates a single standard normal variate.
    #[inline]
    pub fn gen_normal(&mut self) -> f64 {
        StandardNormal.sample(&mut self.inner)
    }

    /// Fills the buffer with standard normal variates.
    #[inline]
    pub fn fill_normal(&mut self, buffer: &mut [f64]) {
        for value in buffer.iter_mut() {
            *value = StandardNormal.sample(&mut self.inner);
        }
    }

    /// Fills every lane with independent standard normal variates.
    pub fn fill_normal_lanes(&mut self, lanes: &mut [Lane]) {
        let mut scratch = [0.0; LANES];
        for lane in lanes.iter_mut() {
            self.fill_normal(&mut scratch);
            *lane = Lane::from(scratch);
        }
    }
}

#[inline]
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
