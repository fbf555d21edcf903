//! Vectorised path storage for one block of paths.
//!
//! Values and draws share the layout `[factor][batch][step]`, where a batch
//! is one [`Lane`] of [`LANES`] paths. One factor's paths for all batches are
//! therefore contiguous, which lets a process borrow a single factor mutably
//! while reading every other factor through a [`BlockView`].

use crate::lanes::{Lane, LANES};

/// A rectangular block of simulated paths.
///
/// # Examples
///
/// ```
/// use pricer_mc::block::PathBlock;
/// use pricer_mc::lanes::Lane;
///
/// let mut block = PathBlock::new(8, 3, 2, 0);
/// assert_eq!(block.n_batches(), 2);
///
/// let (slab, view) = block.split_factor_mut(1);
/// for (dst, src) in slab.iter_mut().zip(view.draws(0, 0)) {
///     *dst = *src + Lane::splat(1.0);
/// }
/// assert_eq!(block.lane_value(1, 0, 0), 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct PathBlock {
    values: Vec<Lane>,
    draws: Vec<Lane>,
    n_paths: usize,
    n_batches: usize,
    n_steps: usize,
    n_factors: usize,
    global_path_index: usize,
}

impl PathBlock {
    /// Zeroed block of `n_paths` paths.
    ///
    /// # Panics
    ///
    /// Panics if `n_paths` is not a multiple of [`LANES`].
    pub fn new(n_paths: usize, n_steps: usize, n_factors: usize, global_path_index: usize) -> Self {
        assert!(
            n_paths % LANES == 0,
            "block path count {} is not a multiple of {}",
            n_paths,
            LANES
        );
        let n_batches = n_paths / LANES;
        let len = n_factors * n_batches * n_steps;
        Self {
            values: vec![Lane::splat(0.0); len],
            draws: vec![Lane::splat(0.0); len],
            n_paths,
            n_batches,
            n_steps,
            n_factors,
            global_path_index,
        }
    }

    /// Number of paths in the block.
    #[inline]
    pub fn n_paths(&self) -> usize {
        self.n_paths
    }

    /// Number of lanes per factor and step.
    #[inline]
    pub fn n_batches(&self) -> usize {
        self.n_batches
    }

    /// Number of time steps.
    #[inline]
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Number of factors.
    #[inline]
    pub fn n_factors(&self) -> usize {
        self.n_factors
    }

    /// Offset of this block's first path in the full population.
    #[inline]
    pub fn global_path_index(&self) -> usize {
        self.global_path_index
    }

    #[inline]
    fn offset(&self, factor: usize, batch: usize) -> usize {
        (factor * self.n_batches + batch) * self.n_steps
    }

    #[inline]
    fn factor_len(&self) -> usize {
        self.n_batches * self.n_steps
    }

    /// Values of `factor` for lane batch `batch`, one lane per step.
    #[inline]
    pub fn path(&self, factor: usize, batch: usize) -> &[Lane] {
        let o = self.offset(factor, batch);
        &self.values[o..o + self.n_steps]
    }

    /// Mutable values of `factor` for `batch`.
    #[inline]
    pub fn path_mut(&mut self, factor: usize, batch: usize) -> &mut [Lane] {
        let o = self.offset(factor, batch);
        &mut self.values[o..o + self.n_steps]
    }

    /// Draws of `factor` for `batch`.
    #[inline]
    pub fn draws(&self, factor: usize, batch: usize) -> &[Lane] {
        let o = self.offset(factor, batch);
        &self.draws[o..o + self.n_steps]
    }

    /// Mutable draws of `factor` for `batch`.
    #[inline]
    pub fn draws_mut(&mut self, factor: usize, batch: usize) -> &mut [Lane] {
        let o = self.offset(factor, batch);
        &mut self.draws[o..o + self.n_steps]
    }

    /// Every draw in the block, for bulk filling.
    #[inline]
    pub fn all_draws_mut(&mut self) -> &mut [Lane] {
        &mut self.draws
    }

    /// Single path value by in-block path number.
    #[inline]
    pub fn lane_value(&self, factor: usize, path: usize, step: usize) -> f64 {
        self.path(factor, path / LANES)[step].to_array()[path % LANES]
    }

    /// Borrows `factor`'s values mutably (all batches, `[batch][step]`) and
    /// everything else read-only.
    ///
    /// The slab splits into per-batch paths with `chunks_mut(n_steps)`.
    pub fn split_factor_mut(&mut self, factor: usize) -> (&mut [Lane], BlockView<'_>) {
        let len = self.factor_len();
        let (before, rest) = self.values.split_at_mut(factor * len);
        let (slab, after) = rest.split_at_mut(len);
        let view = BlockView {
            before,
            after,
            draws: &self.draws,
            factor,
            n_batches: self.n_batches,
            n_steps: self.n_steps,
        };
        (slab, view)
    }
}

/// Read-only view of a block with one factor's values lent out.
#[derive(Debug, Clone, Copy)]
pub struct BlockView<'a> {
    before: &'a [Lane],
    after: &'a [Lane],
    draws: &'a [Lane],
    factor: usize,
    n_batches: usize,
    n_steps: usize,
}

impl<'a> BlockView<'a> {
    /// Values of `factor` for `batch`.
    ///
    /// # Panics
    ///
    /// Panics if `factor` is the factor borrowed mutably.
    #[inline]
    pub fn path(&self, factor: usize, batch: usize) -> &'a [Lane] {
        assert!(
            factor != self.factor,
            "factor {} is borrowed mutably",
            factor
        );
        let len = self.n_batches * self.n_steps;
        let o = batch * self.n_steps;
        if factor < self.factor {
            let base = factor * len + o;
            &self.before[base..base + self.n_steps]
        } else {
            let base = (factor - self.factor - 1) * len + o;
            &self.after[base..base + self.n_steps]
        }
    }

    /// Draws of `factor` for `batch`; every factor is readable.
    #[inline]
    pub fn draws(&self, factor: usize, batch: usize) -> &'a [Lane] {
        let o = (factor * self.n_batches + batch) * self.n_steps;
        &self.draws[o..o + self.n_steps]
    }

    /// Number of time steps.
    #[inline]
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Number of lane batches.
    #[inline]
    pub fn n_batches(&self) -> usize {
        self.n_batches
    }
}
