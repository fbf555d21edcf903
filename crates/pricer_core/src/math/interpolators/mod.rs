//! Interpolation methods used by market-data implementations and the
//! local-volatility slices of the path engine.
//!
//! All 1D interpolators implement the [`Interpolator`] trait:
//! - `interpolate(x: T) -> Result<T, InterpolationError>`: value inside the domain
//! - `domain() -> (T, T)`: valid interpolation range
//!
//! ## Example
//!
//! ```
//! use pricer_core::math::interpolators::{Interpolator, LinearInterpolator};
//!
//! let interp = LinearInterpolator::<f64>::new(&[0.0, 1.0, 2.0], &[0.0, 1.0, 4.0]).unwrap();
//! assert!((interp.interpolate(1.5).unwrap() - 2.5).abs() < 1e-10);
//! assert_eq!(interp.interpolate_flat(10.0), 4.0);
//! ```

mod linear;

pub use linear::LinearInterpolator;

use crate::types::InterpolationError;
use num_traits::Float;

/// One-dimensional interpolator over a sorted knot set.
pub trait Interpolator<T: Float> {
    /// Interpolated value at `x`.
    ///
    /// # Errors
    /// `InterpolationError::OutOfBounds` when `x` lies outside [`domain`](Self::domain).
    fn interpolate(&self, x: T) -> Result<T, InterpolationError>;

    /// Valid interpolation range `(x_min, x_max)`.
    fn domain(&self) -> (T, T);
}
