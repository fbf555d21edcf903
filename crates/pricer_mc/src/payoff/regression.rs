//! Linear continuation estimator.

use crate::error::{SimulationError, SimulationResult};
use crate::lanes::{splat, Lane};
use linreg::linear_regression;
use tracing::debug;

/// Pre-fitted `y ≈ slope·x + intercept`.
///
/// Fitted once on training paths before the parallel phase and immutable
/// afterwards.
///
/// ```
/// use pricer_mc::payoff::LinearEstimator;
///
/// let est = LinearEstimator::fit(&[1.0, 2.0, 3.0], &[3.0, 5.0, 7.0]).unwrap();
/// assert!((est.estimate(4.0) - 9.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinearEstimator {
    /// Slope.
    pub slope: f64,
    /// Intercept.
    pub intercept: f64,
}

impl LinearEstimator {
    /// Least-squares fit of `ys` on `xs`.
    ///
    /// A sample with no spread in `xs` fits a flat line at the mean of `ys`.
    ///
    /// # Errors
    /// `Regression` for mismatched or empty samples, or a failed fit.
    pub fn fit(xs: &[f64], ys: &[f64]) -> SimulationResult<Self> {
        if xs.len() != ys.len() || xs.is_empty() {
            return Err(SimulationError::Regression(format!(
                "sample sizes {} and {}",
                xs.len(),
                ys.len()
            )));
        }
        let n = xs.len() as f64;
        let mean_x = xs.iter().sum::<f64>() / n;
        let spread = xs.iter().map(|x| (x - mean_x).abs()).fold(0.0, f64::max);
        if spread <= 1e-12 * mean_x.abs().max(1.0) {
            let intercept = ys.iter().sum::<f64>() / n;
            debug!(samples = xs.len(), intercept, "degenerate regression sample, flat fit");
            return Ok(Self {
                slope: 0.0,
                intercept,
            });
        }

        let (slope, intercept): (f64, f64) = linear_regression(xs, ys)
            .map_err(|e| SimulationError::Regression(format!("{:?}", e)))?;
        debug!(samples = xs.len(), slope, intercept, "continuation regression fitted");
        Ok(Self { slope, intercept })
    }

    /// Estimate at `x`.
    #[inline]
    pub fn estimate(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Estimate lane by lane.
    #[inline]
    pub fn estimate_lane(&self, x: Lane) -> Lane {
        splat(self.slope) * x + splat(self.intercept)
    }
}
