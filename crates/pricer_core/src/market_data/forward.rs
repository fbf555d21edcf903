//! Deterministic forward price curves.
//!
//! A forward curve maps a year fraction from the valuation date to the
//! forward price for delivery at that time. Generators calibrate their drift
//! so that the simulated mean reproduces this curve at every grid step.

use super::error::MarketDataError;
use crate::math::interpolators::LinearInterpolator;

/// Forward price as a function of time.
///
/// Any `Fn(f64) -> f64` closure is a forward curve, which keeps test set-ups
/// and ad-hoc curves short.
///
/// ```
/// use pricer_core::market_data::ForwardCurve;
///
/// let contango = |t: f64| 100.0 * (0.03 * t).exp();
/// assert!((contango.forward(1.0).unwrap() - 103.0454).abs() < 1e-4);
/// ```
pub trait ForwardCurve: Send + Sync {
    /// Forward price for time `t` (year fraction).
    ///
    /// # Errors
    /// Implementations fail when no forward is available for `t`.
    fn forward(&self, t: f64) -> Result<f64, MarketDataError>;
}

impl<F> ForwardCurve for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    #[inline]
    fn forward(&self, t: f64) -> Result<f64, MarketDataError> {
        Ok(self(t))
    }
}

/// Constant forward curve.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlatForward {
    level: f64,
}

impl FlatForward {
    /// Forward curve equal to `level` at every time.
    pub fn new(level: f64) -> Self {
        Self { level }
    }

    /// The constant level.
    #[inline]
    pub fn level(&self) -> f64 {
        self.level
    }
}

impl ForwardCurve for FlatForward {
    #[inline]
    fn forward(&self, t: f64) -> Result<f64, MarketDataError> {
        if !t.is_finite() {
            return Err(MarketDataError::InvalidMaturity { t });
        }
        Ok(self.level)
    }
}

/// Pillar forward curve with linear interpolation in time.
///
/// Times before the first pillar take the first pillar's forward. Times
/// beyond the last pillar are an error: the curve does not extend the
/// horizon it was built for.
#[derive(Debug, Clone)]
pub struct InterpolatedForward {
    interp: LinearInterpolator<f64>,
}

impl InterpolatedForward {
    /// Build from (time, forward) pillars.
    ///
    /// # Errors
    /// Fewer than two pillars, mismatched lengths or repeated times.
    pub fn new(times: &[f64], forwards: &[f64]) -> Result<Self, MarketDataError> {
        Ok(Self {
            interp: LinearInterpolator::new(times, forwards)?,
        })
    }

    /// Last pillar time.
    pub fn horizon(&self) -> f64 {
        self.interp.xs()[self.interp.len() - 1]
    }
}

impl ForwardCurve for InterpolatedForward {
    fn forward(&self, t: f64) -> Result<f64, MarketDataError> {
        let max = self.horizon();
        if !t.is_finite() || t > max + 1e-12 {
            return Err(MarketDataError::OutOfBounds {
                x: t,
                min: f64::NEG_INFINITY,
                max,
            });
        }
        Ok(self.interp.interpolate_flat(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_flat_forward() {
        let curve = FlatForward::new(75.0);
        assert_eq!(curve.forward(0.0).unwrap(), 75.0);
        assert_eq!(curve.forward(-0.5).unwrap(), 75.0);
        assert!(curve.forward(f64::NAN).is_err());
    }

    #[test]
    fn test_interpolated_forward() {
        let curve = InterpolatedForward::new(&[0.0, 1.0, 2.0], &[100.0, 102.0, 101.0]).unwrap();
        assert_relative_eq!(curve.forward(0.5).unwrap(), 101.0, epsilon = 1e-12);
        assert_relative_eq!(curve.forward(-0.1).unwrap(), 100.0, epsilon = 1e-12);
        assert!(matches!(
            curve.forward(2.5),
            Err(MarketDataError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_closure_forward() {
        let curve = |t: f64| 50.0 + t;
        assert_eq!(curve.forward(2.0).unwrap(), 52.0);
    }
}
