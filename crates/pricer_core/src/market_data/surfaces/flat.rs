//! Flat and ATM term-structure volatility surfaces.

use super::VolatilitySurface;
use crate::market_data::error::MarketDataError;
use crate::math::interpolators::LinearInterpolator;

/// Constant implied volatility for every strike and expiry.
///
/// ```
/// use pricer_core::market_data::surfaces::{VolatilitySurface, FlatVol};
///
/// let surface = FlatVol::new(0.25);
/// assert_eq!(surface.strike_vol(80.0, 2.0, 100.0).unwrap(), 0.25);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlatVol {
    sigma: f64,
}

impl FlatVol {
    /// Construct a flat volatility surface.
    #[inline]
    pub fn new(sigma: f64) -> Self {
        Self { sigma }
    }

    /// Return the constant volatility.
    #[inline]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl VolatilitySurface for FlatVol {
    #[inline]
    fn atm_vol(&self, t: f64) -> Result<f64, MarketDataError> {
        if !t.is_finite() {
            return Err(MarketDataError::InvalidExpiry { expiry: t });
        }
        Ok(self.sigma)
    }

    #[inline]
    fn strike_vol(&self, strike: f64, t: f64, _forward: f64) -> Result<f64, MarketDataError> {
        if strike <= 0.0 {
            return Err(MarketDataError::InvalidStrike { strike });
        }
        self.atm_vol(t)
    }
}

/// ATM volatility term structure.
///
/// Total variance `σ²t` is interpolated linearly between pillars; the
/// volatility is flat before the first and after the last pillar. No smile.
#[derive(Debug, Clone)]
pub struct AtmTermVol {
    variance: LinearInterpolator<f64>,
    first: (f64, f64),
    last: (f64, f64),
}

impl AtmTermVol {
    /// Build from (expiry, ATM vol) pillars. Expiries must be positive.
    ///
    /// # Errors
    /// Non-positive expiries, fewer than two pillars or repeated expiries.
    pub fn new(expiries: &[f64], vols: &[f64]) -> Result<Self, MarketDataError> {
        if let Some(&bad) = expiries.iter().find(|&&t| t <= 0.0) {
            return Err(MarketDataError::InvalidExpiry { expiry: bad });
        }
        let variances: Vec<f64> = expiries
            .iter()
            .zip(vols)
            .map(|(&t, &v)| v * v * t)
            .collect();
        let variance = LinearInterpolator::new(expiries, &variances)?;
        let n = variance.len();
        let xs = variance.xs();
        let ys = variance.ys();
        let first = (xs[0], (ys[0] / xs[0]).sqrt());
        let last = (xs[n - 1], (ys[n - 1] / xs[n - 1]).sqrt());
        Ok(Self {
            variance,
            first,
            last,
        })
    }
}

impl VolatilitySurface for AtmTermVol {
    fn atm_vol(&self, t: f64) -> Result<f64, MarketDataError> {
        if !t.is_finite() {
            return Err(MarketDataError::InvalidExpiry { expiry: t });
        }
        if t <= self.first.0 {
            return Ok(self.first.1);
        }
        if t >= self.last.0 {
            return Ok(self.last.1);
        }
        Ok((self.variance.interpolate_flat(t).max(0.0) / t).sqrt())
    }
}
