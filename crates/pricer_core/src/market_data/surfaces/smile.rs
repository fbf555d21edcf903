//! Strike smile surface on log-moneyness.

use super::VolatilitySurface;
use crate::market_data::error::MarketDataError;
use crate::math::interpolators::LinearInterpolator;

/// One expiry slice: implied vol against log-moneyness `ln(K/F)`.
#[derive(Debug, Clone)]
struct SmileSlice {
    expiry: f64,
    vols: LinearInterpolator<f64>,
}

/// Implied volatility surface quoted per expiry on log-moneyness.
///
/// Within a slice volatility is linear in `ln(K/F)` and flat beyond the
/// wings. Across expiries total variance is interpolated linearly at fixed
/// moneyness; volatility is flat before the first and after the last slice.
///
/// ```
/// use pricer_core::market_data::surfaces::{StrikeSmileSurface, VolatilitySurface};
///
/// let surface = StrikeSmileSurface::new(vec![
///     (1.0, vec![(-0.2, 0.25), (0.0, 0.20), (0.2, 0.18)]),
/// ]).unwrap();
/// assert!((surface.atm_vol(1.0).unwrap() - 0.20).abs() < 1e-12);
/// assert!(surface.strike_vol(80.0, 1.0, 100.0).unwrap() > 0.20);
/// ```
#[derive(Debug, Clone)]
pub struct StrikeSmileSurface {
    slices: Vec<SmileSlice>,
}

impl StrikeSmileSurface {
    /// Build from `(expiry, [(log_moneyness, vol)])` slices.
    ///
    /// # Errors
    /// No slices, a non-positive expiry, or a slice with fewer than two quotes.
    pub fn new(slices: Vec<(f64, Vec<(f64, f64)>)>) -> Result<Self, MarketDataError> {
        if slices.is_empty() {
            return Err(MarketDataError::InsufficientData { got: 0, need: 1 });
        }
        let mut built = Vec::with_capacity(slices.len());
        for (expiry, quotes) in slices {
            if expiry <= 0.0 {
                return Err(MarketDataError::InvalidExpiry { expiry });
            }
            let (ys, vols): (Vec<f64>, Vec<f64>) = quotes.into_iter().unzip();
            built.push(SmileSlice {
                expiry,
                vols: LinearInterpolator::new(&ys, &vols)?,
            });
        }
        built.sort_by(|a, b| a.expiry.total_cmp(&b.expiry));
        Ok(Self { slices: built })
    }

    fn moneyness_vol(&self, y: f64, t: f64) -> f64 {
        let first = &self.slices[0];
        let last = &self.slices[self.slices.len() - 1];
        if t <= first.expiry {
            return first.vols.interpolate_flat(y);
        }
        if t >= last.expiry {
            return last.vols.interpolate_flat(y);
        }
        let hi = self.slices.partition_point(|s| s.expiry <= t);
        let (a, b) = (&self.slices[hi - 1], &self.slices[hi]);
        let va = a.vols.interpolate_flat(y);
        let vb = b.vols.interpolate_flat(y);
        let wa = va * va * a.expiry;
        let wb = vb * vb * b.expiry;
        let w = wa + (wb - wa) * (t - a.expiry) / (b.expiry - a.expiry);
        (w.max(0.0) / t).sqrt()
    }
}

impl VolatilitySurface for StrikeSmileSurface {
    fn atm_vol(&self, t: f64) -> Result<f64, MarketDataError> {
        if !t.is_finite() {
            return Err(MarketDataError::InvalidExpiry { expiry: t });
        }
        Ok(self.moneyness_vol(0.0, t))
    }

    fn strike_vol(&self, strike: f64, t: f64, forward: f64) -> Result<f64, MarketDataError> {
        if strike <= 0.0 {
            return Err(MarketDataError::InvalidStrike { strike });
        }
        if !t.is_finite() {
            return Err(MarketDataError::InvalidExpiry { expiry: t });
        }
        Ok(self.moneyness_vol((strike / forward).ln(), t))
    }

    /// The quoted moneyness nodes of the nearest slice, as strikes.
    fn smile(&self, t: f64, forward: f64) -> Result<Vec<(f64, f64)>, MarketDataError> {
        let idx = self
            .slices
            .partition_point(|s| s.expiry < t)
            .min(self.slices.len() - 1);
        self.slices[idx]
            .vols
            .xs()
            .iter()
            .map(|&y| {
                let k = forward * y.exp();
                Ok((k, self.strike_vol(k, t, forward)?))
            })
            .collect()
    }
}
