//! Volatility surface trait definition.

use crate::market_data::error::MarketDataError;
use crate::math::distributions::norm_inv;

/// Call deltas used for the default smile grid.
const SMILE_DELTAS: [f64; 5] = [0.90, 0.75, 0.50, 0.25, 0.10];

/// Implied volatility surface consumed by the path generators.
///
/// # Contract
///
/// - `atm_vol(t)` is the at-the-money implied volatility for expiry `t`
/// - `forward_atm_vol(t1, t2)` is the forward-starting ATM volatility
///   between two expiries, derived from total variance and floored at zero
/// - `strike_vol(k, t, f)` is the implied volatility for an absolute strike
/// - `delta_vol(delta, t, f)` is the implied volatility for a call delta
/// - `smile(t, f)` is a (strike, vol) grid sufficient to build a
///   local-variance interpolator
///
/// Only `atm_vol` is required; the rest default to ATM-consistent
/// behaviour.
///
/// # Example
///
/// ```
/// use pricer_core::market_data::surfaces::{VolatilitySurface, FlatVol};
///
/// let surface = FlatVol::new(0.20);
/// assert_eq!(surface.atm_vol(1.0).unwrap(), 0.20);
/// assert!((surface.forward_atm_vol(1.0, 2.0).unwrap() - 0.20).abs() < 1e-12);
/// ```
pub trait VolatilitySurface: Send + Sync {
    /// ATM implied volatility for expiry `t`.
    fn atm_vol(&self, t: f64) -> Result<f64, MarketDataError>;

    /// Forward-starting ATM volatility between `t1` and `t2`.
    ///
    /// `sqrt(max(0, σ²(t2)·t2 − σ²(t1)·t1) / (t2 − t1))`. Returns `atm_vol(t2)`
    /// when the interval is empty.
    fn forward_atm_vol(&self, t1: f64, t2: f64) -> Result<f64, MarketDataError> {
        let t1 = t1.max(0.0);
        if t2 <= t1 {
            return self.atm_vol(t2.max(0.0));
        }
        let v2 = self.total_variance(t2)?;
        let v1 = self.total_variance(t1)?;
        Ok(((v2 - v1).max(0.0) / (t2 - t1)).sqrt())
    }

    /// ATM total variance `σ²(t)·t`; zero for `t <= 0`.
    fn total_variance(&self, t: f64) -> Result<f64, MarketDataError> {
        if t <= 0.0 {
            return Ok(0.0);
        }
        let vol = self.atm_vol(t)?;
        Ok(vol * vol * t)
    }

    /// Implied volatility for an absolute strike.
    fn strike_vol(&self, strike: f64, t: f64, forward: f64) -> Result<f64, MarketDataError> {
        let _ = (strike, forward);
        self.atm_vol(t)
    }

    /// Implied volatility for a call delta, solved by fixed-point iteration
    /// on `K = F·exp(−Φ⁻¹(Δ)·σ√t + σ²t/2)`.
    fn delta_vol(&self, delta: f64, t: f64, forward: f64) -> Result<f64, MarketDataError> {
        Ok(self.delta_strike(delta, t, forward)?.1)
    }

    /// Strike and volatility for a call delta.
    fn delta_strike(
        &self,
        delta: f64,
        t: f64,
        forward: f64,
    ) -> Result<(f64, f64), MarketDataError> {
        if t <= 0.0 {
            return Err(MarketDataError::InvalidExpiry { expiry: t });
        }
        let z = norm_inv(delta);
        let sqrt_t = t.sqrt();
        let mut vol = self.atm_vol(t)?;
        let mut strike = forward;
        for _ in 0..32 {
            strike = forward * (-z * vol * sqrt_t + 0.5 * vol * vol * t).exp();
            let next = self.strike_vol(strike, t, forward)?;
            if (next - vol).abs() < 1e-12 {
                vol = next;
                break;
            }
            vol = next;
        }
        Ok((strike, vol))
    }

    /// Smile grid at expiry `t`: strikes ascending with their volatilities.
    fn smile(&self, t: f64, forward: f64) -> Result<Vec<(f64, f64)>, MarketDataError> {
        SMILE_DELTAS
            .iter()
            .map(|&d| self.delta_strike(d, t, forward))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Skewed;

    impl VolatilitySurface for Skewed {
        fn atm_vol(&self, _t: f64) -> Result<f64, MarketDataError> {
            Ok(0.2)
        }

        fn strike_vol(&self, strike: f64, _t: f64, forward: f64) -> Result<f64, MarketDataError> {
            Ok(0.2 - 0.1 * (strike / forward).ln())
        }
    }

    struct TermStructure;

    impl VolatilitySurface for TermStructure {
        fn atm_vol(&self, t: f64) -> Result<f64, MarketDataError> {
            Ok(if t <= 1.0 { 0.3 } else { 0.2 })
        }
    }

    #[test]
    fn test_forward_vol_floors_inverted_variance() {
        let s = TermStructure;
        // 0.04 * 1.01 < 0.09 * 1.0 => inverted
        assert_eq!(s.forward_atm_vol(1.0, 1.01).unwrap(), 0.0);
    }

    #[test]
    fn test_delta_strike_consistency() {
        let s = Skewed;
        let (k, vol) = s.delta_strike(0.25, 1.0, 100.0).unwrap();
        assert!(k > 100.0);
        assert_relative_eq!(vol, s.strike_vol(k, 1.0, 100.0).unwrap(), epsilon = 1e-9);
    }

    #[test]
    fn test_default_smile_is_ascending() {
        let smile = Skewed.smile(0.5, 100.0).unwrap();
        assert_eq!(smile.len(), 5);
        assert!(smile.windows(2).all(|w| w[0].0 < w[1].0));
    }
}
