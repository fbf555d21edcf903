//! Forward-matching calibration shared by the generators.
//!
//! Per grid step this precomputes the (quanto-adjusted) forward, the drift
//! that reproduces it, the forward ATM variance rate and the fixed history
//! up to the valuation step.

use crate::error::{SimulationError, SimulationResult};
use crate::grid::SimulationContext;
use pricer_core::market_data::{ForwardCurve, PastFixings, VolatilitySurface};
use std::sync::Arc;
use tracing::warn;

/// Quanto (compo) drift adjustment.
///
/// The asset forward is replaced by `F(t)·exp(−ρ·σ_S(t)·σ_X(t)·t)` where
/// `σ_X` is read from the FX volatility surface.
#[derive(Clone)]
pub struct QuantoAdjustment {
    /// FX volatility surface.
    pub fx_vol: Arc<dyn VolatilitySurface>,
    /// Asset/FX correlation.
    pub correlation: f64,
}

impl std::fmt::Debug for QuantoAdjustment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuantoAdjustment")
            .field("correlation", &self.correlation)
            .finish_non_exhaustive()
    }
}

/// Per-step calibration arrays, sized to the frozen grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardCalibration {
    /// Calibrated forward per step (historic steps hold the valuation forward).
    pub forwards: Vec<f64>,
    /// Drift `ln(F̃_i / F̃_{i−1}) / dt_i`; zero up to the valuation step.
    pub drift: Vec<f64>,
    /// Forward ATM variance rate per step; zero up to the valuation step.
    pub variance: Vec<f64>,
    /// Square root of `variance`.
    pub vol: Vec<f64>,
    /// Fixed levels for steps `0..=start`.
    pub history: Vec<f64>,
    /// Valuation step.
    pub start: usize,
}

impl ForwardCalibration {
    /// Calibrates `name` on the frozen grid of `ctx`.
    ///
    /// # Errors
    ///
    /// - `MissingForward` when the curve cannot price a grid time
    /// - `MissingFixing` when a historic grid date has no fixing
    /// - `MarketData` when the surface cannot supply a volatility
    pub fn build(
        ctx: &SimulationContext,
        name: &str,
        forward: &dyn ForwardCurve,
        vol: &dyn VolatilitySurface,
        quanto: Option<&QuantoAdjustment>,
        fixings: &PastFixings,
    ) -> SimulationResult<Self> {
        let grid = ctx.grid();
        let n = grid.len();
        let start = grid.valuation_index();
        let times = grid.times();
        let dt = grid.dt();

        let mut forwards = vec![0.0; n];
        for i in start..n {
            let t = times[i];
            let f = forward
                .forward(t)
                .map_err(|source| SimulationError::MissingForward {
                    name: name.to_string(),
                    date: grid.date(i),
                    source,
                })?;
            forwards[i] = match quanto {
                Some(q) if t > 0.0 => {
                    let sigma_s = vol.atm_vol(t)?;
                    let sigma_x = q.fx_vol.atm_vol(t)?;
                    f * (-q.correlation * sigma_s * sigma_x * t).exp()
                }
                _ => f,
            };
        }
        for i in 0..start {
            forwards[i] = forwards[start];
        }

        let mut history = Vec::with_capacity(start + 1);
        for i in 0..start {
            let date = grid.date(i);
            let fixing = fixings
                .get(&date)
                .copied()
                .ok_or_else(|| SimulationError::MissingFixing {
                    name: name.to_string(),
                    date,
                })?;
            history.push(fixing);
        }
        history.push(
            fixings
                .get(&ctx.valuation_date())
                .copied()
                .unwrap_or(forwards[start]),
        );

        let mut drift = vec![0.0; n];
        let mut variance = vec![0.0; n];
        let mut previous_total = vol.total_variance(times[start].max(0.0))?;
        for i in (start + 1)..n {
            let total = vol.total_variance(times[i])?;
            if dt[i] <= 0.0 {
                previous_total = previous_total.max(total);
                continue;
            }
            drift[i] = (forwards[i] / forwards[i - 1]).ln() / dt[i];
            let increment = total - previous_total;
            if increment < -1e-14 {
                warn!(
                    factor = name,
                    date = %grid.date(i),
                    increment,
                    "forward variance inversion floored at zero"
                );
            }
            variance[i] = increment.max(0.0) / dt[i];
            previous_total = total;
        }
        let vol = variance.iter().map(|v| v.sqrt()).collect();

        Ok(Self {
            forwards,
            drift,
            variance,
            vol,
            history,
            start,
        })
    }

    /// Number of steps.
    #[inline]
    pub fn len(&self) -> usize {
        self.forwards.len()
    }

    /// True for an empty grid.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.forwards.is_empty()
    }

    /// Growth factor `F̃_i / F̃_{i−1}` (one up to the valuation step).
    #[inline]
    pub fn growth(&self, i: usize, dt: f64) -> f64 {
        (self.drift[i] * dt).exp()
    }
}

/// `∫₀ᵗ e^{−k·u} du`, tending to `t` as `k → 0`.
#[inline]
pub(crate) fn decay_integral(k: f64, t: f64) -> f64 {
    if (k * t).abs() < 1e-12 {
        t
    } else {
        -(-k * t).exp_m1() / k
    }
}

/// Vol scale whose Samuelson-decayed variance over `[0, expiry]` equals
/// `black_vol² · expiry`: `σ = σ_B·sqrt(2b·T / (1 − e^{−2bT}))`.
#[inline]
pub(crate) fn samuelson_scale(black_vol: f64, decay: f64, expiry: f64) -> f64 {
    if expiry <= 0.0 {
        return black_vol;
    }
    black_vol * (expiry / decay_integral(2.0 * decay, expiry)).sqrt()
}

/// `σ²∫ e^{−2b·max(T−u, 0)} du` over `[t1, t2]`.
///
/// Past `expiry` the decay factor stays at one.
pub(crate) fn samuelson_variance(sigma: f64, decay: f64, expiry: f64, t1: f64, t2: f64) -> f64 {
    if t2 <= t1 {
        return 0.0;
    }
    let split = expiry.clamp(t1, t2);
    let before = if split > t1 {
        // ∫_{t1}^{split} e^{−2b(T−u)} du = e^{−2b(T−split)}·I(2b, split−t1)
        (-2.0 * decay * (expiry - split)).exp() * decay_integral(2.0 * decay, split - t1)
    } else {
        0.0
    };
    sigma * sigma * (before + (t2 - split))
}
