//! Dupire local volatility slices on the simulation grid.
//!
//! For every simulated step the surface's smile at the step end is turned
//! into a local volatility curve over log-moneyness `y = ln(K/F)`:
//!
//! ```text
//! σ²_loc = ∂w/∂T / (1 − (y/w)·w_y + ¼·(−¼ − 1/w + y²/w²)·w_y² + ½·w_yy)
//! ```
//!
//! with `w` the total implied variance. `∂w/∂T` is the forward variance
//! between the two grid times at fixed moneyness, floored at zero.

use super::calibration::ForwardCalibration;
use crate::error::SimulationResult;
use crate::grid::SimulationContext;
use pricer_core::market_data::VolatilitySurface;
use pricer_core::math::interpolators::LinearInterpolator;

/// Smallest admissible Dupire denominator.
const MIN_DENOMINATOR: f64 = 1e-4;

/// Per-step local volatility interpolators.
#[derive(Debug, Clone)]
pub struct LocalVolTable {
    slices: Vec<Option<LinearInterpolator<f64>>>,
}

impl LocalVolTable {
    /// Builds one slice per simulated step of the frozen grid.
    pub fn build(
        ctx: &SimulationContext,
        calibration: &ForwardCalibration,
        surface: &dyn VolatilitySurface,
    ) -> SimulationResult<Self> {
        let grid = ctx.grid();
        let n = grid.len();
        let times = grid.times();
        let dt = grid.dt();
        let f = &calibration.forwards;

        let mut slices = vec![None; n];
        for i in (calibration.start + 1)..n {
            if dt[i] <= 0.0 {
                continue;
            }
            let t2 = times[i];
            let t1 = times[i - 1].max(0.0);

            let mut ys: Vec<f64> = surface
                .smile(t2, f[i])?
                .iter()
                .filter(|(k, _)| *k > 0.0)
                .map(|(k, _)| (k / f[i]).ln())
                .collect();
            ys.sort_by(f64::total_cmp);
            ys.dedup_by(|a, b| (*a - *b).abs() < 1e-10);
            if ys.len() < 2 {
                continue;
            }

            let mut w2 = Vec::with_capacity(ys.len());
            let mut dwdt = Vec::with_capacity(ys.len());
            for &y in &ys {
                let v2 = surface.strike_vol(f[i] * y.exp(), t2, f[i])?;
                let total2 = v2 * v2 * t2;
                let total1 = if t1 > 0.0 {
                    let v1 = surface.strike_vol(f[i - 1] * y.exp(), t1, f[i - 1])?;
                    v1 * v1 * t1
                } else {
                    0.0
                };
                w2.push(total2);
                dwdt.push((total2 - total1).max(0.0) / dt[i]);
            }

            let sigmas: Vec<f64> = (0..ys.len())
                .map(|j| {
                    let (w_y, w_yy) = derivatives(&ys, &w2, j);
                    let den = dupire_denominator(ys[j], w2[j], w_y, w_yy);
                    (dwdt[j] / den).max(0.0).sqrt()
                })
                .collect();

            slices[i] = Some(LinearInterpolator::new(&ys, &sigmas)?);
        }

        Ok(Self { slices })
    }

    /// Local volatility for step `step` at log-moneyness `y`, or `fallback`
    /// where the smile was too thin to build a slice.
    #[inline]
    pub fn vol(&self, step: usize, y: f64, fallback: f64) -> f64 {
        match &self.slices[step] {
            Some(slice) => slice.interpolate_flat(y),
            None => fallback,
        }
    }
}

fn dupire_denominator(y: f64, w: f64, w_y: f64, w_yy: f64) -> f64 {
    if w <= 0.0 {
        return 1.0;
    }
    let den = 1.0 - y / w * w_y + 0.25 * (-0.25 - 1.0 / w + y * y / (w * w)) * w_y * w_y
        + 0.5 * w_yy;
    den.max(MIN_DENOMINATOR)
}

/// First and second derivative of `w` at node `j` on a non-uniform grid.
fn derivatives(ys: &[f64], w: &[f64], j: usize) -> (f64, f64) {
    let n = ys.len();
    if n == 2 {
        return ((w[1] - w[0]) / (ys[1] - ys[0]), 0.0);
    }
    // Wings reuse the nearest interior stencil.
    let c = j.clamp(1, n - 2);
    let h1 = ys[c] - ys[c - 1];
    let h2 = ys[c + 1] - ys[c];
    let denom = h1 * h2 * (h1 + h2);
    let w_y = (h1 * h1 * w[c + 1] - h2 * h2 * w[c - 1] + (h2 * h2 - h1 * h1) * w[c]) / denom;
    let w_yy = 2.0 * (h1 * w[c + 1] - (h1 + h2) * w[c] + h2 * w[c - 1]) / denom;
    (w_y, w_yy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pricer_core::market_data::{FlatForward, FlatVol, PastFixings, StrikeSmileSurface};
    use pricer_core::types::{Date, DayCountConvention};

    fn setup(surface: &dyn VolatilitySurface) -> (SimulationContext, ForwardCalibration) {
        let today = Date::from_ymd(2025, 1, 1).unwrap();
        let mut ctx = SimulationContext::new(today, DayCountConvention::ActualActual365);
        ctx.add_date_range(today, today.add_days(365), 73).unwrap();
        ctx.freeze();
        let cal = ForwardCalibration::build(
            &ctx,
            "X",
            &FlatForward::new(100.0),
            surface,
            None,
            &PastFixings::new(),
        )
        .unwrap();
        (ctx, cal)
    }

    #[test]
    fn test_flat_surface_gives_flat_local_vol() {
        let surface = FlatVol::new(0.25);
        let (ctx, cal) = setup(&surface);
        let table = LocalVolTable::build(&ctx, &cal, &surface).unwrap();
        for step in 1..ctx.n_steps() {
            for y in [-0.5, 0.0, 0.3] {
                assert_relative_eq!(table.vol(step, y, 0.0), 0.25, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_skew_is_preserved() {
        let surface = StrikeSmileSurface::new(vec![(
            1.0,
            vec![(-0.4, 0.32), (-0.2, 0.27), (0.0, 0.23), (0.2, 0.20), (0.4, 0.18)],
        )])
        .unwrap();
        let (ctx, cal) = setup(&surface);
        let table = LocalVolTable::build(&ctx, &cal, &surface).unwrap();
        let last = ctx.n_steps() - 1;
        assert!(table.vol(last, -0.3, 0.0) > table.vol(last, 0.3, 0.0));
    }

    #[test]
    fn test_derivatives_of_quadratic() {
        let ys = [-1.0, -0.25, 0.5, 2.0];
        let w: Vec<f64> = ys.iter().map(|y| 3.0 * y * y + y).collect();
        let (w_y, w_yy) = derivatives(&ys, &w, 2);
        assert_relative_eq!(w_y, 6.0 * 0.5 + 1.0, epsilon = 1e-12);
        assert_relative_eq!(w_yy, 6.0, epsilon = 1e-12);
    }
}
