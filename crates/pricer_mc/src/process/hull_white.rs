//! Hull–White commodity forward with Samuelson vol decay.
//!
//! The factor follows the forward for a single delivery date `T`, whose
//! instantaneous volatility decays away from delivery:
//! `σ(t) = σ·e^{−a(T−t)}`. The scale is solved in closed form so that the
//! integrated variance to delivery equals the Black variance there,
//!
//! ```text
//! σ = σ_B · sqrt(2aT / (1 − e^{−2aT}))
//! ```
//!
//! which is `σ_B` itself as `a → 0`. Past delivery the volatility stays at
//! `σ`. Each step is lognormal with the exact variance of the interval and a
//! drift reproducing the forward curve.

use super::calibration::{samuelson_scale, samuelson_variance, ForwardCalibration};
use super::inputs::{MarketInputs, Schedule};
use super::not_finished;
use crate::block::PathBlock;
use crate::error::{SimulationError, SimulationResult};
use crate::grid::SimulationContext;
use crate::lanes::splat;
use pricer_core::types::Date;
use tracing::debug;

/// Hull–White commodity generator.
#[derive(Debug, Clone)]
pub struct HullWhiteProcess {
    name: String,
    market: MarketInputs,
    schedule: Schedule,
    mean_reversion: f64,
    delivery: Date,
    dim: usize,
    sigma: f64,
    calibration: Option<ForwardCalibration>,
    log_drift: Vec<f64>,
    step_std: Vec<f64>,
    complete: bool,
}

impl HullWhiteProcess {
    /// Generator for `name` delivering on `delivery` with decay `mean_reversion`.
    pub fn new(
        name: &str,
        market: MarketInputs,
        schedule: Schedule,
        mean_reversion: f64,
        delivery: Date,
    ) -> Self {
        Self {
            name: name.to_string(),
            market,
            schedule,
            mean_reversion,
            delivery,
            dim: 0,
            sigma: 0.0,
            calibration: None,
            log_drift: Vec::new(),
            step_std: Vec::new(),
            complete: false,
        }
    }

    /// Factor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once finished.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Solved vol scale.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Per-step standard deviation of the log increment.
    pub fn step_std(&self) -> &[f64] {
        &self.step_std
    }

    pub(crate) fn setup(&mut self, ctx: &mut SimulationContext) -> SimulationResult<()> {
        if self.mean_reversion.is_nan() || self.mean_reversion < 0.0 {
            return Err(SimulationError::InvalidConfig(format!(
                "mean reversion for {} must be non-negative, got {}",
                self.name, self.mean_reversion
            )));
        }
        ctx.add_dimension(&self.name)?;
        ctx.add_date(self.delivery)?;
        self.schedule.declare(ctx)
    }

    pub(crate) fn finish(&mut self, ctx: &SimulationContext) -> SimulationResult<()> {
        if self.complete {
            return Ok(());
        }
        self.dim = ctx.dimension(&self.name)?;
        let cal = self.market.calibrate(ctx, &self.name)?;
        let grid = ctx.grid();
        let n = grid.len();

        let expiry = ctx.year_fraction(self.delivery);
        let black = self.market.vol.atm_vol(expiry.max(0.0))?;
        self.sigma = samuelson_scale(black, self.mean_reversion, expiry);

        self.log_drift = vec![0.0; n];
        self.step_std = vec![0.0; n];
        for i in (cal.start + 1)..n {
            let t1 = grid.time(i - 1).max(0.0);
            let variance =
                samuelson_variance(self.sigma, self.mean_reversion, expiry, t1, grid.time(i));
            self.log_drift[i] = cal.drift[i] * grid.dt()[i] - 0.5 * variance;
            self.step_std[i] = variance.sqrt();
        }

        debug!(
            factor = %self.name,
            sigma = self.sigma,
            black,
            a = self.mean_reversion,
            "hull-white process finished"
        );
        self.calibration = Some(cal);
        self.complete = true;
        Ok(())
    }

    pub(crate) fn process(&self, block: &mut PathBlock) -> SimulationResult<()> {
        let cal = self
            .calibration
            .as_ref()
            .ok_or_else(|| not_finished(&self.name))?;
        let (slab, view) = block.split_factor_mut(self.dim);
        let n_steps = view.n_steps();
        for (batch, path) in slab.chunks_mut(n_steps).enumerate() {
            let z = view.draws(self.dim, batch);
            for (value, &level) in path.iter_mut().zip(&cal.history) {
                *value = splat(level);
            }
            for i in (cal.start + 1)..n_steps {
                let exponent = splat(self.log_drift[i]) + splat(self.step_std[i]) * z[i];
                path[i] = path[i - 1] * exponent.exp();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pricer_core::market_data::{FlatForward, FlatVol};
    use pricer_core::types::DayCountConvention;
    use std::sync::Arc;

    fn finished(a: f64) -> (HullWhiteProcess, SimulationContext) {
        let today = Date::from_ymd(2025, 1, 1).unwrap();
        let delivery = today.add_days(365);
        let inputs = MarketInputs::new(Arc::new(FlatForward::new(3.0)), Arc::new(FlatVol::new(0.4)));
        let schedule = Schedule::new().with_date_range(today, delivery, 30);
        let mut process = HullWhiteProcess::new("NG", inputs, schedule, a, delivery);
        let mut ctx = SimulationContext::new(today, DayCountConvention::ActualActual365);
        process.setup(&mut ctx).unwrap();
        ctx.freeze();
        process.finish(&ctx).unwrap();
        (process, ctx)
    }

    #[test]
    fn test_total_variance_matches_black_at_delivery() {
        let (process, _) = finished(2.5);
        let total: f64 = process.step_std().iter().map(|s| s * s).sum();
        assert_relative_eq!(total, 0.16, epsilon = 1e-12);
        assert!(process.sigma() > 0.4);
    }

    #[test]
    fn test_zero_decay_recovers_black() {
        let (process, ctx) = finished(0.0);
        assert_relative_eq!(process.sigma(), 0.4, epsilon = 1e-12);
        let sqrt_dt = ctx.grid().sqrt_dt();
        for (s, sq) in process.step_std().iter().zip(sqrt_dt) {
            assert_relative_eq!(*s, 0.4 * sq, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_variance_concentrates_near_delivery() {
        let (process, _) = finished(3.0);
        let std = process.step_std();
        assert!(std[std.len() - 2] > std[1]);
    }

    #[test]
    fn test_negative_mean_reversion_is_rejected() {
        let today = Date::from_ymd(2025, 1, 1).unwrap();
        let inputs = MarketInputs::new(Arc::new(FlatForward::new(3.0)), Arc::new(FlatVol::new(0.4)));
        let mut process = HullWhiteProcess::new("NG", inputs, Schedule::new(), -1.0, today);
        let mut ctx = SimulationContext::new(today, DayCountConvention::ActualActual365);
        assert!(process.setup(&mut ctx).is_err());
    }
}
