//! Heston stochastic volatility with full-truncation Euler.
//!
//! ```text
//! v_i = v_{i−1} + κ(θ − v⁺)Δt + ξ·sqrt(v⁺Δt)·z_v
//! S_i = S_{i−1} · (F̃_i / F̃_{i−1}) · exp(−½v⁺Δt + sqrt(v⁺Δt)·(ρ z_v + sqrt(1 − ρ²) z_s))
//! ```
//!
//! with `v⁺ = max(v_{i−1}, 0)`. The spot step is a martingale correction of
//! the known `v⁺`, so the forward curve is matched at every date. Initial
//! variance and the long-run level come from the surface's ATM vol at a short
//! and a long expiry.

use super::calibration::ForwardCalibration;
use super::inputs::{MarketInputs, Schedule};
use super::not_finished;
use crate::block::PathBlock;
use crate::error::{SimulationError, SimulationResult};
use crate::grid::SimulationContext;
use crate::lanes::{splat, Lane};
use tracing::debug;

/// Heston dynamics parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HestonParams {
    /// Mean reversion speed of the variance.
    pub kappa: f64,
    /// Volatility of variance.
    pub vol_of_vol: f64,
    /// Spot/variance correlation.
    pub rho: f64,
    /// Expiry whose ATM vol sets the initial variance.
    pub short_expiry: f64,
    /// Expiry whose ATM vol sets the long-run variance.
    pub long_expiry: f64,
}

impl Default for HestonParams {
    fn default() -> Self {
        Self {
            kappa: 1.5,
            vol_of_vol: 0.3,
            rho: -0.7,
            short_expiry: 1.0 / 12.0,
            long_expiry: 5.0,
        }
    }
}

/// Heston generator writing `Name` and `Name~var`.
#[derive(Debug, Clone)]
pub struct HestonProcess {
    name: String,
    variance_name: String,
    market: MarketInputs,
    schedule: Schedule,
    params: HestonParams,
    spot_dim: usize,
    var_dim: usize,
    v0: f64,
    theta: f64,
    calibration: Option<ForwardCalibration>,
    log_growth: Vec<f64>,
    dt: Vec<f64>,
    sqrt_dt: Vec<f64>,
    complete: bool,
}

impl HestonProcess {
    /// Generator for `name`.
    pub fn new(name: &str, market: MarketInputs, schedule: Schedule, params: HestonParams) -> Self {
        Self {
            name: name.to_string(),
            variance_name: format!("{}~var", name),
            market,
            schedule,
            params,
            spot_dim: 0,
            var_dim: 0,
            v0: 0.0,
            theta: 0.0,
            calibration: None,
            log_growth: Vec::new(),
            dt: Vec::new(),
            sqrt_dt: Vec::new(),
            complete: false,
        }
    }

    /// Factor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the variance factor.
    pub fn variance_name(&self) -> &str {
        &self.variance_name
    }

    /// True once finished.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Calibrated `(v0, θ)`.
    pub fn variance_levels(&self) -> (f64, f64) {
        (self.v0, self.theta)
    }

    /// Calibration arrays, available after `finish`.
    pub fn calibration(&self) -> Option<&ForwardCalibration> {
        self.calibration.as_ref()
    }

    pub(crate) fn setup(&mut self, ctx: &mut SimulationContext) -> SimulationResult<()> {
        let p = &self.params;
        if p.kappa < 0.0 || p.vol_of_vol < 0.0 || !(-1.0..=1.0).contains(&p.rho) {
            return Err(SimulationError::InvalidConfig(format!(
                "Heston parameters for {} out of range: {:?}",
                self.name, p
            )));
        }
        ctx.add_dimension(&self.name)?;
        ctx.add_dimension(&self.variance_name)?;
        self.schedule.declare(ctx)
    }

    pub(crate) fn finish(&mut self, ctx: &SimulationContext) -> SimulationResult<()> {
        if self.complete {
            return Ok(());
        }
        self.spot_dim = ctx.dimension(&self.name)?;
        self.var_dim = ctx.dimension(&self.variance_name)?;

        let short = self.market.vol.atm_vol(self.params.short_expiry)?;
        let long = self.market.vol.atm_vol(self.params.long_expiry)?;
        self.v0 = short * short;
        self.theta = long * long;

        let cal = self.market.calibrate(ctx, &self.name)?;
        let grid = ctx.grid();
        self.log_growth = cal.drift.iter().zip(grid.dt()).map(|(m, dt)| m * dt).collect();
        self.dt = grid.dt().to_vec();
        self.sqrt_dt = grid.sqrt_dt().to_vec();

        debug!(
            factor = %self.name,
            v0 = self.v0,
            theta = self.theta,
            "heston process finished"
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
        let n_steps = block.n_steps();

        {
            let (slab, view) = block.split_factor_mut(self.var_dim);
            for (batch, var) in slab.chunks_mut(n_steps).enumerate() {
                self.walk_variance(cal.start, var, view.draws(self.var_dim, batch));
            }
        }

        let (slab, view) = block.split_factor_mut(self.spot_dim);
        for (batch, spot) in slab.chunks_mut(n_steps).enumerate() {
            self.walk_spot(
                cal,
                spot,
                view.path(self.var_dim, batch),
                view.draws(self.spot_dim, batch),
                view.draws(self.var_dim, batch),
            );
        }
        Ok(())
    }

    fn walk_variance(&self, start: usize, var: &mut [Lane], z_v: &[Lane]) {
        let zero = splat(0.0);
        for value in var.iter_mut().take(start + 1) {
            *value = splat(self.v0);
        }
        for i in (start + 1)..var.len() {
            let v_plus = var[i - 1].max(zero);
            var[i] = var[i - 1]
                + splat(self.params.kappa * self.dt[i]) * (splat(self.theta) - v_plus)
                + splat(self.params.vol_of_vol * self.sqrt_dt[i]) * v_plus.sqrt() * z_v[i];
        }
    }

    fn walk_spot(
        &self,
        cal: &ForwardCalibration,
        spot: &mut [Lane],
        var: &[Lane],
        z_s: &[Lane],
        z_v: &[Lane],
    ) {
        let zero = splat(0.0);
        let rho = self.params.rho;
        let rho_bar = (1.0 - rho * rho).max(0.0).sqrt();
        for (value, &level) in spot.iter_mut().zip(&cal.history) {
            *value = splat(level);
        }
        for i in (cal.start + 1)..spot.len() {
            let v_plus = var[i - 1].max(zero);
            let dw = splat(rho) * z_v[i] + splat(rho_bar) * z_s[i];
            let exponent = splat(self.log_growth[i]) - splat(0.5 * self.dt[i]) * v_plus
                + (v_plus * splat(self.dt[i])).sqrt() * dw;
            spot[i] = spot[i - 1] * exponent.exp();
        }
    }
}
