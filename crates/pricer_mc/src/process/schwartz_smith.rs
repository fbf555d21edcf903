//! Two-factor Schwartz–Smith commodity model.
//!
//! The log price is the sum of a short-term mean-reverting deviation `χ`
//! and a long-term Brownian level `ξ`:
//!
//! ```text
//! χ_i = e^{−κΔt}·χ_{i−1} + σ_χ·sqrt((1 − e^{−2κΔt}) / 2κ)·z₁
//! ξ_i = ξ_{i−1} + σ_ξ·√Δt·(ρ z₁ + sqrt(1 − ρ²) z₂)
//! S_i = F̃_i · exp(χ_i + ξ_i − ½·Var[χ_i + ξ_i])
//! ```
//!
//! Both updates are exact, and the variance of the sum is tracked with the
//! same discrete recursion, so `E[S_i] = F̃_i` exactly on the grid.

use super::calibration::{decay_integral, ForwardCalibration};
use super::inputs::{MarketInputs, Schedule};
use super::not_finished;
use crate::block::PathBlock;
use crate::error::{SimulationError, SimulationResult};
use crate::grid::SimulationContext;
use crate::lanes::{splat, Lane};
use tracing::{debug, warn};

/// Schwartz–Smith parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchwartzSmithParams {
    /// Mean reversion of the short-term factor.
    pub kappa: f64,
    /// Short-term factor volatility.
    pub sigma_chi: f64,
    /// Long-term factor volatility; replaced when `calibrate_long_vol` is set.
    pub sigma_xi: f64,
    /// Correlation of the two factors.
    pub rho: f64,
    /// Solve `sigma_xi` so the model matches the ATM variance at the last
    /// grid date.
    pub calibrate_long_vol: bool,
}

/// Schwartz–Smith generator writing `Name`, `Name~1` (χ) and `Name~2` (ξ).
#[derive(Debug, Clone)]
pub struct SchwartzSmithProcess {
    name: String,
    short_name: String,
    long_name: String,
    market: MarketInputs,
    schedule: Schedule,
    params: SchwartzSmithParams,
    dims: [usize; 3],
    sigma_xi: f64,
    calibration: Option<ForwardCalibration>,
    chi_decay: Vec<f64>,
    chi_std: Vec<f64>,
    xi_std: Vec<f64>,
    half_variance: Vec<f64>,
    complete: bool,
}

impl SchwartzSmithProcess {
    /// Generator for `name`.
    pub fn new(
        name: &str,
        market: MarketInputs,
        schedule: Schedule,
        params: SchwartzSmithParams,
    ) -> Self {
        Self {
            name: name.to_string(),
            short_name: format!("{}~1", name),
            long_name: format!("{}~2", name),
            market,
            schedule,
            params,
            dims: [0; 3],
            sigma_xi: params.sigma_xi,
            calibration: None,
            chi_decay: Vec::new(),
            chi_std: Vec::new(),
            xi_std: Vec::new(),
            half_variance: Vec::new(),
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

    /// Long-term volatility in use (calibrated when requested).
    pub fn sigma_xi(&self) -> f64 {
        self.sigma_xi
    }

    /// Half the variance of `χ + ξ` per step.
    pub fn half_variance(&self) -> &[f64] {
        &self.half_variance
    }

    pub(crate) fn setup(&mut self, ctx: &mut SimulationContext) -> SimulationResult<()> {
        let p = &self.params;
        if p.kappa < 0.0 || p.sigma_chi < 0.0 || p.sigma_xi < 0.0 || !(-1.0..=1.0).contains(&p.rho)
        {
            return Err(SimulationError::InvalidConfig(format!(
                "Schwartz-Smith parameters for {} out of range: {:?}",
                self.name, p
            )));
        }
        ctx.add_dimension(&self.name)?;
        ctx.add_dimension(&self.short_name)?;
        ctx.add_dimension(&self.long_name)?;
        self.schedule.declare(ctx)
    }

    pub(crate) fn finish(&mut self, ctx: &SimulationContext) -> SimulationResult<()> {
        if self.complete {
            return Ok(());
        }
        self.dims = [
            ctx.dimension(&self.name)?,
            ctx.dimension(&self.short_name)?,
            ctx.dimension(&self.long_name)?,
        ];
        let cal = self.market.calibrate(ctx, &self.name)?;
        let grid = ctx.grid();
        let n = grid.len();
        let horizon = grid.time(n - 1);

        let SchwartzSmithParams {
            kappa,
            sigma_chi,
            rho,
            ..
        } = self.params;
        if self.params.calibrate_long_vol && horizon > 0.0 {
            let atm = self.market.vol.atm_vol(horizon)?;
            self.sigma_xi = self.solve_long_vol(atm, horizon);
        }
        let sigma_xi = self.sigma_xi;

        self.chi_decay = vec![1.0; n];
        self.chi_std = vec![0.0; n];
        self.xi_std = vec![0.0; n];
        self.half_variance = vec![0.0; n];
        let (mut var_chi, mut var_xi, mut cov) = (0.0, 0.0, 0.0);
        for i in (cal.start + 1)..n {
            let dt = grid.dt()[i];
            let decay = (-kappa * dt).exp();
            let chi_sd = sigma_chi * decay_integral(2.0 * kappa, dt).sqrt();
            let xi_sd = sigma_xi * grid.sqrt_dt()[i];
            var_chi = decay * decay * var_chi + chi_sd * chi_sd;
            cov = decay * cov + rho * chi_sd * xi_sd;
            var_xi += xi_sd * xi_sd;

            self.chi_decay[i] = decay;
            self.chi_std[i] = chi_sd;
            self.xi_std[i] = xi_sd;
            self.half_variance[i] = 0.5 * (var_chi + var_xi + 2.0 * cov);
        }

        debug!(factor = %self.name, sigma_xi, "schwartz-smith process finished");
        self.calibration = Some(cal);
        self.complete = true;
        Ok(())
    }

    /// Positive root of
    /// `T·σ_ξ² + 2ρσ_χ·I(κ,T)·σ_ξ + σ_χ²·I(2κ,T) − σ_atm²·T = 0`.
    fn solve_long_vol(&self, atm: f64, horizon: f64) -> f64 {
        let p = &self.params;
        let a = horizon;
        let b = 2.0 * p.rho * p.sigma_chi * decay_integral(p.kappa, horizon);
        let c = p.sigma_chi * p.sigma_chi * decay_integral(2.0 * p.kappa, horizon)
            - atm * atm * horizon;
        let disc = b * b - 4.0 * a * c;
        let root = if disc >= 0.0 {
            (-b + disc.sqrt()) / (2.0 * a)
        } else {
            f64::NAN
        };
        if root.is_nan() || root < 0.0 {
            warn!(
                factor = %self.name,
                atm,
                "short-term factor alone exceeds ATM variance; long-term vol floored at zero"
            );
            return 0.0;
        }
        root
    }

    pub(crate) fn process(&self, block: &mut PathBlock) -> SimulationResult<()> {
        let cal = self
            .calibration
            .as_ref()
            .ok_or_else(|| not_finished(&self.name))?;
        let [spot_dim, chi_dim, xi_dim] = self.dims;
        let n_steps = block.n_steps();
        let rho = self.params.rho;
        let rho_bar = (1.0 - rho * rho).max(0.0).sqrt();

        {
            let (slab, view) = block.split_factor_mut(chi_dim);
            for (batch, chi) in slab.chunks_mut(n_steps).enumerate() {
                let z = view.draws(chi_dim, batch);
                chi.fill(splat(0.0));
                for i in (cal.start + 1)..n_steps {
                    chi[i] = splat(self.chi_decay[i]) * chi[i - 1] + splat(self.chi_std[i]) * z[i];
                }
            }
        }
        {
            let (slab, view) = block.split_factor_mut(xi_dim);
            for (batch, xi) in slab.chunks_mut(n_steps).enumerate() {
                let z1 = view.draws(chi_dim, batch);
                let z2 = view.draws(xi_dim, batch);
                xi.fill(splat(0.0));
                for i in (cal.start + 1)..n_steps {
                    let dw = splat(rho) * z1[i] + splat(rho_bar) * z2[i];
                    xi[i] = xi[i - 1] + splat(self.xi_std[i]) * dw;
                }
            }
        }

        let (slab, view) = block.split_factor_mut(spot_dim);
        for (batch, spot) in slab.chunks_mut(n_steps).enumerate() {
            let chi = view.path(chi_dim, batch);
            let xi = view.path(xi_dim, batch);
            self.combine(cal, spot, chi, xi);
        }
        Ok(())
    }

    fn combine(&self, cal: &ForwardCalibration, spot: &mut [Lane], chi: &[Lane], xi: &[Lane]) {
        for (value, &level) in spot.iter_mut().zip(&cal.history) {
            *value = splat(level);
        }
        for i in (cal.start + 1)..spot.len() {
            let exponent = chi[i] + xi[i] - splat(self.half_variance[i]);
            spot[i] = splat(cal.forwards[i]) * exponent.exp();
        }
    }
}
