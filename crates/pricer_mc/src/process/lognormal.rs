//! Lognormal generator with ATM or local volatility.
//!
//! Each step applies
//!
//! ```text
//! S_i = S_{i−1} · (F̃_i / F̃_{i−1}) · exp(−½σ²Δt + σ√Δt·z_i)
//! ```
//!
//! so that `E[S_i] = F̃_i` on every grid date. In ATM mode `σ` is the
//! forward ATM volatility of the step; in local-vol mode it is read from the
//! step's Dupire slice at the previous level, lane by lane.

use super::calibration::ForwardCalibration;
use super::inputs::{MarketInputs, Schedule};
use super::local_vol::LocalVolTable;
use super::not_finished;
use crate::block::PathBlock;
use crate::error::SimulationResult;
use crate::grid::SimulationContext;
use crate::lanes::{map_lanes, splat, Lane};
use tracing::debug;

/// Single-factor lognormal generator.
///
/// ```
/// use pricer_core::market_data::{FlatForward, FlatVol};
/// use pricer_core::types::{Date, DayCountConvention};
/// use pricer_mc::grid::SimulationContext;
/// use pricer_mc::process::{LognormalProcess, MarketInputs, Process, Schedule};
/// use std::sync::Arc;
///
/// let today = Date::from_ymd(2025, 1, 1).unwrap();
/// let inputs = MarketInputs::new(Arc::new(FlatForward::new(100.0)), Arc::new(FlatVol::new(0.2)));
/// let schedule = Schedule::new().with_dates([today.add_days(365)]);
/// let mut process = Process::from(LognormalProcess::new("GOLD", inputs, schedule));
///
/// let mut ctx = SimulationContext::new(today, DayCountConvention::ActualActual365);
/// process.setup(&mut ctx).unwrap();
/// ctx.freeze();
/// process.finish(&ctx).unwrap();
/// assert!(process.is_complete());
/// ```
#[derive(Debug, Clone)]
pub struct LognormalProcess {
    name: String,
    market: MarketInputs,
    schedule: Schedule,
    use_local_vol: bool,
    dim: usize,
    calibration: Option<ForwardCalibration>,
    local_vol: Option<LocalVolTable>,
    log_growth: Vec<f64>,
    half_variance: Vec<f64>,
    diffusion: Vec<f64>,
    dt: Vec<f64>,
    sqrt_dt: Vec<f64>,
    complete: bool,
}

impl LognormalProcess {
    /// ATM-volatility generator for factor `name`.
    pub fn new(name: &str, market: MarketInputs, schedule: Schedule) -> Self {
        Self {
            name: name.to_string(),
            market,
            schedule,
            use_local_vol: false,
            dim: 0,
            calibration: None,
            local_vol: None,
            log_growth: Vec::new(),
            half_variance: Vec::new(),
            diffusion: Vec::new(),
            dt: Vec::new(),
            sqrt_dt: Vec::new(),
            complete: false,
        }
    }

    /// Switches to Dupire local volatility built from the surface smile.
    pub fn with_local_vol(mut self) -> Self {
        self.use_local_vol = true;
        self
    }

    /// Factor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once finished.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Calibration arrays, available after `finish`.
    pub fn calibration(&self) -> Option<&ForwardCalibration> {
        self.calibration.as_ref()
    }

    pub(crate) fn setup(&mut self, ctx: &mut SimulationContext) -> SimulationResult<()> {
        ctx.add_dimension(&self.name)?;
        self.schedule.declare(ctx)
    }

    pub(crate) fn finish(&mut self, ctx: &SimulationContext) -> SimulationResult<()> {
        if self.complete {
            return Ok(());
        }
        self.dim = ctx.dimension(&self.name)?;
        let cal = self.market.calibrate(ctx, &self.name)?;
        let grid = ctx.grid();

        self.log_growth = cal.drift.iter().zip(grid.dt()).map(|(m, dt)| m * dt).collect();
        self.half_variance = cal
            .variance
            .iter()
            .zip(grid.dt())
            .map(|(v, dt)| 0.5 * v * dt)
            .collect();
        self.diffusion = cal
            .vol
            .iter()
            .zip(grid.sqrt_dt())
            .map(|(s, sq)| s * sq)
            .collect();
        self.dt = grid.dt().to_vec();
        self.sqrt_dt = grid.sqrt_dt().to_vec();
        if self.use_local_vol {
            self.local_vol = Some(LocalVolTable::build(ctx, &cal, self.market.vol.as_ref())?);
        }

        debug!(
            factor = %self.name,
            dim = self.dim,
            local_vol = self.use_local_vol,
            "lognormal process finished"
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
            self.walk(cal, path, view.draws(self.dim, batch));
        }
        Ok(())
    }

    fn walk(&self, cal: &ForwardCalibration, path: &mut [Lane], z: &[Lane]) {
        for (value, &level) in path.iter_mut().zip(&cal.history) {
            *value = splat(level);
        }
        for i in (cal.start + 1)..path.len() {
            let prev = path[i - 1];
            let exponent = match &self.local_vol {
                Some(table) => {
                    let f_prev = cal.forwards[i - 1];
                    let fallback = cal.vol[i];
                    let sigma = map_lanes(prev, |s| table.vol(i, (s / f_prev).ln(), fallback));
                    splat(self.log_growth[i]) - splat(0.5 * self.dt[i]) * sigma * sigma
                        + sigma * splat(self.sqrt_dt[i]) * z[i]
                }
                None => {
                    splat(self.log_growth[i] - self.half_variance[i])
                        + splat(self.diffusion[i]) * z[i]
                }
            };
            path[i] = prev * exponent.exp();
        }
    }
}
