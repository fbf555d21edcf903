//! Dated futures contracts and a front-month stitched spot.
//!
//! Each contract `Name~yyyyMMdd` starts at the forward for its expiry and is
//! a driftless lognormal martingale, optionally with Samuelson decay
//! `σ_c·e^{−b(T_c − t)}`, where `σ_c` reproduces the ATM variance at `T_c`.
//! A contract is frozen after its expiry.
//!
//! The spot factor `Name` tracks the front month: the first contract whose
//! expiry is on or after the step date. Between rolls it compounds the front
//! contract's return; on a roll it splices to the new front contract's
//! level.

use super::calibration::{samuelson_scale, samuelson_variance};
use super::inputs::{MarketInputs, Schedule};
use super::not_finished;
use crate::block::PathBlock;
use crate::error::{SimulationError, SimulationResult};
use crate::grid::SimulationContext;
use crate::lanes::splat;
use pricer_core::types::Date;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

/// Calibrated state of one dated contract.
#[derive(Debug, Clone, PartialEq)]
pub struct FuturesContract {
    /// Factor name, `Name~yyyyMMdd`.
    pub name: String,
    /// Expiry (and prompt) date.
    pub expiry: Date,
    /// Forward level on the valuation date.
    pub initial: f64,
    /// Vol scale.
    pub sigma: f64,
    dim: usize,
    log_drift: Vec<f64>,
    step_std: Vec<f64>,
}

impl FuturesContract {
    /// Per-step standard deviation of the log increment.
    pub fn step_std(&self) -> &[f64] {
        &self.step_std
    }
}

/// Futures strip generator with a stitched front-month spot.
#[derive(Debug, Clone)]
pub struct FuturesRollProcess {
    name: String,
    market: MarketInputs,
    schedule: Schedule,
    expiries: Vec<Date>,
    decay: f64,
    spot_dim: usize,
    contracts: Vec<FuturesContract>,
    front: Vec<usize>,
    history: Vec<f64>,
    start: usize,
    complete: bool,
}

impl FuturesRollProcess {
    /// Strip `name` with one contract per expiry.
    pub fn new(name: &str, market: MarketInputs, schedule: Schedule, expiries: Vec<Date>) -> Self {
        let mut expiries = expiries;
        expiries.sort();
        expiries.dedup();
        Self {
            name: name.to_string(),
            market,
            schedule,
            expiries,
            decay: 0.0,
            spot_dim: 0,
            contracts: Vec::new(),
            front: Vec::new(),
            history: Vec::new(),
            start: 0,
            complete: false,
        }
    }

    /// Samuelson decay rate `b`.
    pub fn with_decay(mut self, decay: f64) -> Self {
        self.decay = decay;
        self
    }

    /// Spot factor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once finished.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Factor name of the contract expiring on `expiry`.
    pub fn contract_name(&self, expiry: Date) -> String {
        format!("{}~{}", self.name, expiry.compact())
    }

    /// Contract factor names with their prompt dates, for prompt-decay
    /// correlation.
    pub fn contract_prompts(&self) -> BTreeMap<String, Date> {
        self.expiries
            .iter()
            .map(|&e| (self.contract_name(e), e))
            .collect()
    }

    /// Calibrated contracts, available after `finish`.
    pub fn contracts(&self) -> &[FuturesContract] {
        &self.contracts
    }

    /// Front contract index per grid step.
    pub fn front_indices(&self) -> &[usize] {
        &self.front
    }

    pub(crate) fn setup(&mut self, ctx: &mut SimulationContext) -> SimulationResult<()> {
        if self.expiries.is_empty() {
            return Err(SimulationError::InvalidConfig(format!(
                "futures strip {} has no contracts",
                self.name
            )));
        }
        if let Some(&first) = self.expiries.first() {
            if first < ctx.valuation_date() {
                return Err(SimulationError::InvalidConfig(format!(
                    "contract {} of {} expired before the valuation date",
                    first, self.name
                )));
            }
        }
        if self.decay.is_nan() || self.decay < 0.0 {
            return Err(SimulationError::InvalidConfig(format!(
                "Samuelson decay for {} must be non-negative, got {}",
                self.name, self.decay
            )));
        }
        ctx.add_dimension(&self.name)?;
        for &expiry in &self.expiries {
            ctx.add_dimension(&self.contract_name(expiry))?;
        }
        ctx.add_dates(self.expiries.iter().copied())?;
        self.schedule.declare(ctx)
    }

    pub(crate) fn finish(&mut self, ctx: &SimulationContext) -> SimulationResult<()> {
        if self.complete {
            return Ok(());
        }
        let grid = ctx.grid();
        let n = grid.len();
        self.spot_dim = ctx.dimension(&self.name)?;
        self.start = ctx.valuation_index();

        let mut contracts = Vec::with_capacity(self.expiries.len());
        for &expiry in &self.expiries {
            let name = self.contract_name(expiry);
            let t_c = ctx.year_fraction(expiry);
            let initial =
                self.market
                    .forward
                    .forward(t_c)
                    .map_err(|source| SimulationError::MissingForward {
                        name: name.clone(),
                        date: expiry,
                        source,
                    })?;
            let black = self.market.vol.atm_vol(t_c)?;
            let sigma = samuelson_scale(black, self.decay, t_c);

            let mut log_drift = vec![0.0; n];
            let mut step_std = vec![0.0; n];
            for i in (self.start + 1)..n {
                let t1 = grid.time(i - 1).max(0.0);
                let t2 = grid.time(i).min(t_c);
                let variance = samuelson_variance(sigma, self.decay, t_c, t1, t2);
                log_drift[i] = -0.5 * variance;
                step_std[i] = variance.sqrt();
            }
            contracts.push(FuturesContract {
                dim: ctx.dimension(&name)?,
                name,
                expiry,
                initial,
                sigma,
                log_drift,
                step_std,
            });
        }

        let mut front = Vec::with_capacity(n);
        for &date in grid.dates() {
            let idx = self.expiries.partition_point(|&e| e < date);
            if idx == self.expiries.len() {
                return Err(SimulationError::InvalidConfig(format!(
                    "no live contract of {} on {}",
                    self.name, date
                )));
            }
            front.push(idx);
        }

        let mut history = Vec::with_capacity(self.start + 1);
        for i in 0..self.start {
            let date = grid.date(i);
            let fixing = self.market.fixings.get(&date).copied().ok_or_else(|| {
                SimulationError::MissingFixing {
                    name: self.name.clone(),
                    date,
                }
            })?;
            history.push(fixing);
        }
        history.push(
            self.market
                .fixings
                .get(&ctx.valuation_date())
                .copied()
                .unwrap_or(contracts[front[self.start]].initial),
        );

        debug!(
            factor = %self.name,
            contracts = contracts.len(),
            decay = self.decay,
            "futures roll process finished"
        );
        self.contracts = contracts;
        self.front = front;
        self.history = history;
        self.complete = true;
        Ok(())
    }

    pub(crate) fn process(&self, block: &mut PathBlock) -> SimulationResult<()> {
        if !self.complete {
            return Err(not_finished(&self.name));
        }
        let n_steps = block.n_steps();
        let start = self.start;

        for contract in &self.contracts {
            let (slab, view) = block.split_factor_mut(contract.dim);
            slab.par_chunks_mut(n_steps)
                .enumerate()
                .for_each(|(batch, path)| {
                    let z = view.draws(contract.dim, batch);
                    path[..=start].fill(splat(contract.initial));
                    for i in (start + 1)..n_steps {
                        let exponent =
                            splat(contract.log_drift[i]) + splat(contract.step_std[i]) * z[i];
                        path[i] = path[i - 1] * exponent.exp();
                    }
                });
        }

        let (slab, view) = block.split_factor_mut(self.spot_dim);
        slab.par_chunks_mut(n_steps)
            .enumerate()
            .for_each(|(batch, spot)| {
                for (value, &level) in spot.iter_mut().zip(&self.history) {
                    *value = splat(level);
                }
                for i in (start + 1)..n_steps {
                    let f = self.front[i];
                    let contract = view.path(self.contracts[f].dim, batch);
                    spot[i] = if f == self.front[i - 1] {
                        spot[i - 1] * contract[i] / contract[i - 1]
                    } else {
                        contract[i]
                    };
                }
            });
        Ok(())
    }
}
