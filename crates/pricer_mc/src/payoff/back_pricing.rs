//! Back-pricing: an averaging window judged at a decision date.
//!
//! At the decision date `d` the fixings on or before `d` are known and are
//! summed exactly from the path. The mean of the remaining fixings is
//! estimated from the decision-date level `S_d`:
//!
//! - **carry mode** (a valuation forward curve is supplied):
//!   `S_d · mean_j F(t_j) / F(t_d)`;
//! - **regression mode** (otherwise): a [`LinearEstimator`] of the future
//!   mean on `S_d`, fitted on training paths before pricing.
//!
//! The two parts combine by count weighting into the estimated average `Â`.
//! When nothing is left to estimate, `Â` is the exact average and no
//! training is needed.

use super::regression::LinearEstimator;
use super::terms::{paid_flags, store, store_exercise, OptionType, PayoffTerms};
use crate::block::PathBlock;
use crate::error::{SimulationError, SimulationResult};
use crate::grid::SimulationContext;
use crate::lanes::{indicator, splat, Lane};
use pricer_core::market_data::ForwardCurve;
use pricer_core::types::Date;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// One averaging window split at the decision date.
#[derive(Debug, Clone)]
pub(crate) struct AveragingPeriod {
    dates: Vec<Date>,
    realized: Vec<usize>,
    future: Vec<usize>,
    carry: Option<f64>,
    estimator: Option<LinearEstimator>,
}

impl AveragingPeriod {
    pub(crate) fn new(mut dates: Vec<Date>) -> Self {
        dates.sort_unstable();
        dates.dedup();
        Self {
            dates,
            realized: Vec::new(),
            future: Vec::new(),
            carry: None,
            estimator: None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub(crate) fn declare(&self, ctx: &mut SimulationContext) -> SimulationResult<()> {
        ctx.add_dates(self.dates.iter().copied())
    }

    pub(crate) fn resolve(
        &mut self,
        ctx: &SimulationContext,
        decision: Date,
        forward: Option<&dyn ForwardCurve>,
    ) -> SimulationResult<()> {
        let split = self.dates.partition_point(|&d| d <= decision);
        self.realized = ctx.grid().date_indices(&self.dates[..split])?;
        self.future = ctx.grid().date_indices(&self.dates[split..])?;
        self.carry = match forward {
            Some(curve) if !self.future.is_empty() => {
                let f_d = curve.forward(ctx.year_fraction(decision).max(0.0))?;
                let mut ratio = 0.0;
                for &date in &self.dates[split..] {
                    ratio += curve.forward(ctx.year_fraction(date).max(0.0))? / f_d;
                }
                Some(ratio / self.future.len() as f64)
            }
            _ => None,
        };
        Ok(())
    }

    pub(crate) fn needs_training(&self) -> bool {
        !self.future.is_empty() && self.carry.is_none() && self.estimator.is_none()
    }

    pub(crate) fn estimator(&self) -> Option<LinearEstimator> {
        self.estimator
    }

    fn future_mean(&self, path: &[Lane]) -> Lane {
        let sum = self.future.iter().fold(splat(0.0), |acc: Lane, &i| acc + path[i]);
        sum / splat(self.future.len() as f64)
    }

    /// Fits the future mean on the decision-date level over every training
    /// path.
    pub(crate) fn train(
        &mut self,
        blocks: &[PathBlock],
        asset_dim: usize,
        decision_index: usize,
    ) -> SimulationResult<()> {
        if !self.needs_training() {
            return Ok(());
        }
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for block in blocks {
            for batch in 0..block.n_batches() {
                let path = block.path(asset_dim, batch);
                xs.extend(path[decision_index].to_array());
                ys.extend(self.future_mean(path).to_array());
            }
        }
        self.estimator = Some(LinearEstimator::fit(&xs, &ys)?);
        Ok(())
    }

    /// Count-weighted average of the realised sum and the estimated future
    /// mean.
    pub(crate) fn estimate(&self, path: &[Lane], decision_index: usize) -> SimulationResult<Lane> {
        let realized = self.realized.iter().fold(splat(0.0), |acc: Lane, &i| acc + path[i]);
        let n_realized = self.realized.len() as f64;
        if self.future.is_empty() {
            return Ok(realized / splat(n_realized));
        }
        let n_future = self.future.len() as f64;
        let s_d = path[decision_index];
        let future = match (self.carry, &self.estimator) {
            (Some(carry), _) => s_d * splat(carry),
            (None, Some(estimator)) => estimator.estimate_lane(s_d),
            (None, None) => {
                return Err(SimulationError::InvalidConfig(
                    "back-pricing estimator used before training".to_string(),
                ))
            }
        };
        Ok((realized + future * splat(n_future)) / splat(n_realized + n_future))
    }
}

/// Partial knock-out of the notional once the reference level crosses a
/// level.
///
/// Applied after the core payoff: `payoff · (1 − scale · 1{crossed})`, where
/// a call is crossed at or above the level and a put at or below it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScaleOverlay {
    /// Fraction of the payoff removed once crossed.
    pub scale: f64,
    /// Crossing level.
    pub knock_out_level: f64,
}

impl ScaleOverlay {
    fn apply(&self, option: OptionType, reference: Lane, payoff: Lane) -> Lane {
        let level = self.knock_out_level;
        let crossed = indicator(reference, |s| match option {
            OptionType::Call => s >= level,
            OptionType::Put => s <= level,
        });
        payoff * (splat(1.0) - splat(self.scale) * crossed)
    }
}

/// Back-pricing option.
///
/// A call pays `max(0, Â − S)`, a put `max(0, S − Â)`, where `S` is the
/// level on the settlement date.
#[derive(Clone)]
pub struct BackPricingPayoff {
    terms: PayoffTerms,
    option: OptionType,
    decision_date: Date,
    period: AveragingPeriod,
    valuation_forward: Option<Arc<dyn ForwardCurve>>,
    overlay: Option<ScaleOverlay>,
    decision_index: usize,
}

impl fmt::Debug for BackPricingPayoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackPricingPayoff")
            .field("terms", &self.terms)
            .field("option", &self.option)
            .field("decision_date", &self.decision_date)
            .field("period", &self.period)
            .field("carry_mode", &self.valuation_forward.is_some())
            .field("overlay", &self.overlay)
            .finish()
    }
}

impl BackPricingPayoff {
    /// Regression-mode back-pricing over `averaging_dates`.
    pub fn new(
        terms: PayoffTerms,
        option: OptionType,
        averaging_dates: Vec<Date>,
        decision_date: Date,
    ) -> Self {
        Self {
            terms,
            option,
            decision_date,
            period: AveragingPeriod::new(averaging_dates),
            valuation_forward: None,
            overlay: None,
            decision_index: 0,
        }
    }

    /// Switches to carry mode with the given valuation curve.
    pub fn with_valuation_forward(mut self, forward: Arc<dyn ForwardCurve>) -> Self {
        self.valuation_forward = Some(forward);
        self
    }

    /// Adds a notional knock-out overlay.
    pub fn with_overlay(mut self, overlay: ScaleOverlay) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// Shared terms.
    pub fn terms(&self) -> &PayoffTerms {
        &self.terms
    }

    /// True while a regression estimator still has to be fitted.
    pub fn needs_training(&self) -> bool {
        self.period.needs_training()
    }

    /// Fitted estimator, in regression mode after training.
    pub fn estimator(&self) -> Option<LinearEstimator> {
        self.period.estimator()
    }

    pub(crate) fn setup(&mut self, ctx: &mut SimulationContext) -> SimulationResult<()> {
        if self.period.is_empty() {
            return Err(SimulationError::UnsupportedProduct(format!(
                "back-pricing on {} without averaging dates",
                self.terms.asset
            )));
        }
        self.terms.setup(ctx)?;
        self.period.declare(ctx)?;
        ctx.add_date(self.decision_date)
    }

    pub(crate) fn finish(&mut self, ctx: &SimulationContext) -> SimulationResult<()> {
        self.terms.finish(ctx)?;
        self.decision_index = ctx.date_index(self.decision_date)?;
        self.period
            .resolve(ctx, self.decision_date, self.valuation_forward.as_deref())
    }

    pub(crate) fn train(&mut self, blocks: &[PathBlock]) -> SimulationResult<()> {
        self.period
            .train(blocks, self.terms.asset_dim(), self.decision_index)?;
        if let Some(est) = self.period.estimator() {
            debug!(
                asset = %self.terms.asset,
                slope = est.slope,
                intercept = est.intercept,
                "back-pricing estimator trained"
            );
        }
        Ok(())
    }

    pub(crate) fn evaluate(
        &self,
        block: &PathBlock,
        values: &mut [f64],
        exercise: &mut [i32],
    ) -> SimulationResult<()> {
        let settlement = self.terms.settlement_index();
        for batch in 0..block.n_batches() {
            let path = self.terms.asset_path(block, batch);
            let average = self.period.estimate(path, self.decision_index)?;
            let reference = path[settlement];
            let mut payoff = self.option.intrinsic(average, reference);
            if let Some(overlay) = &self.overlay {
                payoff = overlay.apply(self.option, reference, payoff);
            }
            store(values, batch, self.terms.settle(block, batch, payoff));
            store_exercise(exercise, batch, paid_flags(payoff));
        }
        Ok(())
    }
}
