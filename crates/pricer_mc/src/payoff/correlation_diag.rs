//! Realised correlation of two factors, per path.

use super::terms::{store, store_exercise};
use crate::block::PathBlock;
use crate::error::{SimulationError, SimulationResult};
use crate::grid::SimulationContext;
use crate::lanes::{Lane, LANES};
use pricer_core::types::Date;
use std::ops::Range;

/// Diagnostic output: the sample correlation of the two factors' log
/// returns between consecutive grid steps inside a window.
///
/// Not a monetary value; results carry no currency and are not added to
/// exposures. Paths with a flat factor over the window report `NaN`.
#[derive(Debug, Clone)]
pub struct CorrelationDiagnostic {
    label: String,
    first: String,
    second: String,
    start: Date,
    end: Date,
    dims: (usize, usize),
    window: Range<usize>,
}

impl CorrelationDiagnostic {
    /// Correlation of `first` and `second` over `[start, end]`.
    pub fn new(first: &str, second: &str, start: Date, end: Date) -> Self {
        Self {
            label: format!("corr({},{})", first, second),
            first: first.to_string(),
            second: second.to_string(),
            start,
            end,
            dims: (0, 0),
            window: 0..0,
        }
    }

    /// Result label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Last observation date.
    pub fn end_date(&self) -> Date {
        self.end
    }

    pub(crate) fn setup(&mut self, ctx: &mut SimulationContext) -> SimulationResult<()> {
        if self.end <= self.start {
            return Err(SimulationError::InvalidConfig(format!(
                "{} window ends before it starts",
                self.label
            )));
        }
        ctx.add_dimension(&self.first)?;
        ctx.add_dimension(&self.second)?;
        ctx.add_date(self.start)?;
        ctx.add_date(self.end)
    }

    pub(crate) fn finish(&mut self, ctx: &SimulationContext) -> SimulationResult<()> {
        self.dims = (ctx.dimension(&self.first)?, ctx.dimension(&self.second)?);
        self.window = ctx.grid().steps_between(self.start, self.end)?;
        Ok(())
    }

    pub(crate) fn evaluate(
        &self,
        block: &PathBlock,
        values: &mut [f64],
        exercise: &mut [i32],
    ) -> SimulationResult<()> {
        for batch in 0..block.n_batches() {
            let a = &block.path(self.dims.0, batch)[self.window.clone()];
            let b = &block.path(self.dims.1, batch)[self.window.clone()];
            let mut corr = [f64::NAN; LANES];
            for (lane, value) in corr.iter_mut().enumerate() {
                *value = pearson(&log_returns(a, lane), &log_returns(b, lane));
            }
            store(values, batch, Lane::from(corr));
            store_exercise(exercise, batch, [-1; LANES]);
        }
        Ok(())
    }
}

fn log_returns(path: &[Lane], lane: usize) -> Vec<f64> {
    path.windows(2)
        .map(|w| (w[1].to_array()[lane] / w[0].to_array()[lane]).ln())
        .collect()
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    if x.len() < 2 {
        return f64::NAN;
    }
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx) * (a - mx);
        syy += (b - my) * (b - my);
    }
    sxy / (sxx * syy).sqrt()
}
