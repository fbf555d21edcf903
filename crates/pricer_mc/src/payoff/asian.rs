//! Arithmetic-average (Asian) option.

use super::terms::{paid_flags, store, store_exercise, OptionType, PayoffTerms};
use crate::block::PathBlock;
use crate::error::{SimulationError, SimulationResult};
use crate::grid::SimulationContext;
use crate::lanes::{splat, Lane};
use pricer_core::types::Date;

/// Pays `max(0, ±(A − K))` on the arithmetic mean `A` of the fixings.
#[derive(Debug, Clone)]
pub struct AsianPayoff {
    terms: PayoffTerms,
    option: OptionType,
    strike: f64,
    fixing_dates: Vec<Date>,
    fixing_indices: Vec<usize>,
}

impl AsianPayoff {
    /// Average over `fixing_dates`.
    pub fn new(terms: PayoffTerms, option: OptionType, strike: f64, fixing_dates: Vec<Date>) -> Self {
        Self {
            terms,
            option,
            strike,
            fixing_dates,
            fixing_indices: Vec::new(),
        }
    }

    /// Shared terms.
    pub fn terms(&self) -> &PayoffTerms {
        &self.terms
    }

    pub(crate) fn setup(&mut self, ctx: &mut SimulationContext) -> SimulationResult<()> {
        if self.fixing_dates.is_empty() {
            return Err(SimulationError::UnsupportedProduct(format!(
                "Asian option on {} without fixing dates",
                self.terms.asset
            )));
        }
        self.terms.setup(ctx)?;
        ctx.add_dates(self.fixing_dates.iter().copied())
    }

    pub(crate) fn finish(&mut self, ctx: &SimulationContext) -> SimulationResult<()> {
        self.terms.finish(ctx)?;
        self.fixing_indices = ctx.grid().date_indices(&self.fixing_dates)?;
        Ok(())
    }

    pub(crate) fn evaluate(
        &self,
        block: &PathBlock,
        values: &mut [f64],
        exercise: &mut [i32],
    ) -> SimulationResult<()> {
        let strike = splat(self.strike);
        let n = splat(self.fixing_indices.len() as f64);
        for batch in 0..block.n_batches() {
            let path = self.terms.asset_path(block, batch);
            let sum = self
                .fixing_indices
                .iter()
                .fold(splat(0.0), |acc: Lane, &i| acc + path[i]);
            let payoff = self.option.intrinsic(sum / n, strike);
            store(values, batch, self.terms.settle(block, batch, payoff));
            store_exercise(exercise, batch, paid_flags(payoff));
        }
        Ok(())
    }
}
