//! European option at a single observation date.

use super::terms::{paid_flags, store, store_exercise, OptionType, PayoffTerms};
use crate::block::PathBlock;
use crate::error::SimulationResult;
use crate::grid::SimulationContext;
use crate::lanes::splat;
use pricer_core::types::Date;

/// Pays `max(0, ±(S(T) − K))`.
///
/// Exercise index is `0` for paths finishing in the money, `-1` otherwise.
#[derive(Debug, Clone)]
pub struct EuropeanPayoff {
    terms: PayoffTerms,
    option: OptionType,
    strike: f64,
    expiry: Date,
    expiry_index: usize,
}

impl EuropeanPayoff {
    /// Option observed at `expiry`.
    pub fn new(terms: PayoffTerms, option: OptionType, strike: f64, expiry: Date) -> Self {
        Self {
            terms,
            option,
            strike,
            expiry,
            expiry_index: 0,
        }
    }

    /// Shared terms.
    pub fn terms(&self) -> &PayoffTerms {
        &self.terms
    }

    pub(crate) fn setup(&mut self, ctx: &mut SimulationContext) -> SimulationResult<()> {
        self.terms.setup(ctx)?;
        ctx.add_date(self.expiry)
    }

    pub(crate) fn finish(&mut self, ctx: &SimulationContext) -> SimulationResult<()> {
        self.terms.finish(ctx)?;
        self.expiry_index = ctx.date_index(self.expiry)?;
        Ok(())
    }

    pub(crate) fn evaluate(
        &self,
        block: &PathBlock,
        values: &mut [f64],
        exercise: &mut [i32],
    ) -> SimulationResult<()> {
        let strike = splat(self.strike);
        for batch in 0..block.n_batches() {
            let s = self.terms.asset_path(block, batch)[self.expiry_index];
            let payoff = self.option.intrinsic(s, strike);
            store(values, batch, self.terms.settle(block, batch, payoff));
            store_exercise(exercise, batch, paid_flags(payoff));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lanes::Lane;
    use pricer_core::types::DayCountConvention;

    #[test]
    fn test_call_and_put_at_expiry() {
        let today = Date::from_ymd(2025, 1, 1).unwrap();
        let expiry = today.add_days(30);
        let mut ctx = SimulationContext::new(today, DayCountConvention::ActualActual365);
        let terms = PayoffTerms::new("X", expiry.add_days(2)).with_notional(10.0);
        let mut call = EuropeanPayoff::new(terms.clone(), OptionType::Call, 100.0, expiry);
        let mut put = EuropeanPayoff::new(terms, OptionType::Put, 100.0, expiry);
        call.setup(&mut ctx).unwrap();
        put.setup(&mut ctx).unwrap();
        ctx.freeze();
        call.finish(&ctx).unwrap();
        put.finish(&ctx).unwrap();

        let mut block = PathBlock::new(4, ctx.n_steps(), ctx.n_factors(), 0);
        block.path_mut(0, 0)[1] = Lane::from([90.0, 100.0, 105.0, 130.0]);
        let mut values = vec![0.0; 4];
        let mut exercise = vec![0; 4];
        call.evaluate(&block, &mut values, &mut exercise).unwrap();
        assert_eq!(values, vec![0.0, 0.0, 50.0, 300.0]);
        assert_eq!(exercise, vec![-1, -1, 0, 0]);
        put.evaluate(&block, &mut values, &mut exercise).unwrap();
        assert_eq!(values, vec![100.0, 0.0, 0.0, 0.0]);
        assert_eq!(exercise, vec![0, -1, -1, -1]);
    }
}
