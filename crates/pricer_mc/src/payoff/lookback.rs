//! Rolling-window lookback option.

use super::terms::{store, store_exercise, OptionType, PayoffTerms};
use crate::block::PathBlock;
use crate::error::{SimulationError, SimulationResult};
use crate::grid::SimulationContext;
use crate::lanes::{splat, Lane, LANES};
use pricer_core::market_data::ForwardCurve;
use pricer_core::types::Date;
use std::fmt;
use std::sync::Arc;

/// Level the best window average is compared against.
#[derive(Clone)]
pub enum SettlementLevel {
    /// The simulated level on a grid date.
    Observed(Date),
    /// The level on `from` carried to `to` by the forward ratio
    /// `F(to) / F(from)`, for a settlement that is not simulated directly.
    Carried {
        /// Observed date.
        from: Date,
        /// Date the level is estimated for.
        to: Date,
        /// Curve supplying the carry.
        forward: Arc<dyn ForwardCurve>,
    },
}

impl fmt::Debug for SettlementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettlementLevel::Observed(date) => f.debug_tuple("Observed").field(date).finish(),
            SettlementLevel::Carried { from, to, .. } => f
                .debug_struct("Carried")
                .field("from", from)
                .field("to", to)
                .finish_non_exhaustive(),
        }
    }
}

impl SettlementLevel {
    fn observed_date(&self) -> Date {
        match self {
            SettlementLevel::Observed(date) => *date,
            SettlementLevel::Carried { from, .. } => *from,
        }
    }

    fn carry(&self, ctx: &SimulationContext) -> SimulationResult<f64> {
        match self {
            SettlementLevel::Observed(_) => Ok(1.0),
            SettlementLevel::Carried { from, to, forward } => {
                let f_from = forward.forward(ctx.year_fraction(*from).max(0.0))?;
                let f_to = forward.forward(ctx.year_fraction(*to).max(0.0))?;
                Ok(f_to / f_from)
            }
        }
    }
}

/// Lookback on averages of `window` consecutive fixings.
///
/// A call pays `max(0, S_settle − min_k A_k)`, a put pays
/// `max(0, max_k A_k − S_settle)`, where `A_k` is the average of fixings
/// `k..k + window`. The exercise index records the window `k` achieving the
/// extremum.
#[derive(Debug, Clone)]
pub struct LookbackPayoff {
    terms: PayoffTerms,
    option: OptionType,
    fixing_dates: Vec<Date>,
    window: usize,
    settlement: SettlementLevel,
    fixing_indices: Vec<usize>,
    settlement_index: usize,
    carry: f64,
}

impl LookbackPayoff {
    /// Lookback over `fixing_dates`, settling against the level observed on
    /// the payment date.
    pub fn new(terms: PayoffTerms, option: OptionType, fixing_dates: Vec<Date>, window: usize) -> Self {
        let settlement = SettlementLevel::Observed(terms.settlement_date);
        Self {
            terms,
            option,
            fixing_dates,
            window,
            settlement,
            fixing_indices: Vec::new(),
            settlement_index: 0,
            carry: 1.0,
        }
    }

    /// Overrides the comparison level.
    pub fn with_settlement_level(mut self, settlement: SettlementLevel) -> Self {
        self.settlement = settlement;
        self
    }

    /// Shared terms.
    pub fn terms(&self) -> &PayoffTerms {
        &self.terms
    }

    /// Number of averaging windows.
    pub fn n_windows(&self) -> usize {
        (self.fixing_dates.len() + 1).saturating_sub(self.window)
    }

    pub(crate) fn setup(&mut self, ctx: &mut SimulationContext) -> SimulationResult<()> {
        if self.window == 0 || self.window > self.fixing_dates.len() {
            return Err(SimulationError::UnsupportedProduct(format!(
                "lookback window {} over {} fixings",
                self.window,
                self.fixing_dates.len()
            )));
        }
        self.fixing_dates.sort_unstable();
        self.terms.setup(ctx)?;
        ctx.add_dates(self.fixing_dates.iter().copied())?;
        ctx.add_date(self.settlement.observed_date())
    }

    pub(crate) fn finish(&mut self, ctx: &SimulationContext) -> SimulationResult<()> {
        self.terms.finish(ctx)?;
        self.fixing_indices = ctx.grid().date_indices(&self.fixing_dates)?;
        self.settlement_index = ctx.date_index(self.settlement.observed_date())?;
        self.carry = self.settlement.carry(ctx)?;
        Ok(())
    }

    pub(crate) fn evaluate(
        &self,
        block: &PathBlock,
        values: &mut [f64],
        exercise: &mut [i32],
    ) -> SimulationResult<()> {
        let w = self.window;
        let width = splat(w as f64);
        for batch in 0..block.n_batches() {
            let path = self.terms.asset_path(block, batch);
            let fixing = |k: usize| path[self.fixing_indices[k]];

            let mut sum = (0..w).fold(splat(0.0), |acc: Lane, k| acc + fixing(k));
            let mut best = (sum / width).to_array();
            let mut best_window = [0_i32; LANES];
            for k in 1..self.n_windows() {
                sum = sum + fixing(k + w - 1) - fixing(k - 1);
                let average = (sum / width).to_array();
                for lane in 0..LANES {
                    let better = match self.option {
                        OptionType::Call => average[lane] < best[lane],
                        OptionType::Put => average[lane] > best[lane],
                    };
                    if better {
                        best[lane] = average[lane];
                        best_window[lane] = k as i32;
                    }
                }
            }

            let settle = path[self.settlement_index] * splat(self.carry);
            let extremum = Lane::from(best);
            let payoff = match self.option {
                OptionType::Call => (settle - extremum).max(splat(0.0)),
                OptionType::Put => (extremum - settle).max(splat(0.0)),
            };
            store(values, batch, self.terms.settle(block, batch, payoff));
            store_exercise(exercise, batch, best_window);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricer_core::market_data::InterpolatedForward;
    use pricer_core::types::DayCountConvention;

    fn fixture(payoff: &mut LookbackPayoff, today: Date) -> (SimulationContext, PathBlock) {
        let mut ctx = SimulationContext::new(today, DayCountConvention::ActualActual365);
        payoff.setup(&mut ctx).unwrap();
        ctx.freeze();
        payoff.finish(&ctx).unwrap();
        let mut block = PathBlock::new(4, ctx.n_steps(), ctx.n_factors(), 0);
        let rows = [
            [100.0, 100.0, 100.0, 100.0],
            [104.0, 96.0, 100.0, 90.0],
            [98.0, 102.0, 110.0, 80.0],
            [102.0, 100.0, 120.0, 70.0],
            [106.0, 98.0, 90.0, 60.0],
        ];
        for (i, row) in rows.iter().enumerate() {
            block.path_mut(0, 0)[i] = Lane::from(*row);
        }
        (ctx, block)
    }

    #[test]
    fn test_call_uses_lowest_window() {
        let today = Date::from_ymd(2025, 1, 1).unwrap();
        let fixings: Vec<Date> = (1..=4).map(|d| today.add_days(d)).collect();
        let mut call = LookbackPayoff::new(PayoffTerms::new("X", fixings[3]), OptionType::Call, fixings, 2);
        assert_eq!(call.n_windows(), 3);
        let (_ctx, block) = fixture(&mut call, today);

        let mut values = vec![0.0; 4];
        let mut exercise = vec![0; 4];
        call.evaluate(&block, &mut values, &mut exercise).unwrap();
        // windows: lane 0 averages 101, 100, 104; lane 3 averages 85, 75, 65
        assert_eq!(values, vec![6.0, 0.0, 0.0, 0.0]);
        assert_eq!(exercise, vec![1, 0, 0, 2]);
        assert!(values.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn test_put_uses_highest_window() {
        let today = Date::from_ymd(2025, 1, 1).unwrap();
        let fixings: Vec<Date> = (1..=4).map(|d| today.add_days(d)).collect();
        let mut put = LookbackPayoff::new(PayoffTerms::new("X", fixings[3]), OptionType::Put, fixings, 2);
        let (_ctx, block) = fixture(&mut put, today);

        let mut values = vec![0.0; 4];
        let mut exercise = vec![0; 4];
        put.evaluate(&block, &mut values, &mut exercise).unwrap();
        assert_eq!(values, vec![0.0, 3.0, 25.0, 25.0]);
        assert_eq!(exercise, vec![2, 1, 1, 0]);
    }

    #[test]
    fn test_carried_settlement() {
        let today = Date::from_ymd(2025, 1, 1).unwrap();
        let fixings: Vec<Date> = (1..=4).map(|d| today.add_days(d)).collect();
        let forward = InterpolatedForward::new(&[0.0, 1.0], &[100.0, 110.0]).unwrap();
        let mut call = LookbackPayoff::new(PayoffTerms::new("X", fixings[3]), OptionType::Call, fixings.clone(), 4)
            .with_settlement_level(SettlementLevel::Carried {
                from: fixings[3],
                to: today.add_days(365),
                forward: Arc::new(forward),
            });
        let (ctx, block) = fixture(&mut call, today);
        let expected_carry = 110.0 / (100.0 + 10.0 * ctx.year_fraction(fixings[3]));

        let mut values = vec![0.0; 4];
        let mut exercise = vec![0; 4];
        call.evaluate(&block, &mut values, &mut exercise).unwrap();
        approx::assert_relative_eq!(values[0], 106.0 * expected_carry - 102.5, max_relative = 1e-12);
        assert_eq!(exercise, vec![0; 4]);
    }

    #[test]
    fn test_window_longer_than_fixings() {
        let today = Date::from_ymd(2025, 1, 1).unwrap();
        let mut ctx = SimulationContext::new(today, DayCountConvention::ActualActual365);
        let mut bad = LookbackPayoff::new(PayoffTerms::new("X", today), OptionType::Call, vec![today], 2);
        assert!(matches!(bad.setup(&mut ctx), Err(SimulationError::UnsupportedProduct(_))));
    }
}
