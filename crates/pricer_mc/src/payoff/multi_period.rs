//! Back-pricing with several candidate averaging periods.

use super::back_pricing::AveragingPeriod;
use super::regression::LinearEstimator;
use super::terms::{store, store_exercise, OptionType, PayoffTerms};
use crate::block::PathBlock;
use crate::error::{SimulationError, SimulationResult};
use crate::grid::SimulationContext;
use crate::lanes::{Lane, LANES};
use pricer_core::market_data::ForwardCurve;
use pricer_core::types::Date;
use std::fmt;
use std::sync::Arc;

/// A period choice already made outside the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PeriodChoice {
    /// Use this period's average unconditionally.
    Forced(usize),
    /// The option was abandoned: the average is replaced by the settlement
    /// level, so it pays nothing.
    Abandoned,
}

/// Back-pricing where the holder picks the best of several periods.
///
/// Each period's average `Â_k` is estimated as in
/// [`BackPricingPayoff`](super::BackPricingPayoff). A call takes the largest
/// `Â_k` and a put the smallest, unless a [`PeriodChoice`] is declared. The
/// exercise index is the chosen period, or `-1` when nothing is paid.
#[derive(Clone)]
pub struct MultiPeriodBackPricingPayoff {
    terms: PayoffTerms,
    option: OptionType,
    decision_date: Date,
    periods: Vec<AveragingPeriod>,
    valuation_forward: Option<Arc<dyn ForwardCurve>>,
    choice: Option<PeriodChoice>,
    decision_index: usize,
}

impl fmt::Debug for MultiPeriodBackPricingPayoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiPeriodBackPricingPayoff")
            .field("terms", &self.terms)
            .field("option", &self.option)
            .field("decision_date", &self.decision_date)
            .field("periods", &self.periods.len())
            .field("carry_mode", &self.valuation_forward.is_some())
            .field("choice", &self.choice)
            .finish()
    }
}

impl MultiPeriodBackPricingPayoff {
    /// One period per entry of `periods`.
    pub fn new(
        terms: PayoffTerms,
        option: OptionType,
        periods: Vec<Vec<Date>>,
        decision_date: Date,
    ) -> Self {
        Self {
            terms,
            option,
            decision_date,
            periods: periods.into_iter().map(AveragingPeriod::new).collect(),
            valuation_forward: None,
            choice: None,
            decision_index: 0,
        }
    }

    /// Carry mode with the given valuation curve.
    pub fn with_valuation_forward(mut self, forward: Arc<dyn ForwardCurve>) -> Self {
        self.valuation_forward = Some(forward);
        self
    }

    /// Declares the period choice.
    pub fn with_choice(mut self, choice: PeriodChoice) -> Self {
        self.choice = Some(choice);
        self
    }

    /// Shared terms.
    pub fn terms(&self) -> &PayoffTerms {
        &self.terms
    }

    /// Number of candidate periods.
    pub fn n_periods(&self) -> usize {
        self.periods.len()
    }

    /// True while any period still needs a regression estimator.
    pub fn needs_training(&self) -> bool {
        self.periods.iter().any(AveragingPeriod::needs_training)
    }

    /// Fitted estimators, one per period (`None` for exact or carry periods).
    pub fn estimators(&self) -> Vec<Option<LinearEstimator>> {
        self.periods.iter().map(AveragingPeriod::estimator).collect()
    }

    pub(crate) fn setup(&mut self, ctx: &mut SimulationContext) -> SimulationResult<()> {
        if self.periods.is_empty() || self.periods.iter().any(AveragingPeriod::is_empty) {
            return Err(SimulationError::UnsupportedProduct(format!(
                "multi-period back-pricing on {} with an empty period",
                self.terms.asset
            )));
        }
        if let Some(PeriodChoice::Forced(k)) = self.choice {
            if k >= self.periods.len() {
                return Err(SimulationError::InvalidConfig(format!(
                    "forced period {} of {}",
                    k,
                    self.periods.len()
                )));
            }
        }
        self.terms.setup(ctx)?;
        for period in &self.periods {
            period.declare(ctx)?;
        }
        ctx.add_date(self.decision_date)
    }

    pub(crate) fn finish(&mut self, ctx: &SimulationContext) -> SimulationResult<()> {
        self.terms.finish(ctx)?;
        self.decision_index = ctx.date_index(self.decision_date)?;
        let forward = self.valuation_forward.as_deref();
        for period in &mut self.periods {
            period.resolve(ctx, self.decision_date, forward)?;
        }
        Ok(())
    }

    pub(crate) fn train(&mut self, blocks: &[PathBlock]) -> SimulationResult<()> {
        let asset_dim = self.terms.asset_dim();
        for period in &mut self.periods {
            period.train(blocks, asset_dim, self.decision_index)?;
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
            let reference = path[settlement];

            let (average, chosen) = match self.choice {
                Some(PeriodChoice::Abandoned) => (reference, [-1; LANES]),
                Some(PeriodChoice::Forced(k)) => (
                    self.periods[k].estimate(path, self.decision_index)?,
                    [k as i32; LANES],
                ),
                None => self.select(path)?,
            };

            let payoff = self.option.intrinsic(average, reference);
            let paid = payoff.to_array();
            let indices = std::array::from_fn(|lane| if paid[lane] > 0.0 { chosen[lane] } else { -1 });
            store(values, batch, self.terms.settle(block, batch, payoff));
            store_exercise(exercise, batch, indices);
        }
        Ok(())
    }

    /// Extremal period average per lane.
    fn select(&self, path: &[Lane]) -> SimulationResult<(Lane, [i32; LANES])> {
        let mut best = [0.0; LANES];
        let mut chosen = [-1_i32; LANES];
        for (k, period) in self.periods.iter().enumerate() {
            let average = period.estimate(path, self.decision_index)?.to_array();
            for lane in 0..LANES {
                let better = chosen[lane] < 0
                    || match self.option {
                        OptionType::Call => average[lane] > best[lane],
                        OptionType::Put => average[lane] < best[lane],
                    };
                if better {
                    best[lane] = average[lane];
                    chosen[lane] = k as i32;
                }
            }
        }
        Ok((Lane::from(best), chosen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricer_core::types::DayCountConvention;

    const ROWS: [[f64; 4]; 5] = [
        [100.0, 100.0, 100.0, 100.0],
        [100.0, 90.0, 120.0, 100.0],
        [110.0, 94.0, 100.0, 96.0],
        [104.0, 98.0, 110.0, 92.0],
        [96.0, 102.0, 90.0, 100.0],
    ];

    fn evaluate(mut payoff: MultiPeriodBackPricingPayoff, today: Date) -> (Vec<f64>, Vec<i32>) {
        let mut ctx = SimulationContext::new(today, DayCountConvention::ActualActual365);
        payoff.setup(&mut ctx).unwrap();
        ctx.freeze();
        payoff.finish(&ctx).unwrap();
        assert!(!payoff.needs_training());

        let mut block = PathBlock::new(4, ctx.n_steps(), ctx.n_factors(), 0);
        for (i, row) in ROWS.iter().enumerate() {
            block.path_mut(0, 0)[i] = Lane::from(*row);
        }
        let mut values = vec![0.0; 4];
        let mut exercise = vec![0; 4];
        payoff.evaluate(&block, &mut values, &mut exercise).unwrap();
        (values, exercise)
    }

    fn payoff(option: OptionType) -> (MultiPeriodBackPricingPayoff, Date) {
        let today = Date::from_ymd(2025, 1, 1).unwrap();
        let d: Vec<Date> = (1..=4).map(|k| today.add_days(k * 7)).collect();
        let payoff = MultiPeriodBackPricingPayoff::new(
            PayoffTerms::new("X", d[3]),
            option,
            vec![vec![d[0], d[1]], vec![d[1], d[2]]],
            d[3],
        );
        (payoff, today)
    }

    #[test]
    fn test_call_takes_highest_period() {
        let (call, today) = payoff(OptionType::Call);
        assert_eq!(call.n_periods(), 2);
        let (values, exercise) = evaluate(call, today);
        // period averages: (105, 107), (92, 96), (110, 105), (98, 94)
        assert_eq!(values, vec![11.0, 0.0, 20.0, 0.0]);
        assert_eq!(exercise, vec![1, -1, 0, -1]);
    }

    #[test]
    fn test_put_takes_lowest_period() {
        let (put, today) = payoff(OptionType::Put);
        let (values, exercise) = evaluate(put, today);
        assert_eq!(values, vec![0.0, 10.0, 0.0, 6.0]);
        assert_eq!(exercise, vec![-1, 0, -1, 1]);
    }

    #[test]
    fn test_forced_and_abandoned() {
        let (call, today) = payoff(OptionType::Call);
        let (values, exercise) = evaluate(call.with_choice(PeriodChoice::Forced(0)), today);
        assert_eq!(values, vec![9.0, 0.0, 20.0, 0.0]);
        assert_eq!(exercise, vec![0, -1, 0, -1]);

        let (call, today) = payoff(OptionType::Call);
        let (values, exercise) = evaluate(call.with_choice(PeriodChoice::Abandoned), today);
        assert_eq!(values, vec![0.0; 4]);
        assert_eq!(exercise, vec![-1; 4]);
    }

    #[test]
    fn test_forced_period_out_of_range() {
        let (call, today) = payoff(OptionType::Call);
        let mut call = call.with_choice(PeriodChoice::Forced(2));
        let mut ctx = SimulationContext::new(today, DayCountConvention::ActualActual365);
        assert!(matches!(call.setup(&mut ctx), Err(SimulationError::InvalidConfig(_))));
    }
}
