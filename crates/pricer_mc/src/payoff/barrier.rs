//! Barrier, touch and double-no-touch options.
//!
//! The observation window covers every grid step whose date lies between
//! the window start and end, inclusive. Running extremes are reduced with
//! lane-wise `min`/`max`, so the barrier is monitored discretely on the
//! grid; add an observation frequency to monitor more densely.

use super::terms::{paid_flags, store, store_exercise, OptionType, PayoffTerms};
use crate::block::PathBlock;
use crate::error::{SimulationError, SimulationResult};
use crate::grid::SimulationContext;
use crate::lanes::{splat, Lane, LANES};
use pricer_core::types::Date;
use std::ops::Range;

/// What the barrier event does to the payoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BarrierKind {
    /// Vanilla payoff if the barrier was touched.
    KnockIn,
    /// Vanilla payoff if the barrier was never touched.
    KnockOut,
    /// Rebate if the barrier was touched.
    OneTouch,
    /// Rebate if the barrier was never touched.
    NoTouch,
    /// Rebate if neither the lower nor the upper barrier was touched.
    DoubleNoTouch,
}

/// Side of the spot the barrier sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BarrierDirection {
    /// Touched when the path reaches or exceeds the level.
    Up,
    /// Touched when the path reaches or falls below the level.
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Vanilla {
    option: OptionType,
    strike: f64,
    expiry: Date,
    expiry_index: usize,
}

/// Barrier option over an observation window.
///
/// Exercise index is `0` for paths that touched a barrier, `-1` otherwise.
///
/// ```
/// use pricer_core::types::Date;
/// use pricer_mc::payoff::{BarrierDirection, BarrierKind, BarrierPayoff, OptionType, PayoffTerms};
///
/// let start = Date::from_ymd(2025, 1, 1).unwrap();
/// let end = Date::from_ymd(2025, 12, 31).unwrap();
/// let ko = BarrierPayoff::new(PayoffTerms::new("WTI", end), BarrierKind::KnockOut, BarrierDirection::Up, 120.0, start, end)
///     .with_vanilla(OptionType::Call, 100.0, end);
/// assert_eq!(ko.kind(), BarrierKind::KnockOut);
/// ```
#[derive(Debug, Clone)]
pub struct BarrierPayoff {
    terms: PayoffTerms,
    kind: BarrierKind,
    direction: BarrierDirection,
    level: f64,
    upper: Option<f64>,
    rebate: f64,
    vanilla: Option<Vanilla>,
    window_start: Date,
    window_end: Date,
    observation_days: Option<i64>,
    window: Range<usize>,
}

impl BarrierPayoff {
    /// Barrier at `level`, monitored over `[window_start, window_end]`.
    ///
    /// For [`BarrierKind::DoubleNoTouch`] `level` is the lower barrier and
    /// the upper one is set with [`with_upper`](Self::with_upper).
    pub fn new(
        terms: PayoffTerms,
        kind: BarrierKind,
        direction: BarrierDirection,
        level: f64,
        window_start: Date,
        window_end: Date,
    ) -> Self {
        Self {
            terms,
            kind,
            direction,
            level,
            upper: None,
            rebate: 1.0,
            vanilla: None,
            window_start,
            window_end,
            observation_days: None,
            window: 0..0,
        }
    }

    /// Underlying vanilla for knock-in and knock-out.
    pub fn with_vanilla(mut self, option: OptionType, strike: f64, expiry: Date) -> Self {
        self.vanilla = Some(Vanilla {
            option,
            strike,
            expiry,
            expiry_index: 0,
        });
        self
    }

    /// Upper barrier of a double-no-touch.
    pub fn with_upper(mut self, upper: f64) -> Self {
        self.upper = Some(upper);
        self
    }

    /// Digital amount; defaults to one.
    pub fn with_rebate(mut self, rebate: f64) -> Self {
        self.rebate = rebate;
        self
    }

    /// Adds an observation date every `days` across the window.
    pub fn with_observation_days(mut self, days: i64) -> Self {
        self.observation_days = Some(days);
        self
    }

    /// Barrier kind.
    pub fn kind(&self) -> BarrierKind {
        self.kind
    }

    /// Shared terms.
    pub fn terms(&self) -> &PayoffTerms {
        &self.terms
    }

    pub(crate) fn setup(&mut self, ctx: &mut SimulationContext) -> SimulationResult<()> {
        match self.kind {
            BarrierKind::KnockIn | BarrierKind::KnockOut if self.vanilla.is_none() => {
                return Err(SimulationError::UnsupportedProduct(format!(
                    "{:?} barrier on {} without an underlying option",
                    self.kind, self.terms.asset
                )));
            }
            BarrierKind::DoubleNoTouch => match self.upper {
                Some(upper) if upper > self.level => {}
                _ => {
                    return Err(SimulationError::UnsupportedProduct(format!(
                        "double-no-touch on {} needs an upper barrier above {}",
                        self.terms.asset, self.level
                    )))
                }
            },
            _ => {}
        }
        if self.window_end < self.window_start {
            return Err(SimulationError::InvalidConfig(format!(
                "barrier window on {} ends before it starts",
                self.terms.asset
            )));
        }

        self.terms.setup(ctx)?;
        ctx.add_date(self.window_start)?;
        ctx.add_date(self.window_end)?;
        if let Some(days) = self.observation_days {
            ctx.add_date_range(self.window_start, self.window_end, days)?;
        }
        if let Some(vanilla) = &self.vanilla {
            ctx.add_date(vanilla.expiry)?;
        }
        Ok(())
    }

    pub(crate) fn finish(&mut self, ctx: &SimulationContext) -> SimulationResult<()> {
        self.terms.finish(ctx)?;
        self.window = ctx.grid().steps_between(self.window_start, self.window_end)?;
        if let Some(vanilla) = self.vanilla.as_mut() {
            vanilla.expiry_index = ctx.date_index(vanilla.expiry)?;
        }
        Ok(())
    }

    /// 1.0 on lanes where a barrier was touched.
    fn touched(&self, path: &[Lane]) -> Lane {
        let observed = &path[self.window.clone()];
        let lo = observed.iter().fold(splat(f64::INFINITY), |m, &x| m.min(x));
        let hi = observed.iter().fold(splat(f64::NEG_INFINITY), |m, &x| m.max(x));
        let (lo, hi) = (lo.to_array(), hi.to_array());
        let level = self.level;
        let upper = self.upper.unwrap_or(f64::INFINITY);
        let hit = |k: usize| match (self.kind, self.direction) {
            (BarrierKind::DoubleNoTouch, _) => lo[k] <= level || hi[k] >= upper,
            (_, BarrierDirection::Up) => hi[k] >= level,
            (_, BarrierDirection::Down) => lo[k] <= level,
        };
        Lane::from(std::array::from_fn::<f64, LANES, _>(|k| if hit(k) { 1.0 } else { 0.0 }))
    }

    pub(crate) fn evaluate(
        &self,
        block: &PathBlock,
        values: &mut [f64],
        exercise: &mut [i32],
    ) -> SimulationResult<()> {
        let one = splat(1.0);
        let rebate = splat(self.rebate);
        for batch in 0..block.n_batches() {
            let path = self.terms.asset_path(block, batch);
            let touched = self.touched(path);
            let vanilla = || match &self.vanilla {
                Some(v) => Ok(v.option.intrinsic(path[v.expiry_index], splat(v.strike))),
                None => Err(SimulationError::UnsupportedProduct(format!(
                    "{:?} barrier without an underlying option",
                    self.kind
                ))),
            };
            let payoff = match self.kind {
                BarrierKind::KnockIn => vanilla()? * touched,
                BarrierKind::KnockOut => vanilla()? * (one - touched),
                BarrierKind::OneTouch => rebate * touched,
                BarrierKind::NoTouch | BarrierKind::DoubleNoTouch => rebate * (one - touched),
            };
            store(values, batch, self.terms.settle(block, batch, payoff));
            store_exercise(exercise, batch, paid_flags(touched));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricer_core::types::DayCountConvention;

    struct Fixture {
        ctx: SimulationContext,
        start: Date,
        end: Date,
    }

    fn fixture() -> Fixture {
        let start = Date::from_ymd(2025, 1, 1).unwrap();
        let end = start.add_days(3);
        Fixture {
            ctx: SimulationContext::new(start, DayCountConvention::ActualActual365),
            start,
            end,
        }
    }

    fn block_with(ctx: &SimulationContext, steps: [[f64; 4]; 4]) -> PathBlock {
        let mut block = PathBlock::new(4, ctx.n_steps(), ctx.n_factors(), 0);
        for (i, lanes) in steps.iter().enumerate() {
            block.path_mut(0, 0)[i] = Lane::from(*lanes);
        }
        block
    }

    const PATHS: [[f64; 4]; 4] = [
        [100.0, 100.0, 100.0, 100.0],
        [110.0, 95.0, 125.0, 80.0],
        [115.0, 105.0, 118.0, 85.0],
        [112.0, 90.0, 110.0, 95.0],
    ];

    fn run(payoff: &mut BarrierPayoff, f: &mut Fixture) -> (Vec<f64>, Vec<i32>) {
        payoff.setup(&mut f.ctx).unwrap();
        f.ctx.add_date_range(f.start, f.end, 1).unwrap();
        f.ctx.freeze();
        payoff.finish(&f.ctx).unwrap();
        let block = block_with(&f.ctx, PATHS);
        let mut values = vec![0.0; 4];
        let mut exercise = vec![0; 4];
        payoff.evaluate(&block, &mut values, &mut exercise).unwrap();
        (values, exercise)
    }

    #[test]
    fn test_knock_out_plus_knock_in_is_vanilla() {
        let mut f = fixture();
        let terms = PayoffTerms::new("X", f.end);
        let mut ki = BarrierPayoff::new(terms.clone(), BarrierKind::KnockIn, BarrierDirection::Up, 120.0, f.start, f.end)
            .with_vanilla(OptionType::Call, 100.0, f.end);
        let (ki_values, touched) = run(&mut ki, &mut f);

        let mut f = fixture();
        let mut ko = BarrierPayoff::new(terms, BarrierKind::KnockOut, BarrierDirection::Up, 120.0, f.start, f.end)
            .with_vanilla(OptionType::Call, 100.0, f.end);
        let (ko_values, _) = run(&mut ko, &mut f);

        assert_eq!(touched, vec![-1, -1, 0, -1]);
        let vanilla = [12.0, 0.0, 10.0, 0.0];
        for i in 0..4 {
            assert_eq!(ki_values[i] + ko_values[i], vanilla[i]);
        }
        assert_eq!(ki_values[2], 10.0);
    }

    #[test]
    fn test_touch_and_no_touch_sum_to_rebate() {
        let mut f = fixture();
        let terms = PayoffTerms::new("X", f.end);
        let mut touch = BarrierPayoff::new(terms.clone(), BarrierKind::OneTouch, BarrierDirection::Down, 90.0, f.start, f.end)
            .with_rebate(5.0);
        let (touch_values, _) = run(&mut touch, &mut f);
        let mut f = fixture();
        let mut no_touch = BarrierPayoff::new(terms, BarrierKind::NoTouch, BarrierDirection::Down, 90.0, f.start, f.end)
            .with_rebate(5.0);
        let (no_touch_values, _) = run(&mut no_touch, &mut f);

        assert_eq!(touch_values, vec![0.0, 5.0, 0.0, 5.0]);
        for i in 0..4 {
            assert_eq!(touch_values[i] + no_touch_values[i], 5.0);
        }
    }

    #[test]
    fn test_double_no_touch() {
        let mut f = fixture();
        let mut dnt = BarrierPayoff::new(
            PayoffTerms::new("X", f.end),
            BarrierKind::DoubleNoTouch,
            BarrierDirection::Down,
            85.0,
            f.start,
            f.end,
        )
        .with_upper(120.0);
        let (values, _) = run(&mut dnt, &mut f);
        assert_eq!(values, vec![1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_missing_terms_are_unsupported() {
        let mut f = fixture();
        let mut ko = BarrierPayoff::new(PayoffTerms::new("X", f.end), BarrierKind::KnockOut, BarrierDirection::Up, 1.0, f.start, f.end);
        assert!(matches!(ko.setup(&mut f.ctx), Err(SimulationError::UnsupportedProduct(_))));
        let mut dnt = BarrierPayoff::new(PayoffTerms::new("X", f.end), BarrierKind::DoubleNoTouch, BarrierDirection::Up, 1.0, f.start, f.end);
        assert!(matches!(dnt.setup(&mut f.ctx), Err(SimulationError::UnsupportedProduct(_))));
    }
}
