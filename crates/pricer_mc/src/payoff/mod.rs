//! Payoff evaluators and result aggregation.
//!
//! A payoff follows the process lifecycle: it declares its dates and
//! factors in `setup`, resolves grid indices in `finish`, and then reads
//! finished factor paths block by block, writing one value and one exercise
//! index per path into a slice of the run's result arena.
//!
//! Regression-based payoffs additionally need a `train` pass over an
//! independent set of paths before any block is priced. The fitted
//! [`LinearEstimator`] is immutable afterwards.

mod asian;
mod back_pricing;
mod barrier;
mod correlation_diag;
mod european;
mod lookback;
mod multi_period;
mod regression;
mod results;
mod terms;

pub use asian::AsianPayoff;
pub use back_pricing::{BackPricingPayoff, ScaleOverlay};
pub use barrier::{BarrierDirection, BarrierKind, BarrierPayoff};
pub use correlation_diag::CorrelationDiagnostic;
pub use european::EuropeanPayoff;
pub use lookback::{LookbackPayoff, SettlementLevel};
pub use multi_period::{MultiPeriodBackPricingPayoff, PeriodChoice};
pub use regression::LinearEstimator;
pub use results::{CashFlow, ExposureKey, ExposureLedger, PayoffResults};
pub use terms::{OptionType, PayoffTerms, BASE_CURRENCY};

use crate::block::PathBlock;
use crate::error::SimulationResult;
use crate::grid::SimulationContext;
use pricer_core::types::Date;

/// Closed set of payoffs, dispatched by `match`.
#[derive(Debug, Clone)]
pub enum Payoff {
    /// Single-date vanilla.
    European(EuropeanPayoff),
    /// Arithmetic average.
    Asian(AsianPayoff),
    /// Barrier, touch and double-no-touch.
    Barrier(BarrierPayoff),
    /// Rolling-window lookback.
    Lookback(LookbackPayoff),
    /// Back-pricing over one period.
    BackPricing(BackPricingPayoff),
    /// Back-pricing over several candidate periods.
    MultiPeriodBackPricing(MultiPeriodBackPricingPayoff),
    /// Realised correlation, not a monetary value.
    CorrelationDiagnostic(CorrelationDiagnostic),
}

impl Payoff {
    /// Result label.
    pub fn name(&self) -> &str {
        match self.terms() {
            Ok(terms) => terms.label(),
            Err(diag) => diag.label(),
        }
    }

    /// Shared terms, or the diagnostic for the one payoff without any.
    fn terms(&self) -> Result<&PayoffTerms, &CorrelationDiagnostic> {
        match self {
            Payoff::European(p) => Ok(p.terms()),
            Payoff::Asian(p) => Ok(p.terms()),
            Payoff::Barrier(p) => Ok(p.terms()),
            Payoff::Lookback(p) => Ok(p.terms()),
            Payoff::BackPricing(p) => Ok(p.terms()),
            Payoff::MultiPeriodBackPricing(p) => Ok(p.terms()),
            Payoff::CorrelationDiagnostic(p) => Err(p),
        }
    }

    /// Payment date, or the end of the window for diagnostics.
    pub fn settlement_date(&self) -> Date {
        match self.terms() {
            Ok(terms) => terms.settlement_date,
            Err(diag) => diag.end_date(),
        }
    }

    /// Settlement currency; empty for diagnostics.
    pub fn currency(&self) -> &str {
        self.terms().map_or("", |t| t.currency.as_str())
    }

    /// False for diagnostics, whose values are not money.
    pub fn is_monetary(&self) -> bool {
        self.terms().is_ok()
    }

    /// Declares dates and factors on the open context.
    pub fn setup(&mut self, ctx: &mut SimulationContext) -> SimulationResult<()> {
        match self {
            Payoff::European(p) => p.setup(ctx),
            Payoff::Asian(p) => p.setup(ctx),
            Payoff::Barrier(p) => p.setup(ctx),
            Payoff::Lookback(p) => p.setup(ctx),
            Payoff::BackPricing(p) => p.setup(ctx),
            Payoff::MultiPeriodBackPricing(p) => p.setup(ctx),
            Payoff::CorrelationDiagnostic(p) => p.setup(ctx),
        }
    }

    /// Resolves indices on the frozen context.
    pub fn finish(&mut self, ctx: &SimulationContext) -> SimulationResult<()> {
        match self {
            Payoff::European(p) => p.finish(ctx),
            Payoff::Asian(p) => p.finish(ctx),
            Payoff::Barrier(p) => p.finish(ctx),
            Payoff::Lookback(p) => p.finish(ctx),
            Payoff::BackPricing(p) => p.finish(ctx),
            Payoff::MultiPeriodBackPricing(p) => p.finish(ctx),
            Payoff::CorrelationDiagnostic(p) => p.finish(ctx),
        }
    }

    /// True while a regression estimator is still unfitted.
    pub fn needs_training(&self) -> bool {
        match self {
            Payoff::BackPricing(p) => p.needs_training(),
            Payoff::MultiPeriodBackPricing(p) => p.needs_training(),
            _ => false,
        }
    }

    /// Fits regression estimators on training blocks.
    pub fn train(&mut self, blocks: &[PathBlock]) -> SimulationResult<()> {
        match self {
            Payoff::BackPricing(p) => p.train(blocks),
            Payoff::MultiPeriodBackPricing(p) => p.train(blocks),
            _ => Ok(()),
        }
    }

    /// Writes one value and one exercise index per path of `block`.
    ///
    /// `values` and `exercise` are the block's slices of the result arena.
    pub fn evaluate(
        &self,
        block: &PathBlock,
        values: &mut [f64],
        exercise: &mut [i32],
    ) -> SimulationResult<()> {
        match self {
            Payoff::European(p) => p.evaluate(block, values, exercise),
            Payoff::Asian(p) => p.evaluate(block, values, exercise),
            Payoff::Barrier(p) => p.evaluate(block, values, exercise),
            Payoff::Lookback(p) => p.evaluate(block, values, exercise),
            Payoff::BackPricing(p) => p.evaluate(block, values, exercise),
            Payoff::MultiPeriodBackPricing(p) => p.evaluate(block, values, exercise),
            Payoff::CorrelationDiagnostic(p) => p.evaluate(block, values, exercise),
        }
    }
}

macro_rules! impl_from_payoff {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Payoff {
                fn from(p: $ty) -> Self {
                    Payoff::$variant(p)
                }
            }
        )*
    };
}

impl_from_payoff! {
    European => EuropeanPayoff,
    Asian => AsianPayoff,
    Barrier => BarrierPayoff,
    Lookback => LookbackPayoff,
    BackPricing => BackPricingPayoff,
    MultiPeriodBackPricing => MultiPeriodBackPricingPayoff,
    CorrelationDiagnostic => CorrelationDiagnostic,
}
