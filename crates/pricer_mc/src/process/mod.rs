//! Processes that populate factor paths.
//!
//! Every process follows the same lifecycle against a shared
//! [`SimulationContext`]:
//!
//! 1. [`Process::setup`] declares dates and factor names while the context
//!    is open;
//! 2. [`Process::finish`] resolves indices and precomputes per-step arrays
//!    once the context is frozen (idempotent);
//! 3. [`Process::process`] fills one [`PathBlock`], reading only its own
//!    precomputed state and the block.
//!
//! Processes run in the order they were added. The correlation injector must
//! precede the generators whose draws it mixes, and an FX inverse must follow
//! its source pair.
//!
//! ## Variants
//!
//! | Variant | Factors written |
//! |---------|-----------------|
//! | [`CorrelationProcess`] | draws of every factor it names |
//! | [`LognormalProcess`] | `Name` |
//! | [`HestonProcess`] | `Name`, `Name~var` |
//! | [`SchwartzSmithProcess`] | `Name`, `Name~1`, `Name~2` |
//! | [`HullWhiteProcess`] | `Name` |
//! | [`FuturesRollProcess`] | `Name`, `Name~yyyyMMdd` per contract |
//! | [`FxInverseProcess`] | `FOR/DOM` |

mod calibration;
mod correlation;
mod futures_roll;
mod fx_inverse;
mod heston;
mod hull_white;
mod inputs;
mod local_vol;
mod lognormal;
mod schwartz_smith;

pub use calibration::{ForwardCalibration, QuantoAdjustment};
pub use correlation::{CorrelationModel, CorrelationProcess};
pub use futures_roll::{FuturesContract, FuturesRollProcess};
pub use fx_inverse::FxInverseProcess;
pub use heston::{HestonParams, HestonProcess};
pub use hull_white::HullWhiteProcess;
pub use inputs::{CoshSpacing, MarketInputs, Schedule};
pub use local_vol::LocalVolTable;
pub use lognormal::LognormalProcess;
pub use schwartz_smith::{SchwartzSmithParams, SchwartzSmithProcess};

use crate::block::PathBlock;
use crate::error::SimulationResult;
use crate::grid::SimulationContext;

/// Closed set of path processes, dispatched by `match`.
#[derive(Debug, Clone)]
pub enum Process {
    /// Cholesky correlation of factor draws.
    Correlation(CorrelationProcess),
    /// Lognormal generator, ATM or local volatility.
    Lognormal(LognormalProcess),
    /// Heston stochastic volatility.
    Heston(HestonProcess),
    /// Two-factor Schwartz–Smith.
    SchwartzSmith(SchwartzSmithProcess),
    /// Hull–White commodity forward.
    HullWhite(HullWhiteProcess),
    /// Dated futures contracts with a stitched spot.
    FuturesRoll(FuturesRollProcess),
    /// Reciprocal of an FX pair.
    FxInverse(FxInverseProcess),
}

impl Process {
    /// Name of the factor (or correlation set) the process drives.
    pub fn name(&self) -> &str {
        match self {
            Process::Correlation(p) => p.name(),
            Process::Lognormal(p) => p.name(),
            Process::Heston(p) => p.name(),
            Process::SchwartzSmith(p) => p.name(),
            Process::HullWhite(p) => p.name(),
            Process::FuturesRoll(p) => p.name(),
            Process::FxInverse(p) => p.name(),
        }
    }

    /// Declares dates and factors on the open context.
    pub fn setup(&mut self, ctx: &mut SimulationContext) -> SimulationResult<()> {
        match self {
            Process::Correlation(p) => p.setup(ctx),
            Process::Lognormal(p) => p.setup(ctx),
            Process::Heston(p) => p.setup(ctx),
            Process::SchwartzSmith(p) => p.setup(ctx),
            Process::HullWhite(p) => p.setup(ctx),
            Process::FuturesRoll(p) => p.setup(ctx),
            Process::FxInverse(p) => p.setup(ctx),
        }
    }

    /// Resolves indices and precomputes calibration on the frozen context.
    ///
    /// A second call on a complete process is a no-op.
    pub fn finish(&mut self, ctx: &SimulationContext) -> SimulationResult<()> {
        if self.is_complete() {
            return Ok(());
        }
        match self {
            Process::Correlation(p) => p.finish(ctx),
            Process::Lognormal(p) => p.finish(ctx),
            Process::Heston(p) => p.finish(ctx),
            Process::SchwartzSmith(p) => p.finish(ctx),
            Process::HullWhite(p) => p.finish(ctx),
            Process::FuturesRoll(p) => p.finish(ctx),
            Process::FxInverse(p) => p.finish(ctx),
        }
    }

    /// True once `finish` has succeeded.
    pub fn is_complete(&self) -> bool {
        match self {
            Process::Correlation(p) => p.is_complete(),
            Process::Lognormal(p) => p.is_complete(),
            Process::Heston(p) => p.is_complete(),
            Process::SchwartzSmith(p) => p.is_complete(),
            Process::HullWhite(p) => p.is_complete(),
            Process::FuturesRoll(p) => p.is_complete(),
            Process::FxInverse(p) => p.is_complete(),
        }
    }

    /// Fills the process's factors (or draws) for one block.
    pub fn process(&self, block: &mut PathBlock) -> SimulationResult<()> {
        match self {
            Process::Correlation(p) => p.process(block),
            Process::Lognormal(p) => p.process(block),
            Process::Heston(p) => p.process(block),
            Process::SchwartzSmith(p) => p.process(block),
            Process::HullWhite(p) => p.process(block),
            Process::FuturesRoll(p) => p.process(block),
            Process::FxInverse(p) => p.process(block),
        }
    }
}

macro_rules! impl_from_process {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Process {
                fn from(p: $ty) -> Self {
                    Process::$variant(p)
                }
            }
        )*
    };
}

impl_from_process! {
    Correlation => CorrelationProcess,
    Lognormal => LognormalProcess,
    Heston => HestonProcess,
    SchwartzSmith => SchwartzSmithProcess,
    HullWhite => HullWhiteProcess,
    FuturesRoll => FuturesRollProcess,
    FxInverse => FxInverseProcess,
}

/// Error for a process used before `finish`.
pub(crate) fn not_finished(name: &str) -> crate::error::SimulationError {
    crate::error::SimulationError::InvalidConfig(format!(
        "process {} used before finish",
        name
    ))
}
