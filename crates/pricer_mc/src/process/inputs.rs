//! Market inputs and date schedules shared by the generators.

use super::calibration::{ForwardCalibration, QuantoAdjustment};
use crate::error::SimulationResult;
use crate::grid::SimulationContext;
use pricer_core::market_data::{ForwardCurve, PastFixings, VolatilitySurface};
use pricer_core::types::Date;
use std::fmt;
use std::sync::Arc;

/// Forward curve, volatility surface, optional quanto adjustment and past
/// fixings for one asset.
///
/// ```
/// use pricer_core::market_data::{FlatForward, FlatVol};
/// use pricer_mc::process::MarketInputs;
/// use std::sync::Arc;
///
/// let inputs = MarketInputs::new(Arc::new(FlatForward::new(80.0)), Arc::new(FlatVol::new(0.3)));
/// assert!(inputs.fixings.is_empty());
/// ```
#[derive(Clone)]
pub struct MarketInputs {
    /// Forward price as a function of time.
    pub forward: Arc<dyn ForwardCurve>,
    /// Volatility surface.
    pub vol: Arc<dyn VolatilitySurface>,
    /// Quanto drift adjustment.
    pub quanto: Option<QuantoAdjustment>,
    /// Realised fixings up to the valuation date.
    pub fixings: PastFixings,
}

impl MarketInputs {
    /// Inputs without quanto adjustment or fixings.
    pub fn new(forward: Arc<dyn ForwardCurve>, vol: Arc<dyn VolatilitySurface>) -> Self {
        Self {
            forward,
            vol,
            quanto: None,
            fixings: PastFixings::new(),
        }
    }

    /// Adds a quanto adjustment.
    pub fn with_quanto(mut self, quanto: QuantoAdjustment) -> Self {
        self.quanto = Some(quanto);
        self
    }

    /// Sets the past fixings.
    pub fn with_fixings(mut self, fixings: PastFixings) -> Self {
        self.fixings = fixings;
        self
    }

    /// Calibrates `name` on the frozen grid.
    pub fn calibrate(
        &self,
        ctx: &SimulationContext,
        name: &str,
    ) -> SimulationResult<ForwardCalibration> {
        ForwardCalibration::build(
            ctx,
            name,
            self.forward.as_ref(),
            self.vol.as_ref(),
            self.quanto.as_ref(),
            &self.fixings,
        )
    }
}

impl fmt::Debug for MarketInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketInputs")
            .field("quanto", &self.quanto)
            .field("fixings", &self.fixings.len())
            .finish_non_exhaustive()
    }
}

/// Hyperbolic cosine spacing from the valuation date to `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoshSpacing {
    /// Last date.
    pub end: Date,
    /// Number of intervals.
    pub steps: usize,
    /// Concentration towards `end`.
    pub concentration: f64,
}

/// Dates a generator declares during setup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    dates: Vec<Date>,
    ranges: Vec<(Date, Date, i64)>,
    cosh: Option<CoshSpacing>,
}

impl Schedule {
    /// Empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds explicit dates.
    pub fn with_dates<I: IntoIterator<Item = Date>>(mut self, dates: I) -> Self {
        self.dates.extend(dates);
        self
    }

    /// Adds every `step_days`-th date from `start` to `end`.
    pub fn with_date_range(mut self, start: Date, end: Date, step_days: i64) -> Self {
        self.ranges.push((start, end, step_days));
        self
    }

    /// Adds `steps` cosh-spaced intervals from the valuation date to `end`.
    pub fn with_cosh_spacing(mut self, end: Date, steps: usize, concentration: f64) -> Self {
        self.cosh = Some(CoshSpacing {
            end,
            steps,
            concentration,
        });
        self
    }

    /// Declares every date on the open context.
    pub fn declare(&self, ctx: &mut SimulationContext) -> SimulationResult<()> {
        ctx.add_dates(self.dates.iter().copied())?;
        for &(start, end, step) in &self.ranges {
            ctx.add_date_range(start, end, step)?;
        }
        if let Some(c) = self.cosh {
            ctx.add_cosh_spaced_dates(ctx.valuation_date(), c.end, c.steps, c.concentration)?;
        }
        Ok(())
    }
}
