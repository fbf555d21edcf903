//! Simulation context: time grid plus dimension registry.

use super::registry::DimensionRegistry;
use super::spacing::cosh_spaced_dates;
use super::time_grid::TimeGrid;
use crate::error::{SimulationError, SimulationResult};
use pricer_core::types::{Date, DayCountConvention};
use tracing::info;

/// Run-scoped context passed into every setup, finish and process call.
///
/// Two phases: while open, processes and payoffs declare dates and factor
/// names; [`freeze`](Self::freeze) then fixes the grid and the registry and
/// enables index lookups.
///
/// ```
/// use pricer_mc::grid::SimulationContext;
/// use pricer_core::types::{Date, DayCountConvention};
///
/// let today = Date::from_ymd(2025, 1, 2).unwrap();
/// let mut ctx = SimulationContext::new(today, DayCountConvention::ActualActual365);
/// let dim = ctx.add_dimension("COPPER").unwrap();
/// ctx.add_date(Date::from_ymd(2025, 7, 2).unwrap()).unwrap();
/// ctx.freeze();
///
/// assert_eq!(ctx.dimension("COPPER").unwrap(), dim);
/// assert_eq!(ctx.n_steps(), 2);
/// assert_eq!(ctx.date_index(today).unwrap(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct SimulationContext {
    valuation_date: Date,
    day_count: DayCountConvention,
    grid: TimeGrid,
    registry: DimensionRegistry,
}

impl SimulationContext {
    /// Open context for a run valued on `valuation_date`.
    pub fn new(valuation_date: Date, day_count: DayCountConvention) -> Self {
        Self {
            valuation_date,
            day_count,
            grid: TimeGrid::new(),
            registry: DimensionRegistry::new(),
        }
    }

    /// Valuation date (time zero).
    #[inline]
    pub fn valuation_date(&self) -> Date {
        self.valuation_date
    }

    /// Day count used for grid times.
    #[inline]
    pub fn day_count(&self) -> DayCountConvention {
        self.day_count
    }

    /// Signed year fraction from the valuation date to `date`.
    #[inline]
    pub fn year_fraction(&self, date: Date) -> f64 {
        self.day_count.year_fraction(self.valuation_date, date)
    }

    /// Registers a simulation date.
    pub fn add_date(&mut self, date: Date) -> SimulationResult<()> {
        self.grid.add_date(date)
    }

    /// Registers several simulation dates.
    pub fn add_dates<I: IntoIterator<Item = Date>>(&mut self, dates: I) -> SimulationResult<()> {
        self.grid.add_dates(dates)
    }

    /// Registers every `step_days`-th date from `start` up to `end`, plus `end`.
    pub fn add_date_range(&mut self, start: Date, end: Date, step_days: i64) -> SimulationResult<()> {
        if step_days <= 0 {
            return Err(SimulationError::InvalidConfig(format!(
                "date range step must be positive, got {}",
                step_days
            )));
        }
        let mut date = start;
        while date < end {
            self.grid.add_date(date)?;
            date = date.add_days(step_days);
        }
        self.grid.add_date(end)
    }

    /// Registers `n + 1` dates from `start` to `end` concentrated towards `end`.
    pub fn add_cosh_spaced_dates(
        &mut self,
        start: Date,
        end: Date,
        n: usize,
        concentration: f64,
    ) -> SimulationResult<()> {
        self.grid.add_dates(cosh_spaced_dates(start, end, n, concentration))
    }

    /// Index of `name`, registering it if new.
    pub fn add_dimension(&mut self, name: &str) -> SimulationResult<usize> {
        self.registry.add_dimension(name)
    }

    /// Index of a registered factor.
    pub fn dimension(&self, name: &str) -> SimulationResult<usize> {
        self.registry.dimension(name)
    }

    /// Step index of a registered date.
    pub fn date_index(&self, date: Date) -> SimulationResult<usize> {
        self.grid.date_index(date)
    }

    /// Freezes grid and registry. Idempotent.
    pub fn freeze(&mut self) {
        if self.is_frozen() {
            return;
        }
        self.grid.freeze(self.valuation_date, self.day_count);
        self.registry.freeze();
        info!(
            valuation_date = %self.valuation_date,
            steps = self.grid.len(),
            dates = self.grid.n_registered(),
            dimensions = self.registry.len(),
            "simulation context frozen"
        );
    }

    /// True once frozen.
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.grid.is_frozen()
    }

    /// The time grid.
    #[inline]
    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    /// The dimension registry.
    #[inline]
    pub fn registry(&self) -> &DimensionRegistry {
        &self.registry
    }

    /// Number of grid steps.
    #[inline]
    pub fn n_steps(&self) -> usize {
        self.grid.len()
    }

    /// Number of registered factors.
    #[inline]
    pub fn n_factors(&self) -> usize {
        self.registry.len()
    }

    /// Step of the valuation date.
    #[inline]
    pub fn valuation_index(&self) -> usize {
        self.grid.valuation_index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_range_includes_end() {
        let start = Date::from_ymd(2025, 1, 1).unwrap();
        let end = start.add_days(10);
        let mut ctx = SimulationContext::new(start, DayCountConvention::ActualActual365);
        ctx.add_date_range(start, end, 4).unwrap();
        ctx.freeze();
        let offsets: Vec<i64> = ctx.grid().dates().iter().map(|&d| d - start).collect();
        assert_eq!(offsets, vec![0, 4, 8, 10]);
    }

    #[test]
    fn test_declarations_after_freeze_fail() {
        let start = Date::from_ymd(2025, 1, 1).unwrap();
        let mut ctx = SimulationContext::new(start, DayCountConvention::ActualActual365);
        ctx.freeze();
        assert!(ctx.add_dimension("X").is_err());
        assert!(ctx.add_date(start.add_days(1)).is_err());
    }

    #[test]
    fn test_bad_range_step() {
        let start = Date::from_ymd(2025, 1, 1).unwrap();
        let mut ctx = SimulationContext::new(start, DayCountConvention::ActualActual365);
        assert!(matches!(
            ctx.add_date_range(start, start.add_days(5), 0),
            Err(SimulationError::InvalidConfig(_))
        ));
    }
}
