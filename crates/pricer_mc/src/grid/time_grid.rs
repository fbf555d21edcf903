//! Simulation time grid.

use crate::error::{SimulationError, SimulationResult};
use pricer_core::types::{Date, DayCountConvention};
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;

/// Ordered, deduplicated set of simulation dates.
///
/// Dates are collected while the grid is open. [`freeze`](Self::freeze)
/// sorts them, adds the valuation date, and precomputes per step the year
/// fraction from the valuation date, the step length and its square root.
/// Dates before the valuation date become historic steps with negative
/// time.
///
/// Step times are strictly increasing. Dates the day count maps to the
/// same year fraction (30/360 puts the 30th and the 31st together) share
/// one step, represented by the earliest of them or by the valuation date.
#[derive(Debug, Clone, Default)]
pub struct TimeGrid {
    pending: BTreeSet<Date>,
    registered: Vec<Date>,
    step_of: Vec<usize>,
    dates: Vec<Date>,
    times: Vec<f64>,
    dt: Vec<f64>,
    sqrt_dt: Vec<f64>,
    index: HashMap<Date, usize>,
    valuation_index: usize,
    frozen: bool,
}

impl TimeGrid {
    /// Empty, open grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a date. Idempotent.
    ///
    /// # Errors
    /// `GridFrozen` when the grid is frozen and the date is not already on it.
    pub fn add_date(&mut self, date: Date) -> SimulationResult<()> {
        if self.frozen {
            if self.index.contains_key(&date) {
                return Ok(());
            }
            return Err(SimulationError::GridFrozen(format!("date {}", date)));
        }
        self.pending.insert(date);
        Ok(())
    }

    /// Registers every date of `dates`.
    pub fn add_dates<I: IntoIterator<Item = Date>>(&mut self, dates: I) -> SimulationResult<()> {
        dates.into_iter().try_for_each(|d| self.add_date(d))
    }

    /// True once frozen.
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Number of registered dates (pending before freeze).
    pub fn len(&self) -> usize {
        if self.frozen {
            self.dates.len()
        } else {
            self.pending.len()
        }
    }

    /// True when no date is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorts the dates and computes times and step lengths.
    ///
    /// Freezing twice is a no-op.
    pub fn freeze(&mut self, valuation_date: Date, day_count: DayCountConvention) {
        if self.frozen {
            return;
        }
        self.pending.insert(valuation_date);
        self.registered = std::mem::take(&mut self.pending).into_iter().collect();
        self.step_of = Vec::with_capacity(self.registered.len());
        self.dates = Vec::with_capacity(self.registered.len());
        self.times = Vec::with_capacity(self.registered.len());

        for &date in &self.registered {
            let t = day_count.year_fraction(valuation_date, date);
            match self.times.last() {
                Some(&last) if t <= last => {
                    let step = self.times.len() - 1;
                    if date == valuation_date {
                        self.dates[step] = date;
                        self.times[step] = 0.0;
                    }
                }
                _ => {
                    self.dates.push(date);
                    self.times.push(t);
                }
            }
            self.step_of.push(self.times.len() - 1);
        }

        self.dt = Vec::with_capacity(self.times.len());
        self.dt.push(0.0);
        self.dt
            .extend(self.times.windows(2).map(|w| w[1] - w[0]));
        self.sqrt_dt = self.dt.iter().map(|dt| dt.max(0.0).sqrt()).collect();

        self.index = self
            .registered
            .iter()
            .copied()
            .zip(self.step_of.iter().copied())
            .collect();
        self.valuation_index = self.index.get(&valuation_date).copied().unwrap_or(0);
        self.frozen = true;
    }

    /// Number of distinct dates registered, which exceeds [`len`](Self::len)
    /// when some of them share a step.
    pub fn n_registered(&self) -> usize {
        if self.frozen {
            self.registered.len()
        } else {
            self.pending.len()
        }
    }

    fn ensure_frozen(&self) -> SimulationResult<()> {
        if self.frozen {
            Ok(())
        } else {
            Err(SimulationError::GridNotFrozen)
        }
    }

    /// Step index of `date`.
    ///
    /// # Errors
    /// `GridNotFrozen` before freeze, `UnknownDate` for unregistered dates.
    pub fn date_index(&self, date: Date) -> SimulationResult<usize> {
        self.ensure_frozen()?;
        self.index
            .get(&date)
            .copied()
            .ok_or(SimulationError::UnknownDate(date))
    }

    /// Step indices of `dates`, in the order given.
    pub fn date_indices(&self, dates: &[Date]) -> SimulationResult<Vec<usize>> {
        dates.iter().map(|&d| self.date_index(d)).collect()
    }

    /// Steps holding a registered date in `[start, end]`.
    pub fn steps_between(&self, start: Date, end: Date) -> SimulationResult<Range<usize>> {
        self.ensure_frozen()?;
        let lo = self.registered.partition_point(|&d| d < start);
        let hi = self.registered.partition_point(|&d| d <= end);
        if hi <= lo {
            let step = self.step_of.get(lo).copied().unwrap_or(self.dates.len());
            return Ok(step..step);
        }
        Ok(self.step_of[lo]..self.step_of[hi - 1] + 1)
    }

    /// Step of the valuation date (0 before freeze).
    #[inline]
    pub fn valuation_index(&self) -> usize {
        self.valuation_index
    }

    /// Representative date of each step.
    #[inline]
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Year fractions from the valuation date.
    #[inline]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Step lengths; `dt[0] = 0`.
    #[inline]
    pub fn dt(&self) -> &[f64] {
        &self.dt
    }

    /// Square roots of the step lengths.
    #[inline]
    pub fn sqrt_dt(&self) -> &[f64] {
        &self.sqrt_dt
    }

    /// Date of step `i`.
    #[inline]
    pub fn date(&self, i: usize) -> Date {
        self.dates[i]
    }

    /// Time of step `i`.
    #[inline]
    pub fn time(&self, i: usize) -> f64 {
        self.times[i]
    }
}
