//! Discount factor sources for payoff present values.

use super::error::MarketDataError;
use crate::types::{Date, DayCountConvention};
use std::collections::HashMap;

/// Discount factor lookup by curve (or currency) name.
///
/// Consulted only when deriving cash flows from payoff results, never
/// during path evolution.
pub trait DiscountSource: Send + Sync {
    /// Discount factor on `curve` from `start` to `end`.
    ///
    /// # Errors
    /// `MarketDataError::MissingCurve` when the curve is unknown.
    fn discount_factor(&self, curve: &str, start: Date, end: Date) -> Result<f64, MarketDataError>;
}

/// Continuously compounded flat rates per curve.
///
/// ```
/// use pricer_core::market_data::{DiscountSource, FlatDiscount};
/// use pricer_core::types::Date;
///
/// let curves = FlatDiscount::new().with_rate("USD", 0.05);
/// let start = Date::from_ymd(2025, 1, 1).unwrap();
/// let end = Date::from_ymd(2026, 1, 1).unwrap();
/// let df = curves.discount_factor("USD", start, end).unwrap();
/// assert!((df - (-0.05_f64).exp()).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FlatDiscount {
    rates: HashMap<String, f64>,
    day_count: DayCountConvention,
}

impl FlatDiscount {
    /// Empty set of curves on ACT/365.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a flat rate for `curve`.
    pub fn with_rate(mut self, curve: &str, rate: f64) -> Self {
        self.rates.insert(curve.to_string(), rate);
        self
    }

    /// Sets the day count used for year fractions.
    pub fn with_day_count(mut self, day_count: DayCountConvention) -> Self {
        self.day_count = day_count;
        self
    }
}

impl DiscountSource for FlatDiscount {
    fn discount_factor(&self, curve: &str, start: Date, end: Date) -> Result<f64, MarketDataError> {
        let rate = self
            .rates
            .get(curve)
            .ok_or_else(|| MarketDataError::MissingCurve(curve.to_string()))?;
        let t = self.day_count.year_fraction(start, end);
        Ok((-rate * t).exp())
    }
}
