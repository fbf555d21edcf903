//! Per-path payoff results and their aggregates.

use crate::error::SimulationResult;
use pricer_core::market_data::DiscountSource;
use pricer_core::types::Date;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// One payment derived from a payoff's results.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CashFlow {
    /// Payment date.
    pub date: Date,
    /// Mean payoff before discounting.
    pub undiscounted: f64,
    /// Discount factor from the valuation date to the payment date.
    pub discount_factor: f64,
    /// `undiscounted · discount_factor`.
    pub present_value: f64,
}

/// Results of one payoff over the full path population.
///
/// `values` and `exercise` are indexed by global path number; each block
/// writes its own disjoint slice.
///
/// ```
/// use pricer_core::types::Date;
/// use pricer_mc::payoff::PayoffResults;
///
/// let date = Date::from_ymd(2025, 6, 30).unwrap();
/// let results = PayoffResults::new("call", date, "USD", vec![1.0, 3.0, 1.0, 3.0], vec![0; 4]);
/// assert_eq!(results.mean(), 2.0);
/// assert_eq!(results.std_error(), 0.5);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PayoffResults {
    /// Payoff label.
    pub name: String,
    /// Payment date.
    pub settlement_date: Date,
    /// Settlement currency (empty for diagnostics).
    pub currency: String,
    /// Per-path values.
    pub values: Vec<f64>,
    /// Per-path exercise index, `-1` where nothing was exercised.
    pub exercise: Vec<i32>,
}

impl PayoffResults {
    /// Wraps filled arrays.
    pub fn new(
        name: &str,
        settlement_date: Date,
        currency: &str,
        values: Vec<f64>,
        exercise: Vec<i32>,
    ) -> Self {
        Self {
            name: name.to_string(),
            settlement_date,
            currency: currency.to_string(),
            values,
            exercise,
        }
    }

    /// Number of paths.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no path was simulated.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mean over every path.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return f64::NAN;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Standard error of the mean from the population standard deviation:
    /// `sqrt(Σ(x − m)² / N) / sqrt(N)`.
    pub fn std_error(&self) -> f64 {
        let n = self.values.len() as f64;
        let mean = self.mean();
        let var = self.values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        (var / n).sqrt()
    }

    /// Number of paths per exercise index.
    pub fn exercise_counts(&self) -> BTreeMap<i32, usize> {
        let mut counts = BTreeMap::new();
        for &k in &self.exercise {
            *counts.entry(k).or_insert(0) += 1;
        }
        counts
    }

    /// Mean payoff as a cash flow discounted on the settlement currency's
    /// curve.
    ///
    /// # Errors
    /// Propagates a missing discount curve.
    pub fn cash_flow(
        &self,
        discount: &dyn DiscountSource,
        valuation_date: Date,
    ) -> SimulationResult<CashFlow> {
        let undiscounted = self.mean();
        let discount_factor =
            discount.discount_factor(&self.currency, valuation_date, self.settlement_date)?;
        Ok(CashFlow {
            date: self.settlement_date,
            undiscounted,
            discount_factor,
            present_value: undiscounted * discount_factor,
        })
    }
}

/// Bucket of the exposure ledger: settlement currency, then date.
///
/// Values settling in different currencies are never summed together.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExposureKey {
    /// Settlement currency.
    pub currency: String,
    /// Settlement date.
    pub date: Date,
}

impl ExposureKey {
    /// Key for `currency` on `date`.
    pub fn new(currency: &str, date: Date) -> Self {
        Self {
            currency: currency.to_string(),
            date,
        }
    }
}

/// Expected value per settlement currency and date, accumulated across
/// blocks.
///
/// The only state blocks share; updates take a coarse lock.
#[derive(Debug)]
pub struct ExposureLedger {
    totals: Mutex<BTreeMap<ExposureKey, f64>>,
    n_paths: usize,
}

impl ExposureLedger {
    /// Empty ledger for a population of `n_paths`.
    pub fn new(n_paths: usize) -> Self {
        Self {
            totals: Mutex::new(BTreeMap::new()),
            n_paths,
        }
    }

    /// Adds a block's summed payoff settling in `currency` on `date`.
    pub fn add(&self, currency: &str, date: Date, sum: f64) {
        let mut totals = self.totals.lock().unwrap_or_else(|e| e.into_inner());
        *totals.entry(ExposureKey::new(currency, date)).or_insert(0.0) += sum;
    }

    /// Expected value per bucket, the totals divided by the path count.
    pub fn expected(&self) -> BTreeMap<ExposureKey, f64> {
        let totals = self.totals.lock().unwrap_or_else(|e| e.into_inner());
        let n = self.n_paths.max(1) as f64;
        totals.iter().map(|(k, v)| (k.clone(), v / n)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pricer_core::market_data::FlatDiscount;
    use std::sync::Arc;

    #[test]
    fn test_population_std_error() {
        let date = Date::from_ymd(2025, 6, 30).unwrap();
        let results = PayoffResults::new("x", date, "USD", vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], vec![0; 8]);
        assert_eq!(results.mean(), 5.0);
        // population std is 2
        assert_relative_eq!(results.std_error(), 2.0 / 8f64.sqrt(), epsilon = 1e-14);
    }

    #[test]
    fn test_exercise_counts() {
        let date = Date::from_ymd(2025, 6, 30).unwrap();
        let results = PayoffResults::new("x", date, "USD", vec![0.0; 5], vec![-1, 0, 2, 2, -1]);
        let counts = results.exercise_counts();
        assert_eq!(counts[&-1], 2);
        assert_eq!(counts[&0], 1);
        assert_eq!(counts[&2], 2);
    }

    #[test]
    fn test_cash_flow_discounts_mean() {
        let today = Date::from_ymd(2025, 1, 1).unwrap();
        let pay = Date::from_ymd(2026, 1, 1).unwrap();
        let results = PayoffResults::new("x", pay, "EUR", vec![10.0, 30.0], vec![0, 0]);
        let curves = FlatDiscount::new().with_rate("EUR", 0.02);
        let cf = results.cash_flow(&curves, today).unwrap();
        assert_eq!(cf.undiscounted, 20.0);
        assert_relative_eq!(cf.discount_factor, (-0.02_f64).exp(), epsilon = 1e-14);
        assert_relative_eq!(cf.present_value, 20.0 * (-0.02_f64).exp(), epsilon = 1e-12);
        assert!(results.cash_flow(&FlatDiscount::new(), today).is_err());
    }

    #[test]
    fn test_ledger_accumulates_across_threads() {
        let date = Date::from_ymd(2025, 6, 30).unwrap();
        let ledger = Arc::new(ExposureLedger::new(40));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || ledger.add("USD", date, 25.0))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(ledger.expected()[&ExposureKey::new("USD", date)], 2.5);
    }

    #[test]
    fn test_ledger_keeps_currencies_apart() {
        let date = Date::from_ymd(2026, 1, 2).unwrap();
        let ledger = ExposureLedger::new(2);
        ledger.add("USD", date, 200.0);
        ledger.add("JPY", date, 100.0);
        ledger.add("USD", date, 20.0);

        let expected = ledger.expected();
        assert_eq!(expected.len(), 2);
        assert_eq!(expected[&ExposureKey::new("USD", date)], 110.0);
        assert_eq!(expected[&ExposureKey::new("JPY", date)], 50.0);
    }
}
