//! Past fixings: realised values on or before the valuation date.

use crate::types::Date;
use std::collections::BTreeMap;

/// Realised fixings keyed by date.
pub type PastFixings = BTreeMap<Date, f64>;

/// Builds a fixing map from `(date, value)` pairs.
///
/// ```
/// use pricer_core::market_data::fixings::fixings_from;
/// use pricer_core::types::Date;
///
/// let d = Date::from_ymd(2025, 3, 3).unwrap();
/// let fixings = fixings_from([(d, 71.2)]);
/// assert_eq!(fixings.get(&d), Some(&71.2));
/// ```
pub fn fixings_from<I>(pairs: I) -> PastFixings
where
    I: IntoIterator<Item = (Date, f64)>,
{
    pairs.into_iter().collect()
}

/// Latest fixing at or before `date`.
pub fn latest_fixing(fixings: &PastFixings, date: Date) -> Option<(Date, f64)> {
    fixings.range(..=date).next_back().map(|(&d, &v)| (d, v))
}
