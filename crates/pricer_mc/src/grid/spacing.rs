//! Non-uniform date spacing.

use pricer_core::types::Date;

/// Dates from `start` to `end` (both included) whose spacing shrinks
/// towards `end`.
///
/// Point `k` of `n` sits at
/// `t_k = T·(1 − (cosh(c·(1 − k/n)) − 1) / (cosh(c) − 1))`, where `T` is
/// the span in days and `c` the concentration. Larger `c` packs more steps
/// near the end date; `c → 0` is uniform. Dates are rounded to whole days and
/// deduplicated, so fewer than `n + 1` dates come back when `n` exceeds the
/// span in days.
///
/// ```
/// use pricer_mc::grid::cosh_spaced_dates;
/// use pricer_core::types::Date;
///
/// let start = Date::from_ymd(2025, 1, 1).unwrap();
/// let end = Date::from_ymd(2026, 1, 1).unwrap();
/// let dates = cosh_spaced_dates(start, end, 12, 3.0);
/// assert_eq!(dates.first(), Some(&start));
/// assert_eq!(dates.last(), Some(&end));
/// // gaps shrink towards the end
/// let first_gap = dates[1] - dates[0];
/// let last_gap = dates[dates.len() - 1] - dates[dates.len() - 2];
/// assert!(first_gap > last_gap);
/// ```
pub fn cosh_spaced_dates(start: Date, end: Date, n: usize, concentration: f64) -> Vec<Date> {
    let span = (end - start) as f64;
    if n == 0 || span <= 0.0 {
        return vec![start.min(end)];
    }

    let c = concentration.abs();
    let denom = c.cosh() - 1.0;
    let mut dates: Vec<Date> = (0..=n)
        .map(|k| {
            let u = k as f64 / n as f64;
            let fraction = if denom < 1e-12 {
                u
            } else {
                1.0 - ((c * (1.0 - u)).cosh() - 1.0) / denom
            };
            start.add_days((span * fraction).round() as i64)
        })
        .collect();
    dates.dedup();
    dates
}
