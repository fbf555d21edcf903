//! Market data error types.
//!
//! Failures raised by the collaborator interfaces the path engine consumes:
//! forward curves, volatility surfaces, correlation sources and discount
//! curves.

use crate::types::InterpolationError;
use thiserror::Error;

/// Market data lookup errors.
///
/// # Variants
///
/// - `InvalidMaturity`: Negative or non-finite time
/// - `InvalidStrike`: Non-positive strike price
/// - `InvalidExpiry`: Non-positive time to expiry
/// - `OutOfBounds`: Query outside valid domain
/// - `Interpolation`: Wrapped interpolation error
/// - `InsufficientData`: Not enough data points for construction
/// - `MissingCurve`: Named curve not available
/// - `InvalidCorrelation`: Correlation outside [-1, 1]
///
/// # Examples
///
/// ```
/// use pricer_core::market_data::MarketDataError;
///
/// let err = MarketDataError::InvalidMaturity { t: -1.0 };
/// assert!(format!("{}", err).contains("-1"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    /// Invalid maturity.
    #[error("Invalid maturity: t = {t}")]
    InvalidMaturity {
        /// The invalid maturity value
        t: f64,
    },

    /// Invalid strike price (non-positive).
    #[error("Invalid strike: K = {strike}")]
    InvalidStrike {
        /// The invalid strike value
        strike: f64,
    },

    /// Invalid expiry (non-positive).
    #[error("Invalid expiry: T = {expiry}")]
    InvalidExpiry {
        /// The invalid expiry value
        expiry: f64,
    },

    /// Query point outside valid domain.
    #[error("Out of bounds: {x} not in [{min}, {max}]")]
    OutOfBounds {
        /// The query point that was out of bounds
        x: f64,
        /// Minimum valid value
        min: f64,
        /// Maximum valid value
        max: f64,
    },

    /// Interpolation error.
    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),

    /// Insufficient data for construction.
    #[error("Insufficient data: got {got}, need {need}")]
    InsufficientData {
        /// Number of points provided
        got: usize,
        /// Minimum number of points required
        need: usize,
    },

    /// Named curve not available.
    #[error("Missing curve: {0}")]
    MissingCurve(String),

    /// Correlation outside [-1, 1].
    #[error("Invalid correlation between {a} and {b}: {value}")]
    InvalidCorrelation {
        /// First factor name
        a: String,
        /// Second factor name
        b: String,
        /// Offending value
        value: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_display() {
        let err = MarketDataError::OutOfBounds {
            x: 5.0,
            min: 0.0,
            max: 3.0,
        };
        assert_eq!(format!("{}", err), "Out of bounds: 5 not in [0, 3]");
    }

    #[test]
    fn test_missing_curve_display() {
        let err = MarketDataError::MissingCurve("EUR-OIS".to_string());
        assert_eq!(err.to_string(), "Missing curve: EUR-OIS");
    }

    #[test]
    fn test_from_interpolation_error() {
        let interp_err = InterpolationError::OutOfBounds {
            x: 5.0,
            min: 0.0,
            max: 3.0,
        };
        let mkt_err: MarketDataError = interp_err.into();
        assert!(matches!(mkt_err, MarketDataError::Interpolation(_)));
    }
}
