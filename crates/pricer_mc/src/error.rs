//! Error types for the path engine.
//!
//! Every failure here is a configuration or wiring mistake and is fatal:
//! nothing is retried, because the computation is deterministic given its
//! inputs. Recovered numerical edge cases (variance floors) are logged, not
//! raised.

use crate::config::ConfigError;
use pricer_core::market_data::MarketDataError;
use pricer_core::math::CholeskyError;
use pricer_core::types::{Date, InterpolationError};
use thiserror::Error;

/// Result alias used throughout the engine.
pub type SimulationResult<T> = Result<T, SimulationError>;

/// Path engine errors.
///
/// # Examples
///
/// ```
/// use pricer_mc::SimulationError;
///
/// let err = SimulationError::UnknownDimension("BRENT~2".to_string());
/// assert_eq!(err.to_string(), "Unknown dimension: BRENT~2");
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// A date or dimension was declared after the context was frozen.
    #[error("Simulation context is frozen: cannot register {0}")]
    GridFrozen(String),

    /// An index lookup was attempted before the context was frozen.
    #[error("Simulation context is not frozen yet")]
    GridNotFrozen,

    /// The date was never registered on the time grid.
    #[error("Date {0} is not on the time grid")]
    UnknownDate(Date),

    /// The factor name was never registered.
    #[error("Unknown dimension: {0}")]
    UnknownDimension(String),

    /// A historic grid date has no realised fixing.
    #[error("Missing fixing for {name} on {date}")]
    MissingFixing {
        /// Factor name
        name: String,
        /// Historic date
        date: Date,
    },

    /// The forward curve could not supply a required forward.
    #[error("Missing forward for {name} on {date}: {source}")]
    MissingForward {
        /// Factor name
        name: String,
        /// Grid date
        date: Date,
        /// Underlying lookup failure
        #[source]
        source: MarketDataError,
    },

    /// Correlation matrix construction or decomposition failed.
    #[error("Correlation error: {0}")]
    Correlation(#[from] CholeskyError),

    /// Engine configuration rejected.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Process or payoff parameters are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Product shape with no supported evaluation.
    #[error("Unsupported product: {0}")]
    UnsupportedProduct(String),

    /// Continuation regression could not be fitted.
    #[error("Regression error: {0}")]
    Regression(String),

    /// Collaborator lookup failure.
    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),
}

impl From<InterpolationError> for SimulationError {
    fn from(err: InterpolationError) -> Self {
        SimulationError::MarketData(MarketDataError::Interpolation(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fixing_display() {
        let date = Date::from_ymd(2025, 1, 3).unwrap();
        let err = SimulationError::MissingFixing {
            name: "WTI".to_string(),
            date,
        };
        assert_eq!(err.to_string(), "Missing fixing for WTI on 2025-01-03");
    }

    #[test]
    fn test_from_cholesky_error() {
        let err: SimulationError = CholeskyError::NotSymmetric { i: 0, j: 1 }.into();
        assert!(matches!(err, SimulationError::Correlation(_)));
    }

    #[test]
    fn test_from_interpolation_error() {
        let err: SimulationError = InterpolationError::InsufficientData { got: 1, need: 2 }.into();
        assert!(matches!(err, SimulationError::MarketData(_)));
    }
}
