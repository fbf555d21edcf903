//! Numerical building blocks for the path engine.
//!
//! - [`interpolators`]: linear interpolation with flat extrapolation
//! - [`cholesky`]: correlation matrices and semi-definite Cholesky factors
//! - [`distributions`]: standard normal CDF, density and inverse
//! - [`black`]: Black-76 reference prices

pub mod black;
pub mod cholesky;
pub mod distributions;
pub mod interpolators;

pub use cholesky::{CholeskyError, CholeskyFactor, CorrelationMatrix};
