//! Core time and error types.
//!
//! - `time`: [`Date`] and [`DayCountConvention`] used to build simulation grids
//! - `error`: [`DateError`] and [`InterpolationError`]

pub mod error;
pub mod time;

pub use error::{DateError, InterpolationError};
pub use time::{Date, DayCountConvention};
