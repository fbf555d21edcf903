//! # pricer_core: Foundation for the Monte Carlo Path Engine
//!
//! ## Layer 1 (Foundation) Role
//!
//! pricer_core is the bottom layer of the workspace, providing:
//! - Time types: `Date`, `DayCountConvention` (`types::time`)
//! - Error types: `DateError`, `InterpolationError` (`types::error`)
//! - Numerics: linear interpolation, semi-definite Cholesky factorisation,
//!   normal distribution helpers, Black-76 (`math`)
//! - Collaborator interfaces: forward curves, volatility surfaces,
//!   correlation sources, discount curves, past fixings (`market_data`)
//!
//! ## Zero Dependency Principle
//!
//! Layer 1 has no dependencies on other pricer_* crates, with minimal external dependencies:
//! - num-traits: Traits for generic numerical computation
//! - chrono: Date arithmetic
//! - statrs: Normal distribution special functions
//! - thiserror: Error derivation
//! - serde: Serialisation support (optional)
//!
//! ## Usage Examples
//!
//! ```rust
//! use pricer_core::math::black::black_price;
//! use pricer_core::types::{Date, DayCountConvention};
//!
//! let start = Date::from_ymd(2024, 1, 1).unwrap();
//! let end = Date::from_ymd(2025, 1, 1).unwrap();
//! let t = DayCountConvention::ActualActual365.year_fraction(start, end);
//!
//! let call = black_price(100.0, 100.0, 0.2, t, true);
//! assert!(call > 7.9 && call < 8.1);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialisation for Date, DayCountConvention and simple market data

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod market_data;
pub mod math;
pub mod types;
