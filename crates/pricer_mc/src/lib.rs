//! # pricer_mc: Monte Carlo Path Engine (L3)
//!
//! Simulates correlated factor paths on a shared irregular time grid and
//! evaluates path-dependent payoffs on them.
//!
//! ## Pipeline
//!
//! 1. Processes and payoffs declare dates and factor names on a
//!    [`SimulationContext`](grid::SimulationContext).
//! 2. The context freezes: dates sort into a [`TimeGrid`](grid::TimeGrid)
//!    with the valuation date at time zero, names into a dense registry.
//! 3. Processes calibrate to their forward curves and volatility surfaces;
//!    payoffs resolve grid indices; regression payoffs train.
//! 4. Blocks of paths are filled in [`PathBlock`](block::PathBlock)s of
//!    SIMD [`Lane`](lanes::Lane)s, one process after another, and priced.
//!
//! ## Modules
//!
//! - [`config`]: [`SimulationConfig`] and its builder
//! - [`grid`]: time grid, dimension registry, context
//! - [`block`]: vectorised path storage
//! - [`rng`]: per-block seeded normal draws
//! - [`process`]: correlation and factor generators
//! - [`payoff`]: payoff evaluators, regression, results
//! - [`engine`]: the [`Simulation`] orchestrator
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use pricer_core::market_data::{FlatForward, FlatVol};
//! use pricer_core::types::Date;
//! use pricer_mc::payoff::{AsianPayoff, OptionType, PayoffTerms};
//! use pricer_mc::process::{LognormalProcess, MarketInputs, Schedule};
//! use pricer_mc::{Simulation, SimulationConfig};
//!
//! let today = Date::from_ymd(2025, 1, 1).unwrap();
//! let fixings: Vec<Date> = (1..=4).map(|m| today.add_days(91 * m)).collect();
//!
//! let config = SimulationConfig::builder().n_paths(2048).build().unwrap();
//! let mut sim = Simulation::new(config, today);
//! let inputs = MarketInputs::new(Arc::new(FlatForward::new(80.0)), Arc::new(FlatVol::new(0.25)));
//! sim.add_process(LognormalProcess::new("WTI", inputs, Schedule::new())).unwrap();
//! sim.add_payoff(AsianPayoff::new(
//!     PayoffTerms::new("WTI", fixings[3]),
//!     OptionType::Put,
//!     80.0,
//!     fixings,
//! ))
//! .unwrap();
//!
//! let output = sim.run().unwrap();
//! assert!(output.results[0].mean() > 0.0);
//! ```

#![warn(missing_docs)]

pub mod block;
pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod lanes;
pub mod payoff;
pub mod process;
pub mod rng;

pub use config::{ConfigError, SimulationConfig, SimulationConfigBuilder};
pub use engine::{Simulation, SimulationOutput};
pub use error::{SimulationError, SimulationResult};
