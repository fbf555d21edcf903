//! Time grid, dimension registry and the context that owns them.
//!
//! - [`TimeGrid`]: frozen dates, times, step lengths
//! - [`DimensionRegistry`]: factor name to index
//! - [`SimulationContext`]: both, plus the valuation date and freeze state
//! - [`cosh_spaced_dates`]: end-concentrated date spacing

mod context;
mod registry;
mod spacing;
mod time_grid;

pub use context::SimulationContext;
pub use registry::DimensionRegistry;
pub use spacing::cosh_spaced_dates;
pub use time_grid::TimeGrid;
