//! Volatility surface abstractions.
//!
//! This module provides:
//! - [`VolatilitySurface`]: ATM, forward ATM, strike, delta and smile queries
//! - [`FlatVol`]: Constant volatility
//! - [`AtmTermVol`]: ATM term structure, variance-interpolated
//! - [`StrikeSmileSurface`]: Log-moneyness smile per expiry

mod flat;
mod smile;
mod traits;

pub use flat::{AtmTermVol, FlatVol};
pub use smile::StrikeSmileSurface;
pub use traits::VolatilitySurface;
