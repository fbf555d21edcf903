//! Market data interfaces consumed by the path engine.
//!
//! The engine does not build curves or surfaces; it consumes them through
//! the narrow traits defined here.
//!
//! # Components
//!
//! - [`forward`]: [`ForwardCurve`] and simple implementations
//! - [`surfaces`]: [`VolatilitySurface`] and implementations
//! - [`correlation`]: [`CorrelationSource`], FX pair inversion, prompt decay
//! - [`discount`]: [`DiscountSource`] for cash-flow present values
//! - [`fixings`]: [`PastFixings`] realised history
//! - [`error`]: [`MarketDataError`]
//!
//! # Example
//!
//! ```
//! use pricer_core::market_data::{FlatForward, ForwardCurve};
//! use pricer_core::market_data::surfaces::{FlatVol, VolatilitySurface};
//!
//! let forward = FlatForward::new(100.0);
//! let vol = FlatVol::new(0.2);
//! assert_eq!(forward.forward(1.0).unwrap(), 100.0);
//! assert_eq!(vol.atm_vol(1.0).unwrap(), 0.2);
//! ```

pub mod correlation;
pub mod discount;
pub mod error;
pub mod fixings;
pub mod forward;
pub mod surfaces;

pub use correlation::{
    resolve_correlation, CorrelationSource, CorrelationTable, PromptDecayCorrelation,
    TermCorrelationTable,
};
pub use discount::{DiscountSource, FlatDiscount};
pub use error::MarketDataError;
pub use fixings::{fixings_from, latest_fixing, PastFixings};
pub use forward::{FlatForward, ForwardCurve, InterpolatedForward};
pub use surfaces::{AtmTermVol, FlatVol, StrikeSmileSurface, VolatilitySurface};
