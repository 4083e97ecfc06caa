//! Domain types: decision state, exposure modes, benchmark observations.

pub mod price;
pub mod state;

pub use price::{MarketSnapshot, PricePoint};
pub use state::{drawdown, DecisionState, ExposureMode, TransitionEvent};
