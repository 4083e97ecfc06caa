//! Indicators over the benchmark close series.
//!
//! Indicators are precomputed once over the full history and then read per
//! day. No indicator value at day t may depend on closes after day t.

pub mod sma;
pub mod trend;

pub use sma::sma;
pub use trend::{daily_returns, is_uptrend, TrendSeries};
