//! ddguard core: the drawdown pause / trend-confirmed resume rule.
//!
//! This crate is pure: no I/O, no logging, no clocks.
//! - Domain types (decision state, exposure mode, price points, snapshots)
//! - Rule parameters with fail-fast validation
//! - The single-step state machine (`RuleEngine`)
//! - SMA and trend-flag precomputation

pub mod config;
pub mod domain;
pub mod engine;
pub mod indicators;

pub use config::{ConfigError, RuleConfig};
pub use domain::{DecisionState, ExposureMode, MarketSnapshot, PricePoint, TransitionEvent};
pub use engine::{RuleEngine, StepInput, StepOutcome, Trigger};
