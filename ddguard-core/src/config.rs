//! Rule parameters and their validation.
//!
//! Every historical "scenario" is a `RuleConfig` value, not a code fork.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid rule or portfolio parameters, detected before any state is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("pause_drawdown_limit must be in (0, 1), got {0}")]
    PauseLimitOutOfRange(f64),

    #[error("leverage_multiplier must be finite and > 0, got {0}")]
    InvalidLeverage(f64),

    #[error("trend_sma_period must be >= 1")]
    ZeroTrendPeriod,

    #[error("initial equity must be finite and > 0, got {0}")]
    InvalidInitialEquity(f64),
}

/// Parameters of the pause/resume rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Fractional drawdown that triggers a pause (0.25 = pause at -25%).
    pub pause_drawdown_limit: f64,
    /// Minimum paused days before a resume is considered.
    pub resume_wait_days: u32,
    /// Consecutive uptrend days required to resume.
    pub resume_trend_days: u32,
    /// Multiplier applied to the benchmark's daily return while exposed.
    pub leverage_multiplier: f64,
    /// Lookback of the trailing SMA used for the trend flag.
    pub trend_sma_period: usize,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            pause_drawdown_limit: 0.25,
            resume_wait_days: 30,
            resume_trend_days: 10,
            leverage_multiplier: 3.0,
            trend_sma_period: 200,
        }
    }
}

impl RuleConfig {
    pub fn new(pause_drawdown_limit: f64, resume_wait_days: u32, resume_trend_days: u32) -> Self {
        Self {
            pause_drawdown_limit,
            resume_wait_days,
            resume_trend_days,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let limit = self.pause_drawdown_limit;
        if !(limit.is_finite() && limit > 0.0 && limit < 1.0) {
            return Err(ConfigError::PauseLimitOutOfRange(limit));
        }
        let lev = self.leverage_multiplier;
        if !(lev.is_finite() && lev > 0.0) {
            return Err(ConfigError::InvalidLeverage(lev));
        }
        if self.trend_sma_period == 0 {
            return Err(ConfigError::ZeroTrendPeriod);
        }
        Ok(())
    }

    /// Deterministic identity of this parameter set (BLAKE3 over canonical JSON).
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    /// Short human label, e.g. `25%/30+10 @3x`.
    pub fn label(&self) -> String {
        format!(
            "{:.0}%/{}+{} @{}x",
            self.pause_drawdown_limit * 100.0,
            self.resume_wait_days,
            self.resume_trend_days,
            self.leverage_multiplier
        )
    }
}

/// Reject non-finite or non-positive starting capital.
pub fn validate_initial_equity(equity: f64) -> Result<(), ConfigError> {
    if equity.is_finite() && equity > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidInitialEquity(equity))
    }
}
