//! Benchmark observations: daily price points and the live market snapshot.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily close of the benchmark series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }

    /// A usable close is finite and strictly positive.
    pub fn is_sane(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}

/// Market view for a single date, as seen by the live runner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub date: NaiveDate,
    pub close_price: f64,
    /// Prior session's close; `None` when the series starts on `date`.
    pub previous_close: Option<f64>,
    /// Trailing simple moving average; `None` during warmup.
    pub trailing_average: Option<f64>,
}

impl MarketSnapshot {
    /// Price above its trailing average. An undefined average is not an uptrend.
    pub fn is_uptrend(&self) -> bool {
        match self.trailing_average {
            Some(avg) if avg.is_finite() => self.close_price > avg,
            _ => false,
        }
    }

    /// Simple daily return of the benchmark, if the prior close is known.
    pub fn daily_return(&self) -> Option<f64> {
        self.previous_close
            .filter(|p| p.is_finite() && *p > 0.0)
            .map(|p| self.close_price / p - 1.0)
    }
}
