//! Market flags: the benchmark's most recent daily returns bucketed into
//! GREEN / YELLOW / RED for a dashboard timeline.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use ddguard_core::PricePoint;
use serde::{Deserialize, Serialize};

use crate::state_store::{write_json_atomic, StateStoreError};

pub const DEFAULT_FLAG_COUNT: usize = 30;

/// Returns strictly below this are RED.
pub const DEFAULT_RED_BELOW: f64 = -0.015;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketFlag {
    Green,
    Yellow,
    Red,
}

impl MarketFlag {
    pub fn classify(daily_return: f64, red_below: f64) -> Self {
        if daily_return < red_below {
            MarketFlag::Red
        } else if daily_return < 0.0 {
            MarketFlag::Yellow
        } else {
            MarketFlag::Green
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlagEntry {
    pub date: NaiveDate,
    /// Rounded to four decimals for display; classification uses the exact value.
    #[serde(rename = "return")]
    pub daily_return: f64,
    pub flag: MarketFlag,
}

/// Flags for the last `count` daily returns, oldest first.
pub fn market_flags(points: &[PricePoint], count: usize, red_below: f64) -> Vec<FlagEntry> {
    let mut flags: Vec<FlagEntry> = points
        .windows(2)
        .filter(|w| w[0].close > 0.0)
        .map(|w| {
            let r = w[1].close / w[0].close - 1.0;
            FlagEntry {
                date: w[1].date,
                daily_return: (r * 1e4).round() / 1e4,
                flag: MarketFlag::classify(r, red_below),
            }
        })
        .collect();
    let skip = flags.len().saturating_sub(count);
    flags.drain(..skip);
    flags
}

/// The published flags document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagReport {
    pub updated: DateTime<Utc>,
    pub count: usize,
    pub flags: Vec<FlagEntry>,
}

impl FlagReport {
    pub fn build(points: &[PricePoint], count: usize, red_below: f64, now: DateTime<Utc>) -> Self {
        let flags = market_flags(points, count, red_below);
        Self {
            updated: now,
            count: flags.len(),
            flags,
        }
    }

    /// Write atomically as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), StateStoreError> {
        write_json_atomic(path, self)?;
        tracing::info!(path = %path.display(), count = self.count, "market flags written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pts(closes: &[f64]) -> Vec<PricePoint> {
        let base = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PricePoint::new(base + chrono::Duration::days(i as i64), c))
            .collect()
    }

    #[test]
    fn classification_boundaries() {
        assert_eq!(MarketFlag::classify(0.0, DEFAULT_RED_BELOW), MarketFlag::Green);
        assert_eq!(MarketFlag::classify(0.012, DEFAULT_RED_BELOW), MarketFlag::Green);
        assert_eq!(MarketFlag::classify(-0.001, DEFAULT_RED_BELOW), MarketFlag::Yellow);
        assert_eq!(MarketFlag::classify(-0.015, DEFAULT_RED_BELOW), MarketFlag::Yellow);
        assert_eq!(MarketFlag::classify(-0.0151, DEFAULT_RED_BELOW), MarketFlag::Red);
    }

    #[test]
    fn keeps_last_count_oldest_first() {
        // Returns: +1%, -1%, -2%, +0.5%
        let flags = market_flags(&pts(&[100.0, 101.0, 99.99, 97.9902, 98.480151]), 3, DEFAULT_RED_BELOW);
        assert_eq!(flags.len(), 3);
        assert_eq!(flags[0].date, NaiveDate::from_ymd_opt(2024, 7, 3).unwrap());
        let kinds: Vec<_> = flags.iter().map(|f| f.flag).collect();
        assert_eq!(kinds, vec![MarketFlag::Yellow, MarketFlag::Red, MarketFlag::Green]);
        assert_eq!(flags[0].daily_return, -0.01);
    }

    #[test]
    fn short_history_yields_what_exists() {
        assert!(market_flags(&pts(&[100.0]), 30, DEFAULT_RED_BELOW).is_empty());
        assert_eq!(market_flags(&pts(&[100.0, 100.0]), 30, DEFAULT_RED_BELOW).len(), 1);
    }

    #[test]
    fn report_document_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("market_flags.json");
        let now = Utc.with_ymd_and_hms(2024, 7, 6, 22, 0, 0).unwrap();
        let report = FlagReport::build(&pts(&[100.0, 98.0, 99.0]), 30, DEFAULT_RED_BELOW, now);
        report.save(&path).unwrap();

        let v: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["count"], 2);
        assert_eq!(v["flags"][0]["flag"], "RED");
        assert_eq!(v["flags"][0]["return"], -0.02);
        assert_eq!(v["flags"][1]["date"], "2024-07-03");
        assert!(v.get("updated").is_some());
    }
}
