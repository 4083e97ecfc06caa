//! Trend flag: close above its trailing SMA.
//!
//! Undefined averages (warmup) resolve to "not uptrend".

use super::sma;
use crate::domain::PricePoint;

/// Per-day precomputed series for a price history.
#[derive(Debug, Clone)]
pub struct TrendSeries {
    pub averages: Vec<Option<f64>>,
    pub uptrend: Vec<bool>,
    /// Simple returns; index 0 is always 0.0.
    pub returns: Vec<f64>,
}

impl TrendSeries {
    pub fn compute(points: &[PricePoint], period: usize) -> Self {
        let closes: Vec<f64> = points.iter().map(|p| p.close).collect();
        let averages = sma(&closes, period);
        let uptrend = closes
            .iter()
            .zip(&averages)
            .map(|(&c, &avg)| avg.is_some_and(|a| is_uptrend(c, a)))
            .collect();
        Self {
            averages,
            uptrend,
            returns: daily_returns(&closes),
        }
    }

    /// Trailing average at `index`, `None` while undefined.
    pub fn average_at(&self, index: usize) -> Option<f64> {
        self.averages.get(index).copied().flatten()
    }
}

pub fn is_uptrend(close: f64, average: f64) -> bool {
    average.is_finite() && close > average
}

/// Percent change between consecutive closes; first element is 0.0.
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(closes.len());
    for i in 0..closes.len() {
        if i == 0 || closes[i - 1] <= 0.0 {
            out.push(0.0);
        } else {
            out.push(closes[i] / closes[i - 1] - 1.0);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn points(closes: &[f64]) -> Vec<PricePoint> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PricePoint::new(base + chrono::Duration::days(i as i64), c))
            .collect()
    }

    #[test]
    fn warmup_days_are_not_uptrend() {
        let ts = TrendSeries::compute(&points(&[10.0, 20.0, 30.0, 40.0]), 3);
        assert!(!ts.uptrend[0]);
        assert!(!ts.uptrend[1]);
        assert!(ts.average_at(1).is_none());
        // sma_3 at index 2 = 20, close 30 > 20
        assert!(ts.uptrend[2]);
        assert!(ts.uptrend[3]);
    }

    #[test]
    fn close_equal_to_average_is_not_uptrend() {
        let ts = TrendSeries::compute(&points(&[10.0, 10.0, 10.0]), 3);
        assert!(!ts.uptrend[2]);
    }

    #[test]
    fn returns_start_flat() {
        let r = daily_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(r[0], 0.0);
        assert!((r[1] - 0.1).abs() < 1e-12);
        assert!((r[2] + 0.1).abs() < 1e-12);
    }
}
