//! Market snapshot sources for the live runner.

use chrono::NaiveDate;
use ddguard_core::indicators::TrendSeries;
use ddguard_core::{MarketSnapshot, PricePoint};
use thiserror::Error;

/// The snapshot for a date could not be produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataUnavailable {
    #[error("no observation at or before {as_of}")]
    NoObservation { as_of: NaiveDate },

    #[error("latest observation {latest} is {age_days} days older than {as_of} (max {max_days})")]
    Stale {
        as_of: NaiveDate,
        latest: NaiveDate,
        age_days: i64,
        max_days: u32,
    },

    #[error("invalid close {close} on {date}")]
    InvalidPrice { date: NaiveDate, close: f64 },

    #[error("no previous close before {date}; cannot compute a daily return")]
    MissingPreviousClose { date: NaiveDate },
}

/// Supplies one market snapshot per as-of date.
pub trait SnapshotProvider {
    fn snapshot(&self, as_of: NaiveDate) -> Result<MarketSnapshot, DataUnavailable>;
}

/// Snapshot provider backed by an in-memory daily close series.
///
/// The SMA is precomputed over the whole series once.
#[derive(Debug, Clone)]
pub struct SeriesSnapshotProvider {
    points: Vec<PricePoint>,
    trend: TrendSeries,
    max_staleness_days: u32,
}

impl SeriesSnapshotProvider {
    /// `points` must be sorted by date (as returned by the CSV loader).
    pub fn new(points: Vec<PricePoint>, sma_period: usize, max_staleness_days: u32) -> Self {
        let trend = TrendSeries::compute(&points, sma_period);
        Self {
            points,
            trend,
            max_staleness_days,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

impl SnapshotProvider for SeriesSnapshotProvider {
    fn snapshot(&self, as_of: NaiveDate) -> Result<MarketSnapshot, DataUnavailable> {
        let upto = self.points.partition_point(|p| p.date <= as_of);
        if upto == 0 {
            return Err(DataUnavailable::NoObservation { as_of });
        }
        let i = upto - 1;
        let point = self.points[i];

        let age_days = (as_of - point.date).num_days();
        if age_days > i64::from(self.max_staleness_days) {
            return Err(DataUnavailable::Stale {
                as_of,
                latest: point.date,
                age_days,
                max_days: self.max_staleness_days,
            });
        }
        if !point.is_sane() {
            return Err(DataUnavailable::InvalidPrice {
                date: point.date,
                close: point.close,
            });
        }

        Ok(MarketSnapshot {
            date: point.date,
            close_price: point.close,
            previous_close: i.checked_sub(1).map(|j| self.points[j].close),
            trailing_average: self.trend.average_at(i),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn provider(max_staleness: u32) -> SeriesSnapshotProvider {
        let points = vec![
            PricePoint::new(d(4), 100.0),
            PricePoint::new(d(5), 102.0),
            PricePoint::new(d(6), 104.0),
            PricePoint::new(d(7), 99.0),
        ];
        SeriesSnapshotProvider::new(points, 3, max_staleness)
    }

    #[test]
    fn exact_date_snapshot() {
        let snap = provider(5).snapshot(d(6)).unwrap();
        assert_eq!(snap.date, d(6));
        assert_eq!(snap.close_price, 104.0);
        assert_eq!(snap.previous_close, Some(102.0));
        assert!((snap.trailing_average.unwrap() - 102.0).abs() < 1e-12);
        assert!(snap.is_uptrend());
    }

    #[test]
    fn warmup_has_no_average() {
        let snap = provider(5).snapshot(d(5)).unwrap();
        assert_eq!(snap.trailing_average, None);
        assert!(!snap.is_uptrend());
    }

    #[test]
    fn first_point_has_no_previous_close() {
        let snap = provider(5).snapshot(d(4)).unwrap();
        assert_eq!(snap.previous_close, None);
        assert_eq!(snap.daily_return(), None);
    }

    #[test]
    fn weekend_uses_last_observation() {
        let snap = provider(5).snapshot(d(9)).unwrap();
        assert_eq!(snap.date, d(7));
        assert_eq!(snap.close_price, 99.0);
    }

    #[test]
    fn stale_data_rejected() {
        let err = provider(1).snapshot(d(9)).unwrap_err();
        assert!(matches!(err, DataUnavailable::Stale { age_days: 2, .. }));
    }

    #[test]
    fn before_series_is_unavailable() {
        let err = provider(5).snapshot(d(1)).unwrap_err();
        assert_eq!(err, DataUnavailable::NoObservation { as_of: d(1) });
    }

    #[test]
    fn non_positive_close_rejected() {
        let p = SeriesSnapshotProvider::new(vec![PricePoint::new(d(4), 0.0)], 3, 5);
        assert!(matches!(
            p.snapshot(d(4)),
            Err(DataUnavailable::InvalidPrice { .. })
        ));
    }

    #[test]
    fn reports_loaded_range() {
        let p = provider(5);
        assert_eq!(p.len(), 4);
        assert_eq!(p.latest_date(), Some(d(7)));
        let empty = SeriesSnapshotProvider::new(Vec::new(), 3, 5);
        assert!(empty.is_empty());
        assert_eq!(empty.latest_date(), None);
    }
}
