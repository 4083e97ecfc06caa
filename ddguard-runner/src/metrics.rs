//! Performance metrics: pure functions over equity curves.
//!
//! Every metric is a pure function: dates and/or equity values in, numbers out.
//! Years are calendar years of 365.25 days.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const DAYS_PER_YEAR: f64 = 365.25;

/// Return statistics for one equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnStats {
    pub initial: f64,
    pub final_value: f64,
    pub total_return: f64,
    pub cagr: f64,
    pub max_drawdown: f64,
}

impl ReturnStats {
    /// `dates` and `equity` are parallel; both must be non-empty.
    pub fn compute(dates: &[NaiveDate], equity: &[f64]) -> Self {
        let initial = equity.first().copied().unwrap_or(0.0);
        let final_value = equity.last().copied().unwrap_or(0.0);
        let cagr = match (dates.first(), dates.last()) {
            (Some(&start), Some(&end)) => cagr_calendar(initial, final_value, start, end),
            _ => 0.0,
        };
        Self {
            initial,
            final_value,
            total_return: total_return(equity),
            cagr,
            max_drawdown: max_drawdown(equity),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    let (Some(&initial), Some(&final_eq)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    if equity_curve.len() < 2 || initial <= 0.0 {
        return 0.0;
    }
    (final_eq - initial) / initial
}

/// Elapsed calendar years between two dates.
pub fn years_between(start: NaiveDate, end: NaiveDate) -> f64 {
    (end - start).num_days() as f64 / DAYS_PER_YEAR
}

/// Compound annual growth rate over calendar time.
///
/// Returns 0.0 when no time elapsed or either endpoint is non-positive.
pub fn cagr_calendar(initial: f64, final_value: f64, start: NaiveDate, end: NaiveDate) -> f64 {
    let years = years_between(start, end);
    if years <= 0.0 || initial <= 0.0 || final_value <= 0.0 {
        return 0.0;
    }
    (final_value / initial).powf(1.0 / years) - 1.0
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Per-calendar-year performance of strategy and benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearlyRow {
    pub year: i32,
    pub strategy_return: f64,
    pub benchmark_return: f64,
    pub strategy_max_drawdown: f64,
    pub benchmark_max_drawdown: f64,
}

/// Calendar-year breakdown.
///
/// Each year's return is measured from the last value of the prior year, or
/// from the year's first value when there is no prior year. Drawdown is
/// measured within the year only.
pub fn yearly_breakdown(dates: &[NaiveDate], strategy: &[f64], benchmark: &[f64]) -> Vec<YearlyRow> {
    let n = dates.len().min(strategy.len()).min(benchmark.len());
    let mut rows = Vec::new();
    let mut start = 0;

    while start < n {
        let year = dates[start].year();
        let end = start + dates[start..n].iter().take_while(|d| d.year() == year).count();

        let base = if start == 0 { start } else { start - 1 };
        let ret = |series: &[f64]| {
            let b = series[base];
            if b > 0.0 {
                series[end - 1] / b - 1.0
            } else {
                0.0
            }
        };

        rows.push(YearlyRow {
            year,
            strategy_return: ret(strategy),
            benchmark_return: ret(benchmark),
            strategy_max_drawdown: max_drawdown(&strategy[start..end]),
            benchmark_max_drawdown: max_drawdown(&benchmark[start..end]),
        });
        start = end;
    }
    rows
}

/// Equity at the first date where `years` calendar years have elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub years: u32,
    pub date: NaiveDate,
    pub strategy_equity: f64,
    pub benchmark_equity: f64,
}

impl Milestone {
    pub fn delta(&self) -> f64 {
        self.strategy_equity - self.benchmark_equity
    }
}

pub const DEFAULT_MILESTONE_YEARS: [u32; 4] = [5, 10, 15, 20];

/// Horizons that the curve never reaches are omitted.
pub fn milestones(
    dates: &[NaiveDate],
    strategy: &[f64],
    benchmark: &[f64],
    horizons: &[u32],
) -> Vec<Milestone> {
    let Some(&start) = dates.first() else {
        return Vec::new();
    };
    let n = dates.len().min(strategy.len()).min(benchmark.len());

    horizons
        .iter()
        .filter_map(|&years| {
            let idx = dates[..n]
                .iter()
                .position(|&d| years_between(start, d) >= f64::from(years))?;
            Some(Milestone {
                years,
                date: dates[idx],
                strategy_equity: strategy[idx],
                benchmark_equity: benchmark[idx],
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn total_return_basic() {
        assert!((total_return(&[100.0, 110.0, 120.0]) - 0.2).abs() < 1e-12);
        assert_eq!(total_return(&[100.0]), 0.0);
        assert_eq!(total_return(&[]), 0.0);
    }

    #[test]
    fn cagr_uses_calendar_years() {
        // 1461 days is exactly four 365.25-day years.
        let c = cagr_calendar(100.0, 1_600.0, d(2020, 1, 1), d(2024, 1, 1));
        assert!((c - 1.0).abs() < 1e-12, "cagr = {c}");
    }

    #[test]
    fn cagr_degenerate_inputs() {
        let t = d(2020, 1, 1);
        assert_eq!(cagr_calendar(100.0, 200.0, t, t), 0.0);
        assert_eq!(cagr_calendar(0.0, 200.0, t, d(2021, 1, 1)), 0.0);
        assert_eq!(cagr_calendar(100.0, 0.0, t, d(2021, 1, 1)), 0.0);
    }

    #[test]
    fn max_drawdown_peak_to_trough() {
        let dd = max_drawdown(&[100.0, 120.0, 90.0, 130.0, 117.0]);
        assert!((dd + 0.25).abs() < 1e-12);
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn yearly_breakdown_chains_from_prior_year_end() {
        let dates = [d(2020, 12, 30), d(2020, 12, 31), d(2021, 1, 4), d(2021, 6, 1)];
        let strat = [100.0, 110.0, 99.0, 121.0];
        let bench = [100.0, 100.0, 100.0, 105.0];
        let rows = yearly_breakdown(&dates, &strat, &bench);
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].year, 2020);
        assert!((rows[0].strategy_return - 0.10).abs() < 1e-12);

        assert_eq!(rows[1].year, 2021);
        assert!((rows[1].strategy_return - 0.10).abs() < 1e-12);
        assert!((rows[1].benchmark_return - 0.05).abs() < 1e-12);
        // In-year drawdown ignores the prior-year peak of 110.
        assert_eq!(rows[1].strategy_max_drawdown, 0.0);
    }

    #[test]
    fn milestones_first_date_past_horizon() {
        let dates = [d(2000, 1, 3), d(2004, 12, 31), d(2005, 1, 3), d(2009, 6, 1)];
        let strat = [1.0, 2.0, 3.0, 4.0];
        let bench = [1.0, 1.5, 1.6, 1.7];
        let ms = milestones(&dates, &strat, &bench, &DEFAULT_MILESTONE_YEARS);
        assert_eq!(ms.len(), 1);
        assert_eq!(ms[0].years, 5);
        assert_eq!(ms[0].date, d(2005, 1, 3));
        assert!((ms[0].delta() - 1.4).abs() < 1e-12);
    }

    #[test]
    fn return_stats_for_curve() {
        let dates = [d(2020, 1, 1), d(2021, 1, 1)];
        let stats = ReturnStats::compute(&dates, &[100.0, 80.0]);
        assert_eq!(stats.initial, 100.0);
        assert_eq!(stats.final_value, 80.0);
        assert!((stats.total_return + 0.2).abs() < 1e-12);
        assert!((stats.max_drawdown + 0.2).abs() < 1e-12);
        assert!(stats.cagr < -0.19 && stats.cagr > -0.21);
    }
}
