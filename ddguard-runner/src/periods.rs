//! Period studies: trailing "last N years" windows and independent calendar
//! blocks, each simulated with fresh capital on a warm indicator.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::metrics::DAYS_PER_YEAR;
use crate::simulator::{HistoricalSimulator, PreparedSeries, SimulationError, SimulationResult};

pub const DEFAULT_TRAILING_YEARS: [u32; 4] = [5, 10, 15, 20];

/// Inclusive date window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// "Last N years" windows ending at `last`.
pub fn trailing_windows(last: NaiveDate, years: &[u32]) -> Vec<PeriodWindow> {
    years
        .iter()
        .map(|&n| {
            let days = (f64::from(n) * DAYS_PER_YEAR).round() as i64;
            PeriodWindow {
                label: format!("last_{n}y"),
                start: last - Duration::days(days),
                end: last,
            }
        })
        .collect()
}

/// Independent inclusive blocks `Y-01-01 ..= (Y+step-1)-12-31` for
/// Y = first, first+step, … while `Y + step <= end_year`.
///
/// Labels name the half-open year span, e.g. `2005-2010` for 2005 through 2009.
pub fn calendar_blocks(first_year: i32, end_year: i32, step: u32) -> Vec<PeriodWindow> {
    let step = step.max(1) as i32;
    let mut out = Vec::new();
    let mut y = first_year;
    while y + step <= end_year {
        let (Some(start), Some(end)) = (
            NaiveDate::from_ymd_opt(y, 1, 1),
            NaiveDate::from_ymd_opt(y + step - 1, 12, 31),
        ) else {
            break;
        };
        out.push(PeriodWindow {
            label: format!("{}-{}", y, y + step),
            start,
            end,
        });
        y += step;
    }
    out
}

#[derive(Debug, Clone)]
pub struct PeriodResult {
    pub window: PeriodWindow,
    pub result: SimulationResult,
}

/// Simulate each window; windows with no data are skipped and logged.
pub fn run_windows(
    sim: &HistoricalSimulator,
    series: &PreparedSeries,
    windows: &[PeriodWindow],
) -> Result<Vec<PeriodResult>, SimulationError> {
    let mut out = Vec::with_capacity(windows.len());
    for w in windows {
        match sim.run_window(series, Some(w.start), Some(w.end)) {
            Ok(result) => out.push(PeriodResult {
                window: w.clone(),
                result,
            }),
            Err(SimulationError::NoDataInWindow { .. }) => {
                warn!(label = %w.label, start = %w.start, end = %w.end, "no data in window; skipped");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(out)
}
