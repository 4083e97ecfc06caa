//! Historical simulation: the rule folded over a daily close series.
//!
//! Returns and the trailing SMA are computed once over the full series, so a
//! window that starts mid-history has a warm indicator on its first day. The
//! first day of a window is flat: it only sets the baseline for the strategy
//! and the buy-and-hold benchmark.

use chrono::NaiveDate;
use ddguard_core::indicators::TrendSeries;
use ddguard_core::{
    ConfigError, DecisionState, ExposureMode, PricePoint, RuleConfig, RuleEngine, StepInput,
    TransitionEvent, Trigger,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::{milestones, yearly_breakdown, Milestone, ReturnStats, YearlyRow, DEFAULT_MILESTONE_YEARS};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("price series is empty")]
    EmptySeries,

    #[error("no observations between {start:?} and {end:?}")]
    NoDataInWindow {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },

    #[error("invalid close {close} on {date}")]
    InvalidPrice { date: NaiveDate, close: f64 },

    #[error("dates not strictly increasing: {date} follows {previous}")]
    Unordered { previous: NaiveDate, date: NaiveDate },

    #[error("series prepared with SMA {series} but rule uses SMA {rule}")]
    TrendPeriodMismatch { series: usize, rule: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A validated close series with its trend indicator precomputed.
#[derive(Debug, Clone)]
pub struct PreparedSeries {
    points: Vec<PricePoint>,
    sma_period: usize,
    trend: TrendSeries,
}

impl PreparedSeries {
    /// Reject empty, unordered, or non-positive series up front.
    pub fn new(points: Vec<PricePoint>, sma_period: usize) -> Result<Self, SimulationError> {
        if sma_period == 0 {
            return Err(ConfigError::ZeroTrendPeriod.into());
        }
        if points.is_empty() {
            return Err(SimulationError::EmptySeries);
        }
        for (i, p) in points.iter().enumerate() {
            if !p.is_sane() {
                return Err(SimulationError::InvalidPrice {
                    date: p.date,
                    close: p.close,
                });
            }
            if i > 0 && points[i - 1].date >= p.date {
                return Err(SimulationError::Unordered {
                    previous: points[i - 1].date,
                    date: p.date,
                });
            }
        }
        let trend = TrendSeries::compute(&points, sma_period);
        Ok(Self {
            points,
            sma_period,
            trend,
        })
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn sma_period(&self) -> usize {
        self.sma_period
    }

    pub fn first_date(&self) -> NaiveDate {
        self.points[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.points[self.points.len() - 1].date
    }

    /// Index range `[lo, hi)` of points inside the inclusive window.
    fn window(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<(usize, usize), SimulationError> {
        let lo = start.map_or(0, |s| self.points.partition_point(|p| p.date < s));
        let hi = end.map_or(self.points.len(), |e| self.points.partition_point(|p| p.date <= e));
        if lo >= hi {
            return Err(SimulationError::NoDataInWindow { start, end });
        }
        Ok((lo, hi))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub date: NaiveDate,
    pub price: f64,
    pub equity: f64,
    pub benchmark: f64,
    pub mode: ExposureMode,
    pub drawdown: f64,
    pub event: TransitionEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub date: NaiveDate,
    pub event: TransitionEvent,
    pub trigger: Option<Trigger>,
    pub price: f64,
    pub equity: f64,
    pub drawdown: f64,
    /// Paused days completed, for resume events.
    pub days_paused: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub trading_days: usize,
    pub years: f64,
    pub strategy: ReturnStats,
    pub benchmark: ReturnStats,
    pub pauses: usize,
    pub resumes: usize,
    pub exposed_days: usize,
    pub paused_days: usize,
    pub final_mode: ExposureMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub rule: RuleConfig,
    pub fingerprint: String,
    pub summary: SimulationSummary,
    pub events: Vec<EventRecord>,
    pub yearly: Vec<YearlyRow>,
    pub milestones: Vec<Milestone>,
    pub curve: Vec<CurvePoint>,
}

/// Folds the rule engine over a prepared series.
#[derive(Debug, Clone)]
pub struct HistoricalSimulator {
    engine: RuleEngine,
    initial_equity: f64,
}

impl HistoricalSimulator {
    pub fn new(rule: RuleConfig, initial_equity: f64) -> Result<Self, SimulationError> {
        ddguard_core::config::validate_initial_equity(initial_equity)?;
        Ok(Self {
            engine: RuleEngine::new(rule)?,
            initial_equity,
        })
    }

    pub fn rule(&self) -> &RuleConfig {
        self.engine.config()
    }

    /// Validate, prepare and simulate the whole series.
    pub fn run(&self, points: Vec<PricePoint>) -> Result<SimulationResult, SimulationError> {
        let series = PreparedSeries::new(points, self.rule().trend_sma_period)?;
        self.run_window(&series, None, None)
    }

    /// Simulate the inclusive `[start, end]` window with fresh capital.
    ///
    /// `series` must have been prepared with this rule's SMA period.
    pub fn run_window(
        &self,
        series: &PreparedSeries,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<SimulationResult, SimulationError> {
        let rule_period = self.rule().trend_sma_period;
        if series.sma_period != rule_period {
            return Err(SimulationError::TrendPeriodMismatch {
                series: series.sma_period,
                rule: rule_period,
            });
        }
        let (lo, hi) = series.window(start, end)?;
        let points = &series.points[lo..hi];
        let trend = &series.trend;

        let initial = self.initial_equity;
        let shares = initial / points[0].close;

        let mut state = DecisionState::new(initial);
        let mut curve = Vec::with_capacity(points.len());
        let mut events = Vec::new();

        curve.push(CurvePoint {
            date: points[0].date,
            price: points[0].close,
            equity: initial,
            benchmark: initial,
            mode: state.mode,
            drawdown: 0.0,
            event: TransitionEvent::NoChange,
        });

        for (offset, point) in points.iter().enumerate().skip(1) {
            let i = lo + offset;
            let input = StepInput::new(point.date, trend.returns[i], trend.uptrend[i]);
            let days_paused_before = state.days_paused;
            let outcome = self.engine.step(&state, &input);
            state = outcome.state;

            if outcome.event.is_transition() {
                events.push(EventRecord {
                    date: point.date,
                    event: outcome.event,
                    trigger: outcome.trigger,
                    price: point.close,
                    equity: state.equity,
                    drawdown: state.drawdown,
                    days_paused: if outcome.event == TransitionEvent::ResumeTriggered {
                        days_paused_before + 1
                    } else {
                        0
                    },
                });
            }

            curve.push(CurvePoint {
                date: point.date,
                price: point.close,
                equity: state.equity,
                benchmark: shares * point.close,
                mode: state.mode,
                drawdown: state.drawdown,
                event: outcome.event,
            });
        }

        Ok(self.assemble(curve, events, state.mode))
    }

    fn assemble(
        &self,
        curve: Vec<CurvePoint>,
        events: Vec<EventRecord>,
        final_mode: ExposureMode,
    ) -> SimulationResult {
        let dates: Vec<NaiveDate> = curve.iter().map(|c| c.date).collect();
        let equity: Vec<f64> = curve.iter().map(|c| c.equity).collect();
        let bench: Vec<f64> = curve.iter().map(|c| c.benchmark).collect();

        let start = dates[0];
        let end = dates[dates.len() - 1];
        let count = |e: TransitionEvent| events.iter().filter(|r| r.event == e).count();
        let exposed_days = curve.iter().filter(|c| c.mode.is_exposed()).count();

        let summary = SimulationSummary {
            start,
            end,
            trading_days: curve.len(),
            years: crate::metrics::years_between(start, end),
            strategy: ReturnStats::compute(&dates, &equity),
            benchmark: ReturnStats::compute(&dates, &bench),
            pauses: count(TransitionEvent::PauseTriggered),
            resumes: count(TransitionEvent::ResumeTriggered),
            exposed_days,
            paused_days: curve.len() - exposed_days,
            final_mode,
        };

        SimulationResult {
            rule: *self.rule(),
            fingerprint: self.rule().fingerprint(),
            summary,
            yearly: yearly_breakdown(&dates, &equity, &bench),
            milestones: milestones(&dates, &equity, &bench, &DEFAULT_MILESTONE_YEARS),
            events,
            curve,
        }
    }
}
