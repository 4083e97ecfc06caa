//! DecisionState: the persisted/simulated unit of strategy state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Exposure mode of the strategy.
///
/// Legacy state files label the exposed mode `"ON"` or `"ACTIVE"`; both are
/// accepted on read. Writes always use the canonical names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExposureMode {
    /// Holding the leveraged instrument.
    #[default]
    #[serde(alias = "ON", alias = "ACTIVE")]
    Exposed,
    /// Sitting in cash.
    Paused,
}

impl ExposureMode {
    pub fn is_exposed(self) -> bool {
        matches!(self, ExposureMode::Exposed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExposureMode::Exposed => "EXPOSED",
            ExposureMode::Paused => "PAUSED",
        }
    }
}

impl std::fmt::Display for ExposureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Most recent transition label. Descriptive only; never read by the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionEvent {
    #[default]
    NoChange,
    PauseTriggered,
    ResumeTriggered,
}

impl TransitionEvent {
    pub fn is_transition(self) -> bool {
        !matches!(self, TransitionEvent::NoChange)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransitionEvent::NoChange => "NO_CHANGE",
            TransitionEvent::PauseTriggered => "PAUSE_TRIGGERED",
            TransitionEvent::ResumeTriggered => "RESUME_TRIGGERED",
        }
    }
}

impl std::fmt::Display for TransitionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy state mutated once per step.
///
/// Invariants maintained by [`crate::engine::RuleEngine`]:
/// - while `Paused`, `equity` does not move with the market
/// - while `Exposed`, `high_water_mark >= equity`
/// - both counters reset to 0 on every mode transition
///
/// Field aliases accept the flat legacy engine-state layout (`state`, `ath`,
/// `days_paused_count`, `pause_start_date`, `last_run_date`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionState {
    #[serde(default, alias = "state")]
    pub mode: ExposureMode,
    pub equity: f64,
    /// A missing peak reads as 0; the next exposed step raises it to equity.
    #[serde(default, alias = "ath")]
    pub high_water_mark: f64,
    #[serde(default)]
    pub drawdown: f64,
    #[serde(default, alias = "days_paused_count")]
    pub days_paused: u32,
    #[serde(default)]
    pub trend_confirmation_days: u32,
    #[serde(default, alias = "event")]
    pub last_event: TransitionEvent,
    /// Date the current pause began. `None` while exposed.
    #[serde(default, alias = "pause_start_date")]
    pub pause_started_on: Option<NaiveDate>,
    /// Date of the last applied step.
    #[serde(default, alias = "last_run_date")]
    pub last_step_on: Option<NaiveDate>,
}

impl DecisionState {
    /// Fresh state: exposed, high-water mark at the starting equity.
    pub fn new(initial_equity: f64) -> Self {
        Self {
            mode: ExposureMode::Exposed,
            equity: initial_equity,
            high_water_mark: initial_equity,
            drawdown: 0.0,
            days_paused: 0,
            trend_confirmation_days: 0,
            last_event: TransitionEvent::NoChange,
            pause_started_on: None,
            last_step_on: None,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.mode == ExposureMode::Paused
    }

    /// Move to `Paused` and clear both counters.
    pub(crate) fn enter_pause(&mut self, date: NaiveDate) {
        self.mode = ExposureMode::Paused;
        self.days_paused = 0;
        self.trend_confirmation_days = 0;
        self.pause_started_on = Some(date);
        self.last_event = TransitionEvent::PauseTriggered;
    }

    /// Move to `Exposed`, forgetting the pre-pause peak.
    pub(crate) fn resume(&mut self) {
        self.mode = ExposureMode::Exposed;
        self.high_water_mark = self.equity;
        self.drawdown = 0.0;
        self.days_paused = 0;
        self.trend_confirmation_days = 0;
        self.pause_started_on = None;
        self.last_event = TransitionEvent::ResumeTriggered;
    }
}

/// `equity / hwm - 1`, or 0 when the high-water mark is not positive.
pub fn drawdown(equity: f64, high_water_mark: f64) -> f64 {
    if high_water_mark > 0.0 {
        equity / high_water_mark - 1.0
    } else {
        0.0
    }
}
