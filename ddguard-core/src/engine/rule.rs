//! The pause/resume state machine.
//!
//! One call to [`RuleEngine::step`] is one trading day. The function is pure:
//! the caller owns persistence, logging, and notification.
//!
//! Per step, in priority order:
//! 1. manual override forces `Paused` and suppresses the automatic rules
//! 2. `Exposed`: apply leveraged return, raise the high-water mark, pause on
//!    `drawdown <= -limit`
//! 3. `Paused`: hold equity, count the day, extend or reset the trend streak,
//!    resume once both the wait and the streak are satisfied

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, RuleConfig};
use crate::domain::state::drawdown;
use crate::domain::{DecisionState, ExposureMode, TransitionEvent};

/// Market facts and operator intent for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepInput {
    pub date: NaiveDate,
    /// Unleveraged benchmark return for the day.
    pub market_return: f64,
    pub is_uptrend: bool,
    pub manual_pause: bool,
}

impl StepInput {
    pub fn new(date: NaiveDate, market_return: f64, is_uptrend: bool) -> Self {
        Self {
            date,
            market_return,
            is_uptrend,
            manual_pause: false,
        }
    }

    pub fn with_manual_pause(mut self, manual_pause: bool) -> Self {
        self.manual_pause = manual_pause;
        self
    }
}

/// What caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    DrawdownLimit,
    ManualOverride,
    TrendConfirmed,
}

/// Result of a single step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub state: DecisionState,
    pub event: TransitionEvent,
    /// Set iff `event` is a transition.
    pub trigger: Option<Trigger>,
}

impl StepOutcome {
    pub fn transitioned(&self) -> bool {
        self.event.is_transition()
    }
}

/// Parameterized decision rule.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    config: RuleConfig,
}

impl RuleEngine {
    /// Build an engine, rejecting invalid parameters up front.
    pub fn new(config: RuleConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    /// Apply one trading day to `state`.
    pub fn step(&self, state: &DecisionState, input: &StepInput) -> StepOutcome {
        let mut next = state.clone();
        next.last_event = TransitionEvent::NoChange;
        next.last_step_on = Some(input.date);

        if input.manual_pause {
            return self.apply_manual_pause(next, input.date);
        }

        match next.mode {
            ExposureMode::Exposed => self.step_exposed(next, input),
            ExposureMode::Paused => self.step_paused(next, input),
        }
    }

    fn apply_manual_pause(&self, mut next: DecisionState, date: NaiveDate) -> StepOutcome {
        if next.mode == ExposureMode::Exposed {
            next.enter_pause(date);
            return StepOutcome {
                state: next,
                event: TransitionEvent::PauseTriggered,
                trigger: Some(Trigger::ManualOverride),
            };
        }
        // Already paused: counters frozen while the operator holds the override.
        StepOutcome {
            state: next,
            event: TransitionEvent::NoChange,
            trigger: None,
        }
    }

    fn step_exposed(&self, mut next: DecisionState, input: &StepInput) -> StepOutcome {
        // A leveraged loss beyond -100% wipes the position out; equity floors at 0.
        let factor = 1.0 + input.market_return * self.config.leverage_multiplier;
        next.equity = (next.equity * factor).max(0.0);
        if next.equity > next.high_water_mark {
            next.high_water_mark = next.equity;
        }
        next.drawdown = drawdown(next.equity, next.high_water_mark);

        if next.drawdown <= -self.config.pause_drawdown_limit {
            next.enter_pause(input.date);
            return StepOutcome {
                state: next,
                event: TransitionEvent::PauseTriggered,
                trigger: Some(Trigger::DrawdownLimit),
            };
        }

        StepOutcome {
            state: next,
            event: TransitionEvent::NoChange,
            trigger: None,
        }
    }

    fn step_paused(&self, mut next: DecisionState, input: &StepInput) -> StepOutcome {
        next.days_paused = next.days_paused.saturating_add(1);
        next.trend_confirmation_days = if input.is_uptrend {
            next.trend_confirmation_days.saturating_add(1)
        } else {
            0
        };

        if next.days_paused >= self.config.resume_wait_days
            && next.trend_confirmation_days >= self.config.resume_trend_days
        {
            next.resume();
            return StepOutcome {
                state: next,
                event: TransitionEvent::ResumeTriggered,
                trigger: Some(Trigger::TrendConfirmed),
            };
        }

        StepOutcome {
            state: next,
            event: TransitionEvent::NoChange,
            trigger: None,
        }
    }
}
