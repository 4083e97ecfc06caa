//! Scenario tests for the pause/resume rule.
//!
//! Each scenario drives `RuleEngine::step` day by day from a hand-built state
//! and checks the resulting mode, counters, and high-water mark.

use chrono::NaiveDate;
use ddguard_core::{
    DecisionState, ExposureMode, MarketSnapshot, RuleConfig, RuleEngine, StepInput,
    TransitionEvent, Trigger,
};

fn day(n: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 3, 2).unwrap() + chrono::Duration::days(n)
}

fn paused_at(equity: f64) -> DecisionState {
    DecisionState {
        mode: ExposureMode::Paused,
        equity,
        high_water_mark: equity / 0.75,
        drawdown: -0.25,
        days_paused: 0,
        trend_confirmation_days: 0,
        last_event: TransitionEvent::PauseTriggered,
        pause_started_on: Some(day(0)),
        last_step_on: Some(day(0)),
    }
}

/// Scenario 1: cumulative leveraged loss reaches exactly -25%.
#[test]
fn scenario_drawdown_hits_limit_and_pauses() {
    let engine = RuleEngine::new(RuleConfig::new(0.25, 30, 10)).unwrap();
    let mut state = DecisionState::new(10_000.0);

    // Flat then a rally: new peak.
    state = engine.step(&state, &StepInput::new(day(1), 0.0, true)).state;
    assert_eq!(state.high_water_mark, 10_000.0);

    // A single -8.333..% benchmark day at 3x is a -25% strategy day.
    let out = engine.step(&state, &StepInput::new(day(2), -0.25 / 3.0, false));
    assert_eq!(out.event, TransitionEvent::PauseTriggered);
    assert_eq!(out.trigger, Some(Trigger::DrawdownLimit));
    assert_eq!(out.state.mode, ExposureMode::Paused);
    assert_eq!(out.state.days_paused, 0);
    assert_eq!(out.state.trend_confirmation_days, 0);
    assert!((out.state.drawdown + 0.25).abs() < 1e-12);
}

/// Scenario 1 (multi-day): losses accumulate until the threshold is crossed.
#[test]
fn scenario_cumulative_losses_pause_on_crossing_day() {
    let engine = RuleEngine::new(RuleConfig::new(0.25, 30, 10)).unwrap();
    let mut state = DecisionState::new(10_000.0);
    // 3 * -3.125% = -9.375% per day; after 2 days -17.9%, after 3 days -25.6%.
    for n in 1..=2 {
        let out = engine.step(&state, &StepInput::new(day(n), -0.03125, false));
        assert_eq!(out.event, TransitionEvent::NoChange, "day {n}");
        state = out.state;
    }
    let out = engine.step(&state, &StepInput::new(day(3), -0.03125, false));
    assert_eq!(out.event, TransitionEvent::PauseTriggered);
    assert!(out.state.drawdown < -0.25);
    assert_eq!(out.state.high_water_mark, 10_000.0);
}

/// Scenario 2: 30 paused days, last 10 in uptrend → resume on day 30.
#[test]
fn scenario_resume_after_wait_and_trend() {
    let engine = RuleEngine::new(RuleConfig::new(0.25, 30, 10)).unwrap();
    let mut state = paused_at(7_500.0);

    for n in 1..30 {
        let up = n > 20;
        let out = engine.step(&state, &StepInput::new(day(n), 0.01, up));
        assert_eq!(out.event, TransitionEvent::NoChange, "day {n}");
        assert_eq!(out.state.equity, 7_500.0);
        state = out.state;
    }
    assert_eq!(state.days_paused, 29);
    assert_eq!(state.trend_confirmation_days, 9);

    let out = engine.step(&state, &StepInput::new(day(30), 0.01, true));
    assert_eq!(out.event, TransitionEvent::ResumeTriggered);
    assert_eq!(out.state.mode, ExposureMode::Exposed);
    assert_eq!(out.state.high_water_mark, 7_500.0);
    assert_eq!(out.state.drawdown, 0.0);
    assert_eq!(out.state.days_paused, 0);
    assert_eq!(out.state.trend_confirmation_days, 0);
}

/// Scenario 3: an uptrend break on day 25 leaves the streak at 5 on day 30.
#[test]
fn scenario_trend_break_delays_resume() {
    let engine = RuleEngine::new(RuleConfig::new(0.25, 30, 10)).unwrap();
    let mut state = paused_at(7_500.0);

    for n in 1..=30 {
        let up = n > 20 && n != 25;
        let out = engine.step(&state, &StepInput::new(day(n), 0.0, up));
        assert_eq!(out.event, TransitionEvent::NoChange, "day {n}");
        state = out.state;
    }
    assert_eq!(state.days_paused, 30);
    assert_eq!(state.trend_confirmation_days, 5);
    assert_eq!(state.mode, ExposureMode::Paused);
}

/// Scenario 4: manual override pauses regardless of drawdown.
#[test]
fn scenario_manual_override_forces_pause() {
    let engine = RuleEngine::new(RuleConfig::new(0.25, 30, 10)).unwrap();
    let mut state = DecisionState::new(10_000.0);
    state.days_paused = 3;
    state.trend_confirmation_days = 2;

    let input = StepInput::new(day(1), 0.03, true).with_manual_pause(true);
    let out = engine.step(&state, &input);
    assert_eq!(out.state.mode, ExposureMode::Paused);
    assert_eq!(out.trigger, Some(Trigger::ManualOverride));
    assert_eq!(out.state.days_paused, 0);
    assert_eq!(out.state.trend_confirmation_days, 0);
    assert_eq!(out.state.drawdown, 0.0);
}

/// Scenario 5: an undefined trailing average is not an uptrend.
#[test]
fn scenario_undefined_average_makes_no_progress() {
    let engine = RuleEngine::new(RuleConfig::new(0.25, 1, 1)).unwrap();
    let mut state = paused_at(7_500.0);
    state.trend_confirmation_days = 4;

    let snapshot = MarketSnapshot {
        date: day(1),
        close_price: 420.0,
        previous_close: Some(410.0),
        trailing_average: None,
    };
    assert!(!snapshot.is_uptrend());

    let out = engine.step(
        &state,
        &StepInput::new(day(1), snapshot.daily_return().unwrap(), snapshot.is_uptrend()),
    );
    assert_eq!(out.state.trend_confirmation_days, 0);
    assert_eq!(out.event, TransitionEvent::NoChange);
    assert_eq!(out.state.mode, ExposureMode::Paused);
}

#[test]
fn resume_then_immediate_loss_measures_from_new_baseline() {
    let engine = RuleEngine::new(RuleConfig::new(0.25, 1, 1)).unwrap();
    let state = paused_at(6_000.0);
    let resumed = engine.step(&state, &StepInput::new(day(1), 0.0, true)).state;
    assert_eq!(resumed.high_water_mark, 6_000.0);

    // -1% at 3x from the reset peak is a -3% drawdown, not a pause.
    let out = engine.step(&resumed, &StepInput::new(day(2), -0.01, false));
    assert_eq!(out.event, TransitionEvent::NoChange);
    assert!((out.state.drawdown + 0.03).abs() < 1e-12);
}

#[test]
fn double_invocation_is_not_a_no_op() {
    let engine = RuleEngine::new(RuleConfig::new(0.25, 30, 10)).unwrap();
    let state = paused_at(7_500.0);
    let input = StepInput::new(day(1), 0.0, true);
    let once = engine.step(&state, &input).state;
    let twice = engine.step(&once, &input).state;
    assert_eq!(once.days_paused, 1);
    assert_eq!(twice.days_paused, 2);
    assert_eq!(twice.trend_confirmation_days, 2);
}
