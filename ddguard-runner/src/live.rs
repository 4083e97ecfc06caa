//! Live single-step runner.
//!
//! One invocation: load state → read override → fetch snapshot → one rule
//! step → persist → publish directive → log performance → notify. Any
//! failure before the save leaves the persisted state untouched.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use ddguard_core::{
    ConfigError, DecisionState, MarketSnapshot, RuleEngine, StepInput, StepOutcome,
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::allocation::AllocationDirective;
use crate::config::{AppConfig, PortfolioConfig, RunMode};
use crate::notify::{Notification, Notifier};
use crate::performance::{PerformanceLog, PerformanceRow};
use crate::provider::{DataUnavailable, SnapshotProvider};
use crate::state_store::{write_json_atomic, ManualOverride, OverrideStore, StateStore, StateStoreError};

#[derive(Debug, Error)]
pub enum LiveError {
    #[error("market data unavailable: {0}")]
    DataUnavailable(#[from] DataUnavailable),

    #[error("market date {date} was already processed (use --force to re-apply)")]
    AlreadyProcessed { date: NaiveDate },

    #[error("observed equity must be finite and > 0, got {0}")]
    InvalidEquity(f64),

    #[error("state store error: {0}")]
    State(#[from] StateStoreError),

    #[error("failed to write allocation directive: {0}")]
    Directive(#[source] StateStoreError),
}

/// Where the step's equity comes from.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum EquitySource {
    /// Compound the persisted equity by the leveraged benchmark return.
    #[default]
    Modeled,
    /// Replace the persisted equity with a broker-reported value; no return applied.
    Observed(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveRunOptions {
    pub as_of: NaiveDate,
    pub equity: EquitySource,
    /// Re-apply a step for an already processed market date.
    pub force: bool,
}

impl LiveRunOptions {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            equity: EquitySource::Modeled,
            force: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiveReport {
    pub snapshot: MarketSnapshot,
    pub manual_pause: bool,
    pub outcome: StepOutcome,
    pub directive: AllocationDirective,
    /// `None` in shadow mode.
    pub directive_path: Option<PathBuf>,
    /// `None` when the log is disabled or could not be written.
    pub performance: Option<PerformanceRow>,
}

/// Read-only view for `status`.
#[derive(Debug, Clone)]
pub struct LiveStatus {
    pub state: DecisionState,
    pub persisted: bool,
    pub manual_override: ManualOverride,
}

pub struct LiveRunner<P, N> {
    engine: RuleEngine,
    portfolio: PortfolioConfig,
    state_store: StateStore,
    override_store: OverrideStore,
    decision_path: PathBuf,
    performance: Option<PerformanceLog>,
    run_mode: RunMode,
    provider: P,
    notifier: N,
}

impl<P: SnapshotProvider, N: Notifier> LiveRunner<P, N> {
    pub fn new(config: &AppConfig, provider: P, notifier: N) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            engine: RuleEngine::new(config.rule)?,
            portfolio: config.portfolio.clone(),
            state_store: StateStore::new(&config.live.state_path),
            override_store: OverrideStore::new(&config.live.override_path),
            decision_path: config.live.decision_path.clone(),
            performance: config.live.performance_path.clone().map(PerformanceLog::new),
            run_mode: config.live.mode,
            provider,
            notifier,
        })
    }

    pub fn with_run_mode(mut self, run_mode: RunMode) -> Self {
        self.run_mode = run_mode;
        self
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    pub fn status(&self) -> Result<LiveStatus, StateStoreError> {
        let loaded = self.state_store.load()?;
        Ok(LiveStatus {
            persisted: loaded.is_some(),
            state: loaded.unwrap_or_else(|| DecisionState::new(self.portfolio.initial_equity)),
            manual_override: self.override_store.load()?,
        })
    }

    /// Apply exactly one step for `opts.as_of`.
    pub fn run(&self, opts: &LiveRunOptions, now: DateTime<Utc>) -> Result<LiveReport, LiveError> {
        let mut state = self
            .state_store
            .load_or_default(self.portfolio.initial_equity)?;
        let manual_pause = self.override_store.is_paused()?;

        let snapshot = self.provider.snapshot(opts.as_of).map_err(|e| {
            error!(as_of = %opts.as_of, error = %e, "snapshot unavailable; state left untouched");
            e
        })?;
        if snapshot.date != opts.as_of {
            info!(as_of = %opts.as_of, market_date = %snapshot.date, "using latest prior observation");
        }

        if let Some(last) = state.last_step_on {
            if last >= snapshot.date {
                if !opts.force {
                    return Err(LiveError::AlreadyProcessed {
                        date: snapshot.date,
                    });
                }
                warn!(
                    market_date = %snapshot.date,
                    last_step_on = %last,
                    "forced re-run: the step is applied again"
                );
            }
        }

        let market_return = match opts.equity {
            EquitySource::Observed(equity) => {
                if !(equity.is_finite() && equity > 0.0) {
                    return Err(LiveError::InvalidEquity(equity));
                }
                info!(persisted = state.equity, observed = equity, "using observed equity");
                state.equity = equity;
                0.0
            }
            EquitySource::Modeled => match snapshot.daily_return() {
                Some(r) => r,
                // Only an exposed, un-overridden step consumes the return.
                None if state.is_paused() || manual_pause => 0.0,
                None => {
                    let e = DataUnavailable::MissingPreviousClose {
                        date: snapshot.date,
                    };
                    error!(error = %e, "snapshot unavailable; state left untouched");
                    return Err(e.into());
                }
            },
        };

        let input = StepInput::new(snapshot.date, market_return, snapshot.is_uptrend())
            .with_manual_pause(manual_pause);
        let outcome = self.engine.step(&state, &input);

        self.state_store.save(&outcome.state, now)?;

        let directive = AllocationDirective::from_state(
            &outcome.state,
            &self.portfolio,
            snapshot.date,
            self.run_mode,
            now,
        );
        let directive_path = match self.run_mode {
            RunMode::Live => {
                write_json_atomic(&self.decision_path, &directive).map_err(LiveError::Directive)?;
                Some(self.decision_path.clone())
            }
            RunMode::Shadow => {
                let json = serde_json::to_string(&directive).unwrap_or_default();
                info!(path = %self.decision_path.display(), directive = %json, "shadow mode: directive not written");
                None
            }
        };

        // The state is already saved; a log failure only costs the row.
        let performance = self.performance.as_ref().and_then(|log| {
            log.record_step(
                snapshot.date,
                snapshot.daily_return().unwrap_or(0.0),
                &outcome.state,
                outcome.event,
                self.portfolio.initial_equity,
            )
            .map_err(|e| warn!(path = %log.path().display(), error = %e, "performance log not updated"))
            .ok()
        });

        if let Some(n) = Notification::from_outcome(&outcome, now) {
            if let Err(e) = self.notifier.notify(&n) {
                warn!(error = %e, "notification failed");
            }
        }

        let s = &outcome.state;
        info!(
            market_date = %snapshot.date,
            mode = %s.mode,
            event = %outcome.event,
            equity = s.equity,
            drawdown = s.drawdown,
            days_paused = s.days_paused,
            trend_days = s.trend_confirmation_days,
            manual_pause,
            "step complete"
        );

        Ok(LiveReport {
            snapshot,
            manual_pause,
            outcome,
            directive,
            directive_path,
            performance,
        })
    }
}
