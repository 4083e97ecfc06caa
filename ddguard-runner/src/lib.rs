//! ddguard runner: orchestration around the pure rule engine.
//!
//! This crate builds on `ddguard-core` to provide:
//! - TOML application config
//! - CSV price loading and a series-backed snapshot provider
//! - Atomic JSON persistence for the decision state and manual override
//! - The live single-step runner with allocation directives and alerts
//! - Market flags and the daily paper-trading performance log
//! - Historical simulation, metrics, parameter sweeps and period studies
//! - JSON/CSV export

pub mod allocation;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod flags;
pub mod live;
pub mod metrics;
pub mod notify;
pub mod performance;
pub mod periods;
pub mod provider;
pub mod simulator;
pub mod state_store;
pub mod sweep;

pub use allocation::{AllocationDirective, DirectiveMetrics};
pub use config::{
    AppConfig, ConfigLoadError, FlagsConfig, LiveConfig, NotificationConfig, PortfolioConfig,
    RunMode,
};
pub use data_loader::{load_prices, load_prices_from_reader, LoadError};
pub use flags::{market_flags, FlagEntry, FlagReport, MarketFlag};
pub use live::{EquitySource, LiveError, LiveReport, LiveRunOptions, LiveRunner, LiveStatus};
pub use metrics::{Milestone, ReturnStats, YearlyRow};
pub use notify::{
    FanoutNotifier, Notification, NotificationKind, Notifier, NotifyError, NullNotifier,
    OutboxNotifier, TracingNotifier,
};
pub use performance::{
    PerformanceError, PerformanceHistory, PerformanceLog, PerformanceRow, RecordAction,
};
pub use periods::{calendar_blocks, run_windows, trailing_windows, PeriodResult, PeriodWindow};
pub use provider::{DataUnavailable, SeriesSnapshotProvider, SnapshotProvider};
pub use simulator::{
    CurvePoint, EventRecord, HistoricalSimulator, PreparedSeries, SimulationError,
    SimulationResult, SimulationSummary,
};
pub use state_store::{ManualOverride, OverrideStore, PersistedState, StateStore, StateStoreError};
pub use sweep::{preset, preset_scenarios, ParamGrid, ParamSweep, Scenario, SweepRow};

/// Build the notifier described by the config: tracing always, plus the
/// outbox when one is configured.
pub fn build_notifier(config: &NotificationConfig) -> FanoutNotifier {
    if !config.enabled {
        return FanoutNotifier::new();
    }
    let fanout = FanoutNotifier::new().with(TracingNotifier);
    match &config.outbox_path {
        Some(path) => fanout.with(OutboxNotifier::new(path)),
        None => fanout,
    }
}

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn simulation_types_are_send_sync() {
        assert_send::<SimulationResult>();
        assert_sync::<SimulationResult>();
        assert_send::<PreparedSeries>();
        assert_sync::<PreparedSeries>();
        assert_send::<HistoricalSimulator>();
        assert_sync::<HistoricalSimulator>();
    }

    #[test]
    fn sweep_types_are_send_sync() {
        assert_send::<Scenario>();
        assert_sync::<Scenario>();
        assert_send::<SweepRow>();
        assert_sync::<SweepRow>();
    }

    #[test]
    fn log_types_are_send_sync() {
        assert_send::<PerformanceLog>();
        assert_sync::<PerformanceLog>();
        assert_send::<FlagReport>();
        assert_sync::<FlagReport>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<AppConfig>();
        assert_sync::<AppConfig>();
    }

    #[test]
    fn notifier_types_are_send_sync() {
        assert_send::<FanoutNotifier>();
        assert_sync::<FanoutNotifier>();
        assert_send::<OutboxNotifier>();
        assert_sync::<OutboxNotifier>();
    }

    #[test]
    fn disabled_notifications_build_empty_fanout() {
        let cfg = NotificationConfig {
            enabled: false,
            outbox_path: None,
        };
        assert!(build_notifier(&cfg).is_empty());
        assert_eq!(build_notifier(&NotificationConfig::default()).len(), 2);
    }
}
