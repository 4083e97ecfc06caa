//! Target allocation derived from the decision state.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use ddguard_core::{DecisionState, ExposureMode, TransitionEvent};
use serde::{Deserialize, Serialize};

use crate::config::{PortfolioConfig, RunMode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveMetrics {
    pub equity: f64,
    pub drawdown: f64,
    pub high_water_mark: f64,
    pub days_paused: u32,
    pub trend_confirmation_days: u32,
}

/// The document handed to downstream execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationDirective {
    pub timestamp: DateTime<Utc>,
    pub as_of: NaiveDate,
    pub mode: ExposureMode,
    pub run_mode: RunMode,
    /// Symbol → weight. Always sums to 1.0.
    pub allocations: BTreeMap<String, f64>,
    pub metrics: DirectiveMetrics,
    pub event: TransitionEvent,
}

impl AllocationDirective {
    pub fn from_state(
        state: &DecisionState,
        portfolio: &PortfolioConfig,
        as_of: NaiveDate,
        run_mode: RunMode,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let symbol = match state.mode {
            ExposureMode::Exposed => &portfolio.leveraged_symbol,
            ExposureMode::Paused => &portfolio.cash_symbol,
        };
        let mut allocations = BTreeMap::new();
        allocations.insert(symbol.clone(), 1.0);

        Self {
            timestamp,
            as_of,
            mode: state.mode,
            run_mode,
            allocations,
            metrics: DirectiveMetrics {
                equity: state.equity,
                drawdown: state.drawdown,
                high_water_mark: state.high_water_mark,
                days_paused: state.days_paused,
                trend_confirmation_days: state.trend_confirmation_days,
            },
            event: state.last_event,
        }
    }

    /// The one symbol carrying weight.
    pub fn target_symbol(&self) -> Option<&str> {
        self.allocations
            .iter()
            .find(|(_, &w)| w > 0.0)
            .map(|(s, _)| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 21, 0, 0).unwrap()
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    #[test]
    fn exposed_allocates_fully_to_leveraged_symbol() {
        let state = DecisionState::new(10_000.0);
        let d = AllocationDirective::from_state(&state, &PortfolioConfig::default(), as_of(), RunMode::Live, ts());
        assert_eq!(d.allocations.len(), 1);
        assert_eq!(d.allocations.get("UPRO"), Some(&1.0));
        assert_eq!(d.target_symbol(), Some("UPRO"));
    }

    #[test]
    fn paused_allocates_fully_to_cash() {
        let mut state = DecisionState::new(10_000.0);
        state.mode = ExposureMode::Paused;
        state.days_paused = 4;
        let d = AllocationDirective::from_state(&state, &PortfolioConfig::default(), as_of(), RunMode::Shadow, ts());
        assert_eq!(d.allocations.get("CASH"), Some(&1.0));
        assert_eq!(d.metrics.days_paused, 4);
        assert_eq!(d.run_mode, RunMode::Shadow);
    }

    #[test]
    fn serialized_shape() {
        let d = AllocationDirective::from_state(
            &DecisionState::new(10_000.0),
            &PortfolioConfig::default(),
            as_of(),
            RunMode::Live,
            ts(),
        );
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["mode"], "EXPOSED");
        assert_eq!(v["event"], "NO_CHANGE");
        assert_eq!(v["run_mode"], "live");
        assert_eq!(v["allocations"]["UPRO"], 1.0);
        assert_eq!(v["metrics"]["high_water_mark"], 10_000.0);
    }
}
