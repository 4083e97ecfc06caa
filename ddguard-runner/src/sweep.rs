//! Parameter sweeps over rule configurations.
//!
//! Scenarios are plain `RuleConfig` values. Simulations share one prepared
//! series and nothing mutable, so they fan out on rayon's pool; results come
//! back in grid order regardless.

use chrono::NaiveDate;
use ddguard_core::RuleConfig;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::simulator::{HistoricalSimulator, PreparedSeries, SimulationError, SimulationResult};

/// A named rule parameterization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub rule: RuleConfig,
}

impl Scenario {
    pub fn new(name: impl Into<String>, rule: RuleConfig) -> Self {
        Self {
            name: name.into(),
            rule,
        }
    }
}

/// The sensitivity-study presets, on top of `base` (leverage, SMA period).
pub fn preset_scenarios(base: &RuleConfig) -> Vec<Scenario> {
    let with = |limit: f64, wait: u32, trend: u32| RuleConfig {
        pause_drawdown_limit: limit,
        resume_wait_days: wait,
        resume_trend_days: trend,
        ..*base
    };
    vec![
        Scenario::new("baseline", with(0.25, 60, 20)),
        Scenario::new("test_a", with(0.22, 30, 10)),
        Scenario::new("test_b", with(0.28, 30, 10)),
        Scenario::new("var_c", with(0.25, 30, 10)),
    ]
}

/// Look up a single preset by name.
pub fn preset(name: &str, base: &RuleConfig) -> Option<Scenario> {
    preset_scenarios(base)
        .into_iter()
        .find(|s| s.name.eq_ignore_ascii_case(name))
}

/// Cartesian grid of rule parameters.
///
/// Leverage and SMA period come from the base config.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    pub pause_limits: Vec<f64>,
    pub wait_days: Vec<u32>,
    pub trend_days: Vec<u32>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            pause_limits: vec![0.20, 0.22, 0.25, 0.28, 0.30],
            wait_days: vec![30, 60],
            trend_days: vec![10, 20],
        }
    }
}

impl ParamGrid {
    pub fn size(&self) -> usize {
        self.pause_limits.len() * self.wait_days.len() * self.trend_days.len()
    }

    /// Expand into scenarios, limits outermost.
    pub fn scenarios(&self, base: &RuleConfig) -> Vec<Scenario> {
        let mut out = Vec::with_capacity(self.size());
        for &limit in &self.pause_limits {
            for &wait in &self.wait_days {
                for &trend in &self.trend_days {
                    let rule = RuleConfig {
                        pause_drawdown_limit: limit,
                        resume_wait_days: wait,
                        resume_trend_days: trend,
                        ..*base
                    };
                    out.push(Scenario::new(rule.label(), rule));
                }
            }
        }
        out
    }
}

/// One sweep row: a scenario and its simulation.
#[derive(Debug, Clone)]
pub struct SweepRow {
    pub scenario: Scenario,
    pub result: SimulationResult,
}

/// Sweep executor over a prepared series.
pub struct ParamSweep<'a> {
    series: &'a PreparedSeries,
    initial_equity: f64,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    parallel: bool,
}

impl<'a> ParamSweep<'a> {
    pub fn new(series: &'a PreparedSeries, initial_equity: f64) -> Self {
        Self {
            series,
            initial_equity,
            start: None,
            end: None,
            parallel: true,
        }
    }

    pub fn with_window(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run every scenario. The first failure aborts the sweep.
    ///
    /// Scenarios must share the SMA period the series was prepared with.
    pub fn run(&self, scenarios: &[Scenario]) -> Result<Vec<SweepRow>, SimulationError> {
        let run_one = |scenario: &Scenario| -> Result<SweepRow, SimulationError> {
            let sim = HistoricalSimulator::new(scenario.rule, self.initial_equity)?;
            let result = sim.run_window(self.series, self.start, self.end)?;
            Ok(SweepRow {
                scenario: scenario.clone(),
                result,
            })
        };

        if self.parallel {
            scenarios.par_iter().map(run_one).collect()
        } else {
            scenarios.iter().map(run_one).collect()
        }
    }
}

/// Rows ordered by final strategy equity, best first.
pub fn rank_by_final_equity(rows: &[SweepRow]) -> Vec<&SweepRow> {
    let mut sorted: Vec<&SweepRow> = rows.iter().collect();
    sorted.sort_by(|a, b| {
        b.result
            .summary
            .strategy
            .final_value
            .total_cmp(&a.result.summary.strategy.final_value)
    });
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddguard_core::PricePoint;

    fn prepared() -> PreparedSeries {
        let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let closes = [100.0, 92.0, 93.0, 95.0, 97.0, 99.0, 90.0, 96.0, 101.0, 103.0];
        let pts = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PricePoint::new(base + chrono::Duration::days(i as i64), c))
            .collect();
        PreparedSeries::new(pts, 3).unwrap()
    }

    fn base() -> RuleConfig {
        RuleConfig {
            trend_sma_period: 3,
            ..RuleConfig::default()
        }
    }

    #[test]
    fn presets_match_sensitivity_table() {
        let p = preset_scenarios(&base());
        let table: Vec<_> = p
            .iter()
            .map(|s| {
                (
                    s.name.as_str(),
                    s.rule.pause_drawdown_limit,
                    s.rule.resume_wait_days,
                    s.rule.resume_trend_days,
                )
            })
            .collect();
        assert_eq!(
            table,
            vec![
                ("baseline", 0.25, 60, 20),
                ("test_a", 0.22, 30, 10),
                ("test_b", 0.28, 30, 10),
                ("var_c", 0.25, 30, 10),
            ]
        );
        assert!(p.iter().all(|s| s.rule.trend_sma_period == 3));
        assert_eq!(preset("TEST_B", &base()).unwrap().rule.pause_drawdown_limit, 0.28);
        assert!(preset("nope", &base()).is_none());
    }

    #[test]
    fn grid_expands_in_order() {
        let grid = ParamGrid {
            pause_limits: vec![0.2, 0.3],
            wait_days: vec![5],
            trend_days: vec![1, 2],
        };
        let sc = grid.scenarios(&base());
        assert_eq!(sc.len(), grid.size());
        assert_eq!(sc[0].rule.pause_drawdown_limit, 0.2);
        assert_eq!(sc[1].rule.resume_trend_days, 2);
        assert_eq!(sc[3].rule.pause_drawdown_limit, 0.3);
    }

    #[test]
    fn parallel_matches_sequential() {
        let series = prepared();
        let grid = ParamGrid {
            pause_limits: vec![0.1, 0.2, 0.3],
            wait_days: vec![1, 3],
            trend_days: vec![1, 2],
        };
        let sc = grid.scenarios(&base());
        let par = ParamSweep::new(&series, 10_000.0).run(&sc).unwrap();
        let seq = ParamSweep::new(&series, 10_000.0)
            .with_parallelism(false)
            .run(&sc)
            .unwrap();
        assert_eq!(par.len(), sc.len());
        for (a, b) in par.iter().zip(&seq) {
            assert_eq!(a.scenario, b.scenario);
            assert_eq!(a.result, b.result);
        }
    }

    #[test]
    fn invalid_scenario_fails_sweep() {
        let series = prepared();
        let bad = vec![Scenario::new("bad", RuleConfig::new(1.5, 1, 1))];
        assert!(ParamSweep::new(&series, 10_000.0).run(&bad).is_err());
    }

    #[test]
    fn ranking_is_descending() {
        let series = prepared();
        let rows = ParamSweep::new(&series, 10_000.0)
            .run(&preset_scenarios(&base()))
            .unwrap();
        let ranked = rank_by_final_equity(&rows);
        for pair in ranked.windows(2) {
            assert!(
                pair[0].result.summary.strategy.final_value
                    >= pair[1].result.summary.strategy.final_value
            );
        }
    }
}
