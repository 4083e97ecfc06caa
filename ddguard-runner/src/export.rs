//! Reporting and export: JSON and CSV artifact generation.
//!
//! - **JSON**: full simulation report with schema versioning
//! - **CSV**: equity curve, event log, sweep and period tables, paper-trading log
//!
//! Persisted reports include a `schema_version` field. Unknown versions are
//! rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::performance::PerformanceRow;
use crate::periods::PeriodResult;
use crate::simulator::{CurvePoint, EventRecord, SimulationResult};
use crate::sweep::SweepRow;

pub const REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub schema_version: u32,
    #[serde(flatten)]
    pub result: SimulationResult,
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(result: &SimulationResult) -> Result<String> {
    let report = SimulationReport {
        schema_version: REPORT_SCHEMA_VERSION,
        result: result.clone(),
    };
    serde_json::to_string_pretty(&report).context("failed to serialize simulation report to JSON")
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<SimulationResult> {
    let report: SimulationReport =
        serde_json::from_str(json).context("failed to deserialize simulation report from JSON")?;
    if report.schema_version > REPORT_SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            REPORT_SCHEMA_VERSION
        );
    }
    Ok(report.result)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: date, price, equity, benchmark, mode, drawdown, event
pub fn export_equity_csv(curve: &[CurvePoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "price", "equity", "benchmark", "mode", "drawdown", "event"])?;
    for c in curve {
        wtr.write_record([
            c.date.to_string(),
            format!("{:.4}", c.price),
            format!("{:.2}", c.equity),
            format!("{:.2}", c.benchmark),
            c.mode.as_str().to_string(),
            format!("{:.6}", c.drawdown),
            c.event.as_str().to_string(),
        ])?;
    }
    finish(wtr)
}

/// Columns: date, event, trigger, price, equity, drawdown, days_paused
pub fn export_events_csv(events: &[EventRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "event", "trigger", "price", "equity", "drawdown", "days_paused"])?;
    for e in events {
        let trigger = e
            .trigger
            .and_then(|t| serde_json::to_value(t).ok())
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();
        wtr.write_record([
            e.date.to_string(),
            e.event.as_str().to_string(),
            trigger,
            format!("{:.4}", e.price),
            format!("{:.2}", e.equity),
            format!("{:.6}", e.drawdown),
            e.days_paused.to_string(),
        ])?;
    }
    finish(wtr)
}

const SUMMARY_COLUMNS: [&str; 9] = [
    "final_equity",
    "total_return",
    "cagr",
    "max_drawdown",
    "benchmark_final",
    "benchmark_cagr",
    "pauses",
    "resumes",
    "paused_days",
];

fn summary_fields(r: &SimulationResult) -> [String; 9] {
    let s = &r.summary;
    [
        format!("{:.2}", s.strategy.final_value),
        format!("{:.6}", s.strategy.total_return),
        format!("{:.6}", s.strategy.cagr),
        format!("{:.6}", s.strategy.max_drawdown),
        format!("{:.2}", s.benchmark.final_value),
        format!("{:.6}", s.benchmark.cagr),
        s.pauses.to_string(),
        s.resumes.to_string(),
        s.paused_days.to_string(),
    ]
}

/// One row per scenario, in sweep order.
pub fn export_sweep_csv(rows: &[SweepRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["scenario", "pause_limit", "wait_days", "trend_days", "fingerprint"];
    header.extend(SUMMARY_COLUMNS);
    wtr.write_record(&header)?;
    for row in rows {
        let rule = &row.scenario.rule;
        let mut rec = vec![
            row.scenario.name.clone(),
            rule.pause_drawdown_limit.to_string(),
            rule.resume_wait_days.to_string(),
            rule.resume_trend_days.to_string(),
            row.result.fingerprint.clone(),
        ];
        rec.extend(summary_fields(&row.result));
        wtr.write_record(&rec)?;
    }
    finish(wtr)
}

/// One row per simulated window.
pub fn export_periods_csv(rows: &[PeriodResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["window", "start", "end"];
    header.extend(SUMMARY_COLUMNS);
    wtr.write_record(&header)?;
    for row in rows {
        let mut rec = vec![
            row.window.label.clone(),
            row.result.summary.start.to_string(),
            row.result.summary.end.to_string(),
        ];
        rec.extend(summary_fields(&row.result));
        wtr.write_record(&rec)?;
    }
    finish(wtr)
}

pub fn export_performance_csv(rows: &[PerformanceRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "benchmark", "strategy", "mode", "event"])?;
    for r in rows {
        wtr.write_record([
            r.date.to_string(),
            format!("{:.2}", r.benchmark),
            format!("{:.2}", r.strategy),
            r.mode.as_str().to_string(),
            r.event.as_str().to_string(),
        ])?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save `report.json`, `equity.csv` and `events.csv` under `output_dir/label/`.
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &SimulationResult, output_dir: &Path, label: &str) -> Result<PathBuf> {
    let run_dir = output_dir.join(label);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(result)?)?;
    std::fs::write(run_dir.join("equity.csv"), export_equity_csv(&result.curve)?)?;
    std::fs::write(run_dir.join("events.csv"), export_events_csv(&result.events)?)?;

    tracing::info!(dir = %run_dir.display(), "saved simulation artifacts");
    Ok(run_dir)
}

/// Load a report from an artifact directory's `report.json`.
pub fn load_artifacts(dir: &Path) -> Result<SimulationResult> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::HistoricalSimulator;
    use chrono::NaiveDate;
    use ddguard_core::{PricePoint, RuleConfig};

    fn result() -> SimulationResult {
        let base = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
        let closes = [100.0, 90.0, 92.0, 94.0, 96.0];
        let pts = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PricePoint::new(base + chrono::Duration::days(i as i64), c))
            .collect();
        let rule = RuleConfig {
            trend_sma_period: 2,
            ..RuleConfig::new(0.25, 2, 2)
        };
        HistoricalSimulator::new(rule, 10_000.0).unwrap().run(pts).unwrap()
    }

    #[test]
    fn json_report_has_schema_and_sections() {
        let json = export_json(&result()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["schema_version"], REPORT_SCHEMA_VERSION);
        for key in ["rule", "fingerprint", "summary", "events", "yearly", "milestones", "curve"] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn import_restores_result() {
        let r = result();
        let back = import_json(&export_json(&r).unwrap()).unwrap();
        assert_eq!(back.rule, r.rule);
        assert_eq!(back.summary.pauses, r.summary.pauses);
        assert_eq!(back.summary.end, r.summary.end);
        assert_eq!(back.events.len(), r.events.len());
        assert_eq!(back.curve.len(), r.curve.len());
    }

    #[test]
    fn import_rejects_future_schema() {
        let mut v: serde_json::Value = serde_json::from_str(&export_json(&result()).unwrap()).unwrap();
        v["schema_version"] = serde_json::json!(REPORT_SCHEMA_VERSION + 1);
        let err = import_json(&v.to_string()).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    #[test]
    fn equity_csv_columns() {
        let csv = export_equity_csv(&result().curve).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("date,price,equity,benchmark,mode,drawdown,event"));
        assert_eq!(csv.lines().count(), 6);
        assert!(csv.contains("PAUSE_TRIGGERED"));
    }

    #[test]
    fn events_csv_includes_trigger() {
        let csv = export_events_csv(&result().events).unwrap();
        assert!(csv.contains("drawdown_limit"));
        assert!(csv.contains("trend_confirmed"));
    }

    #[test]
    fn performance_csv_rows() {
        use ddguard_core::{ExposureMode, TransitionEvent};
        let row = PerformanceRow {
            date: chrono::NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            benchmark: 10_100.0,
            strategy: 7_000.0,
            mode: ExposureMode::Paused,
            event: TransitionEvent::PauseTriggered,
        };
        let csv = export_performance_csv(&[row]).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "date,benchmark,strategy,mode,event");
        assert_eq!(lines[1], "2024-05-02,10100.00,7000.00,PAUSED,PAUSE_TRIGGERED");
    }

    #[test]
    fn artifacts_round_trip_through_directory() {
        let dir = tempfile::tempdir().unwrap();
        let r = result();
        let run_dir = save_artifacts(&r, dir.path(), "var_c").unwrap();
        assert!(run_dir.join("equity.csv").exists());
        assert!(run_dir.join("events.csv").exists());
        let loaded = load_artifacts(&run_dir).unwrap();
        assert_eq!(loaded.fingerprint, r.fingerprint);
    }
}
