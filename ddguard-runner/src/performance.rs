//! Paper-trading performance log.
//!
//! One row per market date with the modeled strategy equity next to a
//! buy-and-hold benchmark compounded from the same daily returns. Re-running
//! a date replaces its row, recomputed from the row before it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use ddguard_core::{DecisionState, ExposureMode, TransitionEvent};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::state_store::{write_json_atomic, StateStoreError};

pub const PERFORMANCE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PerformanceError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed performance log {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported schema version {found} (max supported: {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },

    #[error("cannot record {date}: log already ends at {last}")]
    OutOfOrder { date: NaiveDate, last: NaiveDate },

    #[error(transparent)]
    Store(#[from] StateStoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRow {
    pub date: NaiveDate,
    pub benchmark: f64,
    pub strategy: f64,
    pub mode: ExposureMode,
    pub event: TransitionEvent,
}

/// Whether [`PerformanceHistory::record`] added a row or rewrote the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordAction {
    Appended,
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceHistory {
    pub schema_version: u32,
    pub history: Vec<PerformanceRow>,
}

impl Default for PerformanceHistory {
    fn default() -> Self {
        Self {
            schema_version: PERFORMANCE_SCHEMA_VERSION,
            history: Vec::new(),
        }
    }
}

impl PerformanceHistory {
    pub fn last(&self) -> Option<&PerformanceRow> {
        self.history.last()
    }

    /// Benchmark value for `date` after `daily_return`, compounded from the
    /// latest row strictly before `date` (or `initial` for an empty log).
    pub fn next_benchmark(&self, date: NaiveDate, daily_return: f64, initial: f64) -> f64 {
        let base = self
            .history
            .iter()
            .rev()
            .find(|r| r.date < date)
            .map_or(initial, |r| r.benchmark);
        base * (1.0 + daily_return)
    }

    /// Append a newer row or replace the row for the same date.
    pub fn record(&mut self, row: PerformanceRow) -> Result<RecordAction, PerformanceError> {
        match self.history.last().map(|r| r.date) {
            Some(last) if last == row.date => {
                let n = self.history.len();
                self.history[n - 1] = row;
                Ok(RecordAction::Replaced)
            }
            Some(last) if last > row.date => Err(PerformanceError::OutOfOrder {
                date: row.date,
                last,
            }),
            _ => {
                self.history.push(row);
                Ok(RecordAction::Appended)
            }
        }
    }
}

/// File-backed performance log.
#[derive(Debug, Clone)]
pub struct PerformanceLog {
    path: PathBuf,
}

impl PerformanceLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the log; a missing file is an empty history.
    pub fn load(&self) -> Result<PerformanceHistory, PerformanceError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(PerformanceHistory::default()),
            Err(source) => {
                return Err(PerformanceError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let doc: PerformanceHistory =
            serde_json::from_str(&text).map_err(|source| PerformanceError::Json {
                path: self.path.clone(),
                source,
            })?;
        if doc.schema_version > PERFORMANCE_SCHEMA_VERSION {
            return Err(PerformanceError::UnsupportedSchema {
                found: doc.schema_version,
                supported: PERFORMANCE_SCHEMA_VERSION,
            });
        }
        Ok(doc)
    }

    /// Record the state after a live step for `date`.
    pub fn record_step(
        &self,
        date: NaiveDate,
        benchmark_return: f64,
        state: &DecisionState,
        event: TransitionEvent,
        initial_equity: f64,
    ) -> Result<PerformanceRow, PerformanceError> {
        let mut history = self.load()?;
        let row = PerformanceRow {
            date,
            benchmark: history.next_benchmark(date, benchmark_return, initial_equity),
            strategy: state.equity,
            mode: state.mode,
            event,
        };
        let action = history.record(row)?;
        write_json_atomic(&self.path, &history)?;
        info!(%date, ?action, strategy = row.strategy, benchmark = row.benchmark, "performance logged");
        Ok(row)
    }
}
