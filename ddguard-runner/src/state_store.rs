//! JSON persistence for the decision state and the manual override flag.
//!
//! - Atomic writes (write to .tmp, rename into place)
//! - A missing file is not an error: callers get `None` / defaults
//! - Every document carries a `schema_version`; newer versions are rejected

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use ddguard_core::{DecisionState, ExposureMode, TransitionEvent};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Current on-disk schema for state and override documents.
pub const STATE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported schema version {found} in {path} (max supported: {supported})")]
    UnsupportedSchema {
        path: PathBuf,
        found: u32,
        supported: u32,
    },
}

/// Write `bytes` to `path` via a sibling `.tmp` file and a rename.
///
/// Creates the parent directory if needed. On failure the temp file is
/// removed and the previous contents of `path` are untouched.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StateStoreError> {
    let io_err = |source| StateStoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes).map_err(io_err)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(e));
    }
    Ok(())
}

pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StateStoreError> {
    let json = serde_json::to_vec_pretty(value).map_err(|source| StateStoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &json)
}

/// Read a file, mapping "not found" to `Ok(None)`.
fn read_optional(path: &Path) -> Result<Option<String>, StateStoreError> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StateStoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn check_schema(path: &Path, found: u32) -> Result<(), StateStoreError> {
    if found > STATE_SCHEMA_VERSION {
        return Err(StateStoreError::UnsupportedSchema {
            path: path.to_path_buf(),
            found,
            supported: STATE_SCHEMA_VERSION,
        });
    }
    Ok(())
}

// ─── Decision state ─────────────────────────────────────────────────

/// On-disk envelope around the decision state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub schema_version: u32,
    pub updated_at: DateTime<Utc>,
    pub state: DecisionState,
}

/// Envelope, the nested advisor layout, or a bare state object.
///
/// Bare objects also cover the flat legacy layout through the field aliases
/// on [`DecisionState`].
#[derive(Deserialize)]
#[serde(untagged)]
enum StateDocument {
    Envelope(PersistedState),
    Advisor(AdvisorState),
    Bare(DecisionState),
}

#[derive(Deserialize)]
struct AdvisorCounters {
    #[serde(default)]
    days_paused: u32,
    #[serde(default)]
    trend_days: u32,
}

/// Legacy advisor state: counters nested, equity usually absent.
#[derive(Deserialize)]
struct AdvisorState {
    #[serde(default)]
    date: Option<NaiveDate>,
    #[serde(default)]
    state: ExposureMode,
    #[serde(default)]
    equity: Option<f64>,
    ath: f64,
    #[serde(default)]
    drawdown: f64,
    #[serde(default)]
    pause_start_date: Option<NaiveDate>,
    counters: AdvisorCounters,
    #[serde(default)]
    event: TransitionEvent,
}

impl From<AdvisorState> for DecisionState {
    fn from(a: AdvisorState) -> Self {
        // Without a recorded equity, recover it from the peak and drawdown.
        let equity = a.equity.unwrap_or(a.ath * (1.0 + a.drawdown));
        DecisionState {
            mode: a.state,
            equity,
            high_water_mark: a.ath,
            drawdown: a.drawdown,
            days_paused: a.counters.days_paused,
            trend_confirmation_days: a.counters.trend_days,
            last_event: a.event,
            pause_started_on: a.pause_start_date,
            last_step_on: a.date,
        }
    }
}

/// File-backed store for the single live decision state.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state. `Ok(None)` when no file exists yet.
    pub fn load(&self) -> Result<Option<DecisionState>, StateStoreError> {
        let Some(text) = read_optional(&self.path)? else {
            debug!(path = %self.path.display(), "no persisted state");
            return Ok(None);
        };
        let doc: StateDocument =
            serde_json::from_str(&text).map_err(|source| StateStoreError::Json {
                path: self.path.clone(),
                source,
            })?;
        match doc {
            StateDocument::Envelope(p) => {
                check_schema(&self.path, p.schema_version)?;
                Ok(Some(p.state))
            }
            StateDocument::Advisor(legacy) => {
                info!(path = %self.path.display(), "read legacy advisor state");
                Ok(Some(legacy.into()))
            }
            StateDocument::Bare(state) => Ok(Some(state)),
        }
    }

    /// Load the persisted state, or a fresh one at `initial_equity`.
    pub fn load_or_default(&self, initial_equity: f64) -> Result<DecisionState, StateStoreError> {
        Ok(match self.load()? {
            Some(state) => state,
            None => {
                info!(initial_equity, "initializing fresh decision state");
                DecisionState::new(initial_equity)
            }
        })
    }

    /// Persist atomically, stamping `updated_at`.
    pub fn save(&self, state: &DecisionState, now: DateTime<Utc>) -> Result<(), StateStoreError> {
        let doc = PersistedState {
            schema_version: STATE_SCHEMA_VERSION,
            updated_at: now,
            state: state.clone(),
        };
        write_json_atomic(&self.path, &doc)
    }
}

// ─── Manual override ────────────────────────────────────────────────

/// Operator-controlled pause flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualOverride {
    #[serde(default = "default_schema")]
    pub schema_version: u32,
    pub paused: bool,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub note: Option<String>,
}

fn default_schema() -> u32 {
    STATE_SCHEMA_VERSION
}

impl Default for ManualOverride {
    fn default() -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            paused: false,
            updated_at: None,
            note: None,
        }
    }
}

/// File-backed store for the manual override. Missing file means "not paused".
#[derive(Debug, Clone)]
pub struct OverrideStore {
    path: PathBuf,
}

impl OverrideStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<ManualOverride, StateStoreError> {
        let Some(text) = read_optional(&self.path)? else {
            return Ok(ManualOverride::default());
        };
        let doc: ManualOverride =
            serde_json::from_str(&text).map_err(|source| StateStoreError::Json {
                path: self.path.clone(),
                source,
            })?;
        check_schema(&self.path, doc.schema_version)?;
        Ok(doc)
    }

    pub fn is_paused(&self) -> Result<bool, StateStoreError> {
        Ok(self.load()?.paused)
    }

    /// Set the flag and return the stored document.
    pub fn set(
        &self,
        paused: bool,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ManualOverride, StateStoreError> {
        let doc = ManualOverride {
            schema_version: STATE_SCHEMA_VERSION,
            paused,
            updated_at: Some(now),
            note,
        };
        write_json_atomic(&self.path, &doc)?;
        info!(paused, path = %self.path.display(), "manual override updated");
        Ok(doc)
    }
}
