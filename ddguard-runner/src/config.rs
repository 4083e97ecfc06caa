//! Application configuration loaded from TOML.
//!
//! Every section has defaults, so an empty file is a valid config. Values are
//! handed to components explicitly; nothing reads a global.

use std::path::{Path, PathBuf};

use ddguard_core::config::validate_initial_equity;
use ddguard_core::{ConfigError, RuleConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flags::{DEFAULT_FLAG_COUNT, DEFAULT_RED_BELOW};

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigError),
}

/// Portfolio-level settings shared by live and simulated runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    pub initial_equity: f64,
    pub leveraged_symbol: String,
    pub cash_symbol: String,
    pub benchmark_symbol: String,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            initial_equity: 10_000.0,
            leveraged_symbol: "UPRO".into(),
            cash_symbol: "CASH".into(),
            benchmark_symbol: "SPY".into(),
        }
    }
}

/// Whether the live runner publishes its directive or only logs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Live,
    Shadow,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Live => "live",
            RunMode::Shadow => "shadow",
        }
    }
}

impl std::str::FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(RunMode::Live),
            "shadow" => Ok(RunMode::Shadow),
            other => Err(format!("unknown run mode '{other}' (expected live|shadow)")),
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub state_path: PathBuf,
    pub decision_path: PathBuf,
    pub override_path: PathBuf,
    pub prices_path: PathBuf,
    pub mode: RunMode,
    /// Reject snapshots whose latest observation is older than this.
    pub max_staleness_days: u32,
    /// Daily paper-trading log. `None` disables it.
    pub performance_path: Option<PathBuf>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from("state/engine_state.json"),
            decision_path: PathBuf::from("orders/latest_decision.json"),
            override_path: PathBuf::from("state/manual_override.json"),
            prices_path: PathBuf::from("data/SPY.csv"),
            mode: RunMode::Live,
            max_staleness_days: 5,
            performance_path: Some(PathBuf::from("state/performance.json")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    /// JSONL outbox drained by an external mailer. `None` logs only.
    pub outbox_path: Option<PathBuf>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            outbox_path: Some(PathBuf::from("state/alerts.jsonl")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagsConfig {
    pub path: PathBuf,
    pub count: usize,
    /// Daily returns strictly below this are flagged RED.
    pub red_below: f64,
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("state/market_flags.json"),
            count: DEFAULT_FLAG_COUNT,
            red_below: DEFAULT_RED_BELOW,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rule: RuleConfig,
    pub portfolio: PortfolioConfig,
    pub live: LiveConfig,
    pub notifications: NotificationConfig,
    pub flags: FlagsConfig,
}

impl AppConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigLoadError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rule.validate()?;
        validate_initial_equity(self.portfolio.initial_equity)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
