//! Transition notifications.
//!
//! Delivery is fire-and-forget: callers log a `NotifyError` and carry on.
//! The outbox notifier appends one JSON object per line; an external mailer
//! drains the file.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use ddguard_core::{StepOutcome, TransitionEvent};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("outbox I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PauseTriggered,
    ResumeTriggered,
    OverrideChanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub subject: String,
    pub body: String,
    pub as_of: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Build a notification for a transition; `None` for `NoChange`.
    pub fn from_outcome(outcome: &StepOutcome, created_at: DateTime<Utc>) -> Option<Self> {
        let s = &outcome.state;
        let cause = outcome
            .trigger
            .map(|t| format!("{t:?}"))
            .unwrap_or_default();
        let (kind, subject, body) = match outcome.event {
            TransitionEvent::NoChange => return None,
            TransitionEvent::PauseTriggered => (
                NotificationKind::PauseTriggered,
                "PAUSE TRIGGERED: moving to cash".to_string(),
                format!(
                    "Trigger: {cause}\nEquity: {:.2}\nHigh-water mark: {:.2}\nDrawdown: {:.2}%",
                    s.equity,
                    s.high_water_mark,
                    s.drawdown * 100.0
                ),
            ),
            TransitionEvent::ResumeTriggered => (
                NotificationKind::ResumeTriggered,
                "RESUME TRIGGERED: re-entering leveraged exposure".to_string(),
                format!(
                    "Trigger: {cause}\nEquity: {:.2}\nNew high-water mark: {:.2}",
                    s.equity, s.high_water_mark
                ),
            ),
        };
        Some(Self {
            kind,
            subject,
            body,
            as_of: s.last_step_on,
            created_at,
        })
    }

    pub fn override_changed(paused: bool, note: Option<&str>, created_at: DateTime<Utc>) -> Self {
        let subject = if paused {
            "MANUAL OVERRIDE: pause engaged"
        } else {
            "MANUAL OVERRIDE: pause released"
        };
        Self {
            kind: NotificationKind::OverrideChanged,
            subject: subject.to_string(),
            body: note.unwrap_or("").to_string(),
            as_of: None,
            created_at,
        }
    }
}

pub trait Notifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Emits notifications as structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: &Notification) -> Result<(), NotifyError> {
        warn!(kind = ?n.kind, subject = %n.subject, body = %n.body, "alert");
        Ok(())
    }
}

/// Appends notifications to a JSONL outbox file.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    path: PathBuf,
}

impl OutboxNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back all queued notifications, skipping malformed lines.
    pub fn read_all(&self) -> io::Result<Vec<Notification>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = io::BufReader::new(fs::File::open(&self.path)?);
        let mut out = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(n) = serde_json::from_str::<Notification>(&line) {
                out.push(n);
            }
        }
        Ok(out)
    }
}

impl Notifier for OutboxNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let json = serde_json::to_string(notification)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()?;
        info!(path = %self.path.display(), subject = %notification.subject, "queued alert");
        Ok(())
    }
}

/// Delivers to every inner notifier; the first failure is returned after all
/// have been attempted.
#[derive(Default)]
pub struct FanoutNotifier {
    inner: Vec<Box<dyn Notifier + Send + Sync>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: impl Notifier + Send + Sync + 'static) -> Self {
        self.inner.push(Box::new(notifier));
        self
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut first_err = None;
        for n in &self.inner {
            if let Err(e) = n.notify(notification) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ddguard_core::{DecisionState, Trigger};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 21, 0, 0).unwrap()
    }

    fn pause_outcome() -> StepOutcome {
        let mut state = DecisionState::new(7_500.0);
        state.high_water_mark = 10_000.0;
        state.drawdown = -0.25;
        StepOutcome {
            state,
            event: TransitionEvent::PauseTriggered,
            trigger: Some(Trigger::DrawdownLimit),
        }
    }

    struct Counting(Arc<AtomicUsize>);

    impl Notifier for Counting {
        fn notify(&self, _n: &Notification) -> Result<(), NotifyError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl Notifier for Failing {
        fn notify(&self, _n: &Notification) -> Result<(), NotifyError> {
            Err(NotifyError::Io(io::Error::new(io::ErrorKind::Other, "smtp down")))
        }
    }

    #[test]
    fn no_change_builds_no_notification() {
        let mut outcome = pause_outcome();
        outcome.event = TransitionEvent::NoChange;
        outcome.trigger = None;
        assert!(Notification::from_outcome(&outcome, ts()).is_none());
    }

    #[test]
    fn pause_notification_mentions_drawdown() {
        let n = Notification::from_outcome(&pause_outcome(), ts()).unwrap();
        assert_eq!(n.kind, NotificationKind::PauseTriggered);
        assert!(n.body.contains("-25.00%"));
        assert!(n.body.contains("DrawdownLimit"));
    }

    #[test]
    fn outbox_appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = OutboxNotifier::new(dir.path().join("alerts/outbox.jsonl"));
        let n = Notification::from_outcome(&pause_outcome(), ts()).unwrap();
        outbox.notify(&n).unwrap();
        outbox
            .notify(&Notification::override_changed(true, Some("manual"), ts()))
            .unwrap();

        let all = outbox.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], n);
        assert_eq!(all[1].kind, NotificationKind::OverrideChanged);
    }

    #[test]
    fn fanout_attempts_all_and_reports_failure() {
        let count = Arc::new(AtomicUsize::new(0));
        let fanout = FanoutNotifier::new()
            .with(Failing)
            .with(Counting(count.clone()))
            .with(NullNotifier);
        let n = Notification::override_changed(false, None, ts());
        assert!(fanout.notify(&n).is_err());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(fanout.len(), 3);
    }
}
