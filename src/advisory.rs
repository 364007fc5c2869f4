//! Non-fatal signals raised by feature group operations.
//!
//! Advisories are not errors: the operation that raised one still succeeds.
//! They are handed to an [`AdvisorySink`] chosen by the caller. The default
//! [`LogSink`] writes them to the log.

use std::fmt::{Display, Formatter};
use std::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// Deleting the feature group also removes the jobs writing to it.
    JobsRemoved { name: String, version: i32 },
    /// Statistics were requested but are disabled; nothing was computed.
    StatisticsDisabled { name: String, version: i32 },
}

impl Display for Advisory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Advisory::JobsRemoved { name, version } => write!(
                f,
                "All jobs associated to feature group `{}`, version `{}` will be removed.",
                name, version
            ),
            Advisory::StatisticsDisabled { name, version } => write!(
                f,
                "Statistics are not enabled for feature group `{}`, version `{}`.",
                name, version
            ),
        }
    }
}

pub trait AdvisorySink: Send + Sync {
    fn notify(&self, advisory: &Advisory);
}

/// Logs advisories at warn level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl AdvisorySink for LogSink {
    fn notify(&self, advisory: &Advisory) {
        warn!("{}", advisory);
    }
}

/// Keeps advisories for later inspection.
#[derive(Debug, Default)]
pub struct CollectingSink {
    advisories: Mutex<Vec<Advisory>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains the collected advisories.
    pub fn take(&self) -> Vec<Advisory> {
        match self.advisories.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl AdvisorySink for CollectingSink {
    fn notify(&self, advisory: &Advisory) {
        let mut guard = match self.advisories.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(advisory.clone());
    }
}
