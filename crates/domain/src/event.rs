//! Internal event log records.
//!
//! Operator-visible events (automation failures, activation summaries, …)
//! are appended to a server-side log, separate from the per-user
//! notifications in [`crate::notification`].

use serde::{Deserialize, Serialize};

use crate::time::{self, Timestamp};

/// Severity of a logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One entry in the internal event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub level: EventLevel,
    pub title: String,
    pub body: String,
    pub at: Timestamp,
}

impl LogEvent {
    #[must_use]
    pub fn new(level: EventLevel, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            body: body.into(),
            at: time::now(),
        }
    }
}
