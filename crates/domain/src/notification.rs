//! User notifications.
//!
//! Automation run failures and skips always notify the owning user in
//! addition to the internal event log; device-action failures are returned
//! synchronously and are not separately notified.

use serde::{Deserialize, Serialize};

/// Urgency of a user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warn,
    Error,
}
