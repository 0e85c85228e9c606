//! `SQLite` implementation of the [`EventLog`] port.
//!
//! Appending an event must never fail the operation that raised it, so
//! insert failures are traced and swallowed.

use sqlx::SqlitePool;

use homestead_app::ports::EventLog;
use homestead_domain::event::EventLevel;
use homestead_domain::time;

fn level_to_str(level: EventLevel) -> &'static str {
    match level {
        EventLevel::Debug => "debug",
        EventLevel::Info => "info",
        EventLevel::Warn => "warn",
        EventLevel::Error => "error",
    }
}

/// Appends internal events to the `events` table.
pub struct SqliteEventLog {
    pool: SqlitePool,
}

impl SqliteEventLog {
    /// Create a new event log backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl EventLog for SqliteEventLog {
    async fn log(&self, level: EventLevel, title: &str, body: &str) {
        let result = sqlx::query(
            "INSERT INTO events (level, title, body, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(level_to_str(level))
        .bind(title)
        .bind(body)
        .bind(time::now().to_rfc3339())
        .execute(&self.pool)
        .await;
        if let Err(err) = result {
            tracing::error!(title, %err, "failed to append event log entry");
        }
    }
}
