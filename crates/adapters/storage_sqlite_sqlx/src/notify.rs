//! `SQLite` implementation of the [`Notifier`] port.

use sqlx::SqlitePool;

use homestead_app::ports::Notifier;
use homestead_domain::error::HomesteadError;
use homestead_domain::notification::NotificationLevel;
use homestead_domain::time;

use crate::error::StorageError;

fn level_to_str(level: NotificationLevel) -> &'static str {
    match level {
        NotificationLevel::Info => "info",
        NotificationLevel::Warn => "warn",
        NotificationLevel::Error => "error",
    }
}

/// Stores notifications in the user's inbox table.
pub struct SqliteNotifier {
    pool: SqlitePool,
}

impl SqliteNotifier {
    /// Create a new notifier backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl Notifier for SqliteNotifier {
    async fn notify(
        &self,
        owner: &str,
        title: &str,
        body: &str,
        level: NotificationLevel,
    ) -> Result<(), HomesteadError> {
        sqlx::query(
            "INSERT INTO notifications (owner, title, body, level, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(owner)
        .bind(title)
        .bind(body)
        .bind(level_to_str(level))
        .bind(time::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }
}
