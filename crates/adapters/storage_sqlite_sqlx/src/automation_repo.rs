//! `SQLite` implementation of [`AutomationRepository`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use homestead_app::ports::AutomationRepository;
use homestead_domain::automation::{Automation, TimingMode};
use homestead_domain::error::HomesteadError;
use homestead_domain::id::AutomationId;
use homestead_domain::time::Timestamp;

use crate::error::StorageError;

struct Wrapper(Automation);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Automation> {
        value.map(|w| w.0)
    }
}

fn timing_mode_to_str(mode: TimingMode) -> &'static str {
    match mode {
        TimingMode::Normal => "normal",
        TimingMode::Sunrise => "sunrise",
        TimingMode::Sunset => "sunset",
    }
}

fn timing_mode_from_str(value: &str) -> Result<TimingMode, sqlx::Error> {
    match value {
        "normal" => Ok(TimingMode::Normal),
        "sunrise" => Ok(TimingMode::Sunrise),
        "sunset" => Ok(TimingMode::Sunset),
        other => Err(sqlx::Error::Decode(
            format!("unknown timing mode `{other}`").into(),
        )),
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let owner: String = row.try_get("owner")?;
        let name: String = row.try_get("name")?;
        let description: String = row.try_get("description")?;
        let cron_expression: String = row.try_get("cron_expression")?;
        let script_id: String = row.try_get("script_id")?;
        let enabled: bool = row.try_get("enabled")?;
        let disable_once: bool = row.try_get("disable_once")?;
        let timing_mode: String = row.try_get("timing_mode")?;
        let last_run_str: Option<String> = row.try_get("last_run")?;

        let id = AutomationId::from_str(&id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let timing_mode = timing_mode_from_str(&timing_mode)?;
        let last_run = last_run_str
            .map(|s| {
                chrono::DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.to_utc())
                    .map_err(|err| sqlx::Error::Decode(Box::new(err)))
            })
            .transpose()?;

        Ok(Self(Automation {
            id,
            owner,
            name,
            description,
            cron_expression,
            script_id,
            enabled,
            disable_once,
            timing_mode,
            last_run,
        }))
    }
}

/// `SQLite`-backed automation repository.
pub struct SqliteAutomationRepository {
    pool: SqlitePool,
}

impl SqliteAutomationRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AutomationRepository for SqliteAutomationRepository {
    async fn create(&self, automation: Automation) -> Result<Automation, HomesteadError> {
        let last_run = automation.last_run.map(|ts| ts.to_rfc3339());
        sqlx::query(
                "INSERT INTO automations (id, owner, name, description, cron_expression, script_id, enabled, disable_once, timing_mode, last_run) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(automation.id.to_string())
            .bind(&automation.owner)
            .bind(&automation.name)
            .bind(&automation.description)
            .bind(&automation.cron_expression)
            .bind(&automation.script_id)
            .bind(automation.enabled)
            .bind(automation.disable_once)
            .bind(timing_mode_to_str(automation.timing_mode))
            .bind(&last_run)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(automation)
    }

    async fn get_by_id(&self, id: AutomationId) -> Result<Option<Automation>, HomesteadError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM automations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn get_all(&self) -> Result<Vec<Automation>, HomesteadError> {
        let rows: Vec<Wrapper> = sqlx::query_as("SELECT * FROM automations ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn update(&self, automation: Automation) -> Result<Automation, HomesteadError> {
        let last_run = automation.last_run.map(|ts| ts.to_rfc3339());
        sqlx::query(
                "UPDATE automations SET owner = ?, name = ?, description = ?, cron_expression = ?, script_id = ?, enabled = ?, disable_once = ?, timing_mode = ?, last_run = ? WHERE id = ?",
            )
            .bind(&automation.owner)
            .bind(&automation.name)
            .bind(&automation.description)
            .bind(&automation.cron_expression)
            .bind(&automation.script_id)
            .bind(automation.enabled)
            .bind(automation.disable_once)
            .bind(timing_mode_to_str(automation.timing_mode))
            .bind(&last_run)
            .bind(automation.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(automation)
    }

    async fn set_last_run(&self, id: AutomationId, at: Timestamp) -> Result<(), HomesteadError> {
        sqlx::query("UPDATE automations SET last_run = ? WHERE id = ?")
            .bind(at.to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn delete(&self, id: AutomationId) -> Result<(), HomesteadError> {
        sqlx::query("DELETE FROM automations WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;

    async fn setup() -> SqliteAutomationRepository {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteAutomationRepository::new(db.pool().clone())
    }

    fn valid_automation() -> Automation {
        Automation::builder()
            .owner("alice")
            .name("Evening lights")
            .cron_expression("0 22 * * 1,2,3,4,5")
            .script_id("lights_on")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_create_and_retrieve_automation() {
        let repo = setup().await;
        let auto = valid_automation();
        let id = auto.id;

        repo.create(auto).await.unwrap();
        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.name, "Evening lights");
        assert_eq!(fetched.cron_expression, "0 22 * * 1,2,3,4,5");
        assert!(fetched.enabled);
        assert!(fetched.last_run.is_none());
    }

    #[tokio::test]
    async fn should_return_none_when_automation_not_found() {
        let repo = setup().await;
        let result = repo.get_by_id(AutomationId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn should_list_all_automations() {
        let repo = setup().await;
        repo.create(valid_automation()).await.unwrap();
        let mut auto2 = valid_automation();
        auto2.name = "Second rule".to_string();
        repo.create(auto2).await.unwrap();

        let all = repo.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn should_update_automation() {
        let repo = setup().await;
        let auto = valid_automation();
        let id = auto.id;
        repo.create(auto).await.unwrap();

        let mut fetched = repo.get_by_id(id).await.unwrap().unwrap();
        fetched.name = "Updated name".to_string();
        fetched.enabled = false;
        fetched.timing_mode = TimingMode::Sunset;
        repo.update(fetched).await.unwrap();

        let updated = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(updated.name, "Updated name");
        assert!(!updated.enabled);
        assert_eq!(updated.timing_mode, TimingMode::Sunset);
    }

    #[tokio::test]
    async fn should_record_last_run_time() {
        let repo = setup().await;
        let auto = valid_automation();
        let id = auto.id;
        repo.create(auto).await.unwrap();

        let at = homestead_domain::time::now();
        repo.set_last_run(id, at).await.unwrap();
        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.last_run.unwrap().timestamp(), at.timestamp());
    }

    #[tokio::test]
    async fn should_delete_automation() {
        let repo = setup().await;
        let auto = valid_automation();
        let id = auto.id;
        repo.create(auto).await.unwrap();

        repo.delete(id).await.unwrap();
        let result = repo.get_by_id(id).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn should_preserve_timing_mode_and_disable_once_through_roundtrip() {
        let repo = setup().await;
        let mut auto = valid_automation();
        auto.timing_mode = TimingMode::Sunrise;
        auto.disable_once = true;
        let id = auto.id;

        repo.create(auto).await.unwrap();
        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.timing_mode, TimingMode::Sunrise);
        assert!(fetched.disable_once);
    }
}
