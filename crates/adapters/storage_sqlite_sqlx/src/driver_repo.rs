//! `SQLite` implementation of [`DriverRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use homestead_app::ports::DriverRepository;
use homestead_domain::device::Driver;
use homestead_domain::error::HomesteadError;
use homestead_domain::id::DriverKey;

use crate::error::StorageError;

struct Wrapper(Driver);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let vendor_id: String = row.try_get("vendor_id")?;
        let model_id: String = row.try_get("model_id")?;
        let name: String = row.try_get("name")?;
        let version: String = row.try_get("version")?;
        let code: String = row.try_get("code")?;
        let singleton_json: Option<String> = row.try_get("singleton_json")?;

        Ok(Self(Driver {
            key: DriverKey::new(vendor_id, model_id),
            name,
            version,
            code,
            singleton_json,
        }))
    }
}

/// `SQLite`-backed driver repository.
pub struct SqliteDriverRepository {
    pool: SqlitePool,
}

impl SqliteDriverRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl DriverRepository for SqliteDriverRepository {
    async fn create(&self, driver: Driver) -> Result<Driver, HomesteadError> {
        sqlx::query(
            "INSERT INTO drivers (vendor_id, model_id, name, version, code, singleton_json) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&driver.key.vendor_id)
        .bind(&driver.key.model_id)
        .bind(&driver.name)
        .bind(&driver.version)
        .bind(&driver.code)
        .bind(&driver.singleton_json)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(driver)
    }

    async fn get(&self, key: &DriverKey) -> Result<Option<Driver>, HomesteadError> {
        let row: Option<Wrapper> =
            sqlx::query_as("SELECT * FROM drivers WHERE vendor_id = ? AND model_id = ?")
                .bind(&key.vendor_id)
                .bind(&key.model_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn get_all(&self) -> Result<Vec<Driver>, HomesteadError> {
        let rows: Vec<Wrapper> =
            sqlx::query_as("SELECT * FROM drivers ORDER BY vendor_id, model_id")
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn delete(&self, key: &DriverKey) -> Result<(), HomesteadError> {
        sqlx::query("DELETE FROM drivers WHERE vendor_id = ? AND model_id = ?")
            .bind(&key.vendor_id)
            .bind(&key.model_id)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}
