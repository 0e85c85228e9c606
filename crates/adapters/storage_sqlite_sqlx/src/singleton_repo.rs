//! `SQLite` implementation of [`SingletonRepository`].
//!
//! Singleton state lives in the `singleton_json` column of the driver or
//! device row it belongs to, so deleting the owning record always removes
//! its state with it.

use sqlx::{Row, SqlitePool};

use homestead_app::ports::SingletonRepository;
use homestead_domain::error::HomesteadError;
use homestead_domain::id::SingletonKey;

use crate::error::StorageError;

/// `SQLite`-backed singleton repository.
pub struct SqliteSingletonRepository {
    pool: SqlitePool,
}

impl SqliteSingletonRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl SingletonRepository for SqliteSingletonRepository {
    async fn get(&self, key: &SingletonKey) -> Result<Option<String>, HomesteadError> {
        let row = match key {
            SingletonKey::Driver(driver) => {
                sqlx::query("SELECT singleton_json FROM drivers WHERE vendor_id = ? AND model_id = ?")
                    .bind(&driver.vendor_id)
                    .bind(&driver.model_id)
                    .fetch_optional(&self.pool)
                    .await
            }
            SingletonKey::Device(device) => {
                sqlx::query("SELECT singleton_json FROM devices WHERE id = ?")
                    .bind(device.as_str())
                    .fetch_optional(&self.pool)
                    .await
            }
        }
        .map_err(StorageError::from)?;

        match row {
            None => Ok(None),
            Some(row) => {
                let json: Option<String> = row.try_get("singleton_json").map_err(StorageError::from)?;
                Ok(json)
            }
        }
    }

    async fn put(&self, key: &SingletonKey, json: &str) -> Result<(), HomesteadError> {
        match key {
            SingletonKey::Driver(driver) => {
                sqlx::query(
                    "UPDATE drivers SET singleton_json = ? WHERE vendor_id = ? AND model_id = ?",
                )
                .bind(json)
                .bind(&driver.vendor_id)
                .bind(&driver.model_id)
                .execute(&self.pool)
                .await
            }
            SingletonKey::Device(device) => {
                sqlx::query("UPDATE devices SET singleton_json = ? WHERE id = ?")
                    .bind(json)
                    .bind(device.as_str())
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(StorageError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_repo::SqliteDeviceRepository;
    use crate::driver_repo::SqliteDriverRepository;
    use crate::pool::Config;
    use homestead_app::ports::{DeviceRepository, DriverRepository};
    use homestead_domain::device::{Device, DeviceType, Driver};
    use homestead_domain::id::{DeviceId, DriverKey};

    async fn setup() -> SqliteSingletonRepository {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        let pool = db.pool().clone();

        SqliteDriverRepository::new(pool.clone())
            .create(Driver {
                key: DriverKey::new("shelly", "plug-s"),
                name: "Shelly Plug S".to_string(),
                version: "0.1.0".to_string(),
                code: String::new(),
                singleton_json: None,
            })
            .await
            .unwrap();
        SqliteDeviceRepository::new(pool.clone())
            .create(Device {
                id: DeviceId::new("kitchen-plug"),
                driver: DriverKey::new("shelly", "plug-s"),
                room_id: "kitchen".to_string(),
                device_type: DeviceType::Outlet,
                singleton_json: None,
            })
            .await
            .unwrap();

        SqliteSingletonRepository::new(pool)
    }

    #[tokio::test]
    async fn should_return_none_before_first_write() {
        let repo = setup().await;
        let key = SingletonKey::Driver(DriverKey::new("shelly", "plug-s"));
        assert!(repo.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_roundtrip_driver_singleton() {
        let repo = setup().await;
        let key = SingletonKey::Driver(DriverKey::new("shelly", "plug-s"));
        repo.put(&key, "{\"calls\":3}").await.unwrap();
        assert_eq!(repo.get(&key).await.unwrap().unwrap(), "{\"calls\":3}");
    }

    #[tokio::test]
    async fn should_roundtrip_device_singleton() {
        let repo = setup().await;
        let key = SingletonKey::Device(DeviceId::new("kitchen-plug"));
        repo.put(&key, "{\"on\":true}").await.unwrap();
        assert_eq!(repo.get(&key).await.unwrap().unwrap(), "{\"on\":true}");
    }

    #[tokio::test]
    async fn should_keep_driver_and_device_state_separate() {
        let repo = setup().await;
        let driver_key = SingletonKey::Driver(DriverKey::new("shelly", "plug-s"));
        let device_key = SingletonKey::Device(DeviceId::new("kitchen-plug"));
        repo.put(&driver_key, "{\"calls\":1}").await.unwrap();
        repo.put(&device_key, "{\"on\":false}").await.unwrap();

        assert_eq!(repo.get(&driver_key).await.unwrap().unwrap(), "{\"calls\":1}");
        assert_eq!(repo.get(&device_key).await.unwrap().unwrap(), "{\"on\":false}");
    }
}
