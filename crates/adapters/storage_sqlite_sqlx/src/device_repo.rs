//! `SQLite` implementation of [`DeviceRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use homestead_app::ports::DeviceRepository;
use homestead_domain::device::{Device, DeviceType};
use homestead_domain::error::HomesteadError;
use homestead_domain::id::{DeviceId, DriverKey};

use crate::error::StorageError;

struct Wrapper(Device);

fn device_type_to_str(device_type: DeviceType) -> &'static str {
    match device_type {
        DeviceType::Light => "light",
        DeviceType::Switch => "switch",
        DeviceType::Outlet => "outlet",
        DeviceType::Sensor => "sensor",
    }
}

fn device_type_from_str(value: &str) -> Result<DeviceType, sqlx::Error> {
    match value {
        "light" => Ok(DeviceType::Light),
        "switch" => Ok(DeviceType::Switch),
        "outlet" => Ok(DeviceType::Outlet),
        "sensor" => Ok(DeviceType::Sensor),
        other => Err(sqlx::Error::Decode(
            format!("unknown device type `{other}`").into(),
        )),
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let vendor_id: String = row.try_get("vendor_id")?;
        let model_id: String = row.try_get("model_id")?;
        let room_id: String = row.try_get("room_id")?;
        let device_type: String = row.try_get("device_type")?;
        let singleton_json: Option<String> = row.try_get("singleton_json")?;

        Ok(Self(Device {
            id: DeviceId::new(id),
            driver: DriverKey::new(vendor_id, model_id),
            room_id,
            device_type: device_type_from_str(&device_type)?,
            singleton_json,
        }))
    }
}

/// `SQLite`-backed device repository.
pub struct SqliteDeviceRepository {
    pool: SqlitePool,
}

impl SqliteDeviceRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl DeviceRepository for SqliteDeviceRepository {
    async fn create(&self, device: Device) -> Result<Device, HomesteadError> {
        sqlx::query(
            "INSERT INTO devices (id, vendor_id, model_id, room_id, device_type, singleton_json) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(device.id.as_str())
        .bind(&device.driver.vendor_id)
        .bind(&device.driver.model_id)
        .bind(&device.room_id)
        .bind(device_type_to_str(device.device_type))
        .bind(&device.singleton_json)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(device)
    }

    async fn get_by_id(&self, id: &DeviceId) -> Result<Option<Device>, HomesteadError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM devices WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn get_all(&self) -> Result<Vec<Device>, HomesteadError> {
        let rows: Vec<Wrapper> = sqlx::query_as("SELECT * FROM devices ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn delete(&self, id: &DeviceId) -> Result<(), HomesteadError> {
        sqlx::query("DELETE FROM devices WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}
