//! Drivers and devices.
//!
//! A **driver** is a vendor/model-scoped script implementing device actions;
//! a **device** is an addressable instance backed by exactly one driver.
//! Both carry a persisted singleton state object as JSON text; the structure
//! of that JSON is declared by the driver's code (see
//! [`crate::script::SingletonSchema`]).

use serde::{Deserialize, Serialize};

use crate::error::{HomesteadError, ValidationError};
use crate::id::{DeviceId, DriverKey};

/// Broad category of a device, used for display and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Light,
    Switch,
    Outlet,
    Sensor,
}

/// A device-driver script registered under a vendor/model pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub key: DriverKey,
    pub name: String,
    pub version: String,
    /// Source code of the driver script.
    pub code: String,
    /// Serialized driver singleton; `None` until first persisted.
    pub singleton_json: Option<String>,
}

impl Driver {
    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HomesteadError::Validation`] when the name or either key
    /// component is empty.
    pub fn validate(&self) -> Result<(), HomesteadError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.key.vendor_id.is_empty() || self.key.model_id.is_empty() {
            return Err(ValidationError::EmptyDriverKey.into());
        }
        Ok(())
    }
}

/// An addressable device instance.
///
/// The `(vendor_id, model_id)` pair must reference an existing [`Driver`];
/// the storage layer enforces this with a foreign key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub driver: DriverKey,
    pub room_id: String,
    pub device_type: DeviceType,
    /// Serialized device singleton; `None` until first persisted.
    pub singleton_json: Option<String>,
}

impl Device {
    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HomesteadError::Validation`] when the id is empty.
    pub fn validate(&self) -> Result<(), HomesteadError> {
        if self.id.as_str().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }
}
