//! Storage ports — repository traits for persistence.

use std::future::Future;

use homestead_domain::automation::Automation;
use homestead_domain::device::{Device, Driver};
use homestead_domain::error::HomesteadError;
use homestead_domain::id::{AutomationId, DeviceId, DriverKey, SingletonKey};
use homestead_domain::script_def::Script;
use homestead_domain::time::Timestamp;

/// Repository for persisting and querying [`Automation`]s.
pub trait AutomationRepository {
    /// Create a new automation in storage.
    fn create(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<Automation, HomesteadError>> + Send;

    /// Get an automation by its unique identifier.
    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<Automation>, HomesteadError>> + Send;

    /// Get all automations.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Automation>, HomesteadError>> + Send;

    /// Update an existing automation.
    fn update(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<Automation, HomesteadError>> + Send;

    /// Record the time an automation last fired.
    fn set_last_run(
        &self,
        id: AutomationId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), HomesteadError>> + Send;

    /// Delete an automation by its unique identifier.
    fn delete(&self, id: AutomationId) -> impl Future<Output = Result<(), HomesteadError>> + Send;
}

/// Repository for device [`Driver`]s, keyed by vendor/model.
pub trait DriverRepository {
    fn create(&self, driver: Driver) -> impl Future<Output = Result<Driver, HomesteadError>> + Send;

    fn get(
        &self,
        key: &DriverKey,
    ) -> impl Future<Output = Result<Option<Driver>, HomesteadError>> + Send;

    fn get_all(&self) -> impl Future<Output = Result<Vec<Driver>, HomesteadError>> + Send;

    fn delete(&self, key: &DriverKey) -> impl Future<Output = Result<(), HomesteadError>> + Send;
}

/// Repository for [`Device`]s.
pub trait DeviceRepository {
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, HomesteadError>> + Send;

    fn get_by_id(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, HomesteadError>> + Send;

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, HomesteadError>> + Send;

    fn delete(&self, id: &DeviceId) -> impl Future<Output = Result<(), HomesteadError>> + Send;
}

/// Raw persistence of serialized singleton state.
///
/// Keys address either a driver or a device. `get` returning `None` means
/// "never persisted"; the zero-value defaulting on top of that lives in
/// [`crate::singleton_store::SingletonStore`].
pub trait SingletonRepository {
    fn get(
        &self,
        key: &SingletonKey,
    ) -> impl Future<Output = Result<Option<String>, HomesteadError>> + Send;

    fn put(
        &self,
        key: &SingletonKey,
        json: &str,
    ) -> impl Future<Output = Result<(), HomesteadError>> + Send;
}

/// Repository for stored standalone [`Script`]s.
pub trait ScriptRepository {
    fn create(&self, script: Script) -> impl Future<Output = Result<Script, HomesteadError>> + Send;

    /// Get a script by id, scoped to its owner.
    fn get_by_id(
        &self,
        owner: &str,
        id: &str,
    ) -> impl Future<Output = Result<Option<Script>, HomesteadError>> + Send;
}

impl<T: AutomationRepository + Send + Sync> AutomationRepository for std::sync::Arc<T> {
    fn create(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<Automation, HomesteadError>> + Send {
        (**self).create(automation)
    }

    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<Automation>, HomesteadError>> + Send {
        (**self).get_by_id(id)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Automation>, HomesteadError>> + Send {
        (**self).get_all()
    }

    fn update(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<Automation, HomesteadError>> + Send {
        (**self).update(automation)
    }

    fn set_last_run(
        &self,
        id: AutomationId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), HomesteadError>> + Send {
        (**self).set_last_run(id, at)
    }

    fn delete(&self, id: AutomationId) -> impl Future<Output = Result<(), HomesteadError>> + Send {
        (**self).delete(id)
    }
}

impl<T: DeviceRepository + Send + Sync> DeviceRepository for std::sync::Arc<T> {
    fn create(
        &self,
        device: Device,
    ) -> impl Future<Output = Result<Device, HomesteadError>> + Send {
        (**self).create(device)
    }

    fn get_by_id(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, HomesteadError>> + Send {
        (**self).get_by_id(id)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, HomesteadError>> + Send {
        (**self).get_all()
    }

    fn delete(&self, id: &DeviceId) -> impl Future<Output = Result<(), HomesteadError>> + Send {
        (**self).delete(id)
    }
}
