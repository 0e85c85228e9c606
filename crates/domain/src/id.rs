//! Typed identifiers.
//!
//! Automations use UUID-backed newtypes; devices and drivers keep the
//! user-chosen string identifiers they are registered under (a driver is
//! addressed by its `vendor:model` pair, a device by its plain id).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for an [`Automation`](crate::automation::Automation).
    AutomationId
);

/// User-chosen identifier of a [`Device`](crate::device::Device).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Composite key of a [`Driver`](crate::device::Driver): vendor plus model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DriverKey {
    pub vendor_id: String,
    pub model_id: String,
}

impl DriverKey {
    #[must_use]
    pub fn new(vendor_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            vendor_id: vendor_id.into(),
            model_id: model_id.into(),
        }
    }
}

impl fmt::Display for DriverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.vendor_id, self.model_id)
    }
}

/// Key under which one singleton state object is stored.
///
/// Every driver owns one singleton, and every device owns one; the two
/// namespaces never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SingletonKey {
    Driver(DriverKey),
    Device(DeviceId),
}

impl fmt::Display for SingletonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Driver(key) => write!(f, "driver:{key}"),
            Self::Device(id) => write!(f, "device:{id}"),
        }
    }
}
