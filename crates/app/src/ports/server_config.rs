//! Server configuration port — the automation toggle and coordinates.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use homestead_domain::error::HomesteadError;

/// Provides the system-wide automation toggle and the server's location.
pub trait ServerConfig {
    /// Whether the automation system as a whole is switched on.
    fn automation_enabled(&self) -> impl Future<Output = Result<bool, HomesteadError>> + Send;

    /// `(latitude, longitude)` used for solar time calculations.
    fn coordinates(&self) -> impl Future<Output = Result<(f64, f64), HomesteadError>> + Send;
}

/// In-memory [`ServerConfig`] fed from the daemon's configuration file.
///
/// The toggle is runtime-mutable so an admin surface can flip it without a
/// restart.
#[derive(Debug)]
pub struct StaticServerConfig {
    automation_enabled: AtomicBool,
    latitude: f64,
    longitude: f64,
}

impl StaticServerConfig {
    #[must_use]
    pub fn new(automation_enabled: bool, latitude: f64, longitude: f64) -> Self {
        Self {
            automation_enabled: AtomicBool::new(automation_enabled),
            latitude,
            longitude,
        }
    }

    pub fn set_automation_enabled(&self, enabled: bool) {
        self.automation_enabled.store(enabled, Ordering::SeqCst);
    }
}

impl ServerConfig for StaticServerConfig {
    async fn automation_enabled(&self) -> Result<bool, HomesteadError> {
        Ok(self.automation_enabled.load(Ordering::SeqCst))
    }

    async fn coordinates(&self) -> Result<(f64, f64), HomesteadError> {
        Ok((self.latitude, self.longitude))
    }
}

impl<T: ServerConfig + Send + Sync> ServerConfig for std::sync::Arc<T> {
    fn automation_enabled(&self) -> impl Future<Output = Result<bool, HomesteadError>> + Send {
        (**self).automation_enabled()
    }

    fn coordinates(&self) -> impl Future<Output = Result<(f64, f64), HomesteadError>> + Send {
        (**self).coordinates()
    }
}
