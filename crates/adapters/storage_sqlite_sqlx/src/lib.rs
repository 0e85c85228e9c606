//! # homestead-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter. Implements the storage, notification, and
//! event-log ports from `homestead-app` on top of an `sqlx` connection pool.

mod automation_repo;
mod device_repo;
mod driver_repo;
mod error;
mod event_log;
mod notify;
mod pool;
mod script_repo;
mod singleton_repo;

pub use automation_repo::SqliteAutomationRepository;
pub use device_repo::SqliteDeviceRepository;
pub use driver_repo::SqliteDriverRepository;
pub use error::StorageError;
pub use event_log::SqliteEventLog;
pub use notify::SqliteNotifier;
pub use pool::{Config, Database};
pub use script_repo::SqliteScriptRepository;
pub use singleton_repo::SqliteSingletonRepository;
