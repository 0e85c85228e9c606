//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside
//! world. They are defined here (in `app`) so that both the use-case layer
//! and the adapter layer can depend on them without creating circular
//! dependencies.

pub mod event_log;
pub mod notify;
pub mod script_engine;
pub mod server_config;
pub mod storage;

pub use event_log::EventLog;
pub use notify::Notifier;
pub use script_engine::{ScriptEngine, ScriptRunOutcome, ScriptRunner};
pub use server_config::{ServerConfig, StaticServerConfig};
pub use storage::{
    AutomationRepository, DeviceRepository, DriverRepository, ScriptRepository,
    SingletonRepository,
};
