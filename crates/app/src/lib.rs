//! # homestead-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `AutomationRepository`, `DriverRepository`, `DeviceRepository`,
//!     `SingletonRepository`, `ScriptRepository` — persistence
//!   - `Notifier` — per-user notification sink
//!   - `EventLog` — internal event log sink
//!   - `ServerConfig` — automation toggle and server coordinates
//!   - `ScriptEngine` / `ScriptRunner` — the opaque script capability
//! - Provide the **cron scheduler** (in-process timer loop, no IO)
//! - Provide the **automation engine** (schedule lifecycle + job callback)
//! - Provide the **driver service** (singleton store, driver invocation,
//!   action dispatch)
//!
//! ## Dependency rule
//! Depends on `homestead-domain` only (plus `tokio::sync`/`time` and the
//! `cron` grammar). Never imports adapter crates. Adapters depend on *this*
//! crate, not the reverse.

pub mod ports;
pub mod scheduler;
pub mod services;
pub mod singleton_store;
