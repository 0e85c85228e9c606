//! # homestead-domain
//!
//! Pure domain model for the homestead automation server.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Automations** (cron-scheduled script rules with fixed or
//!   solar-relative trigger times)
//! - Define **Drivers** (vendor/model-scoped device-driver scripts) and
//!   **Devices** (driver-backed things with per-device singleton state)
//! - Define the **cron expression** wire format and its conversions
//! - Define the **script value model** (typed signatures, singleton schemas,
//!   structured script diagnostics) used to talk to the script engine
//! - Define device **actions** and their response payloads
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod action;
pub mod automation;
pub mod cron;
pub mod device;
pub mod event;
pub mod notification;
pub mod script;
pub mod script_def;
pub mod suntime;
