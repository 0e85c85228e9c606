//! Application services — use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic
//! parameters (constructor injection), keeping this layer decoupled from
//! concrete adapters.

pub mod automation_service;
pub mod driver_service;
