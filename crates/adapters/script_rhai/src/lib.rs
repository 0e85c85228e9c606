//! # homestead-adapter-script-rhai
//!
//! Script execution adapter backed by the [rhai](https://rhai.rs) embedded
//! language. The application core only ever sees the narrow `ScriptEngine`
//! and `ScriptRunner` ports; everything rhai-specific stays in this crate.
//!
//! ## Driver protocol
//!
//! Driver scripts are plain rhai. Because rhai script functions cannot read
//! the outer scope, singletons are passed as leading call arguments: every
//! driver function receives `(driver, device, ...action args)` (`device`
//! only when the invocation targets a concrete device). Both are shared
//! values, so field assignments inside the script mutate the state the
//! invoker captures back after the run.
//!
//! A driver declares its singleton shapes with two optional zero-argument
//! functions, `driver_template()` and `device_template()`, each returning an
//! object map; the field types of the returned maps become the schema.

mod engine;
mod runner;

pub use engine::RhaiScriptEngine;
pub use runner::RhaiScriptRunner;

pub(crate) fn span_of(position: rhai::Position) -> homestead_domain::script::Span {
    homestead_domain::script::Span {
        line: u32::try_from(position.line().unwrap_or(0)).unwrap_or(0),
        column: u32::try_from(position.position().unwrap_or(0)).unwrap_or(0),
    }
}
