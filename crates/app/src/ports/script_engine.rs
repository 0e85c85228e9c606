//! Script engine ports.
//!
//! The embedded script language is an external capability. The core hands it
//! source code, singleton values, and a typed function invocation, and gets
//! back mutated singletons, a return value, and structured diagnostics — it
//! never sees engine-internal types.

use std::future::Future;
use std::time::Duration;

use homestead_domain::error::HomesteadError;
use homestead_domain::script::{
    DriverSchemas, FunctionInvocation, ScriptError, ScriptOutcome, SingletonValues,
};

/// Compiles and runs driver code.
pub trait ScriptEngine {
    /// Extract the driver- and device-singleton schemas declared by `code`.
    ///
    /// A compile failure is returned as a [`ScriptError`] so callers can
    /// surface it like any other script diagnostic.
    fn schemas(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<DriverSchemas, ScriptError>> + Send;

    /// Run one function invocation against `code`.
    ///
    /// The singletons in the returned outcome reflect any mutation the
    /// script performed. Implementations must stop runaway scripts within
    /// `budget` and report that as a runtime interrupt.
    ///
    /// # Errors
    ///
    /// `Err` means the engine itself failed; script-level faults are data in
    /// the returned [`ScriptOutcome`].
    fn run(
        &self,
        code: &str,
        singletons: SingletonValues,
        invocation: FunctionInvocation,
        budget: Duration,
    ) -> impl Future<Output = Result<ScriptOutcome, HomesteadError>> + Send;
}

/// Result of running a stored standalone script.
#[derive(Debug, Clone)]
pub struct ScriptRunOutcome {
    pub success: bool,
    /// Captured print output.
    pub output: String,
    pub errors: Vec<ScriptError>,
}

/// Runs a stored script addressed by `(owner, id)` — the body of an
/// automation.
pub trait ScriptRunner {
    /// # Errors
    ///
    /// Returns [`HomesteadError::NotFound`] when no such script exists for
    /// this owner; script-level faults are data in the outcome.
    fn run_by_id(
        &self,
        owner: &str,
        script_id: &str,
    ) -> impl Future<Output = Result<ScriptRunOutcome, HomesteadError>> + Send;
}

impl<T: ScriptEngine + Send + Sync> ScriptEngine for std::sync::Arc<T> {
    fn schemas(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<DriverSchemas, ScriptError>> + Send {
        (**self).schemas(code)
    }

    fn run(
        &self,
        code: &str,
        singletons: SingletonValues,
        invocation: FunctionInvocation,
        budget: Duration,
    ) -> impl Future<Output = Result<ScriptOutcome, HomesteadError>> + Send {
        (**self).run(code, singletons, invocation, budget)
    }
}

impl<T: ScriptRunner + Send + Sync> ScriptRunner for std::sync::Arc<T> {
    fn run_by_id(
        &self,
        owner: &str,
        script_id: &str,
    ) -> impl Future<Output = Result<ScriptRunOutcome, HomesteadError>> + Send {
        (**self).run_by_id(owner, script_id)
    }
}
