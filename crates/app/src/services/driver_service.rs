//! Driver service — typed driver invocation and device-action dispatch.
//!
//! [`DriverService::invoke`] is the generic path: load driver code and
//! singletons, run one typed function invocation through the script engine,
//! and persist mutated singleton state. Persistence is all-or-nothing: a
//! script failure (including a timeout or a post-run contract violation)
//! leaves every singleton untouched.
//!
//! The action wrappers pin a fixed function name and signature per device
//! action and enforce the action's output contract; [`DriverService::dispatch`]
//! maps an incoming [`DeviceAction`] onto the matching wrapper.

use std::time::Duration;

use homestead_domain::action::{ActionOutput, ActionResponse, DeviceAction};
use homestead_domain::device::Device;
use homestead_domain::error::{HomesteadError, NotFoundError};
use homestead_domain::id::{DeviceId, DriverKey, SingletonKey};
use homestead_domain::script::{
    FunctionInvocation, FunctionSignature, ScriptError, ScriptType, SingletonValues, Span,
};
use serde_json::Value;

use crate::ports::{DeviceRepository, DriverRepository, ScriptEngine, SingletonRepository};
use crate::singleton_store::SingletonStore;

/// Driver function called for a device health check.
pub const FN_VALIDATE: &str = "validate";
/// Driver function reporting the current power state.
pub const FN_REPORT_POWER_STATE: &str = "report_power_state";
/// Driver function reporting the current power draw in watts.
pub const FN_REPORT_POWER_DRAW: &str = "report_power_draw";
/// Driver function switching the device on or off.
pub const FN_SET_POWER: &str = "set_power";
/// Driver function reporting the current dim percentage.
pub const FN_REPORT_DIM: &str = "report_dim";
/// Driver function applying a dim percentage.
pub const FN_SET_DIM: &str = "set_dim";

/// Extra wall-clock slack granted on top of the script budget before the
/// engine call itself is abandoned.
const BUDGET_GRACE: Duration = Duration::from_secs(1);

/// Result of one generic driver invocation.
#[derive(Debug)]
pub enum InvokeOutcome {
    /// The script ran; singletons are persisted.
    Ok(Value),
    /// The script failed; nothing was persisted.
    ScriptFailed(Vec<ScriptError>),
}

/// Executes driver scripts against persisted singleton state.
pub struct DriverService<D, V, S, E> {
    drivers: D,
    devices: V,
    singletons: SingletonStore<S>,
    engine: E,
    budget: Duration,
}

impl<D, V, S, E> DriverService<D, V, S, E>
where
    D: DriverRepository + Send + Sync,
    V: DeviceRepository + Send + Sync,
    S: SingletonRepository + Send + Sync,
    E: ScriptEngine + Send + Sync,
{
    /// Create a new service with the given per-invocation execution budget.
    pub fn new(drivers: D, devices: V, singletons: SingletonStore<S>, engine: E, budget: Duration) -> Self {
        Self {
            drivers,
            devices,
            singletons,
            engine,
            budget,
        }
    }

    /// Run one typed function invocation against a driver.
    ///
    /// Loads the driver singleton (and the device singleton when `device_id`
    /// is given), exposes both to the script, and on success writes the
    /// post-run values back unconditionally — the invoker does not diff. On
    /// any script failure no persistence occurs.
    ///
    /// # Errors
    ///
    /// Returns [`HomesteadError::NotFound`] for an unknown driver, or
    /// storage/engine infrastructure errors. Script-level faults are data in
    /// the returned [`InvokeOutcome`].
    #[tracing::instrument(skip(self, invocation), fields(function = %invocation.function))]
    pub async fn invoke(
        &self,
        key: &DriverKey,
        device_id: Option<&DeviceId>,
        invocation: FunctionInvocation,
    ) -> Result<InvokeOutcome, HomesteadError> {
        let driver = self.drivers.get(key).await?.ok_or_else(|| NotFoundError {
            entity: "Driver",
            id: key.to_string(),
        })?;

        let schemas = match self.engine.schemas(&driver.code).await {
            Ok(schemas) => schemas,
            Err(err) => return Ok(InvokeOutcome::ScriptFailed(vec![err])),
        };

        // Per-key exclusion for the whole read/execute/write sequence.
        // Lock order is always driver first, then device.
        let driver_key = SingletonKey::Driver(key.clone());
        let _driver_guard = self.singletons.lock(&driver_key).await;
        let device_key = device_id.map(|id| SingletonKey::Device(id.clone()));
        let _device_guard = match &device_key {
            Some(key) => Some(self.singletons.lock(key).await),
            None => None,
        };

        let driver_state = self.singletons.get(&driver_key, &schemas.driver).await?;
        let device_state = match &device_key {
            Some(key) => Some(self.singletons.get(key, &schemas.device).await?),
            None => None,
        };

        let run = self.engine.run(
            &driver.code,
            SingletonValues {
                driver: driver_state,
                device: device_state,
            },
            invocation,
            self.budget,
        );
        let outcome = match tokio::time::timeout(self.budget + BUDGET_GRACE, run).await {
            Ok(result) => result?,
            Err(_) => {
                return Ok(InvokeOutcome::ScriptFailed(vec![ScriptError::runtime(
                    "script exceeded its execution budget",
                    Span::default(),
                )]));
            }
        };
        if !outcome.errors.is_empty() {
            return Ok(InvokeOutcome::ScriptFailed(outcome.errors));
        }

        // A script that broke its own declared state shape must not have
        // that state persisted.
        if !schemas.driver.validate(&outcome.singletons.driver) {
            return Ok(InvokeOutcome::ScriptFailed(vec![ScriptError::runtime(
                "driver singleton no longer matches its declared type after execution",
                Span::default(),
            )]));
        }
        if let (Some(_), Some(device_state)) = (&device_key, &outcome.singletons.device) {
            if !schemas.device.validate(device_state) {
                return Ok(InvokeOutcome::ScriptFailed(vec![ScriptError::runtime(
                    "device singleton no longer matches its declared type after execution",
                    Span::default(),
                )]));
            }
        }

        self.singletons
            .put(&driver_key, &outcome.singletons.driver)
            .await?;
        if let (Some(key), Some(device_state)) = (&device_key, &outcome.singletons.device) {
            self.singletons.put(key, device_state).await?;
        }
        Ok(InvokeOutcome::Ok(outcome.return_value))
    }

    /// Run the driver's validation hook against a device.
    ///
    /// # Errors
    ///
    /// See [`Self::invoke`].
    pub async fn health_check(&self, device: &Device) -> Result<ActionResponse, HomesteadError> {
        let invocation = FunctionInvocation {
            function: FN_VALIDATE.to_string(),
            args: vec![],
            signature: FunctionSignature {
                params: vec![],
                returns: ScriptType::Null,
            },
        };
        match self.invoke(&device.driver, Some(&device.id), invocation).await? {
            InvokeOutcome::Ok(_) => Ok(ActionResponse::ok(ActionOutput::HealthCheck {
                healthy: true,
            })),
            InvokeOutcome::ScriptFailed(errors) => Ok(ActionResponse::failed(
                errors,
                ActionOutput::HealthCheck { healthy: false },
            )),
        }
    }

    /// Report whether a device is currently powered.
    ///
    /// # Errors
    ///
    /// See [`Self::invoke`].
    pub async fn report_power_state(
        &self,
        device: &Device,
    ) -> Result<ActionResponse, HomesteadError> {
        let invocation = FunctionInvocation {
            function: FN_REPORT_POWER_STATE.to_string(),
            args: vec![],
            signature: FunctionSignature {
                params: vec![],
                returns: ScriptType::Bool,
            },
        };
        match self.invoke(&device.driver, Some(&device.id), invocation).await? {
            InvokeOutcome::Ok(value) => {
                let state = value.as_bool().unwrap_or(false);
                Ok(ActionResponse::ok(ActionOutput::PowerState { state }))
            }
            InvokeOutcome::ScriptFailed(errors) => Ok(ActionResponse::failed(
                errors,
                ActionOutput::PowerState { state: false },
            )),
        }
    }

    /// Report a device's power draw; a negative watt value from the driver
    /// is a contract violation reported as a runtime interrupt.
    ///
    /// # Errors
    ///
    /// See [`Self::invoke`].
    pub async fn report_power_draw(
        &self,
        device: &Device,
    ) -> Result<ActionResponse, HomesteadError> {
        let invocation = FunctionInvocation {
            function: FN_REPORT_POWER_DRAW.to_string(),
            args: vec![],
            signature: FunctionSignature {
                params: vec![],
                returns: ScriptType::Int,
            },
        };
        match self.invoke(&device.driver, Some(&device.id), invocation).await? {
            InvokeOutcome::Ok(value) => {
                let watts = value.as_i64().unwrap_or(-1);
                if watts < 0 {
                    return Ok(ActionResponse::failed(
                        vec![ScriptError::runtime(
                            format!(
                                "device function `{FN_REPORT_POWER_DRAW}` should return a positive power draw but returned {watts}"
                            ),
                            Span::default(),
                        )],
                        ActionOutput::PowerDraw { watts: 0 },
                    ));
                }
                Ok(ActionResponse::ok(ActionOutput::PowerDraw {
                    watts: u32::try_from(watts).unwrap_or(u32::MAX),
                }))
            }
            InvokeOutcome::ScriptFailed(errors) => Ok(ActionResponse::failed(
                errors,
                ActionOutput::PowerDraw { watts: 0 },
            )),
        }
    }

    /// Switch a device on or off.
    ///
    /// # Errors
    ///
    /// See [`Self::invoke`].
    pub async fn set_power(
        &self,
        device: &Device,
        state: bool,
    ) -> Result<ActionResponse, HomesteadError> {
        let invocation = FunctionInvocation {
            function: FN_SET_POWER.to_string(),
            args: vec![Value::Bool(state)],
            signature: FunctionSignature {
                params: vec![ScriptType::Bool],
                returns: ScriptType::Bool,
            },
        };
        match self.invoke(&device.driver, Some(&device.id), invocation).await? {
            InvokeOutcome::Ok(value) => {
                let changed = value.as_bool().unwrap_or(false);
                Ok(ActionResponse::ok(ActionOutput::PowerChanged { changed }))
            }
            InvokeOutcome::ScriptFailed(errors) => Ok(ActionResponse::failed(
                errors,
                ActionOutput::PowerChanged { changed: false },
            )),
        }
    }

    /// Report a device's dim percentage; values outside `0..=100` are a
    /// contract violation.
    ///
    /// # Errors
    ///
    /// See [`Self::invoke`].
    pub async fn report_dim(&self, device: &Device) -> Result<ActionResponse, HomesteadError> {
        let invocation = FunctionInvocation {
            function: FN_REPORT_DIM.to_string(),
            args: vec![],
            signature: FunctionSignature {
                params: vec![],
                returns: ScriptType::Int,
            },
        };
        match self.invoke(&device.driver, Some(&device.id), invocation).await? {
            InvokeOutcome::Ok(value) => {
                Ok(Self::checked_percent(FN_REPORT_DIM, &value))
            }
            InvokeOutcome::ScriptFailed(errors) => Ok(ActionResponse::failed(
                errors,
                ActionOutput::Dim { percent: 0 },
            )),
        }
    }

    /// Dim a device to a percentage; the driver returns the percentage it
    /// applied, checked against `0..=100`.
    ///
    /// # Errors
    ///
    /// See [`Self::invoke`].
    pub async fn dim(
        &self,
        device: &Device,
        percent: i64,
    ) -> Result<ActionResponse, HomesteadError> {
        let invocation = FunctionInvocation {
            function: FN_SET_DIM.to_string(),
            args: vec![Value::from(percent)],
            signature: FunctionSignature {
                params: vec![ScriptType::Int],
                returns: ScriptType::Int,
            },
        };
        match self.invoke(&device.driver, Some(&device.id), invocation).await? {
            InvokeOutcome::Ok(value) => Ok(Self::checked_percent(FN_SET_DIM, &value)),
            InvokeOutcome::ScriptFailed(errors) => Ok(ActionResponse::failed(
                errors,
                ActionOutput::Dim { percent: 0 },
            )),
        }
    }

    /// Resolve a device and route the action onto the matching wrapper.
    ///
    /// # Errors
    ///
    /// Returns [`HomesteadError::NotFound`] for an unknown device id, plus
    /// anything [`Self::invoke`] returns.
    #[tracing::instrument(skip(self, action), fields(action = action.kind()))]
    pub async fn dispatch(
        &self,
        device_id: &DeviceId,
        action: DeviceAction,
    ) -> Result<ActionResponse, HomesteadError> {
        let device = self
            .devices
            .get_by_id(device_id)
            .await?
            .ok_or_else(|| NotFoundError {
                entity: "Device",
                id: device_id.to_string(),
            })?;
        match action {
            DeviceAction::HealthCheck => self.health_check(&device).await,
            DeviceAction::ReportPowerState => self.report_power_state(&device).await,
            DeviceAction::ReportPowerDraw => self.report_power_draw(&device).await,
            DeviceAction::SetPower { state } => self.set_power(&device, state).await,
            DeviceAction::ReportDim => self.report_dim(&device).await,
            DeviceAction::Dim { percent } => self.dim(&device, percent).await,
        }
    }

    /// Run the validation hook of every registered device, e.g. at boot.
    ///
    /// Per-device script failures are contained in each response; only
    /// infrastructure errors abort the pass.
    ///
    /// # Errors
    ///
    /// Returns a storage or engine error.
    pub async fn health_check_all(
        &self,
    ) -> Result<Vec<(DeviceId, ActionResponse)>, HomesteadError> {
        let devices = self.devices.get_all().await?;
        let mut results = Vec::with_capacity(devices.len());
        for device in devices {
            let response = self.health_check(&device).await?;
            if !response.success {
                tracing::warn!(device = %device.id, "device failed its driver health check");
            }
            results.push((device.id, response));
        }
        Ok(results)
    }

    fn checked_percent(function: &str, value: &Value) -> ActionResponse {
        let percent = value.as_i64().unwrap_or(-1);
        if !(0..=100).contains(&percent) {
            return ActionResponse::failed(
                vec![ScriptError::runtime(
                    format!(
                        "device function `{function}` should return a percentage in 0..=100 but returned {percent}"
                    ),
                    Span::default(),
                )],
                ActionOutput::Dim { percent: 0 },
            );
        }
        ActionResponse::ok(ActionOutput::Dim { percent })
    }
}
