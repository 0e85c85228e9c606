//! Device actions and their responses.
//!
//! An action request is a closed sum type, so the dispatcher switches
//! exhaustively over it and a payload-less request for a payload-carrying
//! action is unrepresentable after parsing. The same applies to outputs:
//! each action produces exactly one output variant.

use serde::{Deserialize, Serialize};

use crate::script::ScriptError;

/// One typed device-action request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DeviceAction {
    /// Run the driver's validation hook against this device.
    HealthCheck,
    /// Ask the driver whether the device is currently powered.
    ReportPowerState,
    /// Ask the driver for the device's current power draw in watts.
    ReportPowerDraw,
    /// Switch the device on or off.
    SetPower { state: bool },
    /// Ask the driver for the device's current dim percentage.
    ReportDim,
    /// Dim the device to a percentage.
    Dim { percent: i64 },
}

impl DeviceAction {
    /// Stable name of the action, used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HealthCheck => "healthCheck",
            Self::ReportPowerState => "reportPowerState",
            Self::ReportPowerDraw => "reportPowerDraw",
            Self::SetPower { .. } => "setPower",
            Self::ReportDim => "reportDim",
            Self::Dim { .. } => "dim",
        }
    }
}

/// Action-specific output payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ActionOutput {
    HealthCheck { healthy: bool },
    PowerState { state: bool },
    PowerDraw { watts: u32 },
    PowerChanged { changed: bool },
    Dim { percent: i64 },
}

/// Uniform response for every device action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    /// `true` iff the run produced zero script errors.
    pub success: bool,
    pub errors: Vec<ScriptError>,
    pub output: ActionOutput,
}

impl ActionResponse {
    #[must_use]
    pub fn ok(output: ActionOutput) -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            output,
        }
    }

    #[must_use]
    pub fn failed(errors: Vec<ScriptError>, output: ActionOutput) -> Self {
        Self {
            success: false,
            errors,
            output,
        }
    }
}
