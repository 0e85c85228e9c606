//! Automation — a user-owned rule that runs a script on a schedule.
//!
//! The trigger time is wrapped in a 5-field cron expression (see
//! [`crate::cron`]). For the solar timing modes the minute/hour fields of
//! that expression are *derived* from the daily sunrise/sunset calculation
//! and regenerated whenever the job fires or is modified; the weekday field
//! is always user-authoritative and preserved across regeneration.

use serde::{Deserialize, Serialize};

use crate::cron;
use crate::error::{HomesteadError, ValidationError};
use crate::id::AutomationId;
use crate::time::Timestamp;

/// How an automation's trigger time is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimingMode {
    /// Fires at the fixed time encoded in the cron expression.
    Normal,
    /// Fires at local sunrise; the time is recomputed daily.
    Sunrise,
    /// Fires at local sunset; the time is recomputed daily.
    Sunset,
}

impl TimingMode {
    /// Whether this mode re-anchors against the solar calculator.
    #[must_use]
    pub fn is_solar(self) -> bool {
        matches!(self, Self::Sunrise | Self::Sunset)
    }
}

/// A scheduled rule that runs the owner's script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Automation {
    pub id: AutomationId,
    pub owner: String,
    pub name: String,
    pub description: String,
    pub cron_expression: String,
    pub script_id: String,
    pub enabled: bool,
    /// Skip exactly the next firing, then resume normally.
    pub disable_once: bool,
    pub timing_mode: TimingMode,
    pub last_run: Option<Timestamp>,
}

impl Automation {
    /// Create a builder for constructing an [`Automation`].
    #[must_use]
    pub fn builder() -> AutomationBuilder {
        AutomationBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HomesteadError::Validation`] when the name, owner, or script
    /// id is empty, or when the cron expression is not valid syntax.
    pub fn validate(&self) -> Result<(), HomesteadError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.owner.is_empty() {
            return Err(ValidationError::EmptyOwner.into());
        }
        if self.script_id.is_empty() {
            return Err(ValidationError::EmptyScriptId.into());
        }
        if !cron::is_valid(&self.cron_expression) {
            return Err(
                ValidationError::InvalidCronExpression(self.cron_expression.clone()).into(),
            );
        }
        Ok(())
    }

    /// Replace the mutable fields of this automation with `update`, keeping
    /// id, owner, and `last_run`.
    #[must_use]
    pub fn with_update(&self, update: AutomationUpdate) -> Self {
        Self {
            id: self.id,
            owner: self.owner.clone(),
            name: update.name,
            description: update.description,
            cron_expression: update.cron_expression,
            script_id: update.script_id,
            enabled: update.enabled,
            disable_once: update.disable_once,
            timing_mode: update.timing_mode,
            last_run: self.last_run,
        }
    }
}

/// Creation payload: the time is supplied as discrete fields and converted
/// into a cron expression by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAutomation {
    pub name: String,
    pub description: String,
    pub hour: u8,
    pub minute: u8,
    pub weekdays: Vec<u8>,
    pub script_id: String,
    pub owner: String,
    pub enabled: bool,
    pub timing_mode: TimingMode,
}

/// Modification payload — a full replace of everything but id and owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationUpdate {
    pub name: String,
    pub description: String,
    pub cron_expression: String,
    pub script_id: String,
    pub enabled: bool,
    pub disable_once: bool,
    pub timing_mode: TimingMode,
}

impl From<&Automation> for AutomationUpdate {
    fn from(automation: &Automation) -> Self {
        Self {
            name: automation.name.clone(),
            description: automation.description.clone(),
            cron_expression: automation.cron_expression.clone(),
            script_id: automation.script_id.clone(),
            enabled: automation.enabled,
            disable_once: automation.disable_once,
            timing_mode: automation.timing_mode,
        }
    }
}

/// Step-by-step builder for [`Automation`].
#[derive(Debug, Default)]
pub struct AutomationBuilder {
    id: Option<AutomationId>,
    owner: Option<String>,
    name: Option<String>,
    description: Option<String>,
    cron_expression: Option<String>,
    script_id: Option<String>,
    enabled: Option<bool>,
    disable_once: bool,
    timing_mode: Option<TimingMode>,
}

impl AutomationBuilder {
    #[must_use]
    pub fn id(mut self, id: AutomationId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn cron_expression(mut self, expr: impl Into<String>) -> Self {
        self.cron_expression = Some(expr.into());
        self
    }

    #[must_use]
    pub fn script_id(mut self, script_id: impl Into<String>) -> Self {
        self.script_id = Some(script_id.into());
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn disable_once(mut self, disable_once: bool) -> Self {
        self.disable_once = disable_once;
        self
    }

    #[must_use]
    pub fn timing_mode(mut self, timing_mode: TimingMode) -> Self {
        self.timing_mode = Some(timing_mode);
        self
    }

    /// Consume the builder, validate, and return an [`Automation`].
    ///
    /// # Errors
    ///
    /// Returns [`HomesteadError::Validation`] if required fields are missing
    /// or invalid.
    pub fn build(self) -> Result<Automation, HomesteadError> {
        let automation = Automation {
            id: self.id.unwrap_or_default(),
            owner: self.owner.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            cron_expression: self.cron_expression.unwrap_or_default(),
            script_id: self.script_id.unwrap_or_default(),
            enabled: self.enabled.unwrap_or(true),
            disable_once: self.disable_once,
            timing_mode: self.timing_mode.unwrap_or(TimingMode::Normal),
            last_run: None,
        };
        automation.validate()?;
        Ok(automation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_automation() -> Automation {
        Automation::builder()
            .owner("alice")
            .name("Evening lights")
            .cron_expression("0 22 * * 1,2,3,4,5")
            .script_id("lights_on")
            .build()
            .unwrap()
    }

    #[test]
    fn should_build_valid_automation_when_required_fields_provided() {
        let auto = valid_automation();
        assert_eq!(auto.name, "Evening lights");
        assert!(auto.enabled);
        assert!(!auto.disable_once);
        assert_eq!(auto.timing_mode, TimingMode::Normal);
        assert!(auto.last_run.is_none());
    }

    #[test]
    fn should_return_validation_error_when_name_is_empty() {
        let result = Automation::builder()
            .owner("alice")
            .cron_expression("5 4 * * *")
            .script_id("s")
            .build();
        assert!(matches!(
            result,
            Err(HomesteadError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_return_validation_error_when_owner_is_empty() {
        let result = Automation::builder()
            .name("rule")
            .cron_expression("5 4 * * *")
            .script_id("s")
            .build();
        assert!(matches!(
            result,
            Err(HomesteadError::Validation(ValidationError::EmptyOwner))
        ));
    }

    #[test]
    fn should_return_validation_error_on_invalid_cron_expression() {
        let result = Automation::builder()
            .owner("alice")
            .name("rule")
            .cron_expression("whenever")
            .script_id("s")
            .build();
        assert!(matches!(
            result,
            Err(HomesteadError::Validation(
                ValidationError::InvalidCronExpression(_)
            ))
        ));
    }

    #[test]
    fn should_mark_solar_modes() {
        assert!(!TimingMode::Normal.is_solar());
        assert!(TimingMode::Sunrise.is_solar());
        assert!(TimingMode::Sunset.is_solar());
    }

    #[test]
    fn should_keep_id_owner_and_last_run_when_applying_update() {
        let mut auto = valid_automation();
        auto.last_run = Some(crate::time::now());
        let update = AutomationUpdate {
            name: "Renamed".to_string(),
            description: "new".to_string(),
            cron_expression: "5 4 * * 0".to_string(),
            script_id: "other".to_string(),
            enabled: false,
            disable_once: true,
            timing_mode: TimingMode::Sunset,
        };
        let updated = auto.with_update(update);
        assert_eq!(updated.id, auto.id);
        assert_eq!(updated.owner, auto.owner);
        assert_eq!(updated.last_run, auto.last_run);
        assert_eq!(updated.name, "Renamed");
        assert!(!updated.enabled);
        assert_eq!(updated.timing_mode, TimingMode::Sunset);
    }

    #[test]
    fn should_roundtrip_automation_through_serde_json() {
        let auto = valid_automation();
        let json = serde_json::to_string(&auto).unwrap();
        let parsed: Automation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, auto.id);
        assert_eq!(parsed.cron_expression, auto.cron_expression);
        assert_eq!(parsed.timing_mode, auto.timing_mode);
    }

    #[test]
    fn should_serialize_timing_mode_lowercase() {
        let json = serde_json::to_string(&TimingMode::Sunrise).unwrap();
        assert_eq!(json, "\"sunrise\"");
    }
}
