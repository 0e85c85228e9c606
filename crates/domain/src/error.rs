//! Common error types used across the workspace.
//!
//! Faults in user-authored scripts are deliberately *not* part of this
//! hierarchy: a failed compilation or a runtime interrupt is data that rides
//! inside an action response (see [`crate::script::ScriptError`]), while the
//! variants below abort the surrounding operation.

/// Top-level error for domain and application operations.
#[derive(Debug, thiserror::Error)]
pub enum HomesteadError {
    /// Malformed input, rejected before any state change.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A referenced record does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// A scheduler registration could not be added or removed.
    #[error("scheduler error")]
    Scheduler(#[from] SchedulerError),

    /// Underlying store failure; fatal to the current operation.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The script engine itself failed (not the script it was running).
    #[error("script engine failure")]
    Engine(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Input validation failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("owner must not be empty")]
    EmptyOwner,

    #[error("script id must not be empty")]
    EmptyScriptId,

    #[error("vendor and model id must not be empty")]
    EmptyDriverKey,

    #[error("hour {0} is out of range (0-23)")]
    HourOutOfRange(u8),

    #[error("minute {0} is out of range (0-59)")]
    MinuteOutOfRange(u8),

    #[error("at most 7 weekdays are allowed, got {0}")]
    TooManyWeekdays(usize),

    #[error("weekday {0} is out of range (0-6)")]
    WeekdayOutOfRange(u8),

    #[error("at least one weekday is required")]
    NoWeekdays,

    #[error("invalid cron expression `{0}`")]
    InvalidCronExpression(String),

    #[error(transparent)]
    Cron(#[from] CronParseError),
}

/// Failures while parsing the 5-field cron wire format.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CronParseError {
    #[error("expected 5 space-separated fields, found {0}")]
    FieldCount(usize),

    #[error("invalid weekday entry `{0}`")]
    InvalidWeekday(String),

    #[error("field `{field}` has unsupported value `{value}`")]
    InvalidField { field: &'static str, value: String },

    #[error("`{expr}` is not valid cron syntax: {message}")]
    Grammar { expr: String, message: String },
}

impl From<CronParseError> for HomesteadError {
    fn from(err: CronParseError) -> Self {
        Self::Validation(ValidationError::Cron(err))
    }
}

/// A referenced record was not found.
#[derive(Debug, thiserror::Error)]
#[error("{entity} `{id}` not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Failures while mutating the live scheduler job table.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// A job is already registered under this tag; remove it first.
    #[error("a job is already registered under tag `{0}`")]
    DuplicateTag(String),

    /// No job is registered under this tag.
    #[error("no job registered under tag `{0}`")]
    NotRegistered(String),

    /// The trigger expression could not be parsed into a schedule.
    #[error("tag `{0}` carries an unschedulable cron expression")]
    InvalidExpression(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_validation_error_into_top_level_error() {
        let err: HomesteadError = ValidationError::EmptyName.into();
        assert!(matches!(
            err,
            HomesteadError::Validation(ValidationError::EmptyName)
        ));
    }

    #[test]
    fn should_convert_cron_parse_error_through_validation() {
        let err: HomesteadError = CronParseError::FieldCount(3).into();
        assert!(matches!(
            err,
            HomesteadError::Validation(ValidationError::Cron(CronParseError::FieldCount(3)))
        ));
    }

    #[test]
    fn should_render_not_found_error_with_entity_and_id() {
        let err = NotFoundError {
            entity: "Device",
            id: "kitchen-lamp".to_string(),
        };
        assert_eq!(err.to_string(), "Device `kitchen-lamp` not found");
    }
}
