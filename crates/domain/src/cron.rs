//! Cron expression wire format.
//!
//! Automations store their trigger as a compact 5-field cron string,
//! `"<minute> <hour> * * <weekdays-or-*>"`, where the weekday field is either
//! `*` (every day) or a comma-joined list of `0..=6` (Sunday = 0). This module
//! owns the conversions between `(hour, minute, weekdays)` and that string,
//! plus validation and a human-readable rendering for display.
//!
//! The underlying grammar check and next-occurrence iteration delegate to the
//! `cron` crate, which speaks a 6-field dialect (leading seconds, weekdays
//! numbered 1-7); [`to_schedule`] bridges the two formats.

use std::str::FromStr;

use crate::error::{CronParseError, ValidationError};

const WEEKDAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];
const WEEKDAY_LABELS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Generate a cron expression from an hour, a minute, and the weekdays on
/// which the trigger fires.
///
/// When all 7 weekdays are supplied the weekday field collapses to `*`.
/// Duplicate weekday values are *not* deduplicated here; callers validate
/// their input before calling.
///
/// # Errors
///
/// Returns [`ValidationError`] when more than 7 weekdays are supplied, when a
/// weekday is outside `0..=6`, when the list is empty, or when hour/minute are
/// out of range.
pub fn generate(hour: u8, minute: u8, weekdays: &[u8]) -> Result<String, ValidationError> {
    if hour > 23 {
        return Err(ValidationError::HourOutOfRange(hour));
    }
    if minute > 59 {
        return Err(ValidationError::MinuteOutOfRange(minute));
    }
    if weekdays.len() > 7 {
        return Err(ValidationError::TooManyWeekdays(weekdays.len()));
    }
    if weekdays.is_empty() {
        return Err(ValidationError::NoWeekdays);
    }
    if let Some(&day) = weekdays.iter().find(|&&day| day > 6) {
        return Err(ValidationError::WeekdayOutOfRange(day));
    }
    let days = if weekdays.len() == 7 {
        "*".to_string()
    } else {
        weekdays
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(",")
    };
    Ok(format!("{minute} {hour} * * {days}"))
}

/// Extract the weekdays a cron expression fires on.
///
/// A `*` weekday field expands to all of `0..=6`.
///
/// # Errors
///
/// Returns [`CronParseError`] when the expression does not have exactly 5
/// fields or the weekday field contains non-numeric entries.
pub fn extract_weekdays(expr: &str) -> Result<Vec<u8>, CronParseError> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(CronParseError::FieldCount(fields.len()));
    }
    if fields[4] == "*" {
        return Ok((0..=6).collect());
    }
    fields[4]
        .split(',')
        .map(|entry| {
            entry
                .parse::<u8>()
                .ok()
                .filter(|&day| day <= 6)
                .ok_or_else(|| CronParseError::InvalidWeekday(entry.to_string()))
        })
        .collect()
}

/// Parse the 5-field wire format into a [`cron::Schedule`].
///
/// Seconds are pinned to `0` and numeric weekdays are rendered as day names,
/// since the `cron` crate numbers weekdays 1-7 instead of 0-6.
///
/// # Errors
///
/// Returns [`CronParseError`] on a malformed expression.
pub fn to_schedule(expr: &str) -> Result<cron::Schedule, CronParseError> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(CronParseError::FieldCount(fields.len()));
    }
    let weekdays = if fields[4] == "*" {
        "*".to_string()
    } else {
        fields[4]
            .split(',')
            .map(|entry| match entry.parse::<usize>() {
                Ok(day) if day <= 6 => Ok(WEEKDAY_NAMES[day]),
                Ok(_) => Err(CronParseError::InvalidWeekday(entry.to_string())),
                // Pass named entries through; the grammar check below decides.
                Err(_) => Ok(entry),
            })
            .collect::<Result<Vec<_>, _>>()?
            .join(",")
    };
    let six_field = format!(
        "0 {} {} {} {} {}",
        fields[0], fields[1], fields[2], fields[3], weekdays
    );
    cron::Schedule::from_str(&six_field).map_err(|err| CronParseError::Grammar {
        expr: expr.to_string(),
        message: err.to_string(),
    })
}

/// Whether `expr` is a valid expression in the 5-field wire format.
#[must_use]
pub fn is_valid(expr: &str) -> bool {
    to_schedule(expr).is_ok()
}

/// Render a cron expression as a short English sentence, e.g.
/// `"At 06:30 on Monday, Tuesday and Friday"`.
///
/// # Errors
///
/// Returns [`CronParseError`] when the expression is invalid or does not use
/// plain numeric minute/hour fields.
pub fn describe(expr: &str) -> Result<String, CronParseError> {
    // Reject anything the scheduler itself would reject.
    to_schedule(expr)?;

    let fields: Vec<&str> = expr.split_whitespace().collect();
    let minute: u8 = fields[0]
        .parse()
        .map_err(|_| CronParseError::InvalidField {
            field: "minute",
            value: fields[0].to_string(),
        })?;
    let hour: u8 = fields[1].parse().map_err(|_| CronParseError::InvalidField {
        field: "hour",
        value: fields[1].to_string(),
    })?;
    let weekdays = extract_weekdays(expr)?;

    let days = if weekdays.len() == 7 {
        "every day".to_string()
    } else {
        let labels: Vec<&str> = weekdays
            .iter()
            .map(|&day| WEEKDAY_LABELS[day as usize])
            .collect();
        match labels.split_last() {
            Some((last, rest)) if !rest.is_empty() => {
                format!("on {} and {last}", rest.join(", "))
            }
            _ => format!("on {}", labels.join(", ")),
        }
    };
    Ok(format!("At {hour:02}:{minute:02} {days}"))
}
