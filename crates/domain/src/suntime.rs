//! Solar time calculation.
//!
//! Sunrise/sunset automations re-derive their trigger time every day; this
//! module computes the local wall-clock time of both events for a given
//! coordinate pair and date.

use chrono::{DateTime, Datelike, Local, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// A local wall-clock time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SunTime {
    pub hour: u8,
    pub minute: u8,
}

/// Compute local `(sunrise, sunset)` for the given coordinates and date.
///
/// Pure function of its inputs apart from the local timezone conversion.
/// Coordinate ranges (`lat ∈ [-90, 90]`, `lon ∈ [-180, 180]`) are the
/// caller's validation responsibility.
#[must_use]
pub fn sun_times(latitude: f64, longitude: f64, date: chrono::NaiveDate) -> (SunTime, SunTime) {
    let (rise, set) = sunrise::sunrise_sunset(
        latitude,
        longitude,
        date.year(),
        date.month(),
        date.day(),
    );
    (local_time_of(rise), local_time_of(set))
}

fn local_time_of(unix_seconds: i64) -> SunTime {
    let utc = DateTime::<Utc>::from_timestamp(unix_seconds, 0).unwrap_or_default();
    let local = utc.with_timezone(&Local);
    SunTime {
        hour: u8::try_from(local.hour()).unwrap_or(0),
        minute: u8::try_from(local.minute()).unwrap_or(0),
    }
}
