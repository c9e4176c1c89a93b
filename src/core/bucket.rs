//! Bucket encoder (C3): maps a Unix-nanosecond instant to `(hour, dayType)`
//! in a configured IANA timezone.

use crate::core::error::CoreError;
use crate::core::model::{DayType, TimeBucket};
use chrono::{Datelike, TimeZone, Timelike, Weekday};
use chrono_tz::Tz;

pub const DEFAULT_TIMEZONE: &str = "Asia/Taipei";

/// Parses `nano_string` as a base-10 `i64`, loads the IANA zone (falling
/// back to [`DEFAULT_TIMEZONE`] when `tz_name` is empty), and returns the
/// bucket for the resulting local time. Saturday and Sunday are weekend;
/// every other day is weekday.
pub fn parse_time_bucket(nano_string: &str, tz_name: &str) -> Result<TimeBucket, CoreError> {
    let nanos: i64 = nano_string
        .trim()
        .parse()
        .map_err(|_| CoreError::InvalidInput(format!("malformed nanosecond timestamp: {nano_string}")))?;

    bucket_for_nanos(nanos, tz_name)
}

pub fn bucket_for_nanos(nanos: i64, tz_name: &str) -> Result<TimeBucket, CoreError> {
    let zone_name = if tz_name.is_empty() {
        DEFAULT_TIMEZONE
    } else {
        tz_name
    };
    let tz: Tz = zone_name
        .parse()
        .map_err(|_| CoreError::InvalidInput(format!("unknown timezone: {zone_name}")))?;

    let secs = nanos.div_euclid(1_000_000_000);
    let nsec = nanos.rem_euclid(1_000_000_000) as u32;
    let utc = chrono::Utc
        .timestamp_opt(secs, nsec)
        .single()
        .ok_or_else(|| CoreError::InvalidInput(format!("out-of-range timestamp: {nanos}")))?;
    let local = utc.with_timezone(&tz);

    let day_type = match local.weekday() {
        Weekday::Sat | Weekday::Sun => DayType::Weekend,
        _ => DayType::Weekday,
    };

    Ok(TimeBucket {
        hour: local.hour() as u8,
        day_type,
    })
}
