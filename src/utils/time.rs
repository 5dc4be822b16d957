use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use now::DateTimeNow;

/// Microseconds between 1601-01-01 and 1970-01-01. Browser history databases
/// store visit times in microseconds since the former.
pub const HISTORY_EPOCH_OFFSET_MICROS: i64 = 11_644_473_600_000_000;

/// Converts a native history timestamp to UTC. Returns `None` for values that
/// fall outside the representable range.
pub fn history_micros_to_utc(micros: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros - HISTORY_EPOCH_OFFSET_MICROS)
}

pub fn utc_to_history_micros(moment: DateTime<Utc>) -> i64 {
    moment.timestamp_micros() + HISTORY_EPOCH_OFFSET_MICROS
}

/// Bounds of the UTC day containing `moment`: start inclusive, end exclusive.
pub fn utc_day_window(moment: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = moment.beginning_of_day();
    (start, next_day_start(start))
}

/// Returns start of the next day.
pub fn next_day_start<Tz: TimeZone>(date: DateTime<Tz>) -> DateTime<Tz> {
    (date + Duration::days(1)).with_time(NaiveTime::MIN).unwrap()
}
