//! Bedtime date resolution.
//!
//! A sleep session that starts before the cutoff hour (default noon) belongs
//! to the previous calendar day, so a 2am bedtime on March 2nd files under
//! March 1st.

use chrono::{DateTime, Days, Local, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};
use thiserror::Error;

/// Hour of day below which a timestamp belongs to the previous night.
pub const DEFAULT_CUTOFF_HOUR: u32 = 12;

/// Errors from bedtime date resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BedtimeError {
    /// The timestamp is outside the representable calendar range.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(NaiveDateTime),

    /// The cutoff hour is not a valid hour of day.
    #[error("cutoff hour must be 0-23, got {0}")]
    InvalidCutoffHour(u32),
}

/// Resolves the bedtime date for a local date-time.
///
/// Timestamps whose hour of day is below `cutoff_hour` are shifted back one
/// calendar day; the time component is then discarded. Deterministic and
/// side-effect free. The returned [`NaiveDate`] is already a bucket, so
/// resolving it again (at or past the cutoff hour) is a fixed point.
pub fn bedtime_date_naive(
    datetime: NaiveDateTime,
    cutoff_hour: u32,
) -> Result<NaiveDate, BedtimeError> {
    if cutoff_hour > 23 {
        return Err(BedtimeError::InvalidCutoffHour(cutoff_hour));
    }
    let date = datetime.date();
    if datetime.hour() < cutoff_hour {
        date.checked_sub_days(Days::new(1))
            .ok_or(BedtimeError::InvalidTimestamp(datetime))
    } else {
        Ok(date)
    }
}

/// Resolves the bedtime date for an instant, using the local timezone to
/// determine the hour of day.
pub fn bedtime_date(timestamp: DateTime<Utc>, cutoff_hour: u32) -> Result<NaiveDate, BedtimeError> {
    bedtime_date_naive(timestamp.with_timezone(&Local).naive_local(), cutoff_hour)
}

/// Returns the inclusive local time window covered by a bedtime date.
///
/// The window runs from `date` at the cutoff hour to one minute before the
/// cutoff hour of the following day, so every instant resolves back to
/// `date` via [`bedtime_date_naive`].
pub fn bedtime_range(
    date: NaiveDate,
    cutoff_hour: u32,
) -> Result<(NaiveDateTime, NaiveDateTime), BedtimeError> {
    if cutoff_hour > 23 {
        return Err(BedtimeError::InvalidCutoffHour(cutoff_hour));
    }
    let start = date
        .and_hms_opt(cutoff_hour, 0, 0)
        .ok_or(BedtimeError::InvalidCutoffHour(cutoff_hour))?;
    let end = date
        .checked_add_days(Days::new(1))
        .and_then(|next| next.and_hms_opt(cutoff_hour, 0, 0))
        .map(|next| next - TimeDelta::minutes(1))
        .ok_or(BedtimeError::InvalidTimestamp(start))?;
    Ok((start, end))
}
