//! Derived statistics for one night of cleaned events.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bedtime::{BedtimeError, bedtime_date};
use crate::event::{Event, EventKind};

/// Errors from statistics aggregation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StatsError {
    /// The event sequence was empty.
    #[error("cannot aggregate an empty event sequence")]
    EmptyRange,

    /// The first event's timestamp could not be bucketed.
    #[error(transparent)]
    Bedtime(#[from] BedtimeError),
}

/// The derived fields of a sleep entry.
///
/// Timestamps for anchor events that are absent from the range stay `None`;
/// the duration sums start at zero. All durations are non-negative
/// millisecond counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepStats {
    /// Bedtime date of the night, resolved from the first event.
    pub date: NaiveDate,
    /// When the sleeper got into bed.
    pub in_bed_time: Option<DateTime<Utc>>,
    /// When the sleeper turned in for the night.
    pub sleep_start_time: Option<DateTime<Utc>>,
    /// First moment presumed asleep.
    pub fall_asleep_time: Option<DateTime<Utc>>,
    /// First mid-night awakening.
    pub first_awakening_time: Option<DateTime<Utc>>,
    /// Final wake-up of the night.
    pub wake_up_time: Option<DateTime<Utc>>,
    /// When the sleeper got out of bed.
    pub out_of_bed_time: Option<DateTime<Utc>>,
    /// Total time between in-bed and out-of-bed, when both are known.
    pub time_in_bed_ms: Option<i64>,
    /// Total time spent in retained sleep bouts.
    pub time_asleep_ms: i64,
    /// Total time spent in mid-night awakenings.
    pub time_awakened_ms: i64,
    /// Number of mid-night awakenings (the final wake-up does not count).
    pub num_awakenings: u32,
}

/// Aggregates one night's cleaned events into derived statistics.
///
/// Single forward pass with previous/next neighbor access:
/// - each retained `Sleeping` event contributes the gap to its successor to
///   `time_asleep_ms`;
/// - each retained `Awake` event followed by `Sleeping` contributes the gap
///   to `time_awakened_ms` and counts as one awakening — an `Awake`
///   immediately before `OutOfBed` is the final wake-up, not an awakening;
/// - `wake_up_time` is the timestamp of the event preceding `OutOfBed` when
///   that event is `Awake`, otherwise the `OutOfBed` timestamp itself.
pub fn compute_stats(events: &[Event], cutoff_hour: u32) -> Result<SleepStats, StatsError> {
    let first = events.first().ok_or(StatsError::EmptyRange)?;
    let date = bedtime_date(first.timestamp, cutoff_hour)?;

    let mut stats = SleepStats {
        date,
        in_bed_time: None,
        sleep_start_time: None,
        fall_asleep_time: None,
        first_awakening_time: None,
        wake_up_time: None,
        out_of_bed_time: None,
        time_in_bed_ms: None,
        time_asleep_ms: 0,
        time_awakened_ms: 0,
        num_awakenings: 0,
    };

    for (i, event) in events.iter().enumerate() {
        let previous = if i > 0 { events.get(i - 1) } else { None };
        let next = events.get(i + 1);

        match event.kind {
            EventKind::InBed => stats.in_bed_time = Some(event.timestamp),
            EventKind::SleepStart => stats.sleep_start_time = Some(event.timestamp),
            EventKind::Sleeping => {
                stats.fall_asleep_time.get_or_insert(event.timestamp);
                if let Some(next) = next {
                    stats.time_asleep_ms += gap_ms(event, next);
                }
            }
            EventKind::Awake => {
                stats.first_awakening_time.get_or_insert(event.timestamp);
                if let Some(next) = next {
                    if next.kind == EventKind::Sleeping {
                        stats.time_awakened_ms += gap_ms(event, next);
                        stats.num_awakenings += 1;
                    }
                }
            }
            EventKind::OutOfBed => {
                stats.out_of_bed_time = Some(event.timestamp);
                if let Some(in_bed) = stats.in_bed_time {
                    stats.time_in_bed_ms =
                        Some((event.timestamp - in_bed).num_milliseconds().max(0));
                }
                stats.wake_up_time = Some(match previous {
                    Some(prev) if prev.kind == EventKind::Awake => prev.timestamp,
                    _ => event.timestamp,
                });
            }
        }
    }

    Ok(stats)
}

/// Non-negative millisecond gap between consecutive events.
fn gap_ms(event: &Event, next: &Event) -> i64 {
    (next.timestamp - event.timestamp).num_milliseconds().max(0)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};

    use super::*;
    use crate::clean::clean_events;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap() + TimeDelta::minutes(minutes)
    }

    fn night(events: &[(EventKind, i64)]) -> Vec<Event> {
        events
            .iter()
            .map(|&(kind, minutes)| Event::new(kind, at(minutes)))
            .collect()
    }

    /// InBed@00:00, SleepStart@00:05, Sleeping@00:10, Awake@06:00,
    /// Sleeping@06:05, OutOfBed@07:00 relative to a 22:00 base.
    fn scenario_a() -> Vec<Event> {
        night(&[
            (EventKind::InBed, 0),
            (EventKind::SleepStart, 5),
            (EventKind::Sleeping, 10),
            (EventKind::Awake, 360),
            (EventKind::Sleeping, 365),
            (EventKind::OutOfBed, 420),
        ])
    }

    fn assert_scenario_a_stats(stats: &SleepStats, events: &[Event]) {
        assert_eq!(stats.in_bed_time, Some(at(0)));
        assert_eq!(stats.sleep_start_time, Some(at(5)));
        assert_eq!(stats.fall_asleep_time, Some(at(10)));
        assert_eq!(stats.first_awakening_time, Some(at(360)));
        assert_eq!(stats.out_of_bed_time, Some(at(420)));
        // Last event before out-of-bed is Sleeping, so wake-up falls back to
        // the out-of-bed timestamp.
        assert_eq!(stats.wake_up_time, Some(at(420)));
        // (06:00 - 00:10) + (07:00 - 06:05)
        let expected_asleep =
            TimeDelta::minutes(350).num_milliseconds() + TimeDelta::minutes(55).num_milliseconds();
        assert_eq!(stats.time_asleep_ms, expected_asleep);
        assert_eq!(stats.num_awakenings, 1);
        assert_eq!(
            stats.time_awakened_ms,
            TimeDelta::minutes(5).num_milliseconds()
        );
        assert_eq!(
            stats.time_in_bed_ms,
            Some(TimeDelta::minutes(420).num_milliseconds())
        );
        assert_eq!(
            stats.date,
            bedtime_date(events[0].timestamp, 12).unwrap()
        );
    }

    #[test]
    fn scenario_a_full_night() {
        let events = scenario_a();
        let stats = compute_stats(&events, 12).unwrap();
        assert_scenario_a_stats(&stats, &events);
    }

    #[test]
    fn scenario_b_short_bout_filtered_to_same_stats() {
        // Insert a 2-minute Sleeping/Awake blip before OutOfBed; after
        // cleaning the aggregate is identical to scenario A.
        let events = night(&[
            (EventKind::InBed, 0),
            (EventKind::SleepStart, 5),
            (EventKind::Sleeping, 10),
            (EventKind::Awake, 360),
            (EventKind::Sleeping, 365),
            (EventKind::Sleeping, 385),
            (EventKind::Awake, 387),
            (EventKind::OutOfBed, 420),
        ]);
        let cleaned = clean_events(&events, TimeDelta::minutes(20));
        assert_eq!(cleaned.len(), 6);
        let stats = compute_stats(&cleaned, 12).unwrap();
        assert_scenario_a_stats(&stats, &cleaned);
    }

    #[test]
    fn wake_up_time_uses_preceding_awake() {
        let events = night(&[
            (EventKind::InBed, 0),
            (EventKind::Sleeping, 10),
            (EventKind::Awake, 400),
            (EventKind::OutOfBed, 420),
        ]);
        let stats = compute_stats(&events, 12).unwrap();
        assert_eq!(stats.wake_up_time, Some(at(400)));
        // The final wake-up is not an awakening.
        assert_eq!(stats.num_awakenings, 0);
        assert_eq!(stats.time_awakened_ms, 0);
    }

    #[test]
    fn missing_anchors_stay_unset() {
        let events = night(&[(EventKind::Sleeping, 0), (EventKind::Awake, 60)]);
        let stats = compute_stats(&events, 12).unwrap();
        assert!(stats.in_bed_time.is_none());
        assert!(stats.sleep_start_time.is_none());
        assert!(stats.out_of_bed_time.is_none());
        assert!(stats.time_in_bed_ms.is_none());
        assert!(stats.wake_up_time.is_none());
        assert_eq!(
            stats.time_asleep_ms,
            TimeDelta::minutes(60).num_milliseconds()
        );
    }

    #[test]
    fn empty_range_is_rejected() {
        assert_eq!(compute_stats(&[], 12), Err(StatsError::EmptyRange));
    }

    #[test]
    fn time_in_bed_bounds_time_asleep() {
        let events = scenario_a();
        let stats = compute_stats(&events, 12).unwrap();
        assert!(stats.time_in_bed_ms.unwrap() >= stats.time_asleep_ms);
        assert!(stats.time_asleep_ms >= 0);
        assert!(stats.time_awakened_ms >= 0);
    }
}
