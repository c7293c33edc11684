//! Events command for querying the local `SQLite` database.
//!
//! Outputs events from the store as JSONL for inspection and debugging.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use sleeplog_db::Database;

/// Runs the events command, writing events as JSONL.
pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    unconsumed: bool,
    after: Option<&str>,
    before: Option<&str>,
) -> Result<()> {
    let events = if unconsumed {
        db.unconsumed_events()?
    } else {
        match (
            parse_timestamp(after, "after")?,
            parse_timestamp(before, "before")?,
        ) {
            (None, None) => db.list_events()?,
            (after, before) => db.list_events_between(
                after.unwrap_or(DateTime::<Utc>::MIN_UTC),
                before.unwrap_or(DateTime::<Utc>::MAX_UTC),
            )?,
        }
    };

    for event in events {
        let json = serde_json::to_string(&event)?;
        writeln!(writer, "{json}")?;
    }

    Ok(())
}

fn parse_timestamp(s: Option<&str>, name: &str) -> Result<Option<DateTime<Utc>>> {
    match s {
        None => Ok(None),
        Some(s) => {
            let dt = DateTime::parse_from_rfc3339(s).with_context(|| {
                format!(
                    "invalid --{name} timestamp, expected ISO 8601 (e.g., 2024-03-01T22:00:00Z)"
                )
            })?;
            Ok(Some(dt.with_timezone(&Utc)))
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use sleeplog_core::{Event, EventKind};

    use super::*;

    #[test]
    fn writes_one_json_line_per_event() {
        let db = Database::open_in_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap();
        db.insert_event(&Event::new(EventKind::InBed, base)).unwrap();
        db.insert_event(&Event::new(
            EventKind::OutOfBed,
            base + chrono::TimeDelta::hours(8),
        ))
        .unwrap();

        let mut output = Vec::new();
        run(&mut output, &db, false, None, None).unwrap();

        let output = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#""kind":"in_bed""#));
        assert!(lines[1].contains(r#""kind":"out_of_bed""#));
    }

    #[test]
    fn range_filter_is_inclusive() {
        let db = Database::open_in_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap();
        for offset in 0..3 {
            db.insert_event(&Event::new(
                EventKind::Sleeping,
                base + chrono::TimeDelta::hours(offset),
            ))
            .unwrap();
        }

        let mut output = Vec::new();
        run(
            &mut output,
            &db,
            false,
            Some("2024-03-01T23:00:00Z"),
            Some("2024-03-02T00:00:00Z"),
        )
        .unwrap();

        assert_eq!(String::from_utf8(output).unwrap().lines().count(), 2);
    }

    #[test]
    fn rejects_malformed_timestamps() {
        let db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        let err = run(&mut output, &db, false, Some("yesterday"), None).unwrap_err();
        assert!(err.to_string().contains("--after"));
    }
}
