//! Status command: store counts and unconsumed events grouped by night.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDate;

use sleeplog_core::{Event, bedtime_date};
use sleeplog_db::Database;

use crate::Config;

pub fn run<W: Write>(writer: &mut W, db: &mut Database, config: &Config) -> Result<()> {
    // Heal stores written by revisions that deleted entries without
    // unlinking their events.
    db.reset_orphaned_events()?;

    let entries = db.list_entries()?;
    let events = db.list_events()?;
    let unconsumed = db.unconsumed_events()?;

    writeln!(writer, "Sleep log status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(
        writer,
        "{} events, {} entries, {} events awaiting aggregation",
        events.len(),
        entries.len(),
        unconsumed.len()
    )?;

    if unconsumed.is_empty() {
        return Ok(());
    }

    writeln!(writer, "Unaggregated nights:")?;
    for (date, night) in group_by_night(&unconsumed, config.cutoff_hour) {
        let first = &night[0];
        let last = &night[night.len() - 1];
        match date {
            Some(date) => writeln!(
                writer,
                "- {date}: {} events ({} .. {})",
                night.len(),
                first.id,
                last.id
            )?,
            None => writeln!(writer, "- unresolvable: {} events", night.len())?,
        }
    }

    Ok(())
}

/// Groups events by bedtime date, preserving chronological order within and
/// across groups. Events are already sorted by timestamp, and bedtime dates
/// are monotone in the timestamp, so a plain run-length grouping suffices.
fn group_by_night(events: &[Event], cutoff_hour: u32) -> Vec<(Option<NaiveDate>, Vec<&Event>)> {
    let mut nights: Vec<(Option<NaiveDate>, Vec<&Event>)> = Vec::new();
    for event in events {
        let date = bedtime_date(event.timestamp, cutoff_hour).ok();
        match nights.last_mut() {
            Some((last_date, night)) if *last_date == date => night.push(event),
            _ => nights.push((date, vec![event])),
        }
    }
    nights
}
