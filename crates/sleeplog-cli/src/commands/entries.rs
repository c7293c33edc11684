//! Entry lifecycle commands: list, show, create, delete, note.

use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};

use sleeplog_core::{Entry, bedtime_range, format_duration};
use sleeplog_db::Database;

use crate::Config;

/// Lists all entries, one summary line per night.
pub fn list<W: Write>(writer: &mut W, db: &Database) -> Result<()> {
    let entries = db.list_entries()?;
    if entries.is_empty() {
        writeln!(writer, "No entries.")?;
        return Ok(());
    }

    for entry in entries {
        writeln!(writer, "{}", summary_line(&entry))?;
    }
    Ok(())
}

/// Shows one entry in full, with its consumed events.
pub fn show<W: Write>(writer: &mut W, db: &Database, id: &str) -> Result<()> {
    let entry = db.get_entry(id)?;
    let events = db.events_for_entry(id)?;

    writeln!(writer, "Entry {}", entry.id())?;
    write_time(writer, "In bed", entry.stats.in_bed_time)?;
    write_time(writer, "Lights out", entry.stats.sleep_start_time)?;
    write_time(writer, "Fell asleep", entry.stats.fall_asleep_time)?;
    write_time(writer, "Woke up", entry.stats.wake_up_time)?;
    write_time(writer, "Out of bed", entry.stats.out_of_bed_time)?;
    if let Some(in_bed) = entry.stats.time_in_bed_ms {
        writeln!(writer, "Time in bed:    {}", format_duration(in_bed))?;
    }
    writeln!(
        writer,
        "Time asleep:    {}",
        format_duration(entry.stats.time_asleep_ms)
    )?;
    writeln!(
        writer,
        "Awakenings:     {} ({})",
        entry.stats.num_awakenings,
        format_duration(entry.stats.time_awakened_ms)
    )?;
    if let Some(notes) = &entry.notes {
        writeln!(writer, "Notes:          {notes}")?;
    }

    writeln!(writer, "Events:")?;
    for event in events {
        writeln!(
            writer,
            "- {} {} ({})",
            event.timestamp.with_timezone(&Local).format("%H:%M"),
            event.kind,
            event.id
        )?;
    }
    Ok(())
}

/// Aggregates the raw events of one night into an entry.
pub fn create<W: Write>(
    writer: &mut W,
    db: &mut Database,
    date: NaiveDate,
    config: &Config,
) -> Result<()> {
    let (start, end) = bedtime_range(date, config.cutoff_hour)
        .with_context(|| format!("cannot resolve the night of {date}"))?;
    let events = db.list_events_between(local_to_utc(start)?, local_to_utc(end)?)?;
    if events.is_empty() {
        bail!("no events recorded for the night of {date}");
    }

    let entry = db.create_entry(&events, config.min_sleep(), config.cutoff_hour)?;
    writeln!(writer, "{}", summary_line(&entry))?;
    Ok(())
}

/// Deletes an entry, releasing its events for re-aggregation.
pub fn delete<W: Write>(writer: &mut W, db: &mut Database, id: &str) -> Result<()> {
    let unlinked = db.delete_entry(id)?;
    writeln!(writer, "Deleted entry {id} ({unlinked} events released)")?;
    Ok(())
}

/// Sets or clears an entry's notes.
pub fn note(db: &mut Database, id: &str, notes: Option<&str>) -> Result<()> {
    db.set_entry_notes(id, notes)?;
    Ok(())
}

fn summary_line(entry: &Entry) -> String {
    let asleep = format_duration(entry.stats.time_asleep_ms);
    let in_bed = entry
        .stats
        .time_in_bed_ms
        .map_or_else(|| "?".to_string(), format_duration);
    format!(
        "{}  in bed {in_bed}, asleep {asleep}, {} awakening(s)",
        entry.id(),
        entry.stats.num_awakenings
    )
}

fn write_time<W: Write>(
    writer: &mut W,
    label: &str,
    time: Option<DateTime<Utc>>,
) -> Result<()> {
    if let Some(time) = time {
        writeln!(
            writer,
            "{label}:{:<pad$}{}",
            "",
            time.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            pad = 15usize.saturating_sub(label.len() + 1)
        )?;
    }
    Ok(())
}

/// Interprets a naive bedtime-window bound as local time.
fn local_to_utc(naive: NaiveDateTime) -> Result<DateTime<Utc>> {
    naive
        .and_local_timezone(Local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("{naive} does not exist in the local timezone"))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};

    use sleeplog_core::{Event, EventKind, bedtime_date};

    use super::*;

    fn default_config() -> Config {
        Config::default()
    }

    fn seed_night(db: &Database, base: DateTime<Utc>) -> Vec<Event> {
        let minutes = [
            (EventKind::InBed, 0),
            (EventKind::SleepStart, 10),
            (EventKind::Sleeping, 25),
            (EventKind::Awake, 480),
            (EventKind::OutOfBed, 490),
        ];
        minutes
            .iter()
            .map(|&(kind, offset)| {
                let event = Event::new(kind, base + TimeDelta::minutes(offset));
                db.insert_event(&event).unwrap();
                event
            })
            .collect()
    }

    #[test]
    fn create_then_list_and_show() {
        let mut db = Database::open_in_memory().unwrap();
        let config = default_config();
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap();
        seed_night(&db, base);
        let date = bedtime_date(base, config.cutoff_hour).unwrap();

        let mut output = Vec::new();
        create(&mut output, &mut db, date, &config).unwrap();
        let id = date.format("%Y-%m-%d").to_string();
        assert!(String::from_utf8(output).unwrap().starts_with(&id));

        let mut listing = Vec::new();
        list(&mut listing, &db).unwrap();
        assert_eq!(String::from_utf8(listing).unwrap().lines().count(), 1);

        let mut shown = Vec::new();
        show(&mut shown, &db, &id).unwrap();
        let shown = String::from_utf8(shown).unwrap();
        assert!(shown.contains("Time asleep"));
        assert!(shown.contains("in_bed"));
    }

    #[test]
    fn create_fails_for_a_night_without_events() {
        let mut db = Database::open_in_memory().unwrap();
        let config = default_config();
        let date = NaiveDate::from_ymd_opt(2031, 6, 1).unwrap();

        let mut output = Vec::new();
        let err = create(&mut output, &mut db, date, &config).unwrap_err();
        assert!(err.to_string().contains("no events recorded"));
    }

    #[test]
    fn delete_releases_events() {
        let mut db = Database::open_in_memory().unwrap();
        let config = default_config();
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap();
        let events = seed_night(&db, base);
        let date = bedtime_date(base, config.cutoff_hour).unwrap();

        let mut output = Vec::new();
        create(&mut output, &mut db, date, &config).unwrap();

        let mut output = Vec::new();
        delete(&mut output, &mut db, &date.format("%Y-%m-%d").to_string()).unwrap();
        assert!(String::from_utf8(output).unwrap().contains("5 events"));
        assert_eq!(db.unconsumed_events().unwrap().len(), events.len());
    }

    #[test]
    fn note_round_trip() {
        let mut db = Database::open_in_memory().unwrap();
        let config = default_config();
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap();
        seed_night(&db, base);
        let date = bedtime_date(base, config.cutoff_hour).unwrap();

        let mut output = Vec::new();
        create(&mut output, &mut db, date, &config).unwrap();
        let id = date.format("%Y-%m-%d").to_string();

        note(&mut db, &id, Some("restless")).unwrap();
        assert_eq!(db.get_entry(&id).unwrap().notes.as_deref(), Some("restless"));

        note(&mut db, &id, None).unwrap();
        assert!(db.get_entry(&id).unwrap().notes.is_none());
    }
}
