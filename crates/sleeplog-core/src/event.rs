//! Raw sleep events captured from the hardware button.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix for event identifiers.
const EVENT_ID_PREFIX: &str = "event:";

/// The kind of physical occurrence an event records.
///
/// A night follows `InBed -> SleepStart -> Sleeping -> [Awake, Sleeping]* ->
/// Awake -> OutOfBed`, though raw captures may omit or repeat steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The lid was raised; the sleeper got into bed.
    InBed,
    /// First button press of the night; lights out.
    SleepStart,
    /// The inactivity countdown elapsed; presumed asleep.
    Sleeping,
    /// A button press while presumed asleep; woke up.
    Awake,
    /// The lid was closed; the sleeper got out of bed.
    OutOfBed,
}

impl EventKind {
    /// String representation used for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InBed => "in_bed",
            Self::SleepStart => "sleep_start",
            Self::Sleeping => "sleeping",
            Self::Awake => "awake",
            Self::OutOfBed => "out_of_bed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_bed" => Ok(Self::InBed),
            "sleep_start" => Ok(Self::SleepStart),
            "sleeping" => Ok(Self::Sleeping),
            "awake" => Ok(Self::Awake),
            "out_of_bed" => Ok(Self::OutOfBed),
            _ => Err(UnknownEventKind(s.to_string())),
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown event kind strings.
#[derive(Debug, Clone, Error)]
#[error("unknown event kind: {0}")]
pub struct UnknownEventKind(String);

/// An event identifier, derived from the event's millisecond timestamp.
///
/// The textual form is `event:{ms}`. Millisecond timestamps keep a fixed
/// digit width for any realistic clock, so lexicographic order over
/// identifiers matches chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Derives the identifier for an event at the given instant.
    #[must_use]
    pub fn from_timestamp(timestamp: DateTime<Utc>) -> Self {
        Self(format!("{EVENT_ID_PREFIX}{}", timestamp.timestamp_millis()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EventId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for EventId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One physical occurrence recorded by the capture machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier, derived from the timestamp.
    pub id: EventId,
    /// When the event occurred, millisecond precision.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub kind: EventKind,
    /// Identifier of the entry that consumed this event, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
}

impl Event {
    /// Creates an unconsumed event at the given instant.
    #[must_use]
    pub fn new(kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: EventId::from_timestamp(timestamp),
            timestamp,
            kind,
            entry_id: None,
        }
    }
}
