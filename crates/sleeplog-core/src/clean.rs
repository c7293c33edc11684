//! Noise filtering for raw event sequences.
//!
//! A button fumbled in the dark produces a `Sleeping` blip followed seconds
//! later by an `Awake`. Neither reflects a real sleep bout, so both are
//! dropped before statistics are computed.

use chrono::TimeDelta;

use crate::event::{Event, EventKind};

/// Filters transient noise out of one night's ordered event sequence.
///
/// A `Sleeping` event is dropped when the gap to the next raw event is
/// shorter than `min_sleep`; an `Awake` event is dropped when the event
/// immediately before it was dropped, since an awakening cannot follow a
/// sleep bout that was filtered as noise. All other events are retained in
/// order. The last event has no successor and is never filtered.
///
/// Cleaning is idempotent: running it over its own output is a no-op.
#[must_use]
pub fn clean_events(events: &[Event], min_sleep: TimeDelta) -> Vec<Event> {
    let mut retained = Vec::with_capacity(events.len());
    let mut previous_dropped = false;

    for (i, event) in events.iter().enumerate() {
        let next = events.get(i + 1);
        let drop = match event.kind {
            EventKind::Sleeping => {
                next.is_some_and(|next| next.timestamp - event.timestamp < min_sleep)
            }
            EventKind::Awake => previous_dropped,
            _ => false,
        };
        if drop {
            tracing::debug!(id = %event.id, kind = %event.kind, "dropping noise event");
        } else {
            retained.push(event.clone());
        }
        previous_dropped = drop;
    }

    retained
}
