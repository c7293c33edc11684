//! Human-readable duration formatting for CLI output.

/// Formats a millisecond duration as `Nh Nm`, `Nm Ns`, or `Ns`.
///
/// Sub-minute remainders are shown only below the hour scale, matching how
/// sleep durations read best (`7h 45m`, `12m 30s`, `45s`).
#[must_use]
pub fn format_duration(duration_ms: i64) -> String {
    let seconds = (duration_ms.max(0) + 500) / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;

    if hours >= 1 {
        if minutes % 60 == 0 {
            format!("{hours}h")
        } else {
            format!("{hours}h {}m", minutes % 60)
        }
    } else if minutes >= 1 {
        if seconds % 60 == 0 {
            format!("{minutes}m")
        } else {
            format!("{minutes}m {}s", seconds % 60)
        }
    } else {
        format!("{seconds}s")
    }
}
