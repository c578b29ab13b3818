//! Human-readable position/duration formatting
//!
//! Provides the `M:SS` / `H:MM:SS` strings shown next to progress bars so
//! every screen formats time the same way.

/// Format a millisecond position as `M:SS`, or `H:MM:SS` once the value
/// reaches one hour. Sub-second precision is intentionally dropped.
///
/// # Examples
///
/// ```
/// use mezzo_common::time::format_position;
///
/// assert_eq!(format_position(0), "0:00");
/// assert_eq!(format_position(65_000), "1:05");
/// assert_eq!(format_position(3_661_000), "1:01:01");
/// ```
pub fn format_position(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = total_seconds / 3600;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Format a position/duration pair as `M:SS / M:SS`; an unknown duration
/// renders as `--:--`.
pub fn format_progress(position_ms: u64, duration_ms: Option<u64>) -> String {
    match duration_ms {
        Some(duration) => format!(
            "{} / {}",
            format_position(position_ms),
            format_position(duration)
        ),
        None => format!("{} / --:--", format_position(position_ms)),
    }
}
