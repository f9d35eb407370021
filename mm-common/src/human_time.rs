//! Human-readable formatting for playback times and file sizes
//!
//! Provides consistent display formatting for the presentation layer.

/// Seconds per minute
const SECONDS_PER_MINUTE: u64 = 60;

/// Bytes per megabyte (binary)
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Format a playback position as `M:SS`.
///
/// Unknown (`None`), non-finite, zero or negative values render as `0:00`.
/// Fractional seconds are truncated, never rounded up.
///
/// # Examples
///
/// ```
/// use mm_common::human_time::format_playback_time;
///
/// assert_eq!(format_playback_time(Some(0.0)), "0:00");
/// assert_eq!(format_playback_time(Some(59.9)), "0:59");
/// assert_eq!(format_playback_time(Some(200.0)), "3:20");
/// assert_eq!(format_playback_time(Some(f64::NAN)), "0:00");
/// assert_eq!(format_playback_time(None), "0:00");
/// ```
pub fn format_playback_time(seconds: Option<f64>) -> String {
    let seconds = match seconds {
        Some(s) if s.is_finite() && s > 0.0 => s as u64,
        _ => 0,
    };

    let minutes = seconds / SECONDS_PER_MINUTE;
    let secs = seconds % SECONDS_PER_MINUTE;
    format!("{}:{:02}", minutes, secs)
}

/// Format a byte count as megabytes with two decimals (`"3.42 MB"`).
///
/// # Examples
///
/// ```
/// use mm_common::human_time::format_file_size;
///
/// assert_eq!(format_file_size(0), "0.00 MB");
/// assert_eq!(format_file_size(1_048_576), "1.00 MB");
/// assert_eq!(format_file_size(5_242_880 + 524_288), "5.50 MB");
/// ```
pub fn format_file_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MB)
}
