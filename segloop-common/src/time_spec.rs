//! Human time strings for segment offsets
//!
//! Offsets are entered and displayed as `SS`, `M:SS` or `H:MM:SS`.
//! Parsing is lenient about overflow: a minutes or seconds field of 60 or
//! more carries into the next unit (`"1:75"` is 2 minutes 15 seconds), which
//! existing playlists rely on.

/// Maximum number of `:`-separated fields (`HH:MM:SS`)
const MAX_FIELDS: usize = 3;

/// Parse a human time string into seconds.
///
/// Accepts `SS`, `MM:SS` and `HH:MM:SS`. The last field may carry a
/// fractional part; the others must be whole numbers. Returns `None` when any
/// field is empty or non-numeric.
///
/// # Examples
///
/// ```
/// use segloop_common::time_spec::parse;
///
/// assert_eq!(parse("45"), Some(45.0));
/// assert_eq!(parse("2:15"), Some(135.0));
/// assert_eq!(parse("1:75"), Some(135.0));
/// assert_eq!(parse("1:02:03"), Some(3723.0));
/// assert_eq!(parse("1:x"), None);
/// ```
pub fn parse(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let fields: Vec<&str> = text.split(':').collect();
    if fields.len() > MAX_FIELDS {
        return None;
    }

    let (last, leading) = fields.split_last()?;
    let seconds = parse_seconds_field(last)?;

    // Leading fields are (hours, minutes) or (minutes); weight from the right
    let mut total = seconds;
    let mut weight = 60.0;
    for field in leading.iter().rev() {
        let value = parse_whole_field(field)?;
        total += value as f64 * weight;
        weight *= 60.0;
    }

    Some(total)
}

/// Format seconds as `M:SS`, or `H:MM:SS` once there is at least one hour.
///
/// `None` formats as the empty string. Fractional seconds are truncated and
/// negative values clamp to zero.
///
/// # Examples
///
/// ```
/// use segloop_common::time_spec::format;
///
/// assert_eq!(format(None), "");
/// assert_eq!(format(Some(5.0)), "0:05");
/// assert_eq!(format(Some(135.0)), "2:15");
/// assert_eq!(format(Some(7325.0)), "2:02:05");
/// ```
pub fn format(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds else {
        return String::new();
    };

    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

fn parse_whole_field(field: &str) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

fn parse_seconds_field(field: &str) -> Option<f64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    let value: f64 = field.parse().ok()?;
    value.is_finite().then_some(value)
}
