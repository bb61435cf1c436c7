//! Time-jump expressions for history navigation (`b` key, `--at`).
//!
//! Accepted forms, all UTC:
//! - Unix seconds: `1738944000`
//! - Relative to the current snapshot: `-1h`, `+30m`, `-2d`, `-1w`, `-90s`
//! - ISO 8601: `2026-02-07T17:00:00`, `2026-02-07T17:00`, RFC 3339 with offset
//! - Date and time: `2026-02-07:07:00`, `2026-02-07:07:00:00`
//! - Time on the current snapshot's day: `07:00`

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeParseError {
    pub input: String,
    pub message: String,
}

impl TimeParseError {
    fn new(input: &str, message: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TimeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse time '{}': {}", self.input, self.message)
    }
}

impl std::error::Error for TimeParseError {}

const HINT: &str = "use 1738944000, -1h, +30m, 2026-02-07T17:00:00, 2026-02-07:07:00 or 07:00";

/// Parses `input` into epoch seconds. Relative offsets and bare times are
/// resolved against `base_ts`.
pub fn parse_time_with_base(input: &str, base_ts: i64) -> Result<i64, TimeParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TimeParseError::new(input, "empty input"));
    }

    if input.bytes().all(|b| b.is_ascii_digit()) {
        return input
            .parse::<i64>()
            .map_err(|e| TimeParseError::new(input, e.to_string()));
    }

    if let Some(delta) = relative_seconds(input) {
        return base_ts
            .checked_add(delta)
            .ok_or_else(|| TimeParseError::new(input, "relative time overflow"));
    }

    iso8601(input)
        .or_else(|| date_colon_time(input))
        .or_else(|| time_on_day_of(input, base_ts))
        .ok_or_else(|| TimeParseError::new(input, HINT))
}

/// Signed offset in seconds for `-1h` / `+30m` style input.
fn relative_seconds(input: &str) -> Option<i64> {
    let (sign, rest) = match input.as_bytes().first()? {
        b'-' => (-1, &input[1..]),
        b'+' => (1, &input[1..]),
        _ => return None,
    };
    let unit = rest.chars().last()?;
    let number: i64 = rest[..rest.len() - unit.len_utf8()].parse().ok()?;
    let scale = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86_400,
        'w' => 604_800,
        _ => return None,
    };
    number.checked_mul(scale)?.checked_mul(sign)
}

fn iso8601(input: &str) -> Option<i64> {
    if !input.contains('T') {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.timestamp());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .map(|ndt| Utc.from_utc_datetime(&ndt).timestamp())
}

fn date_colon_time(input: &str) -> Option<i64> {
    let (date, time) = (input.get(..10)?, input.get(10..)?.strip_prefix(':')?);
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let time = clock(time)?;
    Some(Utc.from_utc_datetime(&date.and_time(time)).timestamp())
}

fn time_on_day_of(input: &str, base_ts: i64) -> Option<i64> {
    let time = clock(input)?;
    let day = Utc.timestamp_opt(base_ts, 0).single()?.date_naive();
    Some(Utc.from_utc_datetime(&day.and_time(time)).timestamp())
}

/// `HH:MM` or `HH:MM:SS`.
fn clock(s: &str) -> Option<NaiveTime> {
    match s.len() {
        5 => NaiveTime::parse_from_str(s, "%H:%M").ok(),
        8 => NaiveTime::parse_from_str(s, "%H:%M:%S").ok(),
        _ => None,
    }
}

/// `2026-02-07 17:00:00` in UTC, or the raw number if out of range.
pub fn format_timestamp(ts: i64) -> String {
    match Utc.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ts.to_string(),
    }
}
