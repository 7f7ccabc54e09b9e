//! ISO-8601 duration (de)serialization for `std::time::Duration`.
//!
//! Durations are written as `PT#H#M#S` (fractional seconds allowed). Reading also
//! accepts the `[d.]hh:mm:ss[.fff]` clock form used by older sidecars.

use serde::{de, Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Formats a duration as an ISO-8601 string, e.g. `PT3M25S` or `PT1H0M0.5S`.
pub fn format_iso8601(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = duration.subsec_millis();

    let mut out = String::from("PT");
    if hours > 0 {
        out.push_str(&format!("{}H", hours));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{}M", minutes));
    }
    if millis > 0 {
        let frac = format!("{:03}", millis);
        out.push_str(&format!("{}.{}S", seconds, frac.trim_end_matches('0')));
    } else {
        out.push_str(&format!("{}S", seconds));
    }
    out
}

/// Parses an ISO-8601 duration (`P[nD]T[nH][nM][nS]`) or a clock string
/// (`[d.]hh:mm:ss[.fff]`).
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.starts_with('P') || input.starts_with('p') {
        parse_iso8601(input)
    } else {
        parse_clock(input)
    }
}

fn parse_iso8601(input: &str) -> Option<Duration> {
    let body = &input[1..];
    let (date_part, time_part) = match body.find(|c: char| c == 'T' || c == 't') {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };

    let mut total_ms: f64 = 0.0;
    let mut seen_any = false;

    let mut number = String::new();
    for c in date_part.chars() {
        match c {
            '0'..='9' | '.' => number.push(c),
            'D' | 'd' => {
                total_ms += number.parse::<f64>().ok()? * 86_400_000.0;
                number.clear();
                seen_any = true;
            }
            'W' | 'w' => {
                total_ms += number.parse::<f64>().ok()? * 7.0 * 86_400_000.0;
                number.clear();
                seen_any = true;
            }
            _ => return None,
        }
    }
    if !number.is_empty() {
        return None;
    }

    if let Some(time_part) = time_part {
        for c in time_part.chars() {
            match c {
                '0'..='9' | '.' => number.push(c),
                'H' | 'h' => {
                    total_ms += number.parse::<f64>().ok()? * 3_600_000.0;
                    number.clear();
                    seen_any = true;
                }
                'M' | 'm' => {
                    total_ms += number.parse::<f64>().ok()? * 60_000.0;
                    number.clear();
                    seen_any = true;
                }
                'S' | 's' => {
                    total_ms += number.parse::<f64>().ok()? * 1000.0;
                    number.clear();
                    seen_any = true;
                }
                _ => return None,
            }
        }
        if !number.is_empty() {
            return None;
        }
    }

    if !seen_any || !total_ms.is_finite() || total_ms < 0.0 {
        return None;
    }
    Some(Duration::from_millis(total_ms.round() as u64))
}

/// Parses `hh:mm:ss[.fff]`, `hh:mm` and `d.hh:mm:ss[.fff]`.
pub(crate) fn parse_clock(input: &str) -> Option<Duration> {
    let parts: Vec<&str> = input.split(':').collect();

    let (days, hours_str, minutes_str, seconds_str) = match parts.as_slice() {
        [h, m] => (0u64, *h, *m, "0"),
        [h, m, s] => {
            // "1.02:03:04" carries a day component before the first dot
            match h.split_once('.') {
                Some((d, h)) => (d.parse::<u64>().ok()?, h, *m, *s),
                None => (0, *h, *m, *s),
            }
        }
        _ => return None,
    };

    let hours: u64 = hours_str.parse().ok()?;
    let minutes: u64 = minutes_str.parse().ok()?;
    if minutes >= 60 {
        return None;
    }

    let seconds: f64 = seconds_str.parse().ok()?;
    if !(0.0..60.0).contains(&seconds) {
        return None;
    }

    let whole = days * 86_400 + hours * 3600 + minutes * 60;
    Some(Duration::from_secs(whole) + Duration::from_secs_f64(seconds))
}

/// Serializes a duration as an ISO-8601 string.
pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_iso8601(*duration))
}

/// Deserializes an ISO-8601 or clock-form duration.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw)
        .ok_or_else(|| de::Error::custom(format!("invalid duration: {}", raw)))
}
