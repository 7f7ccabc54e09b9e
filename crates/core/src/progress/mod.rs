//! Parsing of transcoder progress lines.
//!
//! The transcoder reports progress on stderr as
//! `size=  1024kB time=00:01:30.00 bitrate= 93.2kbits/s speed=12.1x`.
//! Only the `time=` field is used; it is mapped to a percentage of the source
//! duration by [`ProgressTracker`].

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::time::Duration;

use crate::job::duration::parse_clock;

static PROGRESS_LINE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"size=\s*[\d.]+kB\s+time=\s*(?P<time>[\d.:]+)\s+bitrate=\s*[\d.]+kbits/s\s+speed=\s*[\d.]+x",
    )
    .ok()
});

/// Extracts the elapsed time from one progress line. Never fails; unrelated or
/// malformed lines yield `None`.
pub fn parse_progress_line(line: &str) -> Option<Duration> {
    let re = PROGRESS_LINE.as_ref()?;
    let caps = re.captures(line)?;
    parse_clock(caps.name("time")?.as_str())
}

/// Integer percentage of `elapsed` over `total`, floored. Not clamped.
pub fn percent_of(elapsed: Duration, total: Duration) -> Option<u32> {
    let total_ms = total.as_millis();
    if total_ms == 0 {
        return None;
    }
    let pct = elapsed.as_millis() * 100 / total_ms;
    Some(u32::try_from(pct).unwrap_or(u32::MAX))
}

/// Remembers the last published percentage so repeats can be dropped.
///
/// Owned by a single conversion; values may go down as well as up.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    previous: Option<u32>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the percentage if it differs from the last one returned.
    pub fn update(&mut self, elapsed: Duration, total: Duration) -> Option<u32> {
        let pct = percent_of(elapsed, total)?;
        if self.previous == Some(pct) {
            return None;
        }
        self.previous = Some(pct);
        Some(pct)
    }

    /// Feeds a raw stderr line through the parser and the de-duplication.
    pub fn observe_line(&mut self, line: &str, total: Duration) -> Option<u32> {
        let elapsed = parse_progress_line(line)?;
        self.update(elapsed, total)
    }

    pub fn last(&self) -> Option<u32> {
        self.previous
    }
}
