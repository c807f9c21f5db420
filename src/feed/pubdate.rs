//! Publish-date normalization for real-world RSS feeds.
//!
//! RSS `pubDate` values are RFC-822-ish with inconsistent time zones
//! (named abbreviations like `GMT`/`EST` or numeric offsets like `+0000`)
//! and inconsistent precision (`HH:MM` vs `HH:MM:SS`). Rather than trying
//! a fixed list of formats, the time-of-day and zone fragments are
//! extracted first and a parse template is built around what was found.
//!
//! Failure is two-tier on purpose:
//! - no recognizable time/zone at all is [`PubDateError::NoMatch`], which
//!   callers tolerate by substituting the ingestion time;
//! - a recognized-but-malformed string is [`PubDateError::Parse`], a hard
//!   error, since a confidently matched timestamp that still fails the
//!   template points at malformed upstream data worth surfacing.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PubDateError {
    /// No time-of-day/zone substring was found in the raw string.
    #[error("no recognizable timestamp")]
    NoMatch,

    /// A timestamp pattern matched but the full string failed to parse.
    #[error("malformed publish date: {0}")]
    Parse(#[from] chrono::ParseError),
}

/// Captures the time of day (`HH:MM` or `HH:MM:SS`) and the trailing zone
/// token, anchored to end-of-string.
fn time_and_zone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d{2}:\d{2}(?::\d{2})?).*(\b[A-Z]+|[+-]\d{4})$").expect("valid pattern")
    })
}

/// Convert a raw `pubDate` string into an absolute UTC timestamp.
pub fn normalize_pub_date(raw: &str) -> Result<DateTime<Utc>, PubDateError> {
    let captures = time_and_zone_pattern()
        .captures(raw)
        .ok_or(PubDateError::NoMatch)?;
    let time = &captures[1];
    let zone = &captures[2];

    // Two colons means seconds are present
    let clock = if time.matches(':').count() == 2 {
        "%H:%M:%S"
    } else {
        "%H:%M"
    };

    if zone.starts_with('+') || zone.starts_with('-') {
        let template = format!("%a, %d %b %Y {clock} %z");
        Ok(DateTime::parse_from_str(raw, &template)?.with_timezone(&Utc))
    } else {
        // Named zone abbreviations carry no reliable offset; the zone name
        // is consumed by %Z and the wall-clock fields are taken as UTC,
        // matching how the original data was ingested.
        let template = format!("%a, %d %b %Y {clock} %Z");
        Ok(NaiveDateTime::parse_from_str(raw, &template)?.and_utc())
    }
}
