//! Fixed-width timestamp text encoding.
//!
//! Timestamps are stored as `YYYY-MM-DDTHH:MM:SS.ffffffZ`. Every value has the
//! same width, so lexical order in SQL equals chronological order; the message
//! pagination cursor compares them directly.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};

const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Current time truncated to the stored precision.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn encode(ts: &DateTime<Utc>) -> String {
    ts.format(FORMAT).to_string()
}

pub fn decode(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    // Accept RFC 3339 too, so hand-written cursors still parse
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Ok(d.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, FORMAT).map(|d| d.and_utc())
}
