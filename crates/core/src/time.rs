use chrono::{DateTime, TimeZone, Utc};

/// Parses a log record's timestamp field, accepting RFC3339 strings as
/// well as bare unix timestamps (integer seconds, or fractional seconds
/// as emitted by some structured loggers).
///
/// Treats a successful parse at each step as the success path, trying
/// RFC3339 first, then a float unix timestamp, then an integer unix
/// timestamp.
pub fn parse_log_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(secs) = raw.parse::<f64>() {
        if secs.is_finite() {
            let whole = secs.trunc() as i64;
            let nanos = ((secs.fract()) * 1_000_000_000.0).round() as u32;
            if let chrono::LocalResult::Single(dt) = Utc.timestamp_opt(whole, nanos) {
                return Some(dt);
            }
        }
    }

    if let Ok(secs) = raw.parse::<i64>() {
        if let chrono::LocalResult::Single(dt) = Utc.timestamp_opt(secs, 0) {
            return Some(dt);
        }
    }

    None
}

/// Independent single-sided time filter, conjunctive in the corrected
/// (non-bug-compatible) semantics: a log with no timestamp is dropped by
/// either bound that is set, and a log must satisfy both bounds that are
/// set to pass.
///
/// `legacy` reproduces a historically observed bug: `start` is checked
/// and, if it does not reject the record, `end` is never consulted.
pub fn passes_time_filter(
    time: Option<DateTime<Utc>>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    legacy: bool,
) -> bool {
    if let Some(start) = start {
        match time {
            None => return false,
            Some(t) if t < start => return false,
            _ => {}
        }
        if legacy {
            return true;
        }
    }

    if let Some(end) = end {
        match time {
            None => return false,
            Some(t) if t > end => return false,
            _ => {}
        }
    }

    true
}
