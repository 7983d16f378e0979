//! Timestamp utilities
//!
//! Timestamps are stored in the database as integer unix seconds and carried
//! in memory as `chrono::DateTime<Utc>`.

use chrono::{DateTime, TimeZone, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert unix seconds (database representation) to a UTC timestamp
///
/// Out-of-range values collapse to the unix epoch rather than panicking;
/// a nonsense stored timestamp degrades to "long ago", which the engine
/// treats as fully elapsed.
pub fn from_unix_secs(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Convert a UTC timestamp to unix seconds for storage
pub fn to_unix_secs(ts: DateTime<Utc>) -> i64 {
    ts.timestamp()
}
