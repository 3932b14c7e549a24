use chrono::{DateTime, TimeZone, Utc};

/// Convert a `DateTime<Utc>` to epoch milliseconds.
pub fn to_epoch_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Convert epoch milliseconds to `DateTime<Utc>`, falling back to the unix epoch.
pub fn from_epoch_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Returns the current epoch milliseconds.
pub fn current_epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}
