use chrono::{DateTime, SecondsFormat, Utc};

/// All timestamps are UTC.
pub type Timestamp = DateTime<Utc>;

/// ISO-8601 timestamp as stored in state, history and timeline records.
///
/// Every value produced by [`iso_timestamp`] has the same width and the
/// same `Z` suffix, so comparing two of them as strings orders them in
/// time. Retention filters rely on this.
pub type IsoTimestamp = String;

/// Format a timestamp with microsecond precision and a `Z` suffix.
pub fn iso_timestamp(ts: Timestamp) -> IsoTimestamp {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// The current time as an [`IsoTimestamp`].
pub fn now_iso() -> IsoTimestamp {
    iso_timestamp(Utc::now())
}

/// Oldest timestamp still inside a window of `days` ending at `now`.
///
/// Negative windows count as empty. When the window reaches past the
/// representable range the result is the empty string, which sorts before
/// every timestamp and so keeps everything.
pub fn cutoff_iso(now: Timestamp, days: i64) -> IsoTimestamp {
    chrono::Duration::try_days(days.max(0))
        .and_then(|window| now.checked_sub_signed(window))
        .map(iso_timestamp)
        .unwrap_or_default()
}
