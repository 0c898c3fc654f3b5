//! Shared timestamp helpers for board rows and cursor fields.
//!
//! Every timestamp in the store is RFC-3339 UTC with fixed millisecond
//! width (`2026-08-29T12:34:56.789Z`). Fixed width means SQL string
//! comparison equals chronological comparison, which the cursor predicates
//! rely on, and an encoded cursor's `createdAt` round-trips byte-identically.

use chrono::{DateTime, SecondsFormat, Utc};
use ulid::Ulid;

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn now_iso() -> String {
    iso_from_ms(now_ms())
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

pub fn iso_from_ms(ms: i64) -> String {
    // Out-of-range input cannot come from rows we wrote; epoch is as good a
    // rendering as any for it.
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Strict RFC-3339 to epoch milliseconds, truncating sub-millisecond
/// precision. Returns `None` for malformed input and for impossible dates
/// (no silent normalization) — callers treat that the same as a missing
/// value.
pub fn ms_from_iso(ts: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
}
