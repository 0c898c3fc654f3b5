//! Fixed-window admission buckets, kept in the shared store so limits hold
//! across processes, not just one CLI invocation.
//!
//! Checking and recording are separate: `is_admitted` only reads, `record`
//! counts one successful action. A submission that fails validation after
//! the gate therefore consumes no quota.

use crate::core::error::AgoraError;
use crate::core::time;
use rusqlite::{Connection, OptionalExtension, params};

pub const POST_WINDOW_MS: i64 = 60 * 60 * 1000;

fn bucket_start(now_ms: i64, window_ms: i64) -> String {
    time::iso_from_ms(now_ms - now_ms.rem_euclid(window_ms))
}

/// Whether one more action under `key` would stay within `limit` for the
/// current bucket. Read-only.
pub fn is_admitted(
    conn: &Connection,
    key: &str,
    limit: u32,
    window_ms: i64,
    now_ms: i64,
) -> Result<bool, AgoraError> {
    let bucket = bucket_start(now_ms, window_ms);
    let count: i64 = conn
        .query_row(
            "SELECT count FROM rate_limits WHERE key = ?1 AND bucket_start = ?2",
            params![key, bucket],
            |row| row.get(0),
        )
        .optional()
        .map_err(AgoraError::RusqliteError)?
        .unwrap_or(0);
    Ok(count < limit as i64)
}

/// Counts one completed action against `key`'s current bucket. The
/// increment is an in-database upsert, so concurrent callers cannot lose an
/// update to a stale read.
pub fn record(conn: &Connection, key: &str, window_ms: i64, now_ms: i64) -> Result<(), AgoraError> {
    let bucket = bucket_start(now_ms, window_ms);
    conn.execute(
        "INSERT INTO rate_limits(key, bucket_start, count) VALUES(?1, ?2, 1)
         ON CONFLICT(key, bucket_start) DO UPDATE SET count = count + 1",
        params![key, bucket],
    )?;

    // Opportunistic pruning; buckets two windows old can never matter again.
    let horizon = time::iso_from_ms(now_ms - 2 * window_ms);
    conn.execute(
        "DELETE FROM rate_limits WHERE bucket_start < ?1",
        [&horizon],
    )?;
    Ok(())
}

pub fn post_limit_key(agent_id: &str) -> String {
    format!("posts:{agent_id}")
}
