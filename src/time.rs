//! Timestamp policy shared across the SDK.
//!
//! Rows that have never been pushed carry a fixed sentinel timestamp
//! instead of NULL, so freshness comparisons never have to special-case
//! missing values.

use chrono::{DateTime, Duration, Utc};
use sea_orm::prelude::DateTimeUtc;

/// Consecutive failures after which a record is suppressed from syncing.
pub const MAX_SYNC_ERR: i32 = 10;

/// Advisory locks older than this are considered stale and may be stolen.
pub const STALE_LOCK_TIMEOUT_SECS: i64 = 3600;

/// Tokens are refreshed this many seconds before their stated expiry.
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5;

/// The "never synced" timestamp, ordered before all real timestamps.
pub fn sentinel() -> DateTimeUtc {
    // 2000-01-01T00:00:00Z. Everything this SDK touches postdates it.
    DateTime::UNIX_EPOCH + Duration::seconds(946_684_800)
}

pub fn is_sentinel(t: DateTimeUtc) -> bool {
    t == sentinel()
}

/// Parses an ISO-8601 timestamp from a remote payload.
///
/// Absent or unparseable values fall back to the sentinel: a record whose
/// update time the remote side did not report is treated as never updated.
pub fn parse_remote_timestamp(value: Option<&str>) -> DateTimeUtc {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(sentinel)
}
