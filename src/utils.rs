//! Utility functions for the matchmaking engine

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique match ID
pub fn generate_match_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Milliseconds elapsed between two timestamps, clamped at zero
pub fn elapsed_ms(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    now.signed_duration_since(since).num_milliseconds().max(0)
}

/// Check whether at least `threshold_ms` have passed since `since`
pub fn waited_at_least(since: DateTime<Utc>, now: DateTime<Utc>, threshold_ms: u64) -> bool {
    elapsed_ms(since, now) as u64 >= threshold_ms
}
