//! Hot-score ranking for the post list.

use chrono::{DateTime, TimeZone, Utc};

/// Epoch for the age term. Any fixed date works; scores are only compared
/// against each other.
fn ranking_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid fixed date")
}

/// Log-magnitude score plus an age term: ten times the votes buys the same
/// boost as about 12.5 hours of recency.
pub fn hot_score(up: i32, down: i32, created_at: DateTime<Utc>) -> f64 {
    let score = i64::from(up) - i64::from(down);
    let order = f64::log10((score.abs().max(1)) as f64);
    let sign = match score {
        s if s > 0 => 1.0,
        s if s < 0 => -1.0,
        _ => 0.0,
    };
    let seconds = (created_at - ranking_epoch()).num_seconds() as f64;

    sign * order + seconds / 45_000.0
}
