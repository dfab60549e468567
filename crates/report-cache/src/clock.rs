//! Generation clock
use chrono::{DateTime, Duration, SubsecRound, Utc};

/// A timestamp strictly after `previous`, at microsecond precision so the
/// ordering survives serialization.
pub fn next_timestamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now().trunc_subsecs(6);
    match previous {
        Some(prev) if now <= prev => prev + Duration::microseconds(1),
        _ => now,
    }
}
