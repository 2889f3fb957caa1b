//! Core data types for the `Shotrial` review protocol.

mod dispute;
mod pending;
mod user;
mod video;

pub use dispute::{DisputeEntry, ReviewerVerdict};
pub use pending::{ClaimState, PendingReviewEntry};
pub use user::{AllTimeStats, Last100Stats, UserId, UserRecord, UserStats};
pub use video::{CountryCode, Video, VideoId, VideoIdError, VideoStatus};

use chrono::{DateTime, Utc};

/// Unix timestamp in milliseconds
pub type Timestamp = i64;

/// Get current timestamp in milliseconds
#[must_use]
pub fn now_millis() -> Timestamp {
    Utc::now().timestamp_millis()
}

/// Convert timestamp to `DateTime`
#[must_use]
pub fn timestamp_to_datetime(ts: Timestamp) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ts)
}
