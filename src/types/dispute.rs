//! Dispute entries - disagreements awaiting admin arbitration.

use serde::{Deserialize, Serialize};

use super::{CountryCode, Timestamp, UserId, VideoId};

/// A reviewer's verdict on a claimed video
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerVerdict {
    /// The reviewer's independent shot count
    Count(u32),
    /// The session broke the rules and should not count at all
    RuleViolation,
}

impl ReviewerVerdict {
    /// The counted shots, if the reviewer gave a count
    #[must_use]
    pub const fn count(&self) -> Option<u32> {
        match self {
            Self::Count(n) => Some(*n),
            Self::RuleViolation => None,
        }
    }
}

/// One entry in the global dispute pool.
///
/// Created when a reviewer's verdict disagrees with the uploader's reported
/// count; destroyed when an admin arbitrates. Country-tagged so operators
/// can group their queue, but the pool itself is global.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DisputeEntry {
    /// The disputed video
    pub video_id: VideoId,
    /// The uploader
    pub owner: UserId,
    /// The reviewer who raised the dispute
    pub reviewer: UserId,
    /// Country of the originating pool
    pub country: CountryCode,
    /// The uploader's self-reported count
    pub reported_shots: u32,
    /// The reviewer's verdict
    pub reviewer_verdict: ReviewerVerdict,
    /// The reviewer's stated reason, if any
    pub reason: Option<String>,
    /// When the dispute was raised
    pub created_at: Timestamp,
}
