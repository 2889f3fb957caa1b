//! Peer-review coordination: candidate lookup, claim/release, and outcome
//! submission.
//!
//! ## The review cycle
//!
//! 1. A reviewer asks [`CandidateLocator`] for an eligible pending video
//!    (never their own, never one that is currently claimed)
//! 2. [`ClaimCoordinator`] takes the claim with a compare-and-set; a lost
//!    race is a [`ReviewError::ClaimConflict`], and the caller simply asks
//!    the locator again
//! 3. The reviewer watches the video and [`OutcomeProcessor`] records the
//!    verdict: agreement verifies the video, disagreement hands it to the
//!    dispute pool
//!
//! Claims carry a lease, so a client that crashes mid-review cannot block
//! its video forever: a claim older than [`ReviewConfig::claim_lease_ms`]
//! is treated as unclaimed again.

mod claim;
mod locator;
mod outcome;

pub use claim::ClaimCoordinator;
pub use locator::CandidateLocator;
pub use outcome::{OutcomeProcessor, OutcomeResult, OutcomeSubmission};

use crate::store::StoreError;
use crate::types::{UserId, VideoId, VideoStatus};
use crate::DEFAULT_CLAIM_LEASE_MS;

/// Review coordination configuration
#[derive(Clone, Debug)]
pub struct ReviewConfig {
    /// How long a claim is honoured before it is treated as abandoned.
    /// The default is provisional; tune with product input.
    pub claim_lease_ms: i64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            claim_lease_ms: DEFAULT_CLAIM_LEASE_MS,
        }
    }
}

/// Review coordination errors
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    /// Entry already claimed by someone else. A normal race outcome, not a
    /// failure - re-query for a different candidate.
    #[error("video {0} is already claimed")]
    ClaimConflict(VideoId),
    /// No eligible entry for this caller right now
    #[error("no review candidate available")]
    NoCandidate,
    /// Referenced video (or its pending entry) is missing
    #[error("video {0} not found in the review pool")]
    VideoNotFound(VideoId),
    /// The video is not in a state that accepts this operation
    #[error("video {video_id} is {status:?}, operation requires a pending review")]
    WrongState {
        /// The referenced video
        video_id: VideoId,
        /// Its current status
        status: VideoStatus,
    },
    /// Outcome submitted by someone who does not hold the claim
    #[error("reviewer {0} does not hold the claim")]
    NotClaimant(UserId),
    /// A reviewer can never be assigned their own video
    #[error("user {0} cannot review their own video")]
    SelfReview(UserId),
    /// Caller is not a registered user
    #[error("user {0} is not registered")]
    UnknownUser(UserId),
    /// Reviewer count exceeds the session format
    #[error("reviewer count {0} exceeds the session format")]
    InvalidShotCount(u32),
    /// Underlying store rejection
    #[error(transparent)]
    Store(#[from] StoreError),
}
