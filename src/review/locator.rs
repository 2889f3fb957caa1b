//! Candidate lookup over a country's pending pool.

use crate::store::ReviewStore;
use crate::types::{now_millis, CountryCode, PendingReviewEntry, UserId};

use super::{ReviewConfig, ReviewError};

/// Finds the next video a user should review.
///
/// Pure read: claiming is a separate step, and a located candidate can
/// still be lost to a concurrent claimant.
#[derive(Clone, Debug, Default)]
pub struct CandidateLocator {
    config: ReviewConfig,
}

impl CandidateLocator {
    /// Create a locator
    #[must_use]
    pub const fn new(config: ReviewConfig) -> Self {
        Self { config }
    }

    /// Find an eligible pending entry for `requesting_user` in `country`.
    ///
    /// Hard constraints: never the caller's own video, never an entry with
    /// a live claim. Claims older than the configured lease are treated as
    /// unclaimed. Oldest entry first, to bound starvation.
    ///
    /// # Errors
    /// [`ReviewError::NoCandidate`] when the caller has already satisfied
    /// their review gate or no eligible entry exists;
    /// [`ReviewError::UnknownUser`] for unregistered callers
    pub fn find_candidate(
        &self,
        store: &ReviewStore,
        country: &CountryCode,
        requesting_user: &UserId,
    ) -> Result<PendingReviewEntry, ReviewError> {
        let user = store
            .user(requesting_user)
            .ok_or_else(|| ReviewError::UnknownUser(requesting_user.clone()))?;

        // One-time gate: a user who has reviewed is permanently exempt
        if user.has_reviewed {
            return Err(ReviewError::NoCandidate);
        }

        let now = now_millis();

        store
            .pending_pool(country)
            .into_iter()
            .filter(|entry| entry.owner != *requesting_user)
            .filter(|entry| entry.is_claimable(now, self.config.claim_lease_ms))
            .min_by_key(|entry| (entry.enqueued_at, entry.video_id))
            .cloned()
            .ok_or(ReviewError::NoCandidate)
    }
}
