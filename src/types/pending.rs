//! Pending review entries - the per-country pool reviewers draw from.

use serde::{Deserialize, Serialize};

use super::{CountryCode, Timestamp, UserId, VideoId};

/// Claim state of a pending entry.
///
/// A claimed entry always carries its claimant and claim time, so the
/// "claimed implies non-null claimant" invariant holds by construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimState {
    /// Available to any eligible reviewer
    Unclaimed,
    /// Exclusively held by one reviewer
    Claimed {
        /// The reviewer holding the claim
        claimant: UserId,
        /// When the claim was taken
        claimed_at: Timestamp,
    },
}

impl ClaimState {
    /// The claimant, if any
    #[must_use]
    pub const fn claimant(&self) -> Option<&UserId> {
        match self {
            Self::Unclaimed => None,
            Self::Claimed { claimant, .. } => Some(claimant),
        }
    }

    /// Whether the claim is older than `lease_ms` at time `now`.
    ///
    /// Unclaimed entries are never expired.
    #[must_use]
    pub const fn is_expired(&self, now: Timestamp, lease_ms: i64) -> bool {
        match self {
            Self::Unclaimed => false,
            Self::Claimed { claimed_at, .. } => now - *claimed_at > lease_ms,
        }
    }
}

/// One entry in a country's pending review pool.
///
/// Exactly one entry exists per completed, unverified video. The entry is
/// destroyed when the review resolves - either verified on agreement, or
/// handed to the dispute pool on disagreement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingReviewEntry {
    /// The video awaiting review
    pub video_id: VideoId,
    /// The video's owner (never eligible to review it)
    pub owner: UserId,
    /// Country pool this entry lives in
    pub country: CountryCode,
    /// When the entry joined the pool (oldest-first candidate order)
    pub enqueued_at: Timestamp,
    /// Current claim state
    pub claim: ClaimState,
}

impl PendingReviewEntry {
    /// Create an unclaimed entry for a freshly completed video
    #[must_use]
    pub const fn new(
        video_id: VideoId,
        owner: UserId,
        country: CountryCode,
        enqueued_at: Timestamp,
    ) -> Self {
        Self {
            video_id,
            owner,
            country,
            enqueued_at,
            claim: ClaimState::Unclaimed,
        }
    }

    /// Whether the entry is claimable at `now` under the given lease:
    /// unclaimed, or held by a claim that has expired
    #[must_use]
    pub const fn is_claimable(&self, now: Timestamp, lease_ms: i64) -> bool {
        matches!(self.claim, ClaimState::Unclaimed) || self.claim.is_expired(now, lease_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> PendingReviewEntry {
        PendingReviewEntry::new(
            VideoId::from_bytes([7u8; 32]),
            UserId::new("owner"),
            CountryCode::new("US"),
            1_000,
        )
    }

    #[test]
    fn test_unclaimed_is_claimable() {
        let e = entry();
        assert!(e.is_claimable(1_000, 60_000));
        assert!(e.claim.claimant().is_none());
    }

    #[test]
    fn test_claim_expiry() {
        let mut e = entry();
        e.claim = ClaimState::Claimed {
            claimant: UserId::new("reviewer"),
            claimed_at: 1_000,
        };

        // Within the lease: held
        assert!(!e.is_claimable(30_000, 60_000));
        // Past the lease: stale, claimable again
        assert!(e.is_claimable(61_001, 60_000));
    }
}
