//! Claim/release state transitions on pending entries.
//!
//! This is the only place two concurrent actors can race. The store's
//! exclusive borrow makes each call atomic, and the claim itself is a
//! compare-and-set: the write happens only if the entry is still claimable
//! when read, and a lost race has no side effects.

use tracing::info;

use crate::store::ReviewStore;
use crate::types::{now_millis, ClaimState, CountryCode, UserId, VideoId};

use super::{ReviewConfig, ReviewError};

/// Performs the claim/release transitions on pending entries
#[derive(Clone, Debug, Default)]
pub struct ClaimCoordinator {
    config: ReviewConfig,
}

impl ClaimCoordinator {
    /// Create a coordinator
    #[must_use]
    pub const fn new(config: ReviewConfig) -> Self {
        Self { config }
    }

    /// Atomically claim a pending entry for `claimant`.
    ///
    /// Succeeds if the entry is unclaimed, or held by a claim older than
    /// the lease (stale-claim takeover). A failed claim has no side
    /// effects and is not retried here; the caller re-queries the locator
    /// for a different candidate.
    ///
    /// # Errors
    /// [`ReviewError::ClaimConflict`] if someone else holds a live claim;
    /// [`ReviewError::SelfReview`] if the claimant owns the video;
    /// [`ReviewError::VideoNotFound`] if no pending entry exists
    pub fn claim(
        &self,
        store: &mut ReviewStore,
        country: &CountryCode,
        video_id: &VideoId,
        owner: &UserId,
        claimant: &UserId,
    ) -> Result<(), ReviewError> {
        let lease = self.config.claim_lease_ms;
        let now = now_millis();

        let entry = store
            .pending_entry_mut(country, video_id)
            .ok_or(ReviewError::VideoNotFound(*video_id))?;

        if entry.owner != *owner {
            return Err(ReviewError::VideoNotFound(*video_id));
        }

        if entry.owner == *claimant {
            return Err(ReviewError::SelfReview(claimant.clone()));
        }

        if !entry.is_claimable(now, lease) {
            return Err(ReviewError::ClaimConflict(*video_id));
        }

        entry.claim = ClaimState::Claimed {
            claimant: claimant.clone(),
            claimed_at: now,
        };

        info!(video = %video_id, claimant = %claimant, "claim taken");
        Ok(())
    }

    /// Release a claim held by `caller`, returning the entry to the pool.
    ///
    /// Idempotent: safe to call after the claim expired, was taken over, or
    /// the entry resolved entirely. Returns `true` only when a claim held
    /// by `caller` was actually released.
    pub fn release(
        &self,
        store: &mut ReviewStore,
        country: &CountryCode,
        video_id: &VideoId,
        caller: &UserId,
    ) -> bool {
        let Some(entry) = store.pending_entry_mut(country, video_id) else {
            return false;
        };

        if entry.claim.claimant() != Some(caller) {
            return false;
        }

        entry.claim = ClaimState::Unclaimed;
        info!(video = %video_id, caller = %caller, "claim released");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (ReviewStore, UserId, VideoId, CountryCode) {
        let mut store = ReviewStore::new();
        let country = CountryCode::new("US");
        let alice = UserId::new("alice");
        store.register_user(alice.clone(), country.clone()).unwrap();
        for peer in ["bob", "carol"] {
            store
                .register_user(UserId::new(peer), country.clone())
                .unwrap();
        }

        let id = store.start_recording(&alice).unwrap();
        store.begin_upload(&id, &alice).unwrap();
        store
            .complete_upload(&id, &alice, 5, "blob://x".to_string())
            .unwrap();

        (store, alice, id, country)
    }

    #[test]
    fn test_claim_sets_claimant() {
        let (mut store, alice, id, country) = setup();
        let coordinator = ClaimCoordinator::default();
        let bob = UserId::new("bob");

        coordinator
            .claim(&mut store, &country, &id, &alice, &bob)
            .unwrap();

        let entry = store.pending_entry(&country, &id).unwrap();
        assert_eq!(entry.claim.claimant(), Some(&bob));
    }

    #[test]
    fn test_second_claim_conflicts() {
        let (mut store, alice, id, country) = setup();
        let coordinator = ClaimCoordinator::default();

        coordinator
            .claim(&mut store, &country, &id, &alice, &UserId::new("bob"))
            .unwrap();

        // Loser of the race: conflict, and the holder is unchanged
        let result =
            coordinator.claim(&mut store, &country, &id, &alice, &UserId::new("carol"));
        assert!(matches!(result, Err(ReviewError::ClaimConflict(_))));

        let entry = store.pending_entry(&country, &id).unwrap();
        assert_eq!(entry.claim.claimant(), Some(&UserId::new("bob")));
    }

    #[test]
    fn test_self_claim_rejected() {
        let (mut store, alice, id, country) = setup();
        let coordinator = ClaimCoordinator::default();

        assert!(matches!(
            coordinator.claim(&mut store, &country, &id, &alice, &alice),
            Err(ReviewError::SelfReview(_))
        ));
    }

    #[test]
    fn test_claim_release_claim() {
        let (mut store, alice, id, country) = setup();
        let coordinator = ClaimCoordinator::default();
        let bob = UserId::new("bob");
        let carol = UserId::new("carol");

        coordinator
            .claim(&mut store, &country, &id, &alice, &bob)
            .unwrap();
        assert!(coordinator.release(&mut store, &country, &id, &bob));

        // Back to unclaimed, and another reviewer can take it
        assert_eq!(
            store.pending_entry(&country, &id).unwrap().claim,
            ClaimState::Unclaimed
        );
        coordinator
            .claim(&mut store, &country, &id, &alice, &carol)
            .unwrap();
    }

    #[test]
    fn test_release_by_non_holder_is_noop() {
        let (mut store, alice, id, country) = setup();
        let coordinator = ClaimCoordinator::default();
        let bob = UserId::new("bob");

        coordinator
            .claim(&mut store, &country, &id, &alice, &bob)
            .unwrap();

        assert!(!coordinator.release(&mut store, &country, &id, &UserId::new("carol")));
        assert_eq!(
            store.pending_entry(&country, &id).unwrap().claim.claimant(),
            Some(&bob)
        );

        // And releasing something that never existed is also a no-op
        assert!(!coordinator.release(
            &mut store,
            &country,
            &VideoId::from_bytes([9u8; 32]),
            &bob
        ));
    }

    #[test]
    fn test_stale_claim_takeover() {
        let (mut store, alice, id, country) = setup();
        let coordinator = ClaimCoordinator::default();
        let bob = UserId::new("bob");
        let carol = UserId::new("carol");

        coordinator
            .claim(&mut store, &country, &id, &alice, &bob)
            .unwrap();

        // Age bob's claim past the lease
        store.pending_entry_mut(&country, &id).unwrap().claim = ClaimState::Claimed {
            claimant: bob.clone(),
            claimed_at: now_millis() - crate::DEFAULT_CLAIM_LEASE_MS - 1,
        };

        coordinator
            .claim(&mut store, &country, &id, &alice, &carol)
            .unwrap();
        assert_eq!(
            store.pending_entry(&country, &id).unwrap().claim.claimant(),
            Some(&carol)
        );

        // The original holder's release is now a harmless no-op
        assert!(!coordinator.release(&mut store, &country, &id, &bob));
    }

    #[test]
    fn test_claim_missing_entry() {
        let (mut store, alice, _, country) = setup();
        let coordinator = ClaimCoordinator::default();

        assert!(matches!(
            coordinator.claim(
                &mut store,
                &country,
                &VideoId::from_bytes([9u8; 32]),
                &alice,
                &UserId::new("bob")
            ),
            Err(ReviewError::VideoNotFound(_))
        ));
    }
}
