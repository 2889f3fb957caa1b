//! Outcome recording: agreement verifies, disagreement disputes.

use tracing::{info, warn};

use crate::stats::StatsAggregator;
use crate::store::ReviewStore;
use crate::types::{
    now_millis, DisputeEntry, ReviewerVerdict, UserId, VideoId, VideoStatus,
};
use crate::SESSION_SHOTS;

use super::ReviewError;

/// A reviewer's submitted verdict for a claimed video
#[derive(Clone, Debug)]
pub struct OutcomeSubmission {
    /// The reviewed video
    pub video_id: VideoId,
    /// The video's owner
    pub owner: UserId,
    /// The submitting reviewer
    pub reviewer: UserId,
    /// The verdict: an independent count, or a rule-violation assertion
    pub verdict: ReviewerVerdict,
    /// Free-form reason (expected for rule violations)
    pub reason: Option<String>,
}

/// How a submitted outcome resolved
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeResult {
    /// Counts agreed; the video is verified
    Verified,
    /// Counts disagreed (or a violation was asserted); dispute raised
    Disputed,
}

/// Records review outcomes and routes disagreements to the dispute pool
#[derive(Clone, Debug, Default)]
pub struct OutcomeProcessor {
    stats: StatsAggregator,
}

impl OutcomeProcessor {
    /// Create a processor
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stats: StatsAggregator::new(),
        }
    }

    /// Record a reviewer's verdict.
    ///
    /// Preconditions, checked before any write: the video exists, belongs
    /// to `owner`, is still `PendingReview`, and its pending entry is
    /// currently claimed by `reviewer` (claim-then-outcome ordering). The
    /// status transition and pool moves then happen in one critical
    /// section, so a video is never simultaneously verified and disputed.
    ///
    /// Either way the act of reviewing satisfies the reviewer's one-time
    /// gate.
    ///
    /// # Errors
    /// See [`ReviewError`]; a failed submission leaves no partial state
    pub fn submit_outcome(
        &self,
        store: &mut ReviewStore,
        submission: OutcomeSubmission,
    ) -> Result<OutcomeResult, ReviewError> {
        let OutcomeSubmission {
            video_id,
            owner,
            reviewer,
            verdict,
            reason,
        } = submission;

        if let ReviewerVerdict::Count(n) = verdict {
            if n > SESSION_SHOTS {
                return Err(ReviewError::InvalidShotCount(n));
            }
        }

        if store.user(&reviewer).is_none() {
            return Err(ReviewError::UnknownUser(reviewer));
        }

        let video = store
            .video(&video_id)
            .ok_or(ReviewError::VideoNotFound(video_id))?;

        if video.owner != owner {
            return Err(ReviewError::VideoNotFound(video_id));
        }

        // A late submission after arbitration started (or after another
        // resolution) is rejected here rather than racing the writes.
        if video.status != VideoStatus::PendingReview {
            return Err(ReviewError::WrongState {
                video_id,
                status: video.status,
            });
        }

        let reported = video
            .reported_shots
            .ok_or(ReviewError::WrongState {
                video_id,
                status: video.status,
            })?;
        let country = video.country.clone();

        let entry = store
            .pending_entry(&country, &video_id)
            .ok_or(ReviewError::VideoNotFound(video_id))?;

        if entry.claim.claimant() != Some(&reviewer) {
            return Err(ReviewError::NotClaimant(reviewer));
        }

        // All preconditions hold; mutate.
        store.take_pending(&country, &video_id)?;

        let result = if verdict.count() == Some(reported) {
            store.transition_video(&video_id, VideoStatus::Verified)?;
            info!(video = %video_id, reviewer = %reviewer, shots = reported, "review agreed, video verified");

            // Best-effort: a stale statistic must not fail the review
            if let Err(e) = self.stats.recompute(store, &owner) {
                warn!(user = %owner, error = %e, "stats recompute failed");
            }

            OutcomeResult::Verified
        } else {
            store.transition_video(&video_id, VideoStatus::Disputed)?;
            store.insert_dispute(DisputeEntry {
                video_id,
                owner: owner.clone(),
                reviewer: reviewer.clone(),
                country,
                reported_shots: reported,
                reviewer_verdict: verdict,
                reason,
                created_at: now_millis(),
            })?;
            info!(video = %video_id, reviewer = %reviewer, "review disagreed, dispute raised");

            OutcomeResult::Disputed
        };

        store.user_mut(&reviewer)?.has_reviewed = true;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::{ClaimCoordinator, ReviewConfig};
    use crate::types::CountryCode;

    fn setup_claimed(
        shots: u32,
    ) -> (ReviewStore, UserId, UserId, VideoId, CountryCode) {
        let mut store = ReviewStore::new();
        let country = CountryCode::new("US");
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        store.register_user(alice.clone(), country.clone()).unwrap();
        store.register_user(bob.clone(), country.clone()).unwrap();

        let id = store.start_recording(&alice).unwrap();
        store.begin_upload(&id, &alice).unwrap();
        store
            .complete_upload(&id, &alice, shots, "blob://x".to_string())
            .unwrap();

        ClaimCoordinator::new(ReviewConfig::default())
            .claim(&mut store, &country, &id, &alice, &bob)
            .unwrap();

        (store, alice, bob, id, country)
    }

    fn submission(
        video_id: VideoId,
        owner: &UserId,
        reviewer: &UserId,
        verdict: ReviewerVerdict,
    ) -> OutcomeSubmission {
        OutcomeSubmission {
            video_id,
            owner: owner.clone(),
            reviewer: reviewer.clone(),
            verdict,
            reason: None,
        }
    }

    #[test]
    fn test_agreement_verifies() {
        let (mut store, alice, bob, id, country) = setup_claimed(7);
        let processor = OutcomeProcessor::new();

        let result = processor
            .submit_outcome(
                &mut store,
                submission(id, &alice, &bob, ReviewerVerdict::Count(7)),
            )
            .unwrap();

        assert_eq!(result, OutcomeResult::Verified);
        assert_eq!(store.video(&id).unwrap().status, VideoStatus::Verified);
        assert!(store.pending_entry(&country, &id).is_none());
        assert!(store.dispute(&id).is_none());

        // Reviewer's gate satisfied; owner's untouched
        assert!(store.user(&bob).unwrap().has_reviewed);
        assert!(!store.user(&alice).unwrap().has_reviewed);

        // Owner's rolling stats picked up the verified session
        let last100 = store.user(&alice).unwrap().stats.last100;
        assert_eq!(last100.sessions_counted, 1);
        assert!((last100.percentage - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_count_mismatch_disputes() {
        let (mut store, alice, bob, id, country) = setup_claimed(7);
        let processor = OutcomeProcessor::new();

        let result = processor
            .submit_outcome(
                &mut store,
                submission(id, &alice, &bob, ReviewerVerdict::Count(5)),
            )
            .unwrap();

        assert_eq!(result, OutcomeResult::Disputed);
        assert_eq!(store.video(&id).unwrap().status, VideoStatus::Disputed);
        assert!(store.pending_entry(&country, &id).is_none());

        let dispute = store.dispute(&id).expect("dispute raised");
        assert_eq!(dispute.reported_shots, 7);
        assert_eq!(dispute.reviewer_verdict, ReviewerVerdict::Count(5));
        assert_eq!(dispute.reviewer, bob);

        // Reviewing (even into a dispute) satisfies the gate
        assert!(store.user(&bob).unwrap().has_reviewed);
    }

    #[test]
    fn test_rule_violation_disputes() {
        let (mut store, alice, bob, id, _) = setup_claimed(7);
        let processor = OutcomeProcessor::new();

        let mut sub = submission(id, &alice, &bob, ReviewerVerdict::RuleViolation);
        sub.reason = Some("ball below the line".to_string());

        let result = processor.submit_outcome(&mut store, sub).unwrap();

        assert_eq!(result, OutcomeResult::Disputed);
        let dispute = store.dispute(&id).unwrap();
        assert_eq!(dispute.reviewer_verdict, ReviewerVerdict::RuleViolation);
        assert_eq!(dispute.reason.as_deref(), Some("ball below the line"));
    }

    #[test]
    fn test_outcome_requires_claim() {
        let (mut store, alice, _, id, country) = setup_claimed(7);
        let processor = OutcomeProcessor::new();
        let carol = UserId::new("carol");
        store.register_user(carol.clone(), country).unwrap();

        // Carol never claimed the video
        assert!(matches!(
            processor.submit_outcome(
                &mut store,
                submission(id, &alice, &carol, ReviewerVerdict::Count(7)),
            ),
            Err(ReviewError::NotClaimant(_))
        ));
    }

    #[test]
    fn test_double_submission_rejected() {
        let (mut store, alice, bob, id, _) = setup_claimed(7);
        let processor = OutcomeProcessor::new();

        processor
            .submit_outcome(
                &mut store,
                submission(id, &alice, &bob, ReviewerVerdict::Count(7)),
            )
            .unwrap();

        // The video is resolved; a late duplicate cannot double-apply
        assert!(matches!(
            processor.submit_outcome(
                &mut store,
                submission(id, &alice, &bob, ReviewerVerdict::Count(5)),
            ),
            Err(ReviewError::WrongState { .. })
        ));
        assert!(store.dispute(&id).is_none());
    }

    #[test]
    fn test_reviewer_count_bounded() {
        let (mut store, alice, bob, id, _) = setup_claimed(7);
        let processor = OutcomeProcessor::new();

        assert!(matches!(
            processor.submit_outcome(
                &mut store,
                submission(id, &alice, &bob, ReviewerVerdict::Count(SESSION_SHOTS + 1)),
            ),
            Err(ReviewError::InvalidShotCount(_))
        ));
    }

    #[test]
    fn test_unknown_video() {
        let (mut store, alice, bob, _, _) = setup_claimed(7);
        let processor = OutcomeProcessor::new();

        assert!(matches!(
            processor.submit_outcome(
                &mut store,
                submission(
                    VideoId::from_bytes([9u8; 32]),
                    &alice,
                    &bob,
                    ReviewerVerdict::Count(7)
                ),
            ),
            Err(ReviewError::VideoNotFound(_))
        ));
    }
}
