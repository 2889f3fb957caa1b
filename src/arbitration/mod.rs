//! Admin arbitration of disputed videos.
//!
//! A single trusted operator works the global dispute pool, one dispute at
//! a time. The engine needs no internal locking, but every write is still
//! guarded by a pre-state check so a late-arriving review outcome (or a
//! double-submitted ruling) is rejected instead of double-applying
//! penalties.

use tracing::{info, warn};

use crate::stats::{Fault, PenaltyLedger, StatsAggregator};
use crate::store::{AuditEntry, ReviewStore, StoreError};
use crate::types::{now_millis, ReviewerVerdict, UserId, VideoId, VideoStatus};
use crate::SESSION_SHOTS;

/// The admin's authoritative ruling on a dispute
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRuling {
    /// Final authoritative shot count
    Count(u32),
    /// The session broke the rules; it does not count at all
    Discard,
}

/// What an arbitration did
#[derive(Clone, Debug)]
pub struct ArbitrationResult {
    /// The arbitrated video
    pub video_id: VideoId,
    /// The ruling that was applied
    pub ruling: AdminRuling,
    /// Who was found at fault
    pub fault: Fault,
    /// The video's final count (`None` on discard)
    pub final_shots: Option<u32>,
}

/// Attribute fault between uploader and reviewer, given the uploader's
/// count `reported`, the reviewer's verdict, and the admin's authoritative
/// count `admin`.
///
/// The party strictly further from the admin's count is at fault; equal
/// deviations penalize both. A reviewer whose rule-violation assertion is
/// overruled by a count is treated as having deviated: alone if the admin
/// confirms the uploader, together with the uploader otherwise.
#[must_use]
pub fn attribute_fault(reported: u32, verdict: ReviewerVerdict, admin: u32) -> Fault {
    match verdict {
        ReviewerVerdict::Count(reviewed) => {
            if admin == reported && admin == reviewed {
                Fault::None
            } else if admin == reported {
                Fault::Reviewer
            } else if admin == reviewed {
                Fault::Uploader
            } else {
                let uploader_dev = admin.abs_diff(reported);
                let reviewer_dev = admin.abs_diff(reviewed);
                match uploader_dev.cmp(&reviewer_dev) {
                    std::cmp::Ordering::Greater => Fault::Uploader,
                    std::cmp::Ordering::Less => Fault::Reviewer,
                    std::cmp::Ordering::Equal => Fault::Both,
                }
            }
        }
        ReviewerVerdict::RuleViolation => {
            if admin == reported {
                Fault::Reviewer
            } else {
                Fault::Both
            }
        }
    }
}

/// Applies admin rulings: finalizes the video, attributes fault, updates
/// the penalty ledger, and triggers stats recomputation
#[derive(Clone, Copy, Debug, Default)]
pub struct ArbitrationEngine {
    stats: StatsAggregator,
    ledger: PenaltyLedger,
}

impl ArbitrationEngine {
    /// Create an engine
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stats: StatsAggregator::new(),
            ledger: PenaltyLedger::new(),
        }
    }

    /// Arbitrate one dispute.
    ///
    /// Preconditions: a dispute entry exists for `video_id` and the video
    /// is still `Disputed`. Anything else is an
    /// [`ArbitrationError::Inconsistent`]: rejected with no side effects,
    /// so penalties are never applied twice.
    ///
    /// Stats recomputation is best-effort and never fails the arbitration.
    ///
    /// # Errors
    /// See [`ArbitrationError`]
    pub fn arbitrate(
        &self,
        store: &mut ReviewStore,
        video_id: &VideoId,
        ruling: AdminRuling,
    ) -> Result<ArbitrationResult, ArbitrationError> {
        if let AdminRuling::Count(n) = ruling {
            if n > SESSION_SHOTS {
                return Err(ArbitrationError::InvalidShotCount(n));
            }
        }

        let Some(dispute) = store.dispute(video_id) else {
            return Err(ArbitrationError::DisputeNotFound(*video_id));
        };
        let dispute = dispute.clone();

        let status = store
            .video(video_id)
            .map(|v| v.status)
            .ok_or(ArbitrationError::Inconsistent(*video_id))?;

        if status != VideoStatus::Disputed {
            warn!(video = %video_id, status = ?status, "dispute references a non-disputed video");
            return Err(ArbitrationError::Inconsistent(*video_id));
        }

        // Preconditions hold; consume the dispute and finalize.
        store.take_dispute(video_id)?;

        let result = match ruling {
            AdminRuling::Discard => {
                store.transition_video(video_id, VideoStatus::Errored)?;
                store.record_audit(AuditEntry {
                    video_id: *video_id,
                    owner: dispute.owner.clone(),
                    reason: dispute.reason.clone(),
                    recorded_at: now_millis(),
                });

                if let Err(e) =
                    self.stats
                        .discard_contribution(store, &dispute.owner, dispute.reported_shots)
                {
                    warn!(user = %dispute.owner, error = %e, "discard adjustment failed");
                }

                info!(video = %video_id, owner = %dispute.owner, "dispute resolved: discarded");

                ArbitrationResult {
                    video_id: *video_id,
                    ruling,
                    fault: Fault::None,
                    final_shots: None,
                }
            }
            AdminRuling::Count(admin_shots) => {
                store.transition_video(video_id, VideoStatus::Verified)?;
                store.set_reported_shots(video_id, admin_shots)?;

                if let Err(e) = self.stats.adjust_all_time(
                    store,
                    &dispute.owner,
                    dispute.reported_shots,
                    admin_shots,
                ) {
                    warn!(user = %dispute.owner, error = %e, "all-time adjustment failed");
                }

                let fault =
                    attribute_fault(dispute.reported_shots, dispute.reviewer_verdict, admin_shots);

                if let Err(e) =
                    self.ledger
                        .apply(store, &dispute.owner, &dispute.reviewer, fault)
                {
                    warn!(video = %video_id, error = %e, "penalty application failed");
                }

                info!(
                    video = %video_id,
                    shots = admin_shots,
                    fault = ?fault,
                    "dispute resolved: count finalized"
                );

                ArbitrationResult {
                    video_id: *video_id,
                    ruling,
                    fault,
                    final_shots: Some(admin_shots),
                }
            }
        };

        self.recompute_after(store, &dispute.owner);
        if result.fault.penalizes_reviewer() {
            self.recompute_after(store, &dispute.reviewer);
        }

        Ok(result)
    }

    fn recompute_after(&self, store: &mut ReviewStore, user: &UserId) {
        if let Err(e) = self.stats.recompute(store, user) {
            warn!(user = %user, error = %e, "stats recompute failed");
        }
    }
}

/// Arbitration errors
#[derive(Debug, thiserror::Error)]
pub enum ArbitrationError {
    /// No open dispute for this video
    #[error("no open dispute for video {0}")]
    DisputeNotFound(VideoId),
    /// The dispute's video is no longer in a disputable state
    #[error("video {0} is not in a disputable state")]
    Inconsistent(VideoId),
    /// Admin count exceeds the session format
    #[error("admin count {0} exceeds the session format")]
    InvalidShotCount(u32),
    /// Underlying store rejection
    #[error(transparent)]
    Store(#[from] StoreError),
}
