//! Penalty ledger: fault counters updated only by arbitration outcomes.

use serde::{Deserialize, Serialize};

use crate::store::ReviewStore;
use crate::types::UserId;

use super::StatsError;

/// Who an arbitration ruling found at fault
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fault {
    /// Admin confirmed agreement; nobody penalized
    None,
    /// The uploader's reported count was wrong
    Uploader,
    /// The reviewer's count was wrong
    Reviewer,
    /// Both deviated equally from the authoritative count
    Both,
}

impl Fault {
    /// Whether the uploader is penalized
    #[must_use]
    pub const fn penalizes_uploader(self) -> bool {
        matches!(self, Self::Uploader | Self::Both)
    }

    /// Whether the reviewer is penalized
    #[must_use]
    pub const fn penalizes_reviewer(self) -> bool {
        matches!(self, Self::Reviewer | Self::Both)
    }
}

/// The only writer of the `incorrect_uploads` / `incorrect_reviews`
/// counters. Both counters only ever increment.
#[derive(Clone, Copy, Debug, Default)]
pub struct PenaltyLedger;

impl PenaltyLedger {
    /// Create a ledger
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Apply an arbitration fault attribution
    ///
    /// # Errors
    /// Returns error if a penalized party is not registered
    pub fn apply(
        &self,
        store: &mut ReviewStore,
        owner: &UserId,
        reviewer: &UserId,
        fault: Fault,
    ) -> Result<(), StatsError> {
        if fault.penalizes_uploader() {
            store
                .user_mut(owner)
                .map_err(|_| StatsError::UserNotFound(owner.clone()))?
                .incorrect_uploads += 1;
        }

        if fault.penalizes_reviewer() {
            store
                .user_mut(reviewer)
                .map_err(|_| StatsError::UserNotFound(reviewer.clone()))?
                .incorrect_reviews += 1;
        }

        Ok(())
    }
}
