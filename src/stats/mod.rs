//! Derived statistics: the rolling last-100-shots window and all-time
//! counters.
//!
//! Recomputation is best-effort: callers log a failure and carry on. A
//! stale statistic must never block a review or an arbitration from
//! completing.

mod penalty;

pub use penalty::{Fault, PenaltyLedger};

use crate::store::ReviewStore;
use crate::types::{Last100Stats, UserId};
use crate::{LAST100_WINDOW, SESSION_SHOTS};

/// Recomputes rolling statistics and applies retroactive all-time
/// adjustments
#[derive(Clone, Copy, Debug, Default)]
pub struct StatsAggregator;

impl StatsAggregator {
    /// Create an aggregator
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Recompute a user's last-100-shots window from their most recent
    /// [`LAST100_WINDOW`] verified sessions.
    ///
    /// Idempotent: with no intervening video changes, a second call produces
    /// the same result.
    ///
    /// # Errors
    /// Returns error if the user is not registered
    pub fn recompute(
        &self,
        store: &mut ReviewStore,
        user: &UserId,
    ) -> Result<Last100Stats, StatsError> {
        let mut sessions: Vec<(i64, u32)> = store
            .videos_of(user)
            .into_iter()
            .filter(|v| v.is_verified())
            .map(|v| (v.created_at, v.reported_shots.unwrap_or(0)))
            .collect();

        // Most recent first
        sessions.sort_by_key(|(created_at, _)| std::cmp::Reverse(*created_at));
        sessions.truncate(LAST100_WINDOW);

        let counted = sessions.len() as u32;
        let shots: u32 = sessions.iter().map(|(_, s)| *s).sum();

        let percentage = if counted == 0 {
            0.0
        } else {
            f64::from(shots) * 100.0 / f64::from(SESSION_SHOTS * counted)
        };

        let last100 = Last100Stats {
            percentage,
            sessions_counted: counted,
        };

        let record = store
            .user_mut(user)
            .map_err(|_| StatsError::UserNotFound(user.clone()))?;
        record.stats.last100 = last100;

        Ok(last100)
    }

    /// Apply a retroactive shot-count correction to the all-time counters.
    ///
    /// Attempts are untouched: the session still happened, only its count
    /// changed.
    ///
    /// # Errors
    /// Returns error if the user is not registered
    pub fn adjust_all_time(
        &self,
        store: &mut ReviewStore,
        user: &UserId,
        old_shots: u32,
        new_shots: u32,
    ) -> Result<(), StatsError> {
        let record = store
            .user_mut(user)
            .map_err(|_| StatsError::UserNotFound(user.clone()))?;

        let all_time = &mut record.stats.all_time;
        all_time.shots = all_time
            .shots
            .saturating_sub(u64::from(old_shots))
            .saturating_add(u64::from(new_shots));

        Ok(())
    }

    /// Remove a discarded video's whole contribution: its shots and its
    /// attempts
    ///
    /// # Errors
    /// Returns error if the user is not registered
    pub fn discard_contribution(
        &self,
        store: &mut ReviewStore,
        user: &UserId,
        reported_shots: u32,
    ) -> Result<(), StatsError> {
        let record = store
            .user_mut(user)
            .map_err(|_| StatsError::UserNotFound(user.clone()))?;

        let all_time = &mut record.stats.all_time;
        all_time.shots = all_time.shots.saturating_sub(u64::from(reported_shots));
        all_time.attempts = all_time.attempts.saturating_sub(u64::from(SESSION_SHOTS));

        Ok(())
    }
}

/// Statistics recalculation errors
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    /// User not found
    #[error("user {0} not found")]
    UserNotFound(UserId),
}
