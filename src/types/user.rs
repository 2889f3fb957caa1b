//! User records: review gate, penalty counters, and derived statistics.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::video::CountryCode;

/// A stable user identity, issued by the (external) auth collaborator
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Wrap an auth-issued identity string
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identity as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rolling statistic over the most recent verified sessions
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Last100Stats {
    /// Hit percentage over the window (0.0 - 100.0)
    pub percentage: f64,
    /// How many verified sessions the window actually covered
    pub sessions_counted: u32,
}

/// All-time counters, adjusted retroactively by arbitration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllTimeStats {
    /// Total shots made across all counted sessions
    pub shots: u64,
    /// Total shots attempted across all counted sessions
    pub attempts: u64,
}

/// Derived statistics for a user
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    /// Rolling last-100-shots window
    pub last100: Last100Stats,
    /// All-time totals
    pub all_time: AllTimeStats,
}

/// Per-user review state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stable identity
    pub id: UserId,
    /// Home country (selects the review pool this user draws from)
    pub country: CountryCode,
    /// One-time review gate: once true, the user is permanently exempt from
    /// being asked to review again
    pub has_reviewed: bool,
    /// Times this user's self-reported count was ruled wrong
    pub incorrect_uploads: u32,
    /// Times this user's review count was ruled wrong
    pub incorrect_reviews: u32,
    /// Derived statistics
    pub stats: UserStats,
}

impl UserRecord {
    /// Create a fresh record for a newly registered user
    #[must_use]
    pub const fn new(id: UserId, country: CountryCode) -> Self {
        Self {
            id,
            country,
            has_reviewed: false,
            incorrect_uploads: 0,
            incorrect_reviews: 0,
            stats: UserStats {
                last100: Last100Stats {
                    percentage: 0.0,
                    sessions_counted: 0,
                },
                all_time: AllTimeStats {
                    shots: 0,
                    attempts: 0,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_record() {
        let user = UserRecord::new(UserId::new("user-1"), CountryCode::new("US"));

        assert!(!user.has_reviewed);
        assert_eq!(user.incorrect_uploads, 0);
        assert_eq!(user.incorrect_reviews, 0);
        assert_eq!(user.stats.all_time.attempts, 0);
        assert_eq!(user.stats.last100.sessions_counted, 0);
    }
}
