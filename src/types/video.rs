//! Videos - recorded shooting sessions moving through the review pipeline.
//!
//! A video is the unit of review: one fixed-format session of
//! [`crate::SESSION_SHOTS`] attempts, uploaded with a self-reported count
//! and verified by a peer before it counts toward the owner's statistics.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{now_millis, Timestamp, UserId};

/// A 32-byte video identifier, derived from the owner and creation time
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VideoId([u8; 32]);

impl Serialize for VideoId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for VideoId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl VideoId {
    /// The zero id (placeholder, never stored)
    pub const ZERO: Self = Self([0u8; 32]);

    /// Derive a fresh id for a video being created now.
    ///
    /// Hashes the owner, the creation timestamp, and a random nonce so that
    /// two sessions started by the same user in the same millisecond still
    /// get distinct ids.
    #[must_use]
    pub fn derive(owner: &UserId, created_at: Timestamp) -> Self {
        let nonce: [u8; 16] = rand::random();

        let mut hasher = blake3::Hasher::new();
        hasher.update(owner.as_str().as_bytes());
        hasher.update(&created_at.to_le_bytes());
        hasher.update(&nonce);
        Self(*hasher.finalize().as_bytes())
    }

    /// Create an id from raw bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    ///
    /// # Errors
    /// Returns error if hex string is invalid or wrong length
    pub fn from_hex(s: &str) -> Result<Self, VideoIdError> {
        let bytes = hex::decode(s).map_err(|e| VideoIdError::InvalidHex(e.to_string()))?;

        if bytes.len() != 32 {
            return Err(VideoIdError::WrongLength(bytes.len()));
        }

        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VideoId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Video id parsing errors
#[derive(Debug, thiserror::Error)]
pub enum VideoIdError {
    /// Not valid hex
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    /// Wrong byte length
    #[error("expected 32 bytes, got {0}")]
    WrongLength(usize),
}

/// Country code scoping a review pool (ISO 3166-1 alpha-2, uppercased)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CountryCode(String);

impl CountryCode {
    /// Create a country code, normalising to uppercase
    #[must_use]
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    /// Get the code as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CountryCode({})", self.0)
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a video.
///
/// Replaces the loose `status` string + `verified` flag pair with one tagged
/// state per video. Transitions are enforced by [`VideoStatus::can_transition`];
/// `Verified` and `Errored` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoStatus {
    /// Session is being recorded on the client
    Recording,
    /// Upload in progress
    Uploading,
    /// Completed upload, waiting in the country's review pool
    PendingReview,
    /// Reviewer disagreed with the reported count; in the dispute pool
    Disputed,
    /// Count confirmed (by peer agreement or arbitration); counts toward stats
    Verified,
    /// Upload failed, or the video was discarded by arbitration
    Errored,
}

impl VideoStatus {
    /// Whether a transition from `self` to `next` is allowed
    #[must_use]
    pub const fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Recording, Self::Uploading)
                | (Self::Uploading, Self::PendingReview | Self::Errored)
                | (Self::PendingReview, Self::Verified | Self::Disputed)
                | (Self::Disputed, Self::Verified | Self::Errored)
        )
    }

    /// Whether this status is terminal (the video is immutable)
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Verified | Self::Errored)
    }
}

/// A recorded shooting session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Video {
    /// Unique video id
    pub id: VideoId,
    /// The uploader
    pub owner: UserId,
    /// Country pool this video belongs to
    pub country: CountryCode,
    /// Current lifecycle status
    pub status: VideoStatus,
    /// Shot count; self-reported at upload, overwritten by arbitration
    pub reported_shots: Option<u32>,
    /// Blob-store URL, set when the upload completes
    pub url: Option<String>,
    /// When the session was started
    pub created_at: Timestamp,
}

impl Video {
    /// Create a new video in `Recording` state
    #[must_use]
    pub fn new(owner: UserId, country: CountryCode) -> Self {
        let created_at = now_millis();

        Self {
            id: VideoId::derive(&owner, created_at),
            owner,
            country,
            status: VideoStatus::Recording,
            reported_shots: None,
            url: None,
            created_at,
        }
    }

    /// Whether the count has been finalised (peer agreement or arbitration)
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        matches!(self.status, VideoStatus::Verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_video() -> Video {
        Video::new(UserId::new("user-1"), CountryCode::new("de"))
    }

    #[test]
    fn test_video_id_unique() {
        let owner = UserId::new("user-1");
        let a = VideoId::derive(&owner, 1_000);
        let b = VideoId::derive(&owner, 1_000);

        // Same owner and timestamp, still distinct (nonce)
        assert_ne!(a, b);
    }

    #[test]
    fn test_video_id_hex_round_trip() {
        let id = VideoId::derive(&UserId::new("u"), 42);
        let parsed = VideoId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, parsed);

        assert!(VideoId::from_hex("abcd").is_err());
        assert!(VideoId::from_hex("zz").is_err());
    }

    #[test]
    fn test_country_code_normalised() {
        assert_eq!(CountryCode::new(" de ").as_str(), "DE");
        assert_eq!(CountryCode::new("DE"), CountryCode::new("de"));
    }

    #[test]
    fn test_transition_table() {
        use VideoStatus::*;

        assert!(Recording.can_transition(Uploading));
        assert!(Uploading.can_transition(PendingReview));
        assert!(Uploading.can_transition(Errored));
        assert!(PendingReview.can_transition(Verified));
        assert!(PendingReview.can_transition(Disputed));
        assert!(Disputed.can_transition(Verified));
        assert!(Disputed.can_transition(Errored));

        // Terminal states admit nothing
        for next in [Recording, Uploading, PendingReview, Disputed, Verified, Errored] {
            assert!(!Verified.can_transition(next));
            assert!(!Errored.can_transition(next));
        }

        // No skipping the pipeline
        assert!(!Recording.can_transition(PendingReview));
        assert!(!Recording.can_transition(Verified));
        assert!(!Uploading.can_transition(Verified));
        assert!(!PendingReview.can_transition(Errored));
    }

    #[test]
    fn test_new_video_state() {
        let video = test_video();

        assert_eq!(video.status, VideoStatus::Recording);
        assert!(video.reported_shots.is_none());
        assert!(!video.is_verified());
    }
}
