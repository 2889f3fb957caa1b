//! Review state management.
//!
//! [`ReviewStore`] is the single shared mutable resource of the protocol:
//! user records, videos, the per-country pending pools, and the global
//! dispute pool, all as indexed maps keyed for point lookups. Every write
//! goes through a `&mut self` method that verifies the expected pre-state
//! and fails with a typed error otherwise, so a video can never end up in
//! two pools, or in a terminal state twice.

mod persist;

pub use persist::{PersistError, Persistence};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{
    now_millis, CountryCode, DisputeEntry, PendingReviewEntry, Timestamp, UserId, UserRecord,
    Video, VideoId, VideoStatus,
};
use crate::SESSION_SHOTS;

/// A rule-violation record, written when arbitration discards a video
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEntry {
    /// The discarded video
    pub video_id: VideoId,
    /// The uploader held responsible
    pub owner: UserId,
    /// The stated reason, if any
    pub reason: Option<String>,
    /// When the entry was recorded
    pub recorded_at: Timestamp,
}

/// The shared review state
#[derive(Clone, Debug, Default)]
pub struct ReviewStore {
    /// User records by id
    users: HashMap<UserId, UserRecord>,
    /// Videos by id
    videos: HashMap<VideoId, Video>,
    /// Video ids by owner (insertion order)
    videos_by_owner: HashMap<UserId, Vec<VideoId>>,
    /// Pending review pools, one per country
    pending: HashMap<CountryCode, HashMap<VideoId, PendingReviewEntry>>,
    /// Global dispute pool
    disputes: HashMap<VideoId, DisputeEntry>,
    /// Append-only rule-violation log
    audit: Vec<AuditEntry>,
}

impl ReviewStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- users ---

    /// Register a new user
    ///
    /// # Errors
    /// Returns error if the id is already registered
    pub fn register_user(
        &mut self,
        id: UserId,
        country: CountryCode,
    ) -> Result<&UserRecord, StoreError> {
        if self.users.contains_key(&id) {
            return Err(StoreError::DuplicateUser(id));
        }

        let record = UserRecord::new(id.clone(), country);
        Ok(self.users.entry(id).or_insert(record))
    }

    /// Get a user record
    #[must_use]
    pub fn user(&self, id: &UserId) -> Option<&UserRecord> {
        self.users.get(id)
    }

    /// Get a mutable user record, or `UserNotFound`
    pub(crate) fn user_mut(&mut self, id: &UserId) -> Result<&mut UserRecord, StoreError> {
        self.users
            .get_mut(id)
            .ok_or_else(|| StoreError::UserNotFound(id.clone()))
    }

    /// Iterate all user records
    pub fn users(&self) -> impl Iterator<Item = &UserRecord> {
        self.users.values()
    }

    // --- upload lifecycle ---

    /// Start a recording session for `owner`, creating a video in
    /// `Recording` state in the owner's home country
    ///
    /// # Errors
    /// Returns error if the owner is not registered
    pub fn start_recording(&mut self, owner: &UserId) -> Result<VideoId, StoreError> {
        let country = self
            .users
            .get(owner)
            .ok_or_else(|| StoreError::UserNotFound(owner.clone()))?
            .country
            .clone();

        let video = Video::new(owner.clone(), country);
        let id = video.id;

        self.videos.insert(id, video);
        self.videos_by_owner
            .entry(owner.clone())
            .or_default()
            .push(id);

        Ok(id)
    }

    /// Mark a video as uploading
    ///
    /// # Errors
    /// Returns error if the video is missing, owned by someone else, or not
    /// in `Recording` state
    pub fn begin_upload(&mut self, id: &VideoId, owner: &UserId) -> Result<(), StoreError> {
        self.owned_video_mut(id, owner)?;
        self.transition_video(id, VideoStatus::Uploading)
    }

    /// Complete an upload: record the self-reported count and blob URL,
    /// credit the owner's all-time counters, and enqueue the video in its
    /// country's pending review pool.
    ///
    /// # Errors
    /// Returns error if the video is missing, owned by someone else, not in
    /// `Uploading` state, or the reported count exceeds the session format
    pub fn complete_upload(
        &mut self,
        id: &VideoId,
        owner: &UserId,
        reported_shots: u32,
        url: String,
    ) -> Result<&PendingReviewEntry, StoreError> {
        if reported_shots > SESSION_SHOTS {
            return Err(StoreError::InvalidShotCount(reported_shots));
        }

        let video = self.owned_video_mut(id, owner)?;
        if !video.status.can_transition(VideoStatus::PendingReview) {
            return Err(StoreError::InvalidTransition {
                from: video.status,
                to: VideoStatus::PendingReview,
            });
        }

        video.status = VideoStatus::PendingReview;
        video.reported_shots = Some(reported_shots);
        video.url = Some(url);
        let country = video.country.clone();

        // Self-reported shots count toward all-time immediately; arbitration
        // adjusts retroactively if the count changes.
        let user = self.user_mut(owner)?;
        user.stats.all_time.shots += u64::from(reported_shots);
        user.stats.all_time.attempts += u64::from(SESSION_SHOTS);

        let pool = self.pending.entry(country.clone()).or_default();
        if pool.contains_key(id) {
            return Err(StoreError::DuplicatePendingEntry(*id));
        }

        let entry = PendingReviewEntry::new(*id, owner.clone(), country, now_millis());
        Ok(pool.entry(*id).or_insert(entry))
    }

    /// Mark an upload as failed; the video is terminally `Errored` and never
    /// enters a review pool
    ///
    /// # Errors
    /// Returns error if the video is missing, owned by someone else, or not
    /// in `Uploading` state
    pub fn fail_upload(&mut self, id: &VideoId, owner: &UserId) -> Result<(), StoreError> {
        self.owned_video_mut(id, owner)?;
        self.transition_video(id, VideoStatus::Errored)
    }

    // --- videos ---

    /// Get a video
    #[must_use]
    pub fn video(&self, id: &VideoId) -> Option<&Video> {
        self.videos.get(id)
    }

    /// Iterate all videos
    pub fn videos(&self) -> impl Iterator<Item = &Video> {
        self.videos.values()
    }

    /// All videos owned by `owner`, in creation order
    #[must_use]
    pub fn videos_of(&self, owner: &UserId) -> Vec<&Video> {
        self.videos_by_owner
            .get(owner)
            .map(|ids| ids.iter().filter_map(|id| self.videos.get(id)).collect())
            .unwrap_or_default()
    }

    /// Apply a status transition, enforcing the transition table
    pub(crate) fn transition_video(
        &mut self,
        id: &VideoId,
        next: VideoStatus,
    ) -> Result<(), StoreError> {
        let video = self
            .videos
            .get_mut(id)
            .ok_or(StoreError::VideoNotFound(*id))?;

        if !video.status.can_transition(next) {
            return Err(StoreError::InvalidTransition {
                from: video.status,
                to: next,
            });
        }

        video.status = next;
        Ok(())
    }

    /// Overwrite a video's shot count (arbitration only)
    pub(crate) fn set_reported_shots(
        &mut self,
        id: &VideoId,
        shots: u32,
    ) -> Result<(), StoreError> {
        let video = self
            .videos
            .get_mut(id)
            .ok_or(StoreError::VideoNotFound(*id))?;

        video.reported_shots = Some(shots);
        Ok(())
    }

    fn owned_video_mut(
        &mut self,
        id: &VideoId,
        owner: &UserId,
    ) -> Result<&mut Video, StoreError> {
        let video = self
            .videos
            .get_mut(id)
            .ok_or(StoreError::VideoNotFound(*id))?;

        if video.owner != *owner {
            return Err(StoreError::NotOwner(*id));
        }

        Ok(video)
    }

    // --- pending pools ---

    /// All entries in a country's pending pool (unordered)
    #[must_use]
    pub fn pending_pool(&self, country: &CountryCode) -> Vec<&PendingReviewEntry> {
        self.pending
            .get(country)
            .map(|pool| pool.values().collect())
            .unwrap_or_default()
    }

    /// One pending entry
    #[must_use]
    pub fn pending_entry(
        &self,
        country: &CountryCode,
        video_id: &VideoId,
    ) -> Option<&PendingReviewEntry> {
        self.pending.get(country).and_then(|p| p.get(video_id))
    }

    /// Mutable pending entry, for the claim coordinator's compare-and-set
    pub(crate) fn pending_entry_mut(
        &mut self,
        country: &CountryCode,
        video_id: &VideoId,
    ) -> Option<&mut PendingReviewEntry> {
        self.pending.get_mut(country).and_then(|p| p.get_mut(video_id))
    }

    /// Remove a pending entry (review resolved or moved to dispute)
    pub(crate) fn take_pending(
        &mut self,
        country: &CountryCode,
        video_id: &VideoId,
    ) -> Result<PendingReviewEntry, StoreError> {
        self.pending
            .get_mut(country)
            .and_then(|p| p.remove(video_id))
            .ok_or(StoreError::PendingEntryNotFound(*video_id))
    }

    /// Iterate every pending entry across all countries
    pub fn all_pending(&self) -> impl Iterator<Item = &PendingReviewEntry> {
        self.pending.values().flat_map(HashMap::values)
    }

    // --- disputes ---

    /// Insert a dispute entry
    pub(crate) fn insert_dispute(&mut self, dispute: DisputeEntry) -> Result<(), StoreError> {
        if self.disputes.contains_key(&dispute.video_id) {
            return Err(StoreError::DuplicateDispute(dispute.video_id));
        }

        self.disputes.insert(dispute.video_id, dispute);
        Ok(())
    }

    /// Get a dispute entry
    #[must_use]
    pub fn dispute(&self, video_id: &VideoId) -> Option<&DisputeEntry> {
        self.disputes.get(video_id)
    }

    /// Remove a dispute entry (arbitrated)
    pub(crate) fn take_dispute(&mut self, video_id: &VideoId) -> Result<DisputeEntry, StoreError> {
        self.disputes
            .remove(video_id)
            .ok_or(StoreError::DisputeNotFound(*video_id))
    }

    /// All open disputes, oldest first
    #[must_use]
    pub fn disputes(&self) -> Vec<&DisputeEntry> {
        let mut entries: Vec<&DisputeEntry> = self.disputes.values().collect();
        entries.sort_by_key(|d| (d.created_at, d.video_id));
        entries
    }

    // --- audit ---

    /// Record a rule-violation audit entry
    pub(crate) fn record_audit(&mut self, entry: AuditEntry) {
        self.audit.push(entry);
    }

    /// The rule-violation log, oldest first
    #[must_use]
    pub fn audit_log(&self) -> &[AuditEntry] {
        &self.audit
    }
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// User id already registered
    #[error("user {0} already registered")]
    DuplicateUser(UserId),
    /// User not found
    #[error("user {0} not found")]
    UserNotFound(UserId),
    /// Video not found
    #[error("video {0} not found")]
    VideoNotFound(VideoId),
    /// Caller does not own the video
    #[error("caller does not own video {0}")]
    NotOwner(VideoId),
    /// Transition not in the table
    #[error("invalid transition {from:?} -> {to:?}")]
    InvalidTransition {
        /// Current status
        from: VideoStatus,
        /// Requested status
        to: VideoStatus,
    },
    /// Reported count exceeds the session format
    #[error("reported shot count {0} exceeds the session format")]
    InvalidShotCount(u32),
    /// A pending entry already exists for this video
    #[error("pending entry already exists for video {0}")]
    DuplicatePendingEntry(VideoId),
    /// No pending entry for this video
    #[error("no pending entry for video {0}")]
    PendingEntryNotFound(VideoId),
    /// A dispute already exists for this video
    #[error("dispute already exists for video {0}")]
    DuplicateDispute(VideoId),
    /// No dispute for this video
    #[error("no dispute for video {0}")]
    DisputeNotFound(VideoId),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_user(id: &str, country: &str) -> (ReviewStore, UserId) {
        let mut store = ReviewStore::new();
        let user = UserId::new(id);
        store
            .register_user(user.clone(), CountryCode::new(country))
            .unwrap();
        (store, user)
    }

    fn uploaded_video(store: &mut ReviewStore, owner: &UserId, shots: u32) -> VideoId {
        let id = store.start_recording(owner).unwrap();
        store.begin_upload(&id, owner).unwrap();
        store
            .complete_upload(&id, owner, shots, format!("blob://{id}"))
            .unwrap();
        id
    }

    #[test]
    fn test_register_user_once() {
        let (mut store, user) = store_with_user("alice", "US");

        assert!(store.user(&user).is_some());
        assert!(matches!(
            store.register_user(user, CountryCode::new("US")),
            Err(StoreError::DuplicateUser(_))
        ));
    }

    #[test]
    fn test_upload_lifecycle() {
        let (mut store, alice) = store_with_user("alice", "US");

        let id = store.start_recording(&alice).unwrap();
        assert_eq!(store.video(&id).unwrap().status, VideoStatus::Recording);

        store.begin_upload(&id, &alice).unwrap();
        store
            .complete_upload(&id, &alice, 7, "blob://x".to_string())
            .unwrap();

        let video = store.video(&id).unwrap();
        assert_eq!(video.status, VideoStatus::PendingReview);
        assert_eq!(video.reported_shots, Some(7));

        // Pending entry created in the owner's country pool
        let entry = store
            .pending_entry(&CountryCode::new("US"), &id)
            .expect("entry in pool");
        assert_eq!(entry.owner, alice);

        // All-time credited immediately
        let stats = store.user(&alice).unwrap().stats.all_time;
        assert_eq!(stats.shots, 7);
        assert_eq!(stats.attempts, u64::from(SESSION_SHOTS));
    }

    #[test]
    fn test_complete_upload_requires_uploading_state() {
        let (mut store, alice) = store_with_user("alice", "US");
        let id = store.start_recording(&alice).unwrap();

        // Still Recording: cannot complete
        assert!(matches!(
            store.complete_upload(&id, &alice, 5, "blob://x".to_string()),
            Err(StoreError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_reported_count_bounded_by_format() {
        let (mut store, alice) = store_with_user("alice", "US");
        let id = store.start_recording(&alice).unwrap();
        store.begin_upload(&id, &alice).unwrap();

        assert!(matches!(
            store.complete_upload(&id, &alice, SESSION_SHOTS + 1, "blob://x".to_string()),
            Err(StoreError::InvalidShotCount(_))
        ));
    }

    #[test]
    fn test_fail_upload_is_terminal() {
        let (mut store, alice) = store_with_user("alice", "US");
        let id = store.start_recording(&alice).unwrap();
        store.begin_upload(&id, &alice).unwrap();
        store.fail_upload(&id, &alice).unwrap();

        assert_eq!(store.video(&id).unwrap().status, VideoStatus::Errored);
        // No pool entry, no stats credit
        assert!(store.pending_entry(&CountryCode::new("US"), &id).is_none());
        assert_eq!(store.user(&alice).unwrap().stats.all_time.attempts, 0);
    }

    #[test]
    fn test_owner_check() {
        let (mut store, alice) = store_with_user("alice", "US");
        let mallory = UserId::new("mallory");
        store
            .register_user(mallory.clone(), CountryCode::new("US"))
            .unwrap();

        let id = store.start_recording(&alice).unwrap();
        assert!(matches!(
            store.begin_upload(&id, &mallory),
            Err(StoreError::NotOwner(_))
        ));
    }

    #[test]
    fn test_one_pending_entry_per_video() {
        let (mut store, alice) = store_with_user("alice", "US");
        let id = uploaded_video(&mut store, &alice, 5);

        // The transition guard already refuses a second completion
        assert!(store.complete_upload(&id, &alice, 5, "blob://y".to_string()).is_err());

        let pool = store.pending_pool(&CountryCode::new("US"));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_disputes_sorted_oldest_first() {
        let mut store = ReviewStore::new();
        for (i, ts) in [(1u8, 300), (2u8, 100), (3u8, 200)] {
            store
                .insert_dispute(DisputeEntry {
                    video_id: VideoId::from_bytes([i; 32]),
                    owner: UserId::new("owner"),
                    reviewer: UserId::new("reviewer"),
                    country: CountryCode::new("US"),
                    reported_shots: 5,
                    reviewer_verdict: crate::types::ReviewerVerdict::Count(4),
                    reason: None,
                    created_at: ts,
                })
                .unwrap();
        }

        let ordered: Vec<i64> = store.disputes().iter().map(|d| d.created_at).collect();
        assert_eq!(ordered, vec![100, 200, 300]);
    }
}
