//! Sled-backed persistence for the review store.
//!
//! Records are written as individual keyed values (one key per user, video,
//! pending entry, and dispute), so a snapshot is a sweep over small writes
//! rather than one opaque blob. The node loads the store once at startup and
//! snapshots periodically and on shutdown.

use std::collections::HashMap;
use std::path::Path;

use crate::types::{DisputeEntry, PendingReviewEntry, UserRecord, Video, VideoId};

use super::{AuditEntry, ReviewStore};

const TREE_USERS: &str = "users";
const TREE_VIDEOS: &str = "videos";
const TREE_PENDING: &str = "pending";
const TREE_DISPUTES: &str = "disputes";
const TREE_AUDIT: &str = "audit";

/// Keyed sled persistence for a [`ReviewStore`]
pub struct Persistence {
    db: sled::Db,
    users: sled::Tree,
    videos: sled::Tree,
    pending: sled::Tree,
    disputes: sled::Tree,
    audit: sled::Tree,
}

impl Persistence {
    /// Open (or create) a database at `path`
    ///
    /// # Errors
    /// Returns error if the database cannot be opened
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        Self::from_db(sled::open(path)?)
    }

    /// Open an in-memory database that is dropped on close (tests)
    ///
    /// # Errors
    /// Returns error if the database cannot be opened
    pub fn temporary() -> Result<Self, PersistError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self, PersistError> {
        Ok(Self {
            users: db.open_tree(TREE_USERS)?,
            videos: db.open_tree(TREE_VIDEOS)?,
            pending: db.open_tree(TREE_PENDING)?,
            disputes: db.open_tree(TREE_DISPUTES)?,
            audit: db.open_tree(TREE_AUDIT)?,
            db,
        })
    }

    /// Write the whole store as keyed records and flush
    ///
    /// # Errors
    /// Returns error on serialization or disk failure
    pub fn snapshot(&self, store: &ReviewStore) -> Result<(), PersistError> {
        self.users.clear()?;
        for user in store.users() {
            self.users
                .insert(user.id.as_str().as_bytes(), bincode::serialize(user)?)?;
        }

        self.videos.clear()?;
        for video in store.videos() {
            self.videos
                .insert(video.id.as_bytes(), bincode::serialize(video)?)?;
        }

        self.pending.clear()?;
        for entry in store.all_pending() {
            let key = pending_key(entry);
            self.pending.insert(key, bincode::serialize(entry)?)?;
        }

        self.disputes.clear()?;
        for dispute in store.disputes() {
            self.disputes
                .insert(dispute.video_id.as_bytes(), bincode::serialize(dispute)?)?;
        }

        self.audit.clear()?;
        for (i, entry) in store.audit_log().iter().enumerate() {
            self.audit
                .insert((i as u64).to_be_bytes(), bincode::serialize(entry)?)?;
        }

        self.db.flush()?;
        Ok(())
    }

    /// Load a store from disk
    ///
    /// # Errors
    /// Returns error on deserialization or disk failure
    pub fn load(&self) -> Result<ReviewStore, PersistError> {
        let mut store = ReviewStore::new();

        for item in self.users.iter() {
            let (_, value) = item?;
            let user: UserRecord = bincode::deserialize(&value)?;
            store.users.insert(user.id.clone(), user);
        }

        for item in self.videos.iter() {
            let (_, value) = item?;
            let video: Video = bincode::deserialize(&value)?;
            store
                .videos_by_owner
                .entry(video.owner.clone())
                .or_default()
                .push(video.id);
            store.videos.insert(video.id, video);
        }

        // Restore creation order per owner
        let by_created: HashMap<VideoId, i64> = store
            .videos
            .values()
            .map(|v| (v.id, v.created_at))
            .collect();
        for ids in store.videos_by_owner.values_mut() {
            ids.sort_by_key(|id| by_created.get(id).copied().unwrap_or_default());
        }

        for item in self.pending.iter() {
            let (_, value) = item?;
            let entry: PendingReviewEntry = bincode::deserialize(&value)?;
            store
                .pending
                .entry(entry.country.clone())
                .or_default()
                .insert(entry.video_id, entry);
        }

        for item in self.disputes.iter() {
            let (_, value) = item?;
            let dispute: DisputeEntry = bincode::deserialize(&value)?;
            store.disputes.insert(dispute.video_id, dispute);
        }

        for item in self.audit.iter() {
            let (_, value) = item?;
            let entry: AuditEntry = bincode::deserialize(&value)?;
            store.audit.push(entry);
        }

        Ok(store)
    }
}

fn pending_key(entry: &PendingReviewEntry) -> Vec<u8> {
    let mut key = Vec::with_capacity(entry.country.as_str().len() + 1 + 32);
    key.extend_from_slice(entry.country.as_str().as_bytes());
    key.push(b'/');
    key.extend_from_slice(entry.video_id.as_bytes());
    key
}

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Disk or database failure
    #[error("database error: {0}")]
    Db(#[from] sled::Error),
    /// Record encoding/decoding failure
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CountryCode, UserId};

    #[test]
    fn test_snapshot_load_round_trip() {
        let mut store = ReviewStore::new();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        store
            .register_user(alice.clone(), CountryCode::new("US"))
            .unwrap();
        store
            .register_user(bob.clone(), CountryCode::new("US"))
            .unwrap();

        let id = store.start_recording(&alice).unwrap();
        store.begin_upload(&id, &alice).unwrap();
        store
            .complete_upload(&id, &alice, 6, "blob://x".to_string())
            .unwrap();

        let persistence = Persistence::temporary().unwrap();
        persistence.snapshot(&store).unwrap();

        let loaded = persistence.load().unwrap();

        assert!(loaded.user(&alice).is_some());
        assert!(loaded.user(&bob).is_some());
        assert_eq!(loaded.user(&alice).unwrap().stats.all_time.shots, 6);

        let video = loaded.video(&id).expect("video restored");
        assert_eq!(video.reported_shots, Some(6));
        assert_eq!(loaded.videos_of(&alice).len(), 1);

        assert!(loaded
            .pending_entry(&CountryCode::new("US"), &id)
            .is_some());
    }

    #[test]
    fn test_snapshot_overwrites_stale_records() {
        let mut store = ReviewStore::new();
        let alice = UserId::new("alice");
        store
            .register_user(alice.clone(), CountryCode::new("US"))
            .unwrap();
        let id = store.start_recording(&alice).unwrap();
        store.begin_upload(&id, &alice).unwrap();
        store
            .complete_upload(&id, &alice, 6, "blob://x".to_string())
            .unwrap();

        let persistence = Persistence::temporary().unwrap();
        persistence.snapshot(&store).unwrap();

        // Entry resolves; second snapshot must not resurrect it
        store.take_pending(&CountryCode::new("US"), &id).unwrap();
        persistence.snapshot(&store).unwrap();

        let loaded = persistence.load().unwrap();
        assert!(loaded
            .pending_entry(&CountryCode::new("US"), &id)
            .is_none());
    }
}
