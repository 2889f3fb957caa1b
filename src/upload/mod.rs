//! Upload pipeline seam.
//!
//! Camera capture, compression, and transfer retries live outside this
//! crate. What remains here is the seam: a [`BlobStore`] collaborator that
//! persists bytes and returns a URL, and an [`UploadPipeline`] that drives
//! a video through `Recording -> Uploading -> PendingReview` (or
//! `Errored`) against the store.

use tracing::warn;

use crate::store::{ReviewStore, StoreError};
use crate::types::{UserId, VideoId};

/// Persists video bytes and returns a stable URL
pub trait BlobStore {
    /// Store `bytes` for `video_id`, returning the blob URL
    ///
    /// # Errors
    /// Returns error if the bytes could not be persisted
    fn upload(&self, video_id: &VideoId, bytes: &[u8]) -> Result<String, BlobError>;
}

/// Blob store failure (opaque; the transfer layer owns the details)
#[derive(Debug, thiserror::Error)]
#[error("blob upload failed: {0}")]
pub struct BlobError(pub String);

/// An in-memory blob store for tests and local runs
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    uploads: std::sync::Mutex<Vec<(VideoId, usize)>>,
}

impl MemoryBlobStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    #[must_use]
    pub fn len(&self) -> usize {
        self.uploads.lock().map(|u| u.len()).unwrap_or(0)
    }

    /// Whether no blobs are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn upload(&self, video_id: &VideoId, bytes: &[u8]) -> Result<String, BlobError> {
        let mut uploads = self
            .uploads
            .lock()
            .map_err(|_| BlobError("store poisoned".to_string()))?;
        uploads.push((*video_id, bytes.len()));
        Ok(format!("mem://{video_id}"))
    }
}

/// Drives a recorded session through the upload lifecycle
#[derive(Debug)]
pub struct UploadPipeline<B> {
    blob: B,
}

impl<B: BlobStore> UploadPipeline<B> {
    /// Create a pipeline over a blob store collaborator
    pub const fn new(blob: B) -> Self {
        Self { blob }
    }

    /// Start a recording session, creating the video record
    ///
    /// # Errors
    /// Returns error if the owner is not registered
    pub fn start_session(
        &self,
        store: &mut ReviewStore,
        owner: &UserId,
    ) -> Result<VideoId, UploadError> {
        Ok(store.start_recording(owner)?)
    }

    /// Upload a finished recording: persist the bytes, then complete the
    /// video with its self-reported count. A blob failure marks the video
    /// `Errored`; it never enters a review pool.
    ///
    /// # Errors
    /// Returns error if the blob store rejects the bytes or the video is
    /// not in a completable state
    pub fn upload(
        &self,
        store: &mut ReviewStore,
        video_id: &VideoId,
        owner: &UserId,
        bytes: &[u8],
        reported_shots: u32,
    ) -> Result<(), UploadError> {
        store.begin_upload(video_id, owner)?;

        match self.blob.upload(video_id, bytes) {
            Ok(url) => {
                store.complete_upload(video_id, owner, reported_shots, url)?;
                Ok(())
            }
            Err(e) => {
                warn!(video = %video_id, error = %e, "upload failed");
                store.fail_upload(video_id, owner)?;
                Err(UploadError::Blob(e))
            }
        }
    }
}

/// Upload pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The blob collaborator failed; the video is marked `Errored`
    #[error(transparent)]
    Blob(#[from] BlobError),
    /// The store rejected the lifecycle transition
    #[error(transparent)]
    Store(#[from] StoreError),
}
