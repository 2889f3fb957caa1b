//! The review service: the trusted RPC surface over the shared store.
//!
//! Untrusted peer clients never perform check-then-write themselves; they
//! speak a small line-delimited JSON protocol to this service, and every
//! request that mutates state takes the store's write lock for the whole
//! check-then-write. Two reviewers racing for the same claim therefore
//! serialize here, and exactly one wins.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::arbitration::{AdminRuling, ArbitrationEngine, ArbitrationError};
use crate::review::{
    CandidateLocator, ClaimCoordinator, OutcomeProcessor, OutcomeResult, OutcomeSubmission,
    ReviewConfig, ReviewError,
};
use crate::stats::Fault;
use crate::store::{ReviewStore, StoreError};
use crate::types::{
    CountryCode, DisputeEntry, PendingReviewEntry, ReviewerVerdict, UserId, UserRecord, Video,
    VideoId,
};

/// Service configuration
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// TCP listen address
    pub listen_addr: String,
    /// Review coordination settings
    pub review: ReviewConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7420".to_string(),
            review: ReviewConfig::default(),
        }
    }
}

/// Events emitted to collaborators (the admin UI subscribes to disputes)
#[derive(Clone, Debug)]
pub enum ServiceEvent {
    /// A video completed upload and entered its country's pending pool
    VideoCompleted {
        /// The completed video
        video_id: VideoId,
        /// Its pending pool
        country: CountryCode,
    },
    /// A review disagreement entered the dispute pool
    DisputeCreated {
        /// The disputed video
        video_id: VideoId,
    },
    /// An admin ruling resolved a dispute
    DisputeResolved {
        /// The arbitrated video
        video_id: VideoId,
    },
}

/// A client request
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Register a user identity
    RegisterUser {
        /// Auth-issued identity
        user_id: UserId,
        /// Home country
        country: CountryCode,
    },
    /// Start a recording session
    StartSession {
        /// The recording user
        owner: UserId,
    },
    /// Complete an upload with the self-reported count and blob URL
    CompleteUpload {
        /// The video
        video_id: VideoId,
        /// Its owner
        owner: UserId,
        /// Self-reported shot count
        shots: u32,
        /// Blob-store URL
        url: String,
    },
    /// Mark an upload as failed
    FailUpload {
        /// The video
        video_id: VideoId,
        /// Its owner
        owner: UserId,
    },
    /// Ask for the next video to review
    FindCandidate {
        /// Pool to draw from
        country: CountryCode,
        /// The requesting reviewer
        user_id: UserId,
    },
    /// Claim a pending entry
    Claim {
        /// Pool the entry lives in
        country: CountryCode,
        /// The video
        video_id: VideoId,
        /// The video's owner
        owner: UserId,
        /// The claiming reviewer
        claimant: UserId,
    },
    /// Release a held claim
    Release {
        /// Pool the entry lives in
        country: CountryCode,
        /// The video
        video_id: VideoId,
        /// The releasing reviewer
        claimant: UserId,
    },
    /// Submit a review verdict
    SubmitOutcome {
        /// The reviewed video
        video_id: VideoId,
        /// Its owner
        owner: UserId,
        /// The submitting reviewer
        reviewer: UserId,
        /// Independent count, or `None` for a rule-violation assertion
        shots: Option<u32>,
        /// Free-form reason
        reason: Option<String>,
    },
    /// List open disputes, oldest first
    ListDisputes,
    /// Apply an admin ruling to a dispute
    Arbitrate {
        /// The disputed video
        video_id: VideoId,
        /// The ruling
        ruling: AdminRuling,
    },
    /// Fetch a user record
    GetUser {
        /// The user
        user_id: UserId,
    },
    /// Fetch a video record
    GetVideo {
        /// The video
        video_id: VideoId,
    },
}

/// A service reply
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Response {
    /// User registered
    Registered {
        /// The registered identity
        user_id: UserId,
    },
    /// Recording session started
    SessionStarted {
        /// The new video's id
        video_id: VideoId,
    },
    /// Upload completed and queued for review
    UploadCompleted {
        /// The completed video
        video_id: VideoId,
    },
    /// Upload marked failed
    UploadFailed {
        /// The errored video
        video_id: VideoId,
    },
    /// A review candidate
    Candidate {
        /// The eligible pending entry
        entry: PendingReviewEntry,
    },
    /// Claim taken
    Claimed {
        /// The claimed video
        video_id: VideoId,
    },
    /// Release processed
    Released {
        /// Whether a claim held by the caller was actually released
        released: bool,
    },
    /// Verdict recorded
    Outcome {
        /// How the review resolved
        result: OutcomeResult,
    },
    /// Open disputes
    Disputes {
        /// Oldest first
        disputes: Vec<DisputeEntry>,
    },
    /// Ruling applied
    Arbitrated {
        /// Who was found at fault
        fault: Fault,
        /// The final count (`None` on discard)
        final_shots: Option<u32>,
    },
    /// A user record
    User {
        /// The record
        record: UserRecord,
    },
    /// A video record
    Video {
        /// The record
        video: Video,
    },
    /// Request failed
    Error {
        /// Stable machine-readable kind
        kind: String,
        /// Human-readable detail
        message: String,
    },
}

impl Response {
    fn error(kind: &str, message: impl ToString) -> Self {
        Self::Error {
            kind: kind.to_string(),
            message: message.to_string(),
        }
    }
}

/// The review coordination service
#[derive(Clone)]
pub struct ReviewService {
    store: Arc<RwLock<ReviewStore>>,
    locator: CandidateLocator,
    claims: ClaimCoordinator,
    outcomes: OutcomeProcessor,
    arbitration: ArbitrationEngine,
    events: mpsc::UnboundedSender<ServiceEvent>,
}

impl ReviewService {
    /// Create a service over a shared store, returning the event stream
    /// collaborators subscribe to
    #[must_use]
    pub fn new(
        store: Arc<RwLock<ReviewStore>>,
        config: &ServiceConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ServiceEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();

        let service = Self {
            store,
            locator: CandidateLocator::new(config.review.clone()),
            claims: ClaimCoordinator::new(config.review.clone()),
            outcomes: OutcomeProcessor::new(),
            arbitration: ArbitrationEngine::new(),
            events,
        };

        (service, event_rx)
    }

    /// Accept and serve connections forever
    ///
    /// # Errors
    /// Returns error if the listener fails
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServiceError> {
        info!(addr = %listener.local_addr()?, "review service listening");

        loop {
            let (socket, addr) = listener.accept().await?;
            debug!(peer = %addr, "client connected");

            let service = self.clone();
            tokio::spawn(async move {
                if let Err(e) = service.handle_connection(socket).await {
                    warn!(peer = %addr, error = %e, "connection closed with error");
                }
            });
        }
    }

    async fn handle_connection(&self, socket: TcpStream) -> Result<(), ServiceError> {
        let (reader, mut writer) = socket.into_split();
        let mut lines = BufReader::new(reader).lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<Request>(&line) {
                Ok(request) => self.handle(request).await,
                Err(e) => Response::error("bad_request", e),
            };

            let mut payload = serde_json::to_vec(&response)?;
            payload.push(b'\n');
            writer.write_all(&payload).await?;
        }

        Ok(())
    }

    /// Handle one request against the shared store.
    ///
    /// Mutating requests hold the write lock for the whole
    /// check-then-write; that lock is what makes the claim compare-and-set
    /// (and every other precondition check) atomic.
    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::RegisterUser { user_id, country } => {
                let mut store = self.store.write().await;
                match store.register_user(user_id.clone(), country) {
                    Ok(_) => Response::Registered { user_id },
                    Err(e) => store_error(&e),
                }
            }

            Request::StartSession { owner } => {
                let mut store = self.store.write().await;
                match store.start_recording(&owner) {
                    Ok(video_id) => Response::SessionStarted { video_id },
                    Err(e) => store_error(&e),
                }
            }

            Request::CompleteUpload {
                video_id,
                owner,
                shots,
                url,
            } => {
                let mut store = self.store.write().await;
                match begin_if_recording(&mut store, &video_id, &owner)
                    .and_then(|()| store.complete_upload(&video_id, &owner, shots, url))
                {
                    Ok(entry) => {
                        let country = entry.country.clone();
                        let _ = self
                            .events
                            .send(ServiceEvent::VideoCompleted { video_id, country });
                        Response::UploadCompleted { video_id }
                    }
                    Err(e) => store_error(&e),
                }
            }

            Request::FailUpload { video_id, owner } => {
                let mut store = self.store.write().await;
                match begin_if_recording(&mut store, &video_id, &owner)
                    .and_then(|()| store.fail_upload(&video_id, &owner))
                {
                    Ok(()) => Response::UploadFailed { video_id },
                    Err(e) => store_error(&e),
                }
            }

            Request::FindCandidate { country, user_id } => {
                let store = self.store.read().await;
                match self.locator.find_candidate(&store, &country, &user_id) {
                    Ok(entry) => Response::Candidate { entry },
                    Err(e) => review_error(&e),
                }
            }

            Request::Claim {
                country,
                video_id,
                owner,
                claimant,
            } => {
                let mut store = self.store.write().await;
                match self
                    .claims
                    .claim(&mut store, &country, &video_id, &owner, &claimant)
                {
                    Ok(()) => Response::Claimed { video_id },
                    Err(e) => review_error(&e),
                }
            }

            Request::Release {
                country,
                video_id,
                claimant,
            } => {
                let mut store = self.store.write().await;
                let released =
                    self.claims
                        .release(&mut store, &country, &video_id, &claimant);
                Response::Released { released }
            }

            Request::SubmitOutcome {
                video_id,
                owner,
                reviewer,
                shots,
                reason,
            } => {
                let verdict = shots.map_or(ReviewerVerdict::RuleViolation, ReviewerVerdict::Count);
                let submission = OutcomeSubmission {
                    video_id,
                    owner,
                    reviewer,
                    verdict,
                    reason,
                };

                let mut store = self.store.write().await;
                match self.outcomes.submit_outcome(&mut store, submission) {
                    Ok(result) => {
                        if result == OutcomeResult::Disputed {
                            let _ = self.events.send(ServiceEvent::DisputeCreated { video_id });
                        }
                        Response::Outcome { result }
                    }
                    Err(e) => review_error(&e),
                }
            }

            Request::ListDisputes => {
                let store = self.store.read().await;
                let disputes = store.disputes().into_iter().cloned().collect();
                Response::Disputes { disputes }
            }

            Request::Arbitrate { video_id, ruling } => {
                let mut store = self.store.write().await;
                match self.arbitration.arbitrate(&mut store, &video_id, ruling) {
                    Ok(result) => {
                        let _ = self.events.send(ServiceEvent::DisputeResolved { video_id });
                        Response::Arbitrated {
                            fault: result.fault,
                            final_shots: result.final_shots,
                        }
                    }
                    Err(e) => arbitration_error(&e),
                }
            }

            Request::GetUser { user_id } => {
                let store = self.store.read().await;
                store.user(&user_id).map_or_else(
                    || Response::error("user_not_found", format!("user {user_id} not found")),
                    |record| Response::User {
                        record: record.clone(),
                    },
                )
            }

            Request::GetVideo { video_id } => {
                let store = self.store.read().await;
                store.video(&video_id).map_or_else(
                    || Response::error("video_not_found", format!("video {video_id} not found")),
                    |video| Response::Video {
                        video: video.clone(),
                    },
                )
            }
        }
    }
}

/// The client reports only the upload's end state, so the server walks the
/// video through `Uploading` itself; a retry after a partial failure finds
/// the video already `Uploading` and skips the step.
fn begin_if_recording(
    store: &mut ReviewStore,
    video_id: &VideoId,
    owner: &UserId,
) -> Result<(), StoreError> {
    if store
        .video(video_id)
        .is_some_and(|v| v.status == crate::types::VideoStatus::Recording)
    {
        store.begin_upload(video_id, owner)?;
    }
    Ok(())
}

fn store_error(e: &StoreError) -> Response {
    let kind = match e {
        StoreError::DuplicateUser(_) => "duplicate_user",
        StoreError::UserNotFound(_) => "user_not_found",
        StoreError::VideoNotFound(_) | StoreError::NotOwner(_) => "video_not_found",
        StoreError::InvalidTransition { .. } => "invalid_transition",
        StoreError::InvalidShotCount(_) => "invalid_shot_count",
        StoreError::DuplicatePendingEntry(_) | StoreError::DuplicateDispute(_) => {
            "duplicate_entry"
        }
        StoreError::PendingEntryNotFound(_) | StoreError::DisputeNotFound(_) => "entry_not_found",
    };
    Response::error(kind, e)
}

fn review_error(e: &ReviewError) -> Response {
    let kind = match e {
        ReviewError::ClaimConflict(_) => "claim_conflict",
        ReviewError::NoCandidate => "no_candidate",
        ReviewError::VideoNotFound(id) => {
            warn!(video = %id, "review referenced a missing video");
            "video_not_found"
        }
        ReviewError::WrongState { .. } => "wrong_state",
        ReviewError::NotClaimant(_) => "not_claimant",
        ReviewError::SelfReview(_) => "self_review",
        ReviewError::UnknownUser(_) => "unknown_user",
        ReviewError::InvalidShotCount(_) => "invalid_shot_count",
        ReviewError::Store(inner) => return store_error(inner),
    };
    Response::error(kind, e)
}

fn arbitration_error(e: &ArbitrationError) -> Response {
    let kind = match e {
        ArbitrationError::DisputeNotFound(_) => "dispute_not_found",
        ArbitrationError::Inconsistent(_) => "arbitration_inconsistency",
        ArbitrationError::InvalidShotCount(_) => "invalid_shot_count",
        ArbitrationError::Store(inner) => return store_error(inner),
    };
    Response::error(kind, e)
}

/// Service errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Socket failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Reply encoding failure
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}
