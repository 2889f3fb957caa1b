//! # Shotrial
//!
//! Peer-review coordination and dispute arbitration for recorded shooting
//! sessions.
//!
//! ## Architecture
//!
//! The protocol involves three actor roles:
//! - **Uploader**: records a fixed-format session (10 shots) and uploads it
//!   with a self-reported shot count
//! - **Reviewer**: a peer who claims a pending video, watches it, and
//!   submits an independent count (or asserts a rule violation)
//! - **Admin**: arbitrates disputes with an authoritative final count
//!
//! ## Coordination Model
//!
//! Clients never perform check-then-write themselves. All claim, outcome,
//! and arbitration logic runs inside this service against a single
//! [`store::ReviewStore`], so every state transition is precondition-checked
//! under one exclusive borrow:
//!
//! - claims are compare-and-set on the pending entry's state
//! - a video is never simultaneously pending, disputed, and verified
//! - penalties are applied exactly once per arbitration

#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rust_2018_idioms
)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod arbitration;
pub mod review;
pub mod service;
pub mod stats;
pub mod store;
pub mod types;
pub mod upload;

pub use arbitration::{attribute_fault, AdminRuling, ArbitrationEngine, ArbitrationResult};
pub use review::{CandidateLocator, ClaimCoordinator, OutcomeProcessor, ReviewConfig};
pub use stats::{Fault, PenaltyLedger, StatsAggregator};
pub use store::ReviewStore;
pub use types::{
    ClaimState, CountryCode, DisputeEntry, PendingReviewEntry, ReviewerVerdict, UserId,
    UserRecord, Video, VideoId, VideoStatus,
};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shots attempted per recorded session (fixed format)
pub const SESSION_SHOTS: u32 = 10;

/// Sessions counted by the rolling "last 100 shots" statistic
pub const LAST100_WINDOW: usize = 10;

/// Default claim lease before a stale claim is treated as unclaimed
/// (24 hours; provisional, overridable via [`review::ReviewConfig`])
pub const DEFAULT_CLAIM_LEASE_MS: i64 = 24 * 60 * 60 * 1000;
