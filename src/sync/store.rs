//! Boundary to the authoritative match store.

use super::wire::{MatchStateData, ResetMatchState, UpdateMatchState};
use derive_more::{Display, Error};
use strictly_tictactoe::Role;
use tracing::instrument;

/// Category of a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StoreErrorKind {
    /// The request never produced a usable response.
    #[display("transport")]
    Transport,
    /// The store answered with an error status or error payload.
    #[display("rejected")]
    Rejected,
    /// The response body could not be turned into a snapshot.
    #[display("malformed snapshot")]
    MalformedSnapshot,
    /// The store is not reachable at all.
    #[display("unavailable")]
    Unavailable,
}

/// Store error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Store error ({}): {} at {}:{}", kind, message, file, line)]
pub struct StoreError {
    /// Failure category.
    pub kind: StoreErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl StoreError {
    /// Creates a new store error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Transport failure.
    #[track_caller]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Transport, message)
    }

    /// Unparsable or inconsistent snapshot.
    #[track_caller]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::MalformedSnapshot, message)
    }

    /// True for [`StoreErrorKind::MalformedSnapshot`].
    pub fn is_malformed(&self) -> bool {
        self.kind == StoreErrorKind::MalformedSnapshot
    }
}

impl From<reqwest::Error> for StoreError {
    #[track_caller]
    fn from(err: reqwest::Error) -> Self {
        Self::transport(format!("HTTP error: {}", err))
    }
}

impl From<serde_json::Error> for StoreError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(format!("Invalid JSON: {}", err))
    }
}

/// The four remote operations of the authoritative store.
///
/// Implementations are plain request/response transports. Responses may be
/// redelivered or arrive out of order; the engine reconciles them.
#[async_trait::async_trait]
pub trait AuthoritativeStore: Send + Sync {
    /// Fetches the stored state of a match.
    async fn get_match_state(&self, match_id: &str) -> Result<MatchStateData, StoreError>;

    /// Overwrites the stored state of a match.
    async fn update_match_state(&self, request: UpdateMatchState) -> Result<(), StoreError>;

    /// Clears a match for a rematch, recording both participants.
    async fn reset_match_state(&self, request: ResetMatchState) -> Result<(), StoreError>;

    /// Reports liveness; returns the ping difference to the opponent in seconds.
    async fn heartbeat(&self, match_id: &str, role: Role) -> Result<f64, StoreError>;
}
