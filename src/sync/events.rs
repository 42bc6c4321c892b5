//! Notifications from the engine to the UI.

use super::presence::Presence;
use super::store::StoreError;
use derive_more::Display;
use strictly_tictactoe::{Board, GameStatus, Role};

/// Lifecycle phase of a session.
///
/// `NotStarted → Loading → Fresh | Resuming → Active → Terminal`, and back
/// to `Fresh` on a rematch. `Closed` once the session is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionPhase {
    /// Engine constructed, nothing fetched yet.
    NotStarted,
    /// Fetching the initial remote snapshot.
    Loading,
    /// Starting from an empty board.
    Fresh,
    /// Continuing a game found in the store.
    Resuming,
    /// Game in progress.
    Active,
    /// Game over; waiting for a rematch.
    Terminal,
    /// Session left; timers stopped.
    Closed,
}

/// Messages sent from the engine to the UI.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session moved to a new phase.
    PhaseChanged(SessionPhase),
    /// Board contents changed.
    BoardChanged(Board),
    /// A different role now holds the turn.
    TurnChanged(Role),
    /// The game reached an outcome.
    Terminal(GameStatus),
    /// Opponent liveness estimate changed.
    OpponentPresence(Presence),
    /// A remote call failed; the session keeps running.
    SyncFailed(StoreError),
}
