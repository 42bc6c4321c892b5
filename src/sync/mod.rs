//! Reconciliation of one device's view of a match with the shared store.
//!
//! A session loads the stored game once, then keeps it in step by polling
//! on a timer. Local moves are applied optimistically and pushed as full
//! snapshots; remote snapshots are merged by move count, except that a
//! finished game in the store always wins and a store that went back
//! after our last write means the opponent started a new game.

mod controller;
mod engine;
mod events;
mod handle;
mod http_store;
mod memory_store;
mod presence;
mod reconcile;
mod session;
mod store;
mod wire;

pub use controller::{ControllerState, MoveController, MoveError};
pub use events::{SessionEvent, SessionPhase};
pub use handle::{RunningSession, SessionHandle, spawn_session};
pub use http_store::HttpStore;
pub use memory_store::MemoryStore;
pub use presence::{Presence, PresenceMonitor};
pub use reconcile::{Reconciliation, StoreView, reconcile};
pub use session::{MatchSession, RoleAssignment};
pub use store::{AuthoritativeStore, StoreError, StoreErrorKind};
pub use wire::{
    DRAW_WINNER, GetMatchState, HeartbeatRequest, HeartbeatResponse, MatchStateData,
    MatchStateResponse, RemoteSnapshot, ResetMatchState, TurnCount, UpdateMatchState,
};
