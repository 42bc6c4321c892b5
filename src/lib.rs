//! Strictly Sync - client-side state reconciliation for polled matches
//!
//! Keeps one device's view of a two-player tic-tac-toe match consistent
//! with a shared store that offers only whole-snapshot reads and
//! unconditional writes.
//!
//! # Architecture
//!
//! - **Game**: pure rules and board codec (`strictly_tictactoe`)
//! - **Store**: `AuthoritativeStore` trait with HTTP and in-memory backends
//! - **Engine**: single-task loop that polls, pushes and reconciles
//! - **Handle**: UI-facing commands and an event stream
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strictly_sync::{MatchSession, MemoryStore, Role, SyncConfig, spawn_session};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let session = MatchSession::new(
//!     "alice_bob".to_string(),
//!     Role::X,
//!     "alice".to_string(),
//!     "bob".to_string(),
//! )?;
//! let running = spawn_session(session, SyncConfig::new(), Arc::new(MemoryStore::new())).await?;
//! running.handle.request_move(4).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod sync;

// Crate-level exports - Configuration
pub use config::{AUTH_TOKEN_ENV, ConfigError, SyncConfig};

// Crate-level exports - Session engine
pub use sync::{
    AuthoritativeStore, ControllerState, DRAW_WINNER, GetMatchState, HeartbeatRequest,
    HeartbeatResponse, HttpStore, MatchSession, MatchStateData, MatchStateResponse, MemoryStore,
    MoveController, MoveError, Presence, PresenceMonitor, Reconciliation, RemoteSnapshot,
    ResetMatchState, RoleAssignment, RunningSession, SessionEvent, SessionHandle, SessionPhase,
    StoreError, StoreErrorKind, StoreView, TurnCount, UpdateMatchState, reconcile, spawn_session,
};

// Crate-level exports - Game types (tic-tac-toe)
pub use strictly_tictactoe::{Board, GameState, GameStatus, PlaceError, Position, Role, Square};
