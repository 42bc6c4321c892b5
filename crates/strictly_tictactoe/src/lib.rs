//! Pure tic-tac-toe game logic.
//!
//! Board storage, the canonical 9-character wire codec, and the rules
//! evaluator. Nothing in this crate performs I/O; the sync engine in
//! `strictly_sync` builds on these types.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod position;
pub mod rules;
mod state;
mod types;

pub use position::Position;
pub use state::{GameState, PlaceError};
pub use types::{Board, BoardParseError, GameStatus, Role, Square};
