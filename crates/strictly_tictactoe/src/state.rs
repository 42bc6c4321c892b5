//! In-memory game record exchanged between players.

use super::rules;
use super::{Board, GameStatus, Position, Role, Square};
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Errors that can occur when placing a mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum PlaceError {
    /// Square is already occupied.
    #[display("Square {} is already occupied", _0)]
    SquareOccupied(#[error(not(source))] Position),
    /// The board already has an outcome.
    #[display("Game is already over")]
    GameOver,
}

/// Board, turn owner and move counter of one game.
///
/// `move_count` is the logical clock used to order snapshots: it grows by
/// exactly one per accepted move. The status is derived from the board on
/// every call and is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameState {
    board: Board,
    turn_owner: Role,
    move_count: u32,
}

impl GameState {
    /// Creates an empty game with X to move.
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            turn_owner: Role::X,
            move_count: 0,
        }
    }

    /// Assembles a game from its parts, e.g. a parsed remote snapshot.
    pub fn from_parts(board: Board, turn_owner: Role, move_count: u32) -> Self {
        Self {
            board,
            turn_owner,
            move_count,
        }
    }

    /// Returns the board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Role whose move it is (the last mover once the game is over).
    pub fn turn_owner(&self) -> Role {
        self.turn_owner
    }

    /// Number of accepted moves.
    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    /// Outcome of the current board.
    pub fn status(&self) -> GameStatus {
        rules::evaluate(&self.board)
    }

    /// Places `role`'s mark at `pos`.
    ///
    /// Increments the move counter and hands the turn to the opponent
    /// unless the move ended the game. Turn ownership is the caller's
    /// concern; this only guards the board.
    #[instrument(skip(self), fields(move_count = self.move_count))]
    pub fn place(&mut self, pos: Position, role: Role) -> Result<GameStatus, PlaceError> {
        if self.status().is_terminal() {
            return Err(PlaceError::GameOver);
        }
        if !self.board.is_empty(pos) {
            return Err(PlaceError::SquareOccupied(pos));
        }

        self.board.set(pos, Square::Occupied(role));
        self.move_count += 1;

        let status = self.status();
        if !status.is_terminal() {
            self.turn_owner = role.opponent();
        }
        Ok(status)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
