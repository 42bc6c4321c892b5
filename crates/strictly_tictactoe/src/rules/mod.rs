//! Game rules for tic-tac-toe.
//!
//! Pure functions over a board snapshot. The outcome of a game has no
//! truth of its own: it is always [`evaluate`] applied to the board.

pub mod draw;
pub mod win;

pub use draw::is_full;
pub use win::{check_winner, winning_lines};

use super::{Board, GameStatus};
use tracing::instrument;

/// Determines the outcome of `board`.
///
/// A completed line wins; otherwise a full board is a draw; otherwise the
/// game is still in progress.
#[instrument(skip(board), fields(board = %board.encode()))]
pub fn evaluate(board: &Board) -> GameStatus {
    if let Some(winner) = check_winner(board) {
        GameStatus::Won(winner)
    } else if is_full(board) {
        GameStatus::Draw
    } else {
        GameStatus::InProgress
    }
}
