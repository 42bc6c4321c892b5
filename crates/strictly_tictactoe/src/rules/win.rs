//! Win detection logic for tic-tac-toe.

use super::super::{Board, Position, Role, Square};
use tracing::instrument;

/// The eight lines of the board: three rows, three columns, two diagonals.
pub const LINES: [[Position; 3]; 8] = [
    // Rows
    [Position::TopLeft, Position::TopCenter, Position::TopRight],
    [Position::MiddleLeft, Position::Center, Position::MiddleRight],
    [Position::BottomLeft, Position::BottomCenter, Position::BottomRight],
    // Columns
    [Position::TopLeft, Position::MiddleLeft, Position::BottomLeft],
    [Position::TopCenter, Position::Center, Position::BottomCenter],
    [Position::TopRight, Position::MiddleRight, Position::BottomRight],
    // Diagonals
    [Position::TopLeft, Position::Center, Position::BottomRight],
    [Position::TopRight, Position::Center, Position::BottomLeft],
];

/// Returns the owner of every completed line on the board.
///
/// Boards reachable under alternating turns never have completed lines
/// owned by both roles; callers may check that with this function.
pub fn winning_lines(board: &Board) -> Vec<(Role, [Position; 3])> {
    LINES
        .iter()
        .filter_map(|&[a, b, c]| match board.get(a) {
            Square::Occupied(role) if board.get(b) == board.get(a) && board.get(c) == board.get(a) => {
                Some((role, [a, b, c]))
            }
            _ => None,
        })
        .collect()
}

/// Checks if there is a winner on the board.
///
/// Returns `Some(role)` if the role has three in a row,
/// `None` otherwise.
#[instrument(skip(board))]
pub fn check_winner(board: &Board) -> Option<Role> {
    for [a, b, c] in LINES {
        let sq = board.get(a);
        if sq != Square::Empty && sq == board.get(b) && sq == board.get(c) {
            return match sq {
                Square::Occupied(role) => Some(role),
                Square::Empty => None,
            };
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_winner_empty_board() {
        let board = Board::new();
        assert_eq!(check_winner(&board), None);
        assert!(winning_lines(&board).is_empty());
    }

    #[test]
    fn test_winner_top_row() {
        let mut board = Board::new();
        board.set(Position::TopLeft, Square::Occupied(Role::X));
        board.set(Position::TopCenter, Square::Occupied(Role::X));
        board.set(Position::TopRight, Square::Occupied(Role::X));
        assert_eq!(check_winner(&board), Some(Role::X));
    }

    #[test]
    fn test_winner_diagonal() {
        let mut board = Board::new();
        board.set(Position::TopLeft, Square::Occupied(Role::O));
        board.set(Position::Center, Square::Occupied(Role::O));
        board.set(Position::BottomRight, Square::Occupied(Role::O));
        assert_eq!(check_winner(&board), Some(Role::O));
    }

    #[test]
    fn test_no_winner_incomplete() {
        let mut board = Board::new();
        board.set(Position::TopLeft, Square::Occupied(Role::X));
        board.set(Position::TopCenter, Square::Occupied(Role::X));
        assert_eq!(check_winner(&board), None);
    }

    #[test]
    fn test_double_line_single_owner() {
        // X completes a row and a column with one mark.
        let board: Board = "XXXX--X-O".parse().unwrap();
        let lines = winning_lines(&board);
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|(role, _)| *role == Role::X));
    }
}
