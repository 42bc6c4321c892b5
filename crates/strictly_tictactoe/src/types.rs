//! Core domain types for tic-tac-toe.

use super::position::Position;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Role a participant plays in a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Role {
    /// Role X (always moves first).
    X,
    /// Role O (moves second).
    O,
}

impl Role {
    /// Returns the opposing role.
    pub fn opponent(self) -> Self {
        match self {
            Role::X => Role::O,
            Role::O => Role::X,
        }
    }

    /// Wire symbol for this role.
    pub fn symbol(self) -> char {
        match self {
            Role::X => 'X',
            Role::O => 'O',
        }
    }

    /// Parses a wire role (`"X"` or `"O"`).
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "X" => Some(Role::X),
            "O" => Some(Role::O),
            _ => None,
        }
    }
}

/// A square on the tic-tac-toe board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Square {
    /// Empty square.
    Empty,
    /// Square occupied by a role.
    Occupied(Role),
}

impl Square {
    /// Wire symbol for this square (`X`, `O` or `-`).
    pub fn symbol(self) -> char {
        match self {
            Square::Empty => EMPTY_SYMBOL,
            Square::Occupied(role) => role.symbol(),
        }
    }

    fn from_symbol(c: char) -> Option<Self> {
        match c {
            'X' => Some(Square::Occupied(Role::X)),
            'O' => Some(Square::Occupied(Role::O)),
            EMPTY_SYMBOL => Some(Square::Empty),
            _ => None,
        }
    }
}

const EMPTY_SYMBOL: char = '-';

/// Error parsing the 9-character board encoding.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum BoardParseError {
    /// The encoding was not exactly nine characters.
    #[display("Board encoding must be 9 characters, got {}", _0)]
    WrongLength(#[error(not(source))] usize),
    /// A character outside `X`, `O`, `-`.
    #[display("Invalid board character {:?} at index {}", found, index)]
    InvalidCharacter {
        /// Offending character.
        found: char,
        /// Cell index of the character.
        index: usize,
    },
}

/// 3x3 tic-tac-toe board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    /// Squares in row-major order (index = row * 3 + col).
    squares: [Square; 9],
}

impl Board {
    /// Creates a new empty board.
    pub fn new() -> Self {
        Self {
            squares: [Square::Empty; 9],
        }
    }

    /// Gets the square at the given position.
    pub fn get(&self, pos: Position) -> Square {
        self.squares[pos.to_index()]
    }

    /// Sets the square at the given position.
    pub fn set(&mut self, pos: Position, square: Square) {
        self.squares[pos.to_index()] = square;
    }

    /// Checks if a square is empty.
    pub fn is_empty(&self, pos: Position) -> bool {
        self.get(pos) == Square::Empty
    }

    /// Returns all squares as a slice.
    pub fn squares(&self) -> &[Square; 9] {
        &self.squares
    }

    /// Number of squares holding the given role's mark.
    pub fn count(&self, role: Role) -> usize {
        self.squares
            .iter()
            .filter(|s| **s == Square::Occupied(role))
            .count()
    }

    /// Number of occupied squares.
    pub fn marks(&self) -> usize {
        self.count(Role::X) + self.count(Role::O)
    }

    /// True when every occupied square of `other` holds the same mark here.
    ///
    /// A board that extends another is a possible future of it under the
    /// rule that marks are never overwritten.
    pub fn extends(&self, other: &Board) -> bool {
        self.squares
            .iter()
            .zip(other.squares.iter())
            .all(|(mine, theirs)| *theirs == Square::Empty || mine == theirs)
    }

    /// Canonical wire encoding: nine characters over `X`, `O`, `-`.
    pub fn encode(&self) -> String {
        self.squares.iter().map(|s| s.symbol()).collect()
    }

    /// Formats the board as a grid, numbering empty cells by index.
    pub fn display(&self) -> String {
        let mut result = String::new();
        for row in 0..3 {
            for col in 0..3 {
                let pos = row * 3 + col;
                let symbol = match self.squares[pos] {
                    Square::Empty => pos.to_string(),
                    Square::Occupied(role) => role.to_string(),
                };
                result.push_str(&symbol);
                if col < 2 {
                    result.push('|');
                }
            }
            if row < 2 {
                result.push_str("\n-+-+-\n");
            }
        }
        result
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for Board {
    type Err = BoardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let len = s.chars().count();
        if len != 9 {
            return Err(BoardParseError::WrongLength(len));
        }
        let mut board = Board::new();
        for (index, c) in s.chars().enumerate() {
            board.squares[index] = Square::from_symbol(c)
                .ok_or(BoardParseError::InvalidCharacter { found: c, index })?;
        }
        Ok(board)
    }
}

/// Outcome of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum GameStatus {
    /// Game is ongoing.
    #[display("in progress")]
    InProgress,
    /// Game ended in a win.
    #[display("won by {}", _0)]
    Won(Role),
    /// Game ended in a draw.
    #[display("draw")]
    Draw,
}

impl GameStatus {
    /// True for `Won` and `Draw`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GameStatus::InProgress)
    }
}
