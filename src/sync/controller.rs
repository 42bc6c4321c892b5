//! Local move validation and the single pending-write lock.

use derive_more::Display;
use strictly_tictactoe::{GameState, GameStatus, PlaceError, Position, Role};
use tracing::{debug, info, instrument, warn};

/// Write-lock state of the local player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum ControllerState {
    /// No local write in flight.
    #[default]
    Idle,
    /// A local write has been sent and not yet answered.
    MovePending,
}

/// A local move rejected at the controller boundary.
///
/// Rejections never mutate state or reach the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, derive_more::Error)]
pub enum MoveError {
    /// Index outside 0..=8.
    #[display("Cell index {} is out of bounds (must be 0-8)", _0)]
    OutOfBounds(#[error(not(source))] usize),
    /// The opponent holds the turn.
    #[display("Not your turn")]
    NotMyTurn,
    /// The cell already holds a mark.
    #[display("Cell {} is already occupied", _0)]
    CellOccupied(#[error(not(source))] Position),
    /// The game has an outcome; only a reset is accepted.
    #[display("Game is already over")]
    SessionTerminal,
    /// A local write is still in flight.
    #[display("A move is already pending")]
    MoveAlreadyPending,
    /// The session has been left or is not running.
    #[display("Session is closed")]
    SessionClosed,
}

/// Validates and applies local moves, guarding the pending lock.
#[derive(Debug, Clone)]
pub struct MoveController {
    local_role: Role,
    state: ControllerState,
}

impl MoveController {
    /// Creates an idle controller for `local_role`.
    pub fn new(local_role: Role) -> Self {
        Self {
            local_role,
            state: ControllerState::Idle,
        }
    }

    /// Current lock state.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// True while a local write is in flight.
    pub fn is_pending(&self) -> bool {
        self.state == ControllerState::MovePending
    }

    /// Role of the local player.
    pub fn local_role(&self) -> Role {
        self.local_role
    }

    /// Validates a move against `game` and the lock, then applies it.
    ///
    /// On success the game has been mutated, the controller is
    /// `MovePending`, and the caller must push the new snapshot.
    #[instrument(skip(self, game), fields(role = %self.local_role, move_count = game.move_count()))]
    pub fn submit_local_move(
        &mut self,
        game: &mut GameState,
        index: usize,
    ) -> Result<GameStatus, MoveError> {
        let position = Position::from_index(index).ok_or(MoveError::OutOfBounds(index))?;

        if game.status().is_terminal() {
            debug!("Rejecting move on finished game");
            return Err(MoveError::SessionTerminal);
        }
        if self.is_pending() {
            debug!("Rejecting move while write in flight");
            return Err(MoveError::MoveAlreadyPending);
        }
        if game.turn_owner() != self.local_role {
            debug!(turn_owner = %game.turn_owner(), "Not our turn");
            return Err(MoveError::NotMyTurn);
        }

        let status = game.place(position, self.local_role).map_err(|e| match e {
            PlaceError::SquareOccupied(pos) => MoveError::CellOccupied(pos),
            PlaceError::GameOver => MoveError::SessionTerminal,
        })?;

        self.state = ControllerState::MovePending;
        info!(
            %position,
            move_count = game.move_count(),
            %status,
            "Local move applied"
        );
        Ok(status)
    }

    /// Takes the lock for a local reset.
    #[instrument(skip(self))]
    pub fn begin_reset(&mut self) -> Result<(), MoveError> {
        if self.is_pending() {
            return Err(MoveError::MoveAlreadyPending);
        }
        self.state = ControllerState::MovePending;
        Ok(())
    }

    /// Takes the lock to resend a snapshot the store never received.
    #[instrument(skip(self))]
    pub fn begin_resend(&mut self) -> Result<(), MoveError> {
        if self.is_pending() {
            return Err(MoveError::MoveAlreadyPending);
        }
        self.state = ControllerState::MovePending;
        Ok(())
    }

    /// The store accepted the write.
    #[instrument(skip(self))]
    pub fn on_push_acknowledged(&mut self) {
        debug!("Push acknowledged, releasing lock");
        self.state = ControllerState::Idle;
    }

    /// The write failed; the lock is released so the session cannot wedge.
    #[instrument(skip(self))]
    pub fn on_push_failed(&mut self) {
        warn!("Push failed, releasing lock");
        self.state = ControllerState::Idle;
    }

    /// Drops the lock because a remote outcome overrides the local write.
    pub fn release(&mut self) {
        self.state = ControllerState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strictly_tictactoe::Board;

    fn game(board: &str, turn: Role) -> GameState {
        let board: Board = board.parse().unwrap();
        let count = board.marks() as u32;
        GameState::from_parts(board, turn, count)
    }

    #[test]
    fn test_first_move_center() {
        let mut controller = MoveController::new(Role::X);
        let mut state = GameState::new();
        let status = controller.submit_local_move(&mut state, 4).unwrap();
        assert_eq!(status, GameStatus::InProgress);
        assert_eq!(state.board().encode(), "----X----");
        assert_eq!(state.turn_owner(), Role::O);
        assert_eq!(state.move_count(), 1);
        assert!(controller.is_pending());
    }

    #[test]
    fn test_winning_move_then_terminal() {
        let mut controller = MoveController::new(Role::X);
        let mut state = game("XX-OO----", Role::X);
        let status = controller.submit_local_move(&mut state, 2).unwrap();
        assert_eq!(status, GameStatus::Won(Role::X));
        assert_eq!(state.board().encode(), "XXXOO----");

        controller.on_push_acknowledged();
        for index in 0..9 {
            assert_eq!(
                controller.submit_local_move(&mut state, index),
                Err(MoveError::SessionTerminal)
            );
        }
    }

    #[test]
    fn test_terminal_reported_while_pending() {
        let mut controller = MoveController::new(Role::X);
        let mut state = game("XX-OO----", Role::X);
        controller.submit_local_move(&mut state, 2).unwrap();
        assert!(controller.is_pending());
        assert_eq!(
            controller.submit_local_move(&mut state, 8),
            Err(MoveError::SessionTerminal)
        );
    }

    #[test]
    fn test_pending_rejects_without_mutation() {
        let mut controller = MoveController::new(Role::X);
        let mut state = GameState::new();
        controller.submit_local_move(&mut state, 0).unwrap();
        let before = state;
        for index in 0..9 {
            assert_eq!(
                controller.submit_local_move(&mut state, index),
                Err(MoveError::MoveAlreadyPending)
            );
        }
        assert_eq!(state, before);
    }

    #[test]
    fn test_not_my_turn() {
        let mut controller = MoveController::new(Role::O);
        let mut state = GameState::new();
        assert_eq!(
            controller.submit_local_move(&mut state, 0),
            Err(MoveError::NotMyTurn)
        );
        assert!(!controller.is_pending());
    }

    #[test]
    fn test_cell_occupied() {
        let mut controller = MoveController::new(Role::X);
        let mut state = game("X---O----", Role::X);
        assert_eq!(
            controller.submit_local_move(&mut state, 4),
            Err(MoveError::CellOccupied(Position::Center))
        );
        assert_eq!(state.move_count(), 2);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut controller = MoveController::new(Role::X);
        let mut state = GameState::new();
        assert_eq!(
            controller.submit_local_move(&mut state, 9),
            Err(MoveError::OutOfBounds(9))
        );
    }

    #[test]
    fn test_failed_push_releases_lock() {
        let mut controller = MoveController::new(Role::X);
        let mut state = GameState::new();
        controller.submit_local_move(&mut state, 0).unwrap();
        controller.on_push_failed();
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[test]
    fn test_reset_requires_idle() {
        let mut controller = MoveController::new(Role::X);
        controller.begin_reset().unwrap();
        assert_eq!(controller.begin_reset(), Err(MoveError::MoveAlreadyPending));
        controller.on_push_acknowledged();
        assert!(controller.begin_reset().is_ok());
    }

    #[test]
    fn test_resend_takes_lock_without_touching_game() {
        let mut controller = MoveController::new(Role::X);
        let mut state = GameState::new();
        controller.submit_local_move(&mut state, 4).unwrap();
        assert_eq!(controller.begin_resend(), Err(MoveError::MoveAlreadyPending));
        controller.on_push_failed();

        let before = state;
        controller.begin_resend().unwrap();
        assert!(controller.is_pending());
        assert_eq!(state, before);
    }

    #[test]
    fn test_draw_after_nine_moves() {
        // X O X / X O O / O X X, played alternately by both controllers.
        let order = [0, 1, 2, 4, 3, 5, 7, 6, 8];
        let mut x = MoveController::new(Role::X);
        let mut o = MoveController::new(Role::O);
        let mut state = GameState::new();
        let mut last = GameStatus::InProgress;
        for (i, index) in order.iter().enumerate() {
            let controller = if i % 2 == 0 { &mut x } else { &mut o };
            last = controller.submit_local_move(&mut state, *index).unwrap();
            controller.on_push_acknowledged();
            if i < 8 {
                assert_eq!(last, GameStatus::InProgress, "early end at move {}", i + 1);
            }
        }
        assert_eq!(last, GameStatus::Draw);
        assert_eq!(state.move_count(), 9);
    }
}
