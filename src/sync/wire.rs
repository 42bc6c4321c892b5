//! Wire types exchanged with the match store.
//!
//! Field names follow the store's cloud functions. Responses are parsed
//! leniently (every field optional) and then validated into a
//! [`RemoteSnapshot`]; a board, turn or counter that cannot describe a
//! real game is a malformed snapshot.

use super::session::RoleAssignment;
use super::store::StoreError;
use serde::{Deserialize, Serialize};
use strictly_tictactoe::{Board, GameState, GameStatus, Role, rules};
use tracing::{debug, instrument, warn};

/// Winner field value for a drawn game.
pub const DRAW_WINNER: &str = "draw";

/// `turnCount` as sent by the store: an int-string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnCount {
    /// JSON number.
    Number(u32),
    /// Decimal string, possibly empty.
    Text(String),
}

impl Default for TurnCount {
    fn default() -> Self {
        TurnCount::Text(String::new())
    }
}

impl TurnCount {
    fn parse(&self) -> Result<u32, StoreError> {
        match self {
            TurnCount::Number(n) => Ok(*n),
            TurnCount::Text(s) if s.trim().is_empty() => Ok(0),
            TurnCount::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| StoreError::malformed(format!("Invalid turnCount {:?}", s))),
        }
    }
}

/// `getMatchState` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchStateData {
    /// Nine-character board, or empty before the first move.
    #[serde(rename = "boardState", default)]
    pub board_state: String,
    /// `"X"` or `"O"`.
    #[serde(default)]
    pub turn: String,
    /// Number of moves played.
    #[serde(rename = "turnCount", default)]
    pub turn_count: TurnCount,
    /// `""`, `"X"`, `"O"` or `"draw"`.
    #[serde(default)]
    pub winner: String,
    /// Participant recorded as X.
    #[serde(rename = "playerX", default)]
    pub player_x: String,
    /// Participant recorded as O.
    #[serde(rename = "playerO", default)]
    pub player_o: String,
    /// Last heartbeat of X, as reported by the store.
    #[serde(rename = "playerXlastActive", default)]
    pub player_x_last_active: String,
    /// Last heartbeat of O, as reported by the store.
    #[serde(rename = "playerOlastActive", default)]
    pub player_o_last_active: String,
}

/// `getMatchState` function result: `{message, data}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchStateResponse {
    /// Informational message from the store.
    #[serde(default)]
    pub message: String,
    /// Match payload; absent when the store has no record.
    #[serde(default)]
    pub data: Option<MatchStateData>,
}

/// `getMatchState` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetMatchState {
    /// Match to read.
    #[serde(rename = "matchId")]
    pub match_id: String,
}

/// `updateMatchState` request: full snapshot, unconditional overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMatchState {
    /// Match to write.
    #[serde(rename = "matchId")]
    pub match_id: String,
    /// Nine-character board.
    #[serde(rename = "boardState")]
    pub board_state: String,
    /// Role to move next.
    pub turn: String,
    /// Move counter.
    #[serde(rename = "turnCount")]
    pub turn_count: u32,
    /// Participant playing X, on a match's first move.
    #[serde(rename = "playerX", default, skip_serializing_if = "Option::is_none")]
    pub player_x: Option<String>,
    /// Participant playing O, on a match's first move.
    #[serde(rename = "playerO", default, skip_serializing_if = "Option::is_none")]
    pub player_o: Option<String>,
}

impl UpdateMatchState {
    /// Builds the push for `state`, attaching roles when given.
    #[instrument(skip(state, roles), fields(move_count = state.move_count()))]
    pub fn from_state(
        match_id: &str,
        state: &GameState,
        roles: Option<RoleAssignment>,
    ) -> Self {
        let (player_x, player_o) = match roles {
            Some(roles) => (Some(roles.player_x().clone()), Some(roles.player_o().clone())),
            None => (None, None),
        };
        Self {
            match_id: match_id.to_string(),
            board_state: state.board().encode(),
            turn: state.turn_owner().to_string(),
            turn_count: state.move_count(),
            player_x,
            player_o,
        }
    }
}

/// `resetMatchState` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetMatchState {
    /// Match to reset.
    #[serde(rename = "matchId")]
    pub match_id: String,
    /// Participant playing X.
    #[serde(rename = "playerX")]
    pub player_x: String,
    /// Participant playing O.
    #[serde(rename = "playerO")]
    pub player_o: String,
}

impl ResetMatchState {
    /// Builds a reset for `match_id`.
    pub fn new(match_id: &str, roles: RoleAssignment) -> Self {
        Self {
            match_id: match_id.to_string(),
            player_x: roles.player_x().clone(),
            player_o: roles.player_o().clone(),
        }
    }
}

/// `heartbeat` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    /// Match the heartbeat belongs to.
    #[serde(rename = "matchId")]
    pub match_id: String,
    /// Role sending the heartbeat.
    pub role: String,
}

/// `heartbeat` response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    /// Seconds between this heartbeat and the opponent's last one.
    #[serde(rename = "pingDifference")]
    pub ping_difference: f64,
}

/// A validated remote view of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSnapshot {
    /// Board, turn and counter as stored.
    pub state: GameState,
    /// Recorded participants, when the store knows them.
    pub roles: Option<RoleAssignment>,
}

impl RemoteSnapshot {
    /// Outcome declared by the snapshot.
    pub fn status(&self) -> GameStatus {
        self.state.status()
    }

    /// True when the store holds no moves and no outcome.
    pub fn is_blank(&self) -> bool {
        self.state.move_count() == 0
    }
}

impl MatchStateData {
    /// Encodes a game as the store would report it.
    pub fn from_state(state: &GameState, roles: Option<&RoleAssignment>) -> Self {
        let winner = match state.status() {
            GameStatus::InProgress => String::new(),
            GameStatus::Won(role) => role.to_string(),
            GameStatus::Draw => DRAW_WINNER.to_string(),
        };
        Self {
            board_state: state.board().encode(),
            turn: state.turn_owner().to_string(),
            turn_count: TurnCount::Text(state.move_count().to_string()),
            winner,
            player_x: roles.map(|r| r.player_x().clone()).unwrap_or_default(),
            player_o: roles.map(|r| r.player_o().clone()).unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Parses and validates the payload.
    ///
    /// The board must be reachable under alternating turns with X first,
    /// and the counter must equal the number of marks. The outcome always
    /// comes from the board; a declared winner that disagrees is logged.
    #[instrument(skip(self), fields(board = %self.board_state, turn_count = ?self.turn_count, winner = %self.winner))]
    pub fn to_snapshot(&self) -> Result<RemoteSnapshot, StoreError> {
        let board = if self.board_state.is_empty() {
            Board::new()
        } else {
            self.board_state
                .parse::<Board>()
                .map_err(|e| StoreError::malformed(e.to_string()))?
        };

        let move_count = self.turn_count.parse()?;
        let xs = board.count(Role::X);
        let os = board.count(Role::O);
        if xs < os || xs - os > 1 {
            return Err(StoreError::malformed(format!(
                "Unreachable board {} ({} X, {} O)",
                board.encode(),
                xs,
                os
            )));
        }
        if move_count as usize != xs + os {
            return Err(StoreError::malformed(format!(
                "turnCount {} does not match {} marks",
                move_count,
                xs + os
            )));
        }

        let status = rules::evaluate(&board);
        let declared = match self.winner.as_str() {
            "" => Some(GameStatus::InProgress),
            DRAW_WINNER => Some(GameStatus::Draw),
            other => Role::from_wire(other).map(GameStatus::Won),
        };
        if declared != Some(status) {
            warn!(
                declared = %self.winner,
                %status,
                "Stored winner disagrees with board, using board"
            );
        }

        let parity_turn = if xs == os { Role::X } else { Role::O };
        let turn = if self.turn.is_empty() {
            parity_turn
        } else {
            Role::from_wire(&self.turn)
                .ok_or_else(|| StoreError::malformed(format!("Invalid turn {:?}", self.turn)))?
        };
        if !status.is_terminal() && turn != parity_turn {
            return Err(StoreError::malformed(format!(
                "Turn {} does not match board {}",
                turn,
                board.encode()
            )));
        }

        let roles = if self.player_x.is_empty() || self.player_o.is_empty() {
            None
        } else {
            Some(RoleAssignment::new(self.player_x.clone(), self.player_o.clone()))
        };

        debug!(move_count, %status, "Parsed remote snapshot");
        Ok(RemoteSnapshot {
            state: GameState::from_parts(board, turn, move_count),
            roles,
        })
    }
}
