//! Match identity supplied by matchmaking.

use crate::config::ConfigError;
use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};
use strictly_tictactoe::Role;
use tracing::{error, instrument};

/// Identity of one participant's view of a match.
///
/// Built once from the matchmaking result and handed to the engine; it
/// never changes for the lifetime of the session.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct MatchSession {
    /// Match id shared by both participants' devices.
    match_id: String,
    /// Role this device plays.
    local_role: Role,
    /// Participant id of this device's player.
    local_participant_id: String,
    /// Participant id of the opponent.
    remote_participant_id: String,
}

impl MatchSession {
    /// Creates a validated session.
    ///
    /// Fails when any id is empty; the engine must not start without a
    /// match id.
    #[instrument(skip_all, fields(match_id = %match_id, role = %local_role))]
    pub fn new(
        match_id: String,
        local_role: Role,
        local_participant_id: String,
        remote_participant_id: String,
    ) -> Result<Self, ConfigError> {
        let session = Self {
            match_id,
            local_role,
            local_participant_id,
            remote_participant_id,
        };
        session.validate()?;
        Ok(session)
    }

    /// Checks that every id is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.match_id.trim().is_empty() {
            error!("Match ID is missing");
            return Err(ConfigError::new("Match ID is missing".to_string()));
        }
        if self.local_participant_id.trim().is_empty() {
            return Err(ConfigError::new("Local participant ID is missing".to_string()));
        }
        if self.remote_participant_id.trim().is_empty() {
            return Err(ConfigError::new("Remote participant ID is missing".to_string()));
        }
        Ok(())
    }

    /// Participant ids keyed by role, for the store's records.
    pub fn role_assignment(&self) -> RoleAssignment {
        let local = self.local_participant_id.clone();
        let remote = self.remote_participant_id.clone();
        match self.local_role {
            Role::X => RoleAssignment::new(local, remote),
            Role::O => RoleAssignment::new(remote, local),
        }
    }
}

/// Which participant plays which role.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize, new)]
pub struct RoleAssignment {
    /// Participant playing X.
    player_x: String,
    /// Participant playing O.
    player_o: String,
}
