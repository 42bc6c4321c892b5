//! UI-facing handle to a running session.

use super::controller::MoveError;
use super::engine::{SessionCommand, SyncEngine};
use super::events::SessionEvent;
use super::session::MatchSession;
use super::store::AuthoritativeStore;
use crate::config::{ConfigError, SyncConfig};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

/// Sends local actions to a session's engine.
///
/// Cheap to clone; every clone drives the same session. Once the session
/// has been left, every request fails with [`MoveError::SessionClosed`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    /// Places the local mark at cell `index` (0-8, row-major).
    #[instrument(skip(self))]
    pub async fn request_move(&self, index: usize) -> Result<(), MoveError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(SessionCommand::Move { index, reply })
            .map_err(|_| MoveError::SessionClosed)?;
        response.await.map_err(|_| MoveError::SessionClosed)?
    }

    /// Starts a rematch on a new board.
    #[instrument(skip(self))]
    pub async fn request_reset(&self) -> Result<(), MoveError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(SessionCommand::Reset { reply })
            .map_err(|_| MoveError::SessionClosed)?;
        response.await.map_err(|_| MoveError::SessionClosed)?
    }

    /// Stops the session's timers. In-flight remote calls are abandoned.
    #[instrument(skip(self))]
    pub fn leave(&self) {
        if self.commands.send(SessionCommand::Leave).is_err() {
            debug!("Session already stopped");
        }
    }
}

/// A started session: its handle, event stream and engine task.
#[derive(Debug)]
pub struct RunningSession {
    /// Handle for local actions.
    pub handle: SessionHandle,
    /// Board, turn, phase and presence notifications.
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    /// Engine task; finishes after [`SessionHandle::leave`].
    pub task: JoinHandle<()>,
}

/// Validates the session, loads the initial snapshot and starts the
/// engine loop.
///
/// Returns an error without touching the store when the session has no
/// match id or the config is invalid.
#[instrument(skip_all, fields(match_id = %session.match_id(), role = %session.local_role()))]
pub async fn spawn_session<S: AuthoritativeStore + 'static>(
    session: MatchSession,
    config: SyncConfig,
    store: Arc<S>,
) -> Result<RunningSession, ConfigError> {
    let (events_tx, events) = mpsc::unbounded_channel();
    let (mut engine, completions) = SyncEngine::new(session, config, store, events_tx)?;
    engine.load().await;

    let (commands, command_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(engine.run(command_rx, completions));
    info!("Session started");

    Ok(RunningSession {
        handle: SessionHandle { commands },
        events,
        task,
    })
}
