//! Single-task sync engine: poll, push and reconcile.
//!
//! All mutation of the local game happens inside [`SyncEngine`], driven
//! from one loop. Remote calls run as spawned tasks that report back
//! through a completion channel, so their results are applied on the
//! loop's own turn and never concurrently with a local move.

use super::controller::{MoveController, MoveError};
use super::events::{SessionEvent, SessionPhase};
use super::presence::PresenceMonitor;
use super::reconcile::{Reconciliation, StoreView, reconcile};
use super::session::MatchSession;
use super::store::{AuthoritativeStore, StoreError};
use super::wire::{MatchStateData, ResetMatchState, UpdateMatchState};
use crate::config::{ConfigError, SyncConfig};
use std::sync::Arc;
use strictly_tictactoe::{GameState, GameStatus};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, instrument, warn};

/// A local write sent to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteKind {
    /// Snapshot push after a local move.
    Move {
        /// Move counter carried by the push.
        move_count: u32,
    },
    /// Match reset for a rematch.
    Reset,
}

/// Result of a remote call, delivered back to the engine loop.
#[derive(Debug)]
pub(crate) enum Completion {
    /// A poll finished.
    Poll {
        seq: u64,
        result: Result<MatchStateData, StoreError>,
    },
    /// A write finished.
    Write {
        id: u64,
        kind: WriteKind,
        result: Result<(), StoreError>,
    },
    /// A heartbeat finished.
    Heartbeat { result: Result<f64, StoreError> },
}

/// Calls from the UI into the engine.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    /// Place a mark at a cell index.
    Move {
        index: usize,
        reply: oneshot::Sender<Result<(), MoveError>>,
    },
    /// Reset the match for a rematch.
    Reset {
        reply: oneshot::Sender<Result<(), MoveError>>,
    },
    /// Leave the match.
    Leave,
}

/// Reconciliation engine for one match.
pub(crate) struct SyncEngine<S: AuthoritativeStore + 'static> {
    session: MatchSession,
    config: SyncConfig,
    store: Arc<S>,
    game: GameState,
    controller: MoveController,
    presence: PresenceMonitor,
    phase: SessionPhase,
    next_poll_seq: u64,
    poll_fence: u64,
    next_write_id: u64,
    pending_write: Option<u64>,
    store_lagging: bool,
    events: mpsc::UnboundedSender<SessionEvent>,
    completions: mpsc::UnboundedSender<Completion>,
}

impl<S: AuthoritativeStore + 'static> SyncEngine<S> {
    /// Creates an engine; fails on an invalid session or config.
    #[instrument(skip_all, fields(match_id = %session.match_id(), role = %session.local_role()))]
    pub(crate) fn new(
        session: MatchSession,
        config: SyncConfig,
        store: Arc<S>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Completion>), ConfigError> {
        session.validate()?;
        config.validate()?;

        let (completions, completion_rx) = mpsc::unbounded_channel();
        let engine = Self {
            controller: MoveController::new(*session.local_role()),
            presence: PresenceMonitor::new(*config.offline_threshold_secs()),
            session,
            config,
            store,
            game: GameState::new(),
            phase: SessionPhase::NotStarted,
            next_poll_seq: 0,
            poll_fence: 0,
            next_write_id: 0,
            pending_write: None,
            store_lagging: false,
            events,
            completions,
        };
        Ok((engine, completion_rx))
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase == phase {
            return;
        }
        info!(from = %self.phase, to = %phase, "Session phase changed");
        self.phase = phase;
        self.emit(SessionEvent::PhaseChanged(phase));
    }

    /// Reports board and turn differences against `before`.
    fn emit_changes(&self, before: &GameState) {
        if before.board() != self.game.board() {
            self.emit(SessionEvent::BoardChanged(*self.game.board()));
        }
        if before.turn_owner() != self.game.turn_owner() {
            self.emit(SessionEvent::TurnChanged(self.game.turn_owner()));
        }
    }

    /// Polls issued before this point may have read the store before our
    /// last write, or belong to a superseded game.
    fn raise_fence(&mut self) {
        self.poll_fence = self.next_poll_seq;
    }

    fn enter_terminal(&mut self) {
        self.raise_fence();
        self.set_phase(SessionPhase::Terminal);
        let status = self.game.status();
        info!(%status, move_count = self.game.move_count(), "Game over");
        self.emit(SessionEvent::Terminal(status));
    }

    fn is_running(&self) -> bool {
        matches!(self.phase, SessionPhase::Active | SessionPhase::Terminal)
    }

    /// Fetches the initial snapshot and decides between a fresh start and
    /// resuming the stored game.
    #[instrument(skip(self), fields(match_id = %self.session.match_id()))]
    pub(crate) async fn load(&mut self) {
        self.set_phase(SessionPhase::Loading);

        let snapshot = self
            .store
            .get_match_state(self.session.match_id())
            .await
            .and_then(|data| data.to_snapshot());

        match snapshot {
            Ok(snapshot) if snapshot.status().is_terminal() => {
                info!(status = %snapshot.status(), "Previous game ended, resetting board");
                self.set_phase(SessionPhase::Fresh);
                self.game = GameState::new();
                if let Err(e) = self.controller.begin_reset() {
                    warn!(error = %e, "Could not take lock for reset");
                } else {
                    self.dispatch_reset();
                }
            }
            Ok(snapshot) if !snapshot.is_blank() => {
                info!(
                    board = %snapshot.state.board().encode(),
                    turn = %snapshot.state.turn_owner(),
                    move_count = snapshot.state.move_count(),
                    "Resuming stored game"
                );
                if let Some(roles) = &snapshot.roles
                    && *roles != self.session.role_assignment()
                {
                    warn!(
                        stored_x = %roles.player_x(),
                        stored_o = %roles.player_o(),
                        "Stored game was started by other players"
                    );
                }
                self.set_phase(SessionPhase::Resuming);
                self.game = snapshot.state;
            }
            Ok(_) => {
                info!("No stored game, starting fresh");
                self.set_phase(SessionPhase::Fresh);
                self.game = GameState::new();
            }
            Err(e) => {
                warn!(error = %e, "Error fetching state, starting fresh");
                self.set_phase(SessionPhase::Fresh);
                self.game = GameState::new();
                self.emit(SessionEvent::SyncFailed(e));
            }
        }

        self.emit(SessionEvent::BoardChanged(*self.game.board()));
        self.emit(SessionEvent::TurnChanged(self.game.turn_owner()));
        self.set_phase(SessionPhase::Active);
    }

    /// Applies a local move and pushes the new snapshot.
    #[instrument(skip(self), fields(role = %self.session.local_role()))]
    pub(crate) fn submit_local_move(&mut self, index: usize) -> Result<(), MoveError> {
        if !self.is_running() {
            return Err(MoveError::SessionClosed);
        }

        let before = self.game;
        let status = self.controller.submit_local_move(&mut self.game, index)?;
        self.emit_changes(&before);

        let roles = (self.game.move_count() == 1).then(|| self.session.role_assignment());
        let request = UpdateMatchState::from_state(self.session.match_id(), &self.game, roles);
        self.dispatch_update(request);

        if status.is_terminal() {
            self.enter_terminal();
        }
        Ok(())
    }

    /// Starts a new game locally and resets the store.
    #[instrument(skip(self), fields(role = %self.session.local_role()))]
    pub(crate) fn request_reset(&mut self) -> Result<(), MoveError> {
        if !self.is_running() {
            return Err(MoveError::SessionClosed);
        }
        self.controller.begin_reset()?;

        info!("Restarting game");
        let before = self.game;
        self.game = GameState::new();
        self.store_lagging = false;
        self.set_phase(SessionPhase::Fresh);
        self.emit_changes(&before);
        self.dispatch_reset();
        self.set_phase(SessionPhase::Active);
        Ok(())
    }

    /// Whether a poll tick should query the store.
    ///
    /// Skipped while a write is in flight, and while it is our own move in
    /// a running game since nothing remote can change until we play.
    pub(crate) fn should_poll(&self) -> bool {
        if !self.is_running() || self.controller.is_pending() {
            return false;
        }
        let our_move = self.game.turn_owner() == *self.session.local_role()
            && self.game.status() == GameStatus::InProgress;
        !our_move
    }

    /// Poll timer fired.
    pub(crate) fn poll_tick(&mut self) {
        if !self.should_poll() {
            debug!(
                pending = self.controller.is_pending(),
                turn = %self.game.turn_owner(),
                "Skipping poll"
            );
            return;
        }
        self.dispatch_poll();
    }

    /// Heartbeat timer fired.
    pub(crate) fn heartbeat_tick(&mut self) {
        if self.is_running() {
            self.dispatch_heartbeat();
        }
    }

    fn dispatch_poll(&mut self) {
        let seq = self.next_poll_seq;
        self.next_poll_seq += 1;
        debug!(seq, "Polling store");

        let store = Arc::clone(&self.store);
        let completions = self.completions.clone();
        let match_id = self.session.match_id().clone();
        tokio::spawn(async move {
            let result = store.get_match_state(&match_id).await;
            if completions.send(Completion::Poll { seq, result }).is_err() {
                debug!(seq, "Engine gone before poll completed");
            }
        });
    }

    fn next_write(&mut self) -> u64 {
        let id = self.next_write_id;
        self.next_write_id += 1;
        self.pending_write = Some(id);
        id
    }

    fn dispatch_update(&mut self, request: UpdateMatchState) {
        self.raise_fence();
        let id = self.next_write();
        let kind = WriteKind::Move {
            move_count: request.turn_count,
        };
        debug!(id, move_count = request.turn_count, "Pushing snapshot");

        let store = Arc::clone(&self.store);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = store.update_match_state(request).await;
            if completions.send(Completion::Write { id, kind, result }).is_err() {
                debug!(id, "Engine gone before push completed");
            }
        });
    }

    fn dispatch_reset(&mut self) {
        self.raise_fence();
        let id = self.next_write();
        let request = ResetMatchState::new(self.session.match_id(), self.session.role_assignment());
        debug!(id, "Resetting match");

        let store = Arc::clone(&self.store);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = store.reset_match_state(request).await;
            let kind = WriteKind::Reset;
            if completions.send(Completion::Write { id, kind, result }).is_err() {
                debug!(id, "Engine gone before reset completed");
            }
        });
    }

    fn dispatch_heartbeat(&self) {
        let store = Arc::clone(&self.store);
        let completions = self.completions.clone();
        let match_id = self.session.match_id().clone();
        let role = *self.session.local_role();
        tokio::spawn(async move {
            let result = store.heartbeat(&match_id, role).await;
            if completions.send(Completion::Heartbeat { result }).is_err() {
                debug!("Engine gone before heartbeat completed");
            }
        });
    }

    /// Applies a remote call's result.
    pub(crate) fn handle_completion(&mut self, completion: Completion) {
        if self.phase == SessionPhase::Closed {
            debug!(?completion, "Ignoring completion after close");
            return;
        }
        match completion {
            Completion::Poll { seq, result } => self.on_poll_completed(seq, result),
            Completion::Write { id, kind, result } => self.on_write_completed(id, kind, result),
            Completion::Heartbeat { result } => self.on_heartbeat_completed(result),
        }
    }

    #[instrument(skip(self, result), fields(local = self.game.move_count()))]
    fn on_poll_completed(&mut self, seq: u64, result: Result<MatchStateData, StoreError>) {
        if seq < self.poll_fence {
            debug!(fence = self.poll_fence, "Dropping poll issued before a newer write or poll");
            return;
        }
        self.poll_fence = seq + 1;

        let snapshot = match result.and_then(|data| data.to_snapshot()) {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_malformed() => {
                warn!(error = %e, "Malformed snapshot, keeping local state");
                self.emit(SessionEvent::SyncFailed(e));
                return;
            }
            Err(e) => {
                warn!(error = %e, "Error fetching state");
                self.emit(SessionEvent::SyncFailed(e));
                return;
            }
        };

        let view = if self.store_lagging {
            StoreView::Lagging
        } else {
            StoreView::Current
        };
        let decision = reconcile(&self.game, &snapshot.state, view);
        debug!(?decision, remote = snapshot.state.move_count(), "Reconciled snapshot");
        if decision != Reconciliation::Stale {
            self.store_lagging = false;
        }
        if !decision.replaces_local() {
            if decision == Reconciliation::Stale
                && view == StoreView::Lagging
                && snapshot.state.move_count() < self.game.move_count()
            {
                self.resend();
            }
            return;
        }

        let before = self.game;
        self.game = snapshot.state;
        match decision {
            Reconciliation::AdoptTerminal => {
                if self.controller.is_pending() {
                    info!("Remote outcome overrides pending local write");
                }
                self.controller.release();
                self.pending_write = None;
                self.emit_changes(&before);
                self.enter_terminal();
            }
            Reconciliation::Rematch => {
                info!(remote = snapshot.state.move_count(), "Opponent started a new game");
                self.controller.release();
                self.pending_write = None;
                self.raise_fence();
                self.set_phase(SessionPhase::Fresh);
                self.emit_changes(&before);
                self.set_phase(SessionPhase::Active);
            }
            Reconciliation::Adopt => {
                info!(
                    board = %self.game.board().encode(),
                    move_count = self.game.move_count(),
                    "Adopted remote snapshot"
                );
                self.emit_changes(&before);
            }
            Reconciliation::Unchanged | Reconciliation::Stale => {}
        }
    }

    /// Pushes the local game again after the store missed our last move.
    #[instrument(skip(self), fields(move_count = self.game.move_count()))]
    fn resend(&mut self) {
        if let Err(e) = self.controller.begin_resend() {
            debug!(error = %e, "Write in flight, not resending");
            return;
        }
        info!(board = %self.game.board().encode(), "Store is missing our move, resending");
        let roles = (self.game.move_count() == 1).then(|| self.session.role_assignment());
        let request = UpdateMatchState::from_state(self.session.match_id(), &self.game, roles);
        self.dispatch_update(request);
    }

    #[instrument(skip(self, result))]
    fn on_write_completed(&mut self, id: u64, kind: WriteKind, result: Result<(), StoreError>) {
        let current = self.pending_write == Some(id);
        match result {
            Ok(()) => {
                if let WriteKind::Move { .. } = kind {
                    self.store_lagging = false;
                }
                if current {
                    self.pending_write = None;
                    self.controller.on_push_acknowledged();
                }
            }
            Err(e) => {
                warn!(error = %e, "Write failed");
                if let WriteKind::Move { move_count } = kind {
                    warn!(move_count, "Store is behind the local game");
                    self.store_lagging = true;
                }
                if current {
                    self.pending_write = None;
                    self.controller.on_push_failed();
                }
                self.emit(SessionEvent::SyncFailed(e));
            }
        }
        if !current {
            debug!("Completion of a superseded write");
        }
    }

    fn on_heartbeat_completed(&mut self, result: Result<f64, StoreError>) {
        match result {
            Ok(ping_difference) => {
                if let Some(presence) = self.presence.observe(ping_difference) {
                    self.emit(SessionEvent::OpponentPresence(presence));
                }
            }
            Err(e) => {
                warn!(error = %e, "Heartbeat failed");
            }
        }
    }

    /// Stops the session; further commands fail with `SessionClosed`.
    #[instrument(skip(self))]
    pub(crate) fn leave(&mut self) {
        info!("Leaving match");
        self.set_phase(SessionPhase::Closed);
    }

    /// Runs the loop until the session is left or every handle is dropped.
    #[instrument(skip_all, fields(match_id = %self.session.match_id(), role = %self.session.local_role()))]
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        let poll_period = self.config.poll_interval();
        let heartbeat_period = self.config.heartbeat_interval();
        let mut poll = interval_at(Instant::now() + poll_period, poll_period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut heartbeat = interval_at(Instant::now() + heartbeat_period, heartbeat_period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(?poll_period, ?heartbeat_period, "Starting sync loop");
        loop {
            tokio::select! {
                biased;
                Some(completion) = completions.recv() => self.handle_completion(completion),
                command = commands.recv() => match command {
                    Some(SessionCommand::Move { index, reply }) => {
                        let result = self.submit_local_move(index);
                        if let Err(e) = &result {
                            debug!(index, error = %e, "Move rejected");
                        }
                        let _ = reply.send(result);
                    }
                    Some(SessionCommand::Reset { reply }) => {
                        let _ = reply.send(self.request_reset());
                    }
                    Some(SessionCommand::Leave) | None => {
                        self.leave();
                        break;
                    }
                },
                _ = poll.tick() => self.poll_tick(),
                _ = heartbeat.tick() => self.heartbeat_tick(),
            }
        }
        info!("Sync loop stopped");
    }
}
