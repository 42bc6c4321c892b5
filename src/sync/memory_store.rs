//! In-process match store for tests and local play.

use super::session::RoleAssignment;
use super::store::{AuthoritativeStore, StoreError, StoreErrorKind};
use super::wire::{MatchStateData, ResetMatchState, UpdateMatchState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use strictly_tictactoe::{Board, GameState, Role};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Default)]
struct StoredMatch {
    state: GameState,
    roles: Option<RoleAssignment>,
    raw: Option<MatchStateData>,
    last_active_x: Option<Instant>,
    last_active_o: Option<Instant>,
    updates: Vec<UpdateMatchState>,
    resets: Vec<ResetMatchState>,
}

#[derive(Debug)]
struct Inner {
    matches: HashMap<String, StoredMatch>,
    available: bool,
    failing_updates: u32,
    get_calls: u64,
}

/// Shared in-memory store.
///
/// Writes overwrite unconditionally, like the hosted store. Clones share
/// the same matches, so two sessions can play against one instance.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Creates an empty, reachable store.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating in-memory match store");
        Self {
            inner: Arc::new(Mutex::new(Inner {
                matches: HashMap::new(),
                available: true,
                failing_updates: 0,
                get_calls: 0,
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::new(StoreErrorKind::Unavailable, "Store lock poisoned"))
    }

    fn reachable(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        let inner = self.lock()?;
        if !inner.available {
            return Err(StoreError::new(StoreErrorKind::Unavailable, "Store offline"));
        }
        Ok(inner)
    }

    /// Makes every call fail (`false`) or succeed again (`true`).
    pub fn set_available(&self, available: bool) {
        if let Ok(mut inner) = self.lock() {
            inner.available = available;
        }
    }

    /// Fails the next `count` update calls with a transport error.
    pub fn fail_next_updates(&self, count: u32) {
        if let Ok(mut inner) = self.lock() {
            inner.failing_updates = count;
        }
    }

    /// Seeds a match with a stored game.
    pub fn insert_state(&self, match_id: &str, state: GameState) {
        if let Ok(mut inner) = self.lock() {
            let entry = inner.matches.entry(match_id.to_string()).or_default();
            entry.state = state;
            entry.raw = None;
        }
    }

    /// Serves `data` verbatim from `get_match_state` until the next write.
    pub fn put_raw(&self, match_id: &str, data: MatchStateData) {
        if let Ok(mut inner) = self.lock() {
            inner.matches.entry(match_id.to_string()).or_default().raw = Some(data);
        }
    }

    /// Stored game of a match.
    pub fn state(&self, match_id: &str) -> Option<GameState> {
        self.lock().ok()?.matches.get(match_id).map(|m| m.state)
    }

    /// Participants recorded for a match.
    pub fn roles(&self, match_id: &str) -> Option<RoleAssignment> {
        self.lock().ok()?.matches.get(match_id)?.roles.clone()
    }

    /// Every accepted update of a match, oldest first.
    pub fn updates(&self, match_id: &str) -> Vec<UpdateMatchState> {
        self.lock()
            .ok()
            .and_then(|inner| inner.matches.get(match_id).map(|m| m.updates.clone()))
            .unwrap_or_default()
    }

    /// Every accepted reset of a match, oldest first.
    pub fn resets(&self, match_id: &str) -> Vec<ResetMatchState> {
        self.lock()
            .ok()
            .and_then(|inner| inner.matches.get(match_id).map(|m| m.resets.clone()))
            .unwrap_or_default()
    }

    /// Number of `get_match_state` calls received, including failed ones.
    pub fn get_calls(&self) -> u64 {
        self.lock().map(|inner| inner.get_calls).unwrap_or_default()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AuthoritativeStore for MemoryStore {
    #[instrument(skip(self))]
    async fn get_match_state(&self, match_id: &str) -> Result<MatchStateData, StoreError> {
        if let Ok(mut inner) = self.lock() {
            inner.get_calls += 1;
        }
        let inner = self.reachable()?;
        let data = match inner.matches.get(match_id) {
            Some(stored) => match &stored.raw {
                Some(raw) => raw.clone(),
                None => MatchStateData::from_state(&stored.state, stored.roles.as_ref()),
            },
            None => MatchStateData::default(),
        };
        debug!(board = %data.board_state, "Served match state");
        Ok(data)
    }

    #[instrument(skip(self, request), fields(match_id = %request.match_id, turn_count = request.turn_count))]
    async fn update_match_state(&self, request: UpdateMatchState) -> Result<(), StoreError> {
        let mut inner = self.reachable()?;
        if inner.failing_updates > 0 {
            inner.failing_updates -= 1;
            warn!("Injected update failure");
            return Err(StoreError::transport("Injected update failure"));
        }

        let board: Board = request
            .board_state
            .parse()
            .map_err(|e| StoreError::new(StoreErrorKind::Rejected, format!("{}", e)))?;
        let turn = Role::from_wire(&request.turn).ok_or_else(|| {
            StoreError::new(StoreErrorKind::Rejected, format!("Invalid turn {:?}", request.turn))
        })?;

        let stored = inner.matches.entry(request.match_id.clone()).or_default();
        stored.state = GameState::from_parts(board, turn, request.turn_count);
        stored.raw = None;
        if let (Some(x), Some(o)) = (&request.player_x, &request.player_o) {
            stored.roles = Some(RoleAssignment::new(x.clone(), o.clone()));
        }
        stored.updates.push(request);
        debug!("Match state overwritten");
        Ok(())
    }

    #[instrument(skip(self, request), fields(match_id = %request.match_id))]
    async fn reset_match_state(&self, request: ResetMatchState) -> Result<(), StoreError> {
        let mut inner = self.reachable()?;
        let stored = inner.matches.entry(request.match_id.clone()).or_default();
        stored.state = GameState::new();
        stored.raw = None;
        stored.roles = Some(RoleAssignment::new(
            request.player_x.clone(),
            request.player_o.clone(),
        ));
        stored.resets.push(request);
        info!("Match reset");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn heartbeat(&self, match_id: &str, role: Role) -> Result<f64, StoreError> {
        let mut inner = self.reachable()?;
        let now = Instant::now();
        let stored = inner.matches.entry(match_id.to_string()).or_default();
        let other = match role {
            Role::X => {
                stored.last_active_x = Some(now);
                stored.last_active_o
            }
            Role::O => {
                stored.last_active_o = Some(now);
                stored.last_active_x
            }
        };
        let difference = other
            .map(|seen| now.duration_since(seen).as_secs_f64())
            .unwrap_or(0.0);
        debug!(difference, "Heartbeat recorded");
        Ok(difference)
    }
}
