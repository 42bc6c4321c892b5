//! Logical-clock merge of a remote snapshot into local state.

use strictly_tictactoe::GameState;
use tracing::{debug, instrument, warn};

/// What to do with a remote snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Remote equals local; nothing to do.
    Unchanged,
    /// Remote carries an outcome; adopt it and drop any pending write.
    AdoptTerminal,
    /// Remote is ahead on the move clock; adopt it.
    Adopt,
    /// The store holds a different game from ours: the opponent reset the
    /// match, after our game ended or in the middle of it.
    Rematch,
    /// Remote is behind or equal; local state stays authoritative.
    Stale,
}

impl Reconciliation {
    /// True when local state should be replaced by the remote one.
    pub fn replaces_local(self) -> bool {
        matches!(
            self,
            Reconciliation::AdoptTerminal | Reconciliation::Adopt | Reconciliation::Rematch
        )
    }
}

/// How a remote snapshot relates to our own writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreView {
    /// The snapshot may predate our last write (redelivered or reordered).
    Unordered,
    /// The snapshot was read after our last write landed.
    Current,
    /// Our last move push failed; the store may be missing that move.
    Lagging,
}

/// Decides how `remote` merges into `local`.
///
/// - a terminal remote always wins, whatever the clocks say;
/// - a higher remote move count wins over an unfinished local game;
/// - a remote that is behind or equal keeps the local state, unless it
///   cannot be an older view of our game: under [`StoreView::Current`]
///   the store went back, and under [`StoreView::Lagging`] its board is
///   not a prefix of ours. Both mean the opponent reset the match.
///
/// Pure: applying the result and reconciling the same snapshot again
/// always yields [`Reconciliation::Unchanged`] or [`Reconciliation::Stale`].
#[instrument(skip_all, fields(local = local.move_count(), remote = remote.move_count(), ?view))]
pub fn reconcile(local: &GameState, remote: &GameState, view: StoreView) -> Reconciliation {
    if local == remote {
        return Reconciliation::Unchanged;
    }

    let remote_status = remote.status();
    if remote_status.is_terminal() {
        debug!(%remote_status, "Remote outcome overrides local state");
        return Reconciliation::AdoptTerminal;
    }

    let older_view = remote.move_count() < local.move_count()
        && local.board().extends(remote.board());

    if local.status().is_terminal() {
        if view != StoreView::Current && older_view {
            debug!("Store has not caught up with our finished game");
            return Reconciliation::Stale;
        }
        return Reconciliation::Rematch;
    }

    if remote.move_count() > local.move_count() {
        if !remote.board().extends(local.board()) {
            warn!(
                local = %local.board().encode(),
                remote = %remote.board().encode(),
                "Adopting remote snapshot that rewrites local cells"
            );
        }
        return Reconciliation::Adopt;
    }

    match view {
        StoreView::Current => {
            debug!(remote = %remote.board().encode(), "Store went back, new game started");
            Reconciliation::Rematch
        }
        StoreView::Lagging if !older_view => {
            debug!(remote = %remote.board().encode(), "Store holds a different game");
            Reconciliation::Rematch
        }
        StoreView::Lagging | StoreView::Unordered => Reconciliation::Stale,
    }
}
