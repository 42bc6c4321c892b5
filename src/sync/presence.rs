//! Opponent liveness estimate from heartbeat ping differences.

use derive_more::Display;
use tracing::{debug, info, instrument};

/// Best guess at the opponent's liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum Presence {
    /// Heartbeats are close together.
    #[default]
    #[display("online")]
    Online,
    /// The opponent's last heartbeat is older than the threshold.
    #[display("possibly offline")]
    PossiblyOffline,
}

/// Tracks heartbeat results; purely observational.
#[derive(Debug, Clone)]
pub struct PresenceMonitor {
    threshold_secs: f64,
    presence: Presence,
}

impl PresenceMonitor {
    /// Creates a monitor that assumes the opponent is online.
    pub fn new(threshold_secs: f64) -> Self {
        Self {
            threshold_secs,
            presence: Presence::Online,
        }
    }

    /// Current estimate.
    pub fn presence(&self) -> Presence {
        self.presence
    }

    /// Records a ping difference; returns the new estimate when it changed.
    #[instrument(skip(self), fields(threshold = self.threshold_secs))]
    pub fn observe(&mut self, ping_difference: f64) -> Option<Presence> {
        let next = if ping_difference.abs() > self.threshold_secs {
            Presence::PossiblyOffline
        } else {
            Presence::Online
        };
        if next == self.presence {
            debug!(%next, "Presence unchanged");
            return None;
        }
        info!(from = %self.presence, to = %next, "Opponent presence changed");
        self.presence = next;
        Some(next)
    }
}
