//! Fan-out of committed state to every attached connection.

use crate::connection::ConnectionHandle;
use crate::protocol::StateSnapshot;
use gridduel_rules::{GameState, Player};
use tokio::sync::watch;
use tracing::{error, instrument, trace, warn};

/// Delivery counts for one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Connections the snapshot was queued for.
    pub delivered: usize,
    /// Connections that were already gone.
    pub failed: usize,
}

/// Pushes every committed [`GameState`] to connections and observers.
///
/// Delivery is fire-and-forget: a dead connection is logged and skipped,
/// and is reaped later through its own disconnect.
#[derive(Debug)]
pub struct StatePublisher {
    observers: watch::Sender<GameState>,
}

impl StatePublisher {
    /// Creates a publisher seeded with the initial state.
    pub fn new(initial: GameState) -> Self {
        let (observers, _) = watch::channel(initial);
        Self { observers }
    }

    /// Subscribes an in-process observer to committed states.
    pub fn subscribe(&self) -> watch::Receiver<GameState> {
        self.observers.subscribe()
    }

    /// Serializes `state` once and queues it for every connection.
    #[instrument(skip_all)]
    pub fn publish<'a>(
        &self,
        state: &GameState,
        connections: impl IntoIterator<Item = (Player, &'a ConnectionHandle)>,
    ) -> PublishReport {
        self.observers.send_replace(state.clone());

        let frame = match serde_json::to_string(&StateSnapshot::from(state)) {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, "Failed to serialize state snapshot");
                return PublishReport::default();
            }
        };

        let mut report = PublishReport::default();
        for (player, connection) in connections {
            match connection.send_text(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(%player, error = %e, "State delivery failed");
                    report.failed += 1;
                }
            }
        }

        trace!(delivered = report.delivered, failed = report.failed, "State published");
        report
    }
}
