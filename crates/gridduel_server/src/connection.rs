//! Send capability for one attached connection.

use crate::protocol::ServerFrame;
use derive_more::{Display, Error};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Handle the engine uses to push frames to a connection.
///
/// Sending never blocks: frames go onto an unbounded queue drained by the
/// connection's own task, so a slow socket cannot stall the session.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    tx: mpsc::UnboundedSender<ServerFrame>,
}

impl ConnectionHandle {
    /// Creates a handle and the receiver its connection task drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    /// Unique id of this connection.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queues a text frame.
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), DeliveryError> {
        self.tx
            .send(ServerFrame::Text(text.into()))
            .map_err(|_| DeliveryError {
                connection_id: self.id,
            })
    }
}

/// The connection is gone; the frame was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
#[display("Connection {} is closed", connection_id)]
pub struct DeliveryError {
    /// Connection that could not be reached.
    pub connection_id: Uuid,
}
