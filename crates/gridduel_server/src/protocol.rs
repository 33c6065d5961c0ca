//! Text-frame wire protocol.
//!
//! Inbound frames are either the liveness acknowledgment `pong` or an
//! action of the form `<name>#<json>`. Outbound frames are the `ping`
//! probe, the private identity acknowledgment, and full state snapshots.

use derive_more::Display;
use gridduel_rules::{Board, GameState, Outcome, Phase, Player};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::instrument;
use uuid::Uuid;

/// Liveness probe sent by the server.
pub const PING: &str = "ping";

/// Liveness acknowledgment sent by the client.
pub const PONG: &str = "pong";

/// Action name for placing a mark.
pub const MAKE_TURN: &str = "make_turn";

/// WebSocket close code for policy violations (RFC 6455).
pub const POLICY_VIOLATION: u16 = 1008;

/// Coordinates carried by a `make_turn` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakeTurn {
    /// Column, 0-based.
    pub x: i64,
    /// Row, 0-based.
    pub y: i64,
}

/// Decoded inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
    /// Liveness acknowledgment.
    Pong,
    /// Move request.
    MakeTurn(MakeTurn),
}

impl ClientMessage {
    /// Parses a text frame.
    #[instrument(level = "trace")]
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        if text == PONG {
            return Ok(ClientMessage::Pong);
        }

        let (action, payload) = text.split_once('#').unwrap_or((text, ""));
        if action != MAKE_TURN {
            return Err(ProtocolError::UnrecognizedAction(action.to_string()));
        }

        serde_json::from_str(payload)
            .map(ClientMessage::MakeTurn)
            .map_err(|e| ProtocolError::MalformedTurn(e.to_string()))
    }
}

/// Inbound frame the server cannot act on.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ProtocolError {
    /// The action name is not part of the protocol.
    #[display("Unknown action type: {}", _0)]
    UnrecognizedAction(String),

    /// `make_turn` payload is not `{"x":int,"y":int}`.
    #[display("Malformed make_turn payload: {}", _0)]
    MalformedTurn(String),
}

impl std::error::Error for ProtocolError {}

/// Private acknowledgment telling a connection which identity it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Assigned identity.
    pub player_name: Player,
    /// Opaque token for this connection.
    pub id: Uuid,
}

/// Broadcast view of a [`GameState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// Rows of squares; `null` for empty.
    pub field: Board,
    /// Identity whose move is accepted next.
    pub player_at_turn: Player,
    /// Identities bound to a connection.
    pub connected_players: BTreeSet<Player>,
    /// Winner of the round, if any.
    pub winning_player: Option<Player>,
    /// True when every square is occupied.
    pub is_board_full: bool,
    /// Round status.
    pub outcome: Outcome,
    /// Derived lifecycle phase.
    pub phase: Phase,
    /// Marks in a line needed to win.
    pub run_length: usize,
}

impl From<&GameState> for StateSnapshot {
    fn from(state: &GameState) -> Self {
        Self {
            field: state.board().clone(),
            player_at_turn: state.player_at_turn(),
            connected_players: state.connected_players().clone(),
            winning_player: state.winning_player(),
            is_board_full: state.is_board_full(),
            outcome: state.outcome(),
            phase: state.phase(),
            run_length: state.run_length(),
        }
    }
}

/// Why the server is closing a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CloseReason {
    /// Both identities are taken.
    #[display("Too many players")]
    SessionFull,
    /// The liveness threshold was exceeded.
    #[display("Too many pings missed")]
    LivenessTimeout,
    /// The client id is already bound to a player.
    #[display("Player already exists")]
    DuplicateClient,
    /// The client sent an action outside the protocol.
    #[display("Unrecognized action")]
    UnrecognizedAction,
}

impl CloseReason {
    /// WebSocket close code.
    pub fn code(self) -> u16 {
        POLICY_VIOLATION
    }
}

/// Frame queued for a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    /// Text frame, already serialized.
    Text(String),
}
