//! Immutable session snapshot and its transitions.

use crate::board::{Board, PlaceError};
use crate::geometry::Geometry;
use crate::rules::{detect_outcome, is_full};
use crate::types::{Outcome, Player};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{instrument, trace};

/// Lifecycle phase derived from the outcome and the connection count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Fewer than two players connected and no terminal outcome.
    WaitingForPlayers,
    /// Both players connected, round ongoing.
    InProgress,
    /// Round won; waiting for the reset.
    Won,
    /// Board full with no winner; waiting for the reset.
    Draw,
}

/// Complete session state.
///
/// A `GameState` is a value: every transition returns a new snapshot and
/// leaves the receiver untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// The board.
    board: Board,
    /// Marks in a line needed to win.
    run_length: usize,
    /// Identity whose move is accepted next.
    player_at_turn: Player,
    /// Identities currently bound to a connection.
    connected_players: BTreeSet<Player>,
    /// Round status.
    outcome: Outcome,
}

impl GameState {
    /// Creates an empty session with no players connected.
    pub fn new(geometry: Geometry) -> Self {
        Self {
            board: Board::new(geometry.size()),
            run_length: geometry.run_length(),
            player_at_turn: Player::STARTING,
            connected_players: BTreeSet::new(),
            outcome: Outcome::InProgress,
        }
    }

    /// Returns the board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Returns the winning run length.
    pub fn run_length(&self) -> usize {
        self.run_length
    }

    /// Returns the identity whose move is accepted next.
    pub fn player_at_turn(&self) -> Player {
        self.player_at_turn
    }

    /// Returns the connected identities.
    pub fn connected_players(&self) -> &BTreeSet<Player> {
        &self.connected_players
    }

    /// Returns the round outcome.
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Returns the winner, if the round was won.
    pub fn winning_player(&self) -> Option<Player> {
        self.outcome.winner()
    }

    /// Checks if every square is occupied.
    pub fn is_board_full(&self) -> bool {
        is_full(&self.board)
    }

    /// Derives the lifecycle phase.
    pub fn phase(&self) -> Phase {
        match self.outcome {
            Outcome::Won(_) => Phase::Won,
            Outcome::Draw => Phase::Draw,
            Outcome::InProgress if self.connected_players.len() < 2 => Phase::WaitingForPlayers,
            Outcome::InProgress => Phase::InProgress,
        }
    }

    /// Returns a snapshot with `player` marked as connected.
    pub fn with_connected(&self, player: Player) -> Self {
        let mut next = self.clone();
        next.connected_players.insert(player);
        next
    }

    /// Returns a snapshot with `player` marked as disconnected.
    pub fn with_disconnected(&self, player: Player) -> Self {
        let mut next = self.clone();
        next.connected_players.remove(&player);
        next
    }

    /// Validates and applies a move, returning the resulting snapshot.
    ///
    /// Checks run in a fixed order: bounds, occupancy, round status, turn.
    ///
    /// # Errors
    ///
    /// Returns the first [`MoveRejection`] that applies; `self` is unchanged.
    #[instrument(skip(self), fields(at_turn = %self.player_at_turn))]
    pub fn apply_move(&self, player: Player, x: i64, y: i64) -> Result<Self, MoveRejection> {
        let (col, row) = match (usize::try_from(x), usize::try_from(y)) {
            (Ok(col), Ok(row)) if self.board.contains(col, row) => (col, row),
            _ => return Err(MoveRejection::OutOfBounds { x, y }),
        };
        if self.board.get(col, row).is_some_and(|square| !square.is_empty()) {
            return Err(MoveRejection::Occupied { x, y });
        }
        if self.outcome.is_terminal() {
            return Err(MoveRejection::RoundOver);
        }
        if player != self.player_at_turn {
            return Err(MoveRejection::NotYourTurn(player));
        }

        let mut next = self.clone();
        next.board.place(col, row, player).map_err(MoveRejection::from)?;
        next.player_at_turn = player.opponent();
        next.outcome = if let Some(winner) = detect_outcome(&next.board, next.run_length) {
            Outcome::Won(winner)
        } else if is_full(&next.board) {
            Outcome::Draw
        } else {
            Outcome::InProgress
        };

        trace!(outcome = ?next.outcome, "Move applied");
        Ok(next)
    }

    /// Returns a fresh round: empty board, starting player at turn.
    ///
    /// Connected players are carried over.
    pub fn reset(&self) -> Self {
        Self {
            board: Board::new(self.board.size()),
            run_length: self.run_length,
            player_at_turn: Player::STARTING,
            connected_players: self.connected_players.clone(),
            outcome: Outcome::InProgress,
        }
    }
}

/// Reason a move was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum MoveRejection {
    /// Coordinates are outside the board.
    #[display("Position ({}, {}) is out of bounds", x, y)]
    OutOfBounds {
        /// Column as received.
        x: i64,
        /// Row as received.
        y: i64,
    },

    /// The square already holds a mark.
    #[display("Square ({}, {}) is already occupied", x, y)]
    Occupied {
        /// Column.
        x: i64,
        /// Row.
        y: i64,
    },

    /// The round has ended and is waiting for its reset.
    #[display("Round is already over")]
    RoundOver,

    /// It's not this player's turn.
    #[display("It's not {}'s turn", _0)]
    NotYourTurn(Player),
}

impl std::error::Error for MoveRejection {}

impl From<PlaceError> for MoveRejection {
    fn from(err: PlaceError) -> Self {
        match err {
            PlaceError::OutOfBounds { x, y } => MoveRejection::OutOfBounds {
                x: x as i64,
                y: y as i64,
            },
            PlaceError::Occupied { x, y } => MoveRejection::Occupied {
                x: x as i64,
                y: y as i64,
            },
        }
    }
}
