//! Pure game logic for two-player grid games.
//!
//! Everything in this crate is synchronous and side-effect free. The board
//! is N×N, a win is K marks in an unbroken line, and every transition on
//! [`GameState`] returns a fresh snapshot instead of mutating in place.
//!
//! # Example
//!
//! ```
//! use gridduel_rules::{GameState, Geometry, Outcome, Player};
//!
//! let geometry = Geometry::classic();
//! let state = GameState::new(geometry)
//!     .apply_move(Player::X, 0, 0)
//!     .unwrap();
//! assert_eq!(state.player_at_turn(), Player::O);
//! assert_eq!(state.outcome(), Outcome::InProgress);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod board;
mod geometry;
mod rules;
mod state;
mod types;

pub use board::{Board, PlaceError};
pub use geometry::{Geometry, GeometryError, MAX_BOARD_SIZE, MIN_BOARD_SIZE, MIN_RUN_LENGTH};
pub use rules::{detect_outcome, is_full};
pub use state::{GameState, MoveRejection, Phase};
pub use types::{Outcome, Player, Square};
