//! Game rules for grid games.
//!
//! This module contains pure functions for evaluating a board. Rules are
//! separated from board storage so the session engine can compose them
//! with whatever geometry it was configured with.

pub mod draw;
pub mod win;

pub use draw::is_full;
pub use win::detect_outcome;
