//! Draw detection logic.

use crate::board::Board;
use crate::types::Square;
use tracing::instrument;

/// Checks if the board is full (all squares occupied).
///
/// A full board with no winner indicates a draw.
#[instrument(level = "trace", skip(board), fields(size = board.size()))]
pub fn is_full(board: &Board) -> bool {
    board.squares().all(|square| square != Square::Empty)
}
