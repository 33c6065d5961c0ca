//! Win detection logic.

use crate::board::Board;
use crate::types::{Player, Square};
use tracing::instrument;

/// Scan directions as `(dx, dy)`: rows, columns, main diagonals,
/// anti-diagonals.
const DIRECTIONS: [(isize, isize); 4] = [(1, 0), (0, 1), (1, 1), (-1, 1)];

/// Checks if there is a winner on the board.
///
/// Returns `Some(player)` for the first line of `run_length` consecutive
/// marks found, scanning rows, then columns, then diagonals parallel to the
/// main diagonal, then diagonals parallel to the anti-diagonal. Boards with
/// several winning lines are not disambiguated.
#[instrument(level = "trace", skip(board), fields(size = board.size()))]
pub fn detect_outcome(board: &Board, run_length: usize) -> Option<Player> {
    let size = board.size();
    if run_length == 0 || run_length > size {
        return None;
    }

    let (n, k) = (size as isize, run_length as isize);
    DIRECTIONS.into_iter().find_map(|(dx, dy)| {
        (0..n)
            .flat_map(|y| (0..n).map(move |x| (x, y)))
            .find_map(|(x, y)| run_from(board, (x, y), (dx, dy), k))
    })
}

/// Returns the player holding all `k` squares from `start` along `step`.
fn run_from(
    board: &Board,
    (x, y): (isize, isize),
    (dx, dy): (isize, isize),
    k: isize,
) -> Option<Player> {
    let player = board.get_signed(x, y)?.player()?;
    (1..k)
        .all(|i| board.get_signed(x + dx * i, y + dy * i) == Some(Square::Occupied(player)))
        .then_some(player)
}
