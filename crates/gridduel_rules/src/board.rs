//! N×N board storage.

use crate::types::{Player, Square};
use serde::{Deserialize, Serialize};

/// Square grid stored as rows, top to bottom.
///
/// Coordinates are `(x, y)` with `x` the column and `y` the row, both
/// 0-based from the top-left corner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    rows: Vec<Vec<Square>>,
}

impl Board {
    /// Creates an empty `size`×`size` board.
    pub fn new(size: usize) -> Self {
        Self {
            rows: vec![vec![Square::Empty; size]; size],
        }
    }

    /// Board edge length.
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    /// Gets the square at `(x, y)`, or `None` when out of bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<Square> {
        self.rows.get(y).and_then(|row| row.get(x)).copied()
    }

    /// Gets the square at signed coordinates.
    pub(crate) fn get_signed(&self, x: isize, y: isize) -> Option<Square> {
        let x = usize::try_from(x).ok()?;
        let y = usize::try_from(y).ok()?;
        self.get(x, y)
    }

    /// Checks if `(x, y)` lies on the board.
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.size() && y < self.size()
    }

    /// Places `player` at `(x, y)`.
    pub fn place(&mut self, x: usize, y: usize, player: Player) -> Result<(), PlaceError> {
        let square = self
            .rows
            .get_mut(y)
            .and_then(|row| row.get_mut(x))
            .ok_or(PlaceError::OutOfBounds { x, y })?;
        if !square.is_empty() {
            return Err(PlaceError::Occupied { x, y });
        }
        *square = Square::Occupied(player);
        Ok(())
    }

    /// Rows, top to bottom.
    pub fn rows(&self) -> &[Vec<Square>] {
        &self.rows
    }

    /// Iterates all squares in row-major order.
    pub fn squares(&self) -> impl Iterator<Item = Square> + '_ {
        self.rows.iter().flatten().copied()
    }

    /// Checks if every square is occupied.
    pub fn is_full(&self) -> bool {
        crate::rules::is_full(self)
    }

    /// Formats the board as a human-readable grid.
    pub fn display(&self) -> String {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|square| match square {
                        Square::Empty => ".".to_string(),
                        Square::Occupied(player) => player.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join("|")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Error that can occur when placing a mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum PlaceError {
    /// Coordinates are outside the board.
    #[display("Position ({}, {}) is out of bounds", x, y)]
    OutOfBounds {
        /// Column.
        x: usize,
        /// Row.
        y: usize,
    },

    /// The square already holds a mark.
    #[display("Square ({}, {}) is already occupied", x, y)]
    Occupied {
        /// Column.
        x: usize,
        /// Row.
        y: usize,
    },
}

impl std::error::Error for PlaceError {}
