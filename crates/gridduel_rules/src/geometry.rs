//! Board size and run length, fixed when a session is constructed.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Smallest supported board edge.
pub const MIN_BOARD_SIZE: usize = 3;

/// Largest supported board edge.
pub const MAX_BOARD_SIZE: usize = 32;

/// Shortest run that can win.
pub const MIN_RUN_LENGTH: usize = 3;

/// Board edge length N and winning run length K.
///
/// Always satisfies `MIN_BOARD_SIZE <= N <= MAX_BOARD_SIZE` and
/// `MIN_RUN_LENGTH <= K <= N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawGeometry", into = "RawGeometry")]
pub struct Geometry {
    size: usize,
    run_length: usize,
}

impl Geometry {
    /// Validates and creates a geometry.
    #[instrument]
    pub fn new(size: usize, run_length: usize) -> Result<Self, GeometryError> {
        if !(MIN_BOARD_SIZE..=MAX_BOARD_SIZE).contains(&size) {
            return Err(GeometryError::new(format!(
                "board size {} outside {}..={}",
                size, MIN_BOARD_SIZE, MAX_BOARD_SIZE
            )));
        }
        if !(MIN_RUN_LENGTH..=size).contains(&run_length) {
            return Err(GeometryError::new(format!(
                "run length {} outside {}..={}",
                run_length, MIN_RUN_LENGTH, size
            )));
        }
        Ok(Self { size, run_length })
    }

    /// Three in a row on a 3×3 board.
    pub const fn classic() -> Self {
        Self {
            size: 3,
            run_length: 3,
        }
    }

    /// Board edge length N.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Marks in a line needed to win.
    pub fn run_length(&self) -> usize {
        self.run_length
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::classic()
    }
}

#[derive(Serialize, Deserialize)]
struct RawGeometry {
    size: usize,
    run_length: usize,
}

impl TryFrom<RawGeometry> for Geometry {
    type Error = GeometryError;

    fn try_from(raw: RawGeometry) -> Result<Self, Self::Error> {
        Geometry::new(raw.size, raw.run_length)
    }
}

impl From<Geometry> for RawGeometry {
    fn from(geometry: Geometry) -> Self {
        Self {
            size: geometry.size,
            run_length: geometry.run_length,
        }
    }
}

/// Invalid board configuration.
#[derive(Debug, Clone, Display, Error)]
#[display("Geometry error: {} at {}:{}", message, file, line)]
pub struct GeometryError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl GeometryError {
    /// Creates a new geometry error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
