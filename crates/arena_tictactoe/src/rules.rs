//! Win and draw evaluation.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::board::{Board, Cell, Mark};

/// The eight winning triples, checked in this fixed order:
/// rows, then columns, then diagonals.
pub const WINNING_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Terminal verdict of a board position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// A mark completed a winning line.
    Win {
        /// The winning mark.
        mark: Mark,
        /// Indices of the completed triple.
        line: [usize; 3],
    },
    /// The board is full with no winning line.
    Draw,
}

/// Evaluates a board position.
///
/// Returns the first winning line in [`WINNING_LINES`] order, `Draw` when the
/// board is full without one, and `None` while the round continues.
#[instrument(level = "debug")]
pub fn evaluate(board: &Board) -> Option<Verdict> {
    for line in WINNING_LINES {
        let [a, b, c] = line;
        if let Some(Cell::Taken(mark)) = board.get(a) {
            if board.get(b) == Some(Cell::Taken(mark)) && board.get(c) == Some(Cell::Taken(mark)) {
                return Some(Verdict::Win { mark, line });
            }
        }
    }

    if board.is_full() {
        return Some(Verdict::Draw);
    }

    None
}
