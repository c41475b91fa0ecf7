//! Trivial move picker for an automated opponent.

use tracing::instrument;

use crate::board::{Board, Mark};
use crate::rules::{Verdict, evaluate};

const CENTER: usize = 4;
const CORNERS: [usize; 4] = [0, 2, 6, 8];

/// Picks a move for `mark`: win if possible, otherwise block the opponent's
/// winning cell, otherwise center, otherwise a corner, otherwise the first
/// empty cell. Returns `None` on a full board.
#[instrument(level = "debug")]
pub fn pick_move(board: &Board, mark: Mark) -> Option<usize> {
    if let Some(index) = winning_cell(board, mark) {
        return Some(index);
    }
    if let Some(index) = winning_cell(board, mark.opponent()) {
        return Some(index);
    }
    if board.is_legal_move(CENTER) {
        return Some(CENTER);
    }
    if let Some(index) = CORNERS.iter().copied().find(|&i| board.is_legal_move(i)) {
        return Some(index);
    }
    (0..9).find(|&i| board.is_legal_move(i))
}

/// Returns a cell that completes a line for `mark`, if one exists.
fn winning_cell(board: &Board, mark: Mark) -> Option<usize> {
    (0..9).find(|&index| {
        if !board.is_legal_move(index) {
            return false;
        }
        let mut probe = board.clone();
        probe.place(index, mark);
        matches!(evaluate(&probe), Some(Verdict::Win { mark: m, .. }) if m == mark)
    })
}
