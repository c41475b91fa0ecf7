//! Pure tic-tac-toe rules for the arena core.
//!
//! Everything here is stateless and side-effect free: board construction,
//! legal-move validation, win/draw evaluation, and a trivial win/block move
//! heuristic for an automated opponent. Turn order, timers, and settlement
//! live in `arena_core`; illegal inputs are rejected there before these
//! functions run.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod board;
mod heuristic;
mod rules;

pub use board::{Board, Cell, Mark};
pub use heuristic::pick_move;
pub use rules::{Verdict, WINNING_LINES, evaluate};
