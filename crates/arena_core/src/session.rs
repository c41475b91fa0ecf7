//! One active best-of-N contest between two participants.
//!
//! The session is a pure state machine: it validates and applies moves,
//! tracks round wins, and decides when the match is over. Timers, ledger
//! mutations, and notifications are the [`Arena`](crate::Arena)'s job; it
//! calls in here, reads the transition result, and performs the side
//! effects.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use arena_tictactoe::{Board, Mark, Verdict, evaluate};

use crate::ArenaError;
use crate::notify::{GameView, NoticeHandle};
use crate::profile::ParticipantId;
use crate::timer::TimerHandle;

/// Unique identifier of a session, minted by the arena.
pub type SessionId = u64;

/// Explicit phase tag of the session state machine.
///
/// `RoundResolved` is only ever observable mid-action: the arena resolves it
/// into the next round or match end before releasing the state lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// A round is being played.
    RoundInProgress,
    /// A round just finished; resolution decides next round vs. match end.
    RoundResolved,
    /// Terminal: the match is decided and the session is retiring.
    MatchResolved,
}

/// Outcome of one accepted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MoveResult {
    /// Round continues; the turn passed to the other participant.
    Continued,
    /// The mover completed a winning line.
    RoundWon {
        /// Player index that took the round.
        winner: usize,
    },
    /// The board filled with no winner.
    RoundDrawn,
}

/// What follows a resolved round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoundResolution {
    /// Play continues on a fresh board; first mover set by round parity.
    NextRound,
    /// The match is decided.
    MatchOver(MatchVerdict),
}

/// Decided match result, by session player index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MatchVerdict {
    /// One side holds strictly more round wins.
    Winner(usize),
    /// Equal round wins after the final round.
    Drawn,
}

/// Live state of one match. Owned and mutated exclusively by the arena.
#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) id: SessionId,
    /// Ordered pair: index 0 moves first in round one and plays X.
    pub(crate) players: [ParticipantId; 2],
    pub(crate) board: Board,
    /// Current round, 1-based.
    pub(crate) round: u8,
    pub(crate) round_wins: [u8; 2],
    /// Player index whose turn it is.
    pub(crate) turn: usize,
    pub(crate) state: SessionState,
    pub(crate) staked: bool,
    /// Correlation handles for the per-participant outward messages.
    pub(crate) notices: [Option<NoticeHandle>; 2],
    pub(crate) move_timer: Option<TimerHandle>,
    pub(crate) idle_timer: Option<TimerHandle>,
    /// Bumped on every timer reschedule; tokens carrying an older seq are
    /// stale and must be ignored.
    pub(crate) timer_seq: u64,
}

impl Session {
    pub(crate) fn open(id: SessionId, players: [ParticipantId; 2], staked: bool) -> Self {
        Self {
            id,
            players,
            board: Board::new(),
            round: 1,
            round_wins: [0, 0],
            turn: Self::first_mover(1),
            state: SessionState::RoundInProgress,
            staked,
            notices: [None, None],
            move_timer: None,
            idle_timer: None,
            timer_seq: 0,
        }
    }

    /// First mover of `round`, by round parity: index 0 opens odd rounds,
    /// index 1 opens even rounds. A fixed fairness rule, independent of who
    /// won the previous round.
    pub(crate) fn first_mover(round: u8) -> usize {
        ((round - 1) % 2) as usize
    }

    /// Mark held by the player at `index` for the whole match.
    pub(crate) fn mark_of(index: usize) -> Mark {
        if index == 0 { Mark::X } else { Mark::O }
    }

    /// Index of `participant` within the session, if a member.
    pub(crate) fn player_index(&self, participant: &str) -> Option<usize> {
        self.players.iter().position(|p| p == participant)
    }

    /// Validates and applies one move for the player at `index`.
    ///
    /// On acceptance the mark is placed and the board evaluated; the caller
    /// reschedules timers and emits notices from the returned result.
    #[instrument(skip(self), fields(session_id = self.id))]
    pub(crate) fn apply_move(&mut self, index: usize, cell: usize) -> Result<MoveResult, ArenaError> {
        if self.state != SessionState::RoundInProgress {
            return Err(ArenaError::NotInSession);
        }
        if index != self.turn {
            debug!(index, turn = self.turn, "Move out of turn");
            return Err(ArenaError::NotYourTurn);
        }
        if !self.board.is_legal_move(cell) {
            debug!(cell, "Illegal cell");
            return Err(ArenaError::IllegalMove);
        }

        self.board.place(cell, Self::mark_of(index));

        match evaluate(&self.board) {
            None => {
                self.turn = 1 - self.turn;
                Ok(MoveResult::Continued)
            }
            Some(Verdict::Win { .. }) => {
                self.round_wins[index] += 1;
                self.state = SessionState::RoundResolved;
                Ok(MoveResult::RoundWon { winner: index })
            }
            Some(Verdict::Draw) => {
                self.state = SessionState::RoundResolved;
                Ok(MoveResult::RoundDrawn)
            }
        }
    }

    /// Resolves a finished round: match end when either side reached the
    /// majority threshold or the final round was played, otherwise a fresh
    /// board for the next round.
    #[instrument(skip(self), fields(session_id = self.id))]
    pub(crate) fn resolve_round(&mut self, majority: u8, rounds: u8) -> RoundResolution {
        debug_assert_eq!(self.state, SessionState::RoundResolved);

        let decided = self.round_wins[0] >= majority
            || self.round_wins[1] >= majority
            || self.round >= rounds;

        if decided {
            self.state = SessionState::MatchResolved;
            let verdict = match self.round_wins[0].cmp(&self.round_wins[1]) {
                std::cmp::Ordering::Greater => MatchVerdict::Winner(0),
                std::cmp::Ordering::Less => MatchVerdict::Winner(1),
                std::cmp::Ordering::Equal => MatchVerdict::Drawn,
            };
            return RoundResolution::MatchOver(verdict);
        }

        self.round += 1;
        self.board = Board::new();
        self.turn = Self::first_mover(self.round);
        self.state = SessionState::RoundInProgress;
        RoundResolution::NextRound
    }

    /// Renders the session for the player at `index`.
    pub(crate) fn view_for(&self, index: usize) -> GameView {
        GameView {
            board: *self.board.cells(),
            round: self.round,
            your_mark: Self::mark_of(index),
            your_round_wins: self.round_wins[index],
            opponent_round_wins: self.round_wins[1 - index],
            your_turn: self.state == SessionState::RoundInProgress && self.turn == index,
            staked: self.staked,
        }
    }
}
