//! Outbound notification contract.
//!
//! The arena announces every user-visible state change through a [`Notifier`]
//! and does not interpret delivery failures beyond logging: the state change
//! is the authoritative fact, the announcement is best-effort.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use arena_tictactoe::{Cell, Mark};

/// Opaque correlation handle minted by the sink, letting the arena edit a
/// previously delivered notice in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoticeHandle(pub u64);

/// Snapshot of a session rendered for one participant.
///
/// Always built after the triggering mutation, never from a stale board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameView {
    /// Board cells in row-major order.
    pub board: [Cell; 9],
    /// Current round, 1-based.
    pub round: u8,
    /// The recipient's mark.
    pub your_mark: Mark,
    /// Rounds won by the recipient.
    pub your_round_wins: u8,
    /// Rounds won by the opponent.
    pub opponent_round_wins: u8,
    /// Whether the recipient moves next.
    pub your_turn: bool,
    /// Whether a stake is riding on the match.
    pub staked: bool,
}

/// How a finished match reads from the recipient's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResultKind {
    /// The recipient took the match.
    Won,
    /// The opponent took the match.
    Lost,
    /// Equal round wins after the final round.
    Drawn,
    /// The opponent surrendered or timed out on a move.
    OpponentForfeited,
    /// The recipient surrendered or timed out on a move.
    Forfeited,
    /// Idle timeout: the match never counted.
    Voided,
}

/// A user-visible state change pushed through the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// A match was opened for the recipient.
    MatchStarted(GameView),
    /// A new round began on a fresh board.
    RoundStarted(GameView),
    /// A move was accepted; the board changed.
    BoardUpdated(GameView),
    /// A round finished; `winner_mark` is `None` on a drawn round.
    RoundResult {
        /// Board as the round ended.
        view: GameView,
        /// Mark that took the round, if any.
        winner_mark: Option<Mark>,
    },
    /// The match finished.
    MatchResult {
        /// Final board state.
        view: GameView,
        /// Result from the recipient's side.
        result: MatchResultKind,
    },
    /// The recipient's queue entry expired unpaired.
    QueueExpired,
    /// A reserved stake was returned in full.
    StakeRefunded {
        /// Refunded amount in TMT.
        amount: f64,
    },
}

/// Outbound notification sink.
///
/// Implementations deliver to whatever transport fronts the arena. Delivery
/// is one-way: failures are logged by the implementation and never retried
/// or surfaced, and no state change is rolled back over them.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers a fresh notice; returns a correlation handle when the sink
    /// supports later edits.
    async fn notify(&self, to: &str, notice: Notice) -> Option<NoticeHandle>;

    /// Edits a previously delivered notice in place.
    async fn update(&self, handle: &NoticeHandle, notice: Notice);

    /// Withdraws a previously delivered notice.
    async fn retract(&self, handle: &NoticeHandle);
}

/// Sink that drops every notice, logging at debug. Useful when the arena is
/// driven headless.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, to: &str, notice: Notice) -> Option<NoticeHandle> {
        debug!(to, ?notice, "Dropping notice");
        None
    }

    async fn update(&self, _handle: &NoticeHandle, notice: Notice) {
        debug!(?notice, "Dropping notice update");
    }

    async fn retract(&self, _handle: &NoticeHandle) {}
}
