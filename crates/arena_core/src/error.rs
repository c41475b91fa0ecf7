//! Error taxonomy for the arena core.

use derive_more::{Display, Error};

/// Rejection and failure kinds surfaced by arena operations.
///
/// Every rejection is terminal for the triggering action and leaves core
/// state untouched; the transport adapter decides what, if anything, to tell
/// the participant. Timer firings that target a retired session are absorbed
/// silently and never produce one of these.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ArenaError {
    /// The participant is already waiting in a matchmaking queue.
    #[display("already waiting in a matchmaking queue")]
    AlreadyQueued,
    /// The participant already owns an active session.
    #[display("already in an active match")]
    AlreadyInSession,
    /// A move or surrender targeted a participant with no active session.
    #[display("no active match")]
    NotInSession,
    /// A move arrived from the participant whose turn it is not.
    #[display("not your turn")]
    NotYourTurn,
    /// A move targeted an occupied or out-of-range cell.
    #[display("illegal move")]
    IllegalMove,
    /// A staked enqueue with a balance below the stake; nothing was debited.
    #[display("insufficient balance for a staked match")]
    InsufficientBalance,
    /// A ledger delta targeted a profile that was never ensured. Upstream
    /// calls `ensure_profile` first, so this is an invariant violation, not a
    /// user-facing rejection.
    #[display("profile absent: {_0}")]
    ProfileAbsent(#[error(not(source))] String),
    /// The backing ledger store failed.
    #[display("ledger storage error: {_0}")]
    Storage(#[error(not(source))] String),
}
