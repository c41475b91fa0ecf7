//! Translation of a decided match into ledger deltas.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::profile::{Ledger, ParticipantId, ProfileDelta};

/// Terminal outcome of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    /// One side won: by play, surrender, or move-timeout forfeiture.
    Win {
        /// Participant credited with the win.
        winner: ParticipantId,
        /// Participant charged with the loss.
        loser: ParticipantId,
    },
    /// Equal round wins after the final round.
    Draw {
        /// Both participants.
        players: [ParticipantId; 2],
    },
    /// Idle timeout: the match never counted and no stats move.
    Voided {
        /// Both participants.
        players: [ParticipantId; 2],
    },
}

/// Applies the ledger deltas for `outcome`.
///
/// Runs exactly once per session: the caller retires the session immediately
/// afterwards, and the lookup removal is what prevents a second settlement
/// from ever being reachable.
#[instrument(skip(ledger, config))]
pub(crate) async fn settle(
    ledger: &dyn Ledger,
    config: &ArenaConfig,
    outcome: &MatchOutcome,
    staked: bool,
) -> Result<(), ArenaError> {
    match outcome {
        MatchOutcome::Win { winner, loser } => {
            ledger
                .apply_delta(
                    winner,
                    ProfileDelta {
                        score: 1,
                        balance: if staked { config.win_payout } else { 0.0 },
                        games_played: 1,
                        wins: 1,
                        ..Default::default()
                    },
                )
                .await?;
            // The loser's stake stays debited: losing a staked match costs
            // the full staked unit.
            ledger
                .apply_delta(
                    loser,
                    ProfileDelta {
                        score: -1,
                        games_played: 1,
                        losses: 1,
                        ..Default::default()
                    },
                )
                .await?;
        }
        MatchOutcome::Draw { players } => {
            for player in players {
                ledger
                    .apply_delta(
                        player,
                        ProfileDelta {
                            balance: if staked { config.stake_amount } else { 0.0 },
                            games_played: 1,
                            draws: 1,
                            ..Default::default()
                        },
                    )
                    .await?;
            }
        }
        MatchOutcome::Voided { players } => {
            if staked {
                for player in players {
                    ledger
                        .apply_delta(
                            player,
                            ProfileDelta {
                                balance: config.stake_amount,
                                ..Default::default()
                            },
                        )
                        .await?;
                }
            }
        }
    }

    info!(?outcome, staked, "Match settled");
    Ok(())
}
