//! The arena: single owner of queues, sessions, and participant lookups.
//!
//! Every inbound action — enqueue request, move, surrender, fired timer,
//! operator command — enters through one of the public methods here and is
//! processed to completion under one lock before the next begins. Nothing
//! outside this module mutates queue or session state.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::notify::{GameView, MatchResultKind, Notice, Notifier};
use crate::profile::{Ledger, ParticipantId, Profile, ProfileDelta};
use crate::queue::{MatchQueues, QueueEntry, QueueKind};
use crate::session::{MatchVerdict, MoveResult, RoundResolution, Session, SessionId, SessionState};
use crate::settlement::{MatchOutcome, settle};
use crate::timer::{TimerToken, Timers};

/// Mutable core state, guarded by one lock.
#[derive(Debug, Default)]
struct ArenaState {
    queues: MatchQueues,
    sessions: HashMap<SessionId, Session>,
    by_participant: HashMap<ParticipantId, SessionId>,
    next_session_id: SessionId,
    next_timer_seq: u64,
}

impl ArenaState {
    fn next_seq(&mut self) -> u64 {
        self.next_timer_seq += 1;
        self.next_timer_seq
    }
}

/// Why a decided match ended, for notification wording only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinishCause {
    /// Decided over the board.
    Played,
    /// Decided by surrender or move timeout.
    Forfeit,
}

/// Front door for every inbound action.
///
/// Owns the two lookup tables (`participant → session`, queue membership)
/// and composes the board engine, timer subsystem, ledger, and notification
/// sink. One action is processed at a time; timer firings arrive as ordinary
/// actions through [`Arena::handle_timer`].
pub struct Arena {
    state: Mutex<ArenaState>,
    ledger: Arc<dyn Ledger>,
    notifier: Arc<dyn Notifier>,
    timers: Arc<dyn Timers>,
    config: ArenaConfig,
}

impl Arena {
    /// Creates an arena wired to the given collaborators.
    pub fn new(
        config: ArenaConfig,
        ledger: Arc<dyn Ledger>,
        notifier: Arc<dyn Notifier>,
        timers: Arc<dyn Timers>,
    ) -> Self {
        info!(?config, "Creating arena");
        Self {
            state: Mutex::new(ArenaState::default()),
            ledger,
            notifier,
            timers,
            config,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Queues `participant` for a match, pairing immediately when an
    /// opponent is already waiting.
    ///
    /// Staked enqueues reserve the stake as early as possible: the first
    /// waiter is debited here, the second at pairing time (which is this
    /// same action). A second enqueuer whose balance no longer covers the
    /// stake is rejected and the waiting entry stays queued, timer intact.
    #[instrument(skip(self))]
    pub async fn enqueue(
        &self,
        participant: &str,
        display_name: &str,
        kind: QueueKind,
    ) -> Result<(), ArenaError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if state.queues.contains(participant) {
            return Err(ArenaError::AlreadyQueued);
        }
        if state.by_participant.contains_key(participant) {
            return Err(ArenaError::AlreadyInSession);
        }

        self.ledger.ensure_profile(participant, display_name).await?;

        let reserved = kind == QueueKind::Staked;
        if reserved {
            // All-or-nothing at the store: the reservation either debits the
            // full stake or rejects the enqueue with nothing moved.
            self.ledger.reserve(participant, self.config.stake_amount).await?;
        }

        let seq = state.next_seq();
        let expiry_timer = self.timers.after(
            self.config.queue_expiry(),
            TimerToken::QueueExpiry {
                participant: participant.to_string(),
                seq,
            },
        );
        state.queues.push(QueueEntry::new(
            participant.to_string(),
            kind,
            Utc::now(),
            reserved,
            expiry_timer,
            seq,
        ));
        info!(participant, %kind, "Queued for matchmaking");

        if let Some((first, second)) = state.queues.take_pair(kind) {
            self.timers.cancel(&first.expiry_timer);
            self.timers.cancel(&second.expiry_timer);
            let waited = Utc::now() - first.enqueued_at;
            info!(
                first = %first.participant,
                second = %second.participant,
                waited_ms = waited.num_milliseconds(),
                "Pairing the two oldest entries"
            );
            self.open_session(
                state,
                [first.participant, second.participant],
                kind == QueueKind::Staked,
            )
            .await;
        }
        Ok(())
    }

    /// Operator-issued direct pairing, bypassing the queues. Both
    /// participants must be idle; the match is unstaked.
    #[instrument(skip(self))]
    pub async fn pair_directly(&self, first: &str, second: &str) -> Result<SessionId, ArenaError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        for participant in [first, second] {
            if state.queues.contains(participant) {
                return Err(ArenaError::AlreadyQueued);
            }
            if state.by_participant.contains_key(participant) {
                return Err(ArenaError::AlreadyInSession);
            }
        }
        self.ledger.ensure_profile(first, first).await?;
        self.ledger.ensure_profile(second, second).await?;

        let id = self
            .open_session(state, [first.to_string(), second.to_string()], false)
            .await;
        Ok(id)
    }

    /// Applies one move for `participant`.
    ///
    /// Rejections (`NotInSession`, `NotYourTurn`, `IllegalMove`) leave every
    /// piece of state untouched and re-send nothing. An accepted move
    /// reschedules both session timers, updates both participants, and may
    /// resolve the round and with it the match.
    #[instrument(skip(self))]
    pub async fn make_move(&self, participant: &str, cell: usize) -> Result<(), ArenaError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let session_id = *state
            .by_participant
            .get(participant)
            .ok_or(ArenaError::NotInSession)?;
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or(ArenaError::NotInSession)?;
        let mover = session
            .player_index(participant)
            .ok_or(ArenaError::NotInSession)?;

        let result = session.apply_move(mover, cell)?;
        self.reschedule_timers(session, &mut state.next_timer_seq);

        match result {
            MoveResult::Continued => {
                for idx in 0..2 {
                    let view = session.view_for(idx);
                    self.push_notice(session, idx, Notice::BoardUpdated(view)).await;
                }
                Ok(())
            }
            MoveResult::RoundWon { winner } => {
                let winner_mark = Some(Session::mark_of(winner));
                for idx in 0..2 {
                    let view = session.view_for(idx);
                    self.push_notice(session, idx, Notice::RoundResult { view, winner_mark })
                        .await;
                }
                self.conclude_round(state, session_id).await
            }
            MoveResult::RoundDrawn => {
                for idx in 0..2 {
                    let view = session.view_for(idx);
                    self.push_notice(
                        session,
                        idx,
                        Notice::RoundResult {
                            view,
                            winner_mark: None,
                        },
                    )
                    .await;
                }
                self.conclude_round(state, session_id).await
            }
        }
    }

    /// Immediate one-sided cancellation: the other participant is declared
    /// winner and the match settles as a forfeit.
    #[instrument(skip(self))]
    pub async fn surrender(&self, participant: &str) -> Result<(), ArenaError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let session_id = *state
            .by_participant
            .get(participant)
            .ok_or(ArenaError::NotInSession)?;
        let session = state
            .sessions
            .get(&session_id)
            .ok_or(ArenaError::NotInSession)?;
        let loser = session
            .player_index(participant)
            .ok_or(ArenaError::NotInSession)?;
        let outcome = MatchOutcome::Win {
            winner: session.players[1 - loser].clone(),
            loser: session.players[loser].clone(),
        };

        info!(participant, session_id, "Surrendering the match");
        self.finish_session(state, session_id, outcome, FinishCause::Forfeit)
            .await
    }

    /// Entry point for fired timers.
    ///
    /// A token resolving to a retired session, a departed queue entry, or a
    /// superseded generation is absorbed silently; that absorption is the
    /// defense against the fire-versus-action race, and never an error.
    #[instrument(skip(self))]
    pub async fn handle_timer(&self, token: TimerToken) -> Result<(), ArenaError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        match token {
            TimerToken::QueueExpiry { participant, seq } => {
                let Some(entry) = state.queues.remove_expired(&participant, seq) else {
                    debug!(%participant, seq, "Absorbing stale queue expiry");
                    return Ok(());
                };
                info!(participant = %entry.participant, kind = %entry.kind, "Queue entry expired unpaired");
                if entry.reserved {
                    self.ledger
                        .apply_delta(
                            &entry.participant,
                            ProfileDelta {
                                balance: self.config.stake_amount,
                                ..Default::default()
                            },
                        )
                        .await?;
                    self.notifier
                        .notify(
                            &entry.participant,
                            Notice::StakeRefunded {
                                amount: self.config.stake_amount,
                            },
                        )
                        .await;
                }
                self.notifier.notify(&entry.participant, Notice::QueueExpired).await;
                Ok(())
            }
            TimerToken::MoveTimeout {
                session: session_id,
                seq,
            } => {
                let Some(session) = state.sessions.get(&session_id) else {
                    debug!(session_id, "Absorbing move timeout for retired session");
                    return Ok(());
                };
                if session.timer_seq != seq {
                    debug!(
                        session_id,
                        seq,
                        current = session.timer_seq,
                        "Absorbing superseded move timeout"
                    );
                    return Ok(());
                }
                let loser = session.turn;
                let outcome = MatchOutcome::Win {
                    winner: session.players[1 - loser].clone(),
                    loser: session.players[loser].clone(),
                };
                warn!(session_id, loser = %session.players[loser], "Move timeout, forfeiting the match");
                self.finish_session(state, session_id, outcome, FinishCause::Forfeit)
                    .await
            }
            TimerToken::IdleTimeout {
                session: session_id,
                seq,
            } => {
                let Some(session) = state.sessions.get(&session_id) else {
                    debug!(session_id, "Absorbing idle timeout for retired session");
                    return Ok(());
                };
                if session.timer_seq != seq {
                    debug!(session_id, "Absorbing superseded idle timeout");
                    return Ok(());
                }
                let outcome = MatchOutcome::Voided {
                    players: session.players.clone(),
                };
                warn!(session_id, "Idle timeout, voiding the match");
                self.finish_session(state, session_id, outcome, FinishCause::Played)
                    .await
            }
        }
    }

    /// Operator credit or debit, through the same delta contract settlement
    /// uses, so balances stay consistent.
    ///
    /// Holds the state lock for the duration: an operator command is an
    /// action like any other and never interleaves with one mid-flight.
    #[instrument(skip(self))]
    pub async fn adjust_profile(
        &self,
        participant: &str,
        score: i64,
        balance: f64,
    ) -> Result<Profile, ArenaError> {
        let _guard = self.state.lock().await;
        self.ledger.ensure_profile(participant, participant).await?;
        self.ledger
            .apply_delta(
                participant,
                ProfileDelta {
                    score,
                    balance,
                    ..Default::default()
                },
            )
            .await
    }

    /// Current rendered view of `participant`'s session, if any.
    pub async fn session_view(&self, participant: &str) -> Option<GameView> {
        let state = self.state.lock().await;
        let session_id = state.by_participant.get(participant)?;
        let session = state.sessions.get(session_id)?;
        let idx = session.player_index(participant)?;
        Some(session.view_for(idx))
    }

    /// Whether `participant` is waiting in a matchmaking queue.
    pub async fn is_queued(&self, participant: &str) -> bool {
        self.state.lock().await.queues.contains(participant)
    }

    /// Read-through to the ledger.
    pub async fn profile(&self, participant: &str) -> Result<Option<Profile>, ArenaError> {
        self.ledger.get_profile(participant).await
    }

    async fn open_session(
        &self,
        state: &mut ArenaState,
        players: [ParticipantId; 2],
        staked: bool,
    ) -> SessionId {
        state.next_session_id += 1;
        let id = state.next_session_id;
        info!(session_id = id, first = %players[0], second = %players[1], staked, "Opening session");

        let mut session = Session::open(id, players, staked);
        self.reschedule_timers(&mut session, &mut state.next_timer_seq);
        for idx in 0..2 {
            let view = session.view_for(idx);
            session.notices[idx] = self
                .notifier
                .notify(&session.players[idx], Notice::MatchStarted(view))
                .await;
        }
        for player in &session.players {
            state.by_participant.insert(player.clone(), id);
        }
        state.sessions.insert(id, session);
        id
    }

    /// Cancel-then-restart of both session timers under a fresh generation.
    fn reschedule_timers(&self, session: &mut Session, next_seq: &mut u64) {
        *next_seq += 1;
        let seq = *next_seq;
        session.timer_seq = seq;

        if let Some(handle) = session.move_timer.take() {
            self.timers.cancel(&handle);
        }
        if let Some(handle) = session.idle_timer.take() {
            self.timers.cancel(&handle);
        }
        session.move_timer = Some(self.timers.after(
            self.config.move_timeout(),
            TimerToken::MoveTimeout {
                session: session.id,
                seq,
            },
        ));
        session.idle_timer = Some(self.timers.after(
            self.config.idle_timeout(),
            TimerToken::IdleTimeout {
                session: session.id,
                seq,
            },
        ));
    }

    /// Next-round or match-end step after a round resolved.
    async fn conclude_round(
        &self,
        state: &mut ArenaState,
        session_id: SessionId,
    ) -> Result<(), ArenaError> {
        let majority = self.config.majority();
        let rounds = self.config.rounds_per_match;
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or(ArenaError::NotInSession)?;

        match session.resolve_round(majority, rounds) {
            RoundResolution::NextRound => {
                debug!(session_id, round = session.round, "Starting next round");
                for idx in 0..2 {
                    let view = session.view_for(idx);
                    self.push_notice(session, idx, Notice::RoundStarted(view)).await;
                }
                Ok(())
            }
            RoundResolution::MatchOver(verdict) => {
                let outcome = match verdict {
                    MatchVerdict::Winner(winner) => MatchOutcome::Win {
                        winner: session.players[winner].clone(),
                        loser: session.players[1 - winner].clone(),
                    },
                    MatchVerdict::Drawn => MatchOutcome::Draw {
                        players: session.players.clone(),
                    },
                };
                self.finish_session(state, session_id, outcome, FinishCause::Played)
                    .await
            }
        }
    }

    /// Settles the outcome, announces it, and retires the session.
    ///
    /// Settlement strictly precedes retirement; retirement clears both
    /// participant lookups in one step, which is what makes a second
    /// settlement for this session unreachable.
    async fn finish_session(
        &self,
        state: &mut ArenaState,
        session_id: SessionId,
        outcome: MatchOutcome,
        cause: FinishCause,
    ) -> Result<(), ArenaError> {
        let staked = state
            .sessions
            .get(&session_id)
            .map(|s| s.staked)
            .unwrap_or(false);

        settle(self.ledger.as_ref(), &self.config, &outcome, staked).await?;

        if let Some(session) = state.sessions.get_mut(&session_id) {
            session.state = SessionState::MatchResolved;
            for idx in 0..2 {
                let result = result_kind_for(&outcome, cause, &session.players[idx]);
                let view = session.view_for(idx);
                self.push_notice(session, idx, Notice::MatchResult { view, result })
                    .await;
            }
            if staked
                && matches!(
                    outcome,
                    MatchOutcome::Draw { .. } | MatchOutcome::Voided { .. }
                )
            {
                for player in session.players.clone() {
                    self.notifier
                        .notify(
                            &player,
                            Notice::StakeRefunded {
                                amount: self.config.stake_amount,
                            },
                        )
                        .await;
                }
            }
        }

        self.retire(state, session_id);
        Ok(())
    }

    /// Removes the session and both participant lookups in one step, and
    /// cancels whatever timers are still pending.
    fn retire(&self, state: &mut ArenaState, session_id: SessionId) {
        if let Some(session) = state.sessions.remove(&session_id) {
            for player in &session.players {
                state.by_participant.remove(player);
            }
            if let Some(handle) = session.move_timer {
                self.timers.cancel(&handle);
            }
            if let Some(handle) = session.idle_timer {
                self.timers.cancel(&handle);
            }
            info!(session_id, "Session retired");
        }
    }

    /// Edits the participant's live match message when a correlation handle
    /// exists, otherwise sends fresh and keeps the handle.
    async fn push_notice(&self, session: &mut Session, idx: usize, notice: Notice) {
        match &session.notices[idx] {
            Some(handle) => self.notifier.update(handle, notice).await,
            None => {
                session.notices[idx] = self
                    .notifier
                    .notify(&session.players[idx], notice)
                    .await;
            }
        }
    }
}

fn result_kind_for(outcome: &MatchOutcome, cause: FinishCause, player: &str) -> MatchResultKind {
    match outcome {
        MatchOutcome::Win { winner, .. } => match (winner.as_str() == player, cause) {
            (true, FinishCause::Played) => MatchResultKind::Won,
            (false, FinishCause::Played) => MatchResultKind::Lost,
            (true, FinishCause::Forfeit) => MatchResultKind::OpponentForfeited,
            (false, FinishCause::Forfeit) => MatchResultKind::Forfeited,
        },
        MatchOutcome::Draw { .. } => MatchResultKind::Drawn,
        MatchOutcome::Voided { .. } => MatchResultKind::Voided,
    }
}
