//! Matchmaking queue behavior: pairing, rejection, expiry, and stake
//! reservation.

mod common;

use async_trait::async_trait;
use std::sync::Arc;

use arena_core::{
    Arena, ArenaConfig, ArenaError, Ledger, MemoryLedger, Notice, Profile, ProfileDelta, QueueKind,
};
use arena_tictactoe::Mark;
use common::*;

#[tokio::test]
async fn lone_entry_waits_and_a_second_pairs_immediately() {
    let fx = fixture();
    fx.arena.enqueue("a", "Alice", QueueKind::Casual).await.unwrap();
    assert!(fx.arena.is_queued("a").await);
    assert!(fx.arena.session_view("a").await.is_none());

    fx.arena.enqueue("b", "Bob", QueueKind::Casual).await.unwrap();
    assert!(!fx.arena.is_queued("a").await);
    assert!(!fx.arena.is_queued("b").await);

    let view_a = fx.arena.session_view("a").await.expect("session for a");
    assert_eq!(view_a.round, 1);
    assert_eq!(view_a.your_mark, Mark::X);
    assert!(view_a.your_turn);
    let view_b = fx.arena.session_view("b").await.expect("session for b");
    assert_eq!(view_b.your_mark, Mark::O);
    assert!(!view_b.your_turn);

    // Expiry timers were cancelled at pairing; the session timers remain.
    assert!(fx.timers.find(queue_expiry).is_none());
    assert!(fx.timers.find(move_timeout).is_some());
    assert!(fx.timers.find(idle_timeout).is_some());

    assert!(matches!(
        fx.notifier.sent_to("a").as_slice(),
        [Notice::MatchStarted(_)]
    ));
    assert!(matches!(
        fx.notifier.sent_to("b").as_slice(),
        [Notice::MatchStarted(_)]
    ));
}

#[tokio::test]
async fn double_enqueue_and_enqueue_during_a_match_are_rejected() {
    let fx = fixture();
    fx.arena.enqueue("a", "Alice", QueueKind::Casual).await.unwrap();
    assert_eq!(
        fx.arena.enqueue("a", "Alice", QueueKind::Casual).await,
        Err(ArenaError::AlreadyQueued)
    );
    // Presence in either lane blocks the other lane too.
    assert_eq!(
        fx.arena.enqueue("a", "Alice", QueueKind::Staked).await,
        Err(ArenaError::AlreadyQueued)
    );

    fx.arena.enqueue("b", "Bob", QueueKind::Casual).await.unwrap();
    assert_eq!(
        fx.arena.enqueue("a", "Alice", QueueKind::Casual).await,
        Err(ArenaError::AlreadyInSession)
    );
}

#[tokio::test]
async fn third_participant_waits_for_the_next_pair() {
    let fx = fixture();
    start_casual(&fx, "a", "b").await;

    fx.arena.enqueue("c", "Cara", QueueKind::Casual).await.unwrap();
    assert!(fx.arena.is_queued("c").await);
    assert!(fx.arena.session_view("c").await.is_none());

    fx.arena.enqueue("d", "Dave", QueueKind::Casual).await.unwrap();
    assert!(fx.arena.session_view("c").await.is_some());
    assert!(fx.arena.session_view("d").await.is_some());
}

#[tokio::test]
async fn lanes_do_not_cross_pair() {
    let fx = fixture();
    fx.arena.adjust_profile("b", 0, 5.0).await.unwrap();
    fx.arena.enqueue("a", "Alice", QueueKind::Casual).await.unwrap();
    fx.arena.enqueue("b", "Bob", QueueKind::Staked).await.unwrap();

    assert!(fx.arena.is_queued("a").await);
    assert!(fx.arena.is_queued("b").await);
    assert!(fx.arena.session_view("a").await.is_none());
    assert!(fx.arena.session_view("b").await.is_none());
}

#[tokio::test]
async fn queue_expiry_removes_the_entry_and_refunds_the_stake() {
    let fx = fixture();
    fx.arena.adjust_profile("a", 0, 5.0).await.unwrap();
    fx.arena.enqueue("a", "Alice", QueueKind::Staked).await.unwrap();
    assert_eq!(balance_of(&fx, "a").await, 4.0);

    let token = fx.timers.find(queue_expiry).expect("expiry scheduled");
    fx.arena.handle_timer(token.clone()).await.unwrap();

    assert!(!fx.arena.is_queued("a").await);
    assert_eq!(balance_of(&fx, "a").await, 5.0);
    let seen = fx.notifier.sent_to("a");
    assert!(seen.contains(&Notice::QueueExpired));
    assert!(seen.contains(&Notice::StakeRefunded { amount: 1.0 }));

    // A second firing of the same token must not refund twice.
    fx.arena.handle_timer(token).await.unwrap();
    assert_eq!(balance_of(&fx, "a").await, 5.0);
}

#[tokio::test]
async fn casual_expiry_notifies_without_a_refund() {
    let fx = fixture();
    fx.arena.enqueue("a", "Alice", QueueKind::Casual).await.unwrap();

    let token = fx.timers.find(queue_expiry).expect("expiry scheduled");
    fx.arena.handle_timer(token).await.unwrap();

    assert!(!fx.arena.is_queued("a").await);
    let seen = fx.notifier.sent_to("a");
    assert!(seen.contains(&Notice::QueueExpired));
    assert!(!seen.iter().any(|n| matches!(n, Notice::StakeRefunded { .. })));
}

#[tokio::test]
async fn staked_enqueue_needs_the_full_stake_up_front() {
    let fx = fixture();
    fx.arena.adjust_profile("a", 0, 0.5).await.unwrap();
    assert_eq!(
        fx.arena.enqueue("a", "Alice", QueueKind::Staked).await,
        Err(ArenaError::InsufficientBalance)
    );
    assert!(!fx.arena.is_queued("a").await);
    // Nothing was debited by the rejected attempt.
    assert_eq!(balance_of(&fx, "a").await, 0.5);
}

#[tokio::test]
async fn poor_second_enqueuer_leaves_the_first_waiting() {
    let fx = fixture();
    fx.arena.adjust_profile("a", 0, 5.0).await.unwrap();
    fx.arena.adjust_profile("b", 0, 0.25).await.unwrap();

    fx.arena.enqueue("a", "Alice", QueueKind::Staked).await.unwrap();
    assert_eq!(
        fx.arena.enqueue("b", "Bob", QueueKind::Staked).await,
        Err(ArenaError::InsufficientBalance)
    );

    assert!(fx.arena.is_queued("a").await);
    assert!(!fx.arena.is_queued("b").await);
    // The first entry keeps its reservation and its expiry timer.
    assert_eq!(balance_of(&fx, "a").await, 4.0);
    assert!(fx.timers.find(queue_expiry).is_some());
}

/// Ledger that drains the balance right before delegating a reservation,
/// standing in for any writer racing the enqueue.
struct DrainingLedger {
    inner: MemoryLedger,
    drain: f64,
}

#[async_trait]
impl Ledger for DrainingLedger {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, ArenaError> {
        self.inner.get_profile(id).await
    }

    async fn ensure_profile(&self, id: &str, display_name: &str) -> Result<Profile, ArenaError> {
        self.inner.ensure_profile(id, display_name).await
    }

    async fn apply_delta(&self, id: &str, delta: ProfileDelta) -> Result<Profile, ArenaError> {
        self.inner.apply_delta(id, delta).await
    }

    async fn reserve(&self, id: &str, amount: f64) -> Result<Profile, ArenaError> {
        self.inner
            .apply_delta(
                id,
                ProfileDelta {
                    balance: -self.drain,
                    ..Default::default()
                },
            )
            .await?;
        self.inner.reserve(id, amount).await
    }
}

#[tokio::test]
async fn drained_balance_fails_the_reservation_instead_of_clamping() {
    let ledger = Arc::new(DrainingLedger {
        inner: MemoryLedger::new(),
        drain: 0.75,
    });
    let timers = Arc::new(ManualTimers::default());
    let arena = Arena::new(
        ArenaConfig::default(),
        ledger.clone(),
        Arc::new(RecordingNotifier::default()),
        timers.clone(),
    );

    arena.adjust_profile("a", 0, 1.0).await.unwrap();
    assert_eq!(
        arena.enqueue("a", "Alice", QueueKind::Staked).await,
        Err(ArenaError::InsufficientBalance)
    );

    // Only the drain moved currency: no partial debit, no entry, and no
    // expiry timer armed that could later refund a full stake.
    assert!(!arena.is_queued("a").await);
    let profile = arena.profile("a").await.unwrap().unwrap();
    assert_eq!(*profile.balance(), 0.25);
    assert!(timers.pending().is_empty());
}

#[tokio::test]
async fn direct_pairing_bypasses_the_queues() {
    let fx = fixture();
    let id = fx.arena.pair_directly("a", "b").await.unwrap();
    assert!(id > 0);
    assert!(fx.arena.session_view("a").await.is_some());
    assert!(fx.arena.session_view("b").await.is_some());

    assert_eq!(
        fx.arena.pair_directly("a", "c").await,
        Err(ArenaError::AlreadyInSession)
    );
    fx.arena.enqueue("c", "Cara", QueueKind::Casual).await.unwrap();
    assert_eq!(
        fx.arena.pair_directly("c", "d").await,
        Err(ArenaError::AlreadyQueued)
    );
}
