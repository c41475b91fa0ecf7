//! Shared fixtures: a hand-cranked timer provider and a recording
//! notification sink, so tests fire timeouts deterministically and assert on
//! everything the arena announced.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arena_core::{
    Arena, ArenaConfig, MemoryLedger, Notice, NoticeHandle, Notifier, Profile, QueueKind,
    TimerHandle, TimerToken, Timers,
};
use tracing_subscriber::EnvFilter;

/// Timer provider that records schedules and fires nothing on its own;
/// tests pull a pending token and feed it to `Arena::handle_timer`.
#[derive(Default)]
pub struct ManualTimers {
    inner: Mutex<ManualState>,
}

#[derive(Default)]
struct ManualState {
    next_id: u64,
    pending: Vec<(TimerHandle, TimerToken)>,
}

impl ManualTimers {
    /// Tokens currently scheduled, oldest first.
    pub fn pending(&self) -> Vec<TimerToken> {
        self.inner
            .lock()
            .unwrap()
            .pending
            .iter()
            .map(|(_, token)| token.clone())
            .collect()
    }

    /// First scheduled token matching `pred`, left in place.
    pub fn find(&self, pred: impl Fn(&TimerToken) -> bool) -> Option<TimerToken> {
        self.pending().into_iter().find(|token| pred(token))
    }
}

impl Timers for ManualTimers {
    fn after(&self, _delay: Duration, token: TimerToken) -> TimerHandle {
        let mut state = self.inner.lock().unwrap();
        state.next_id += 1;
        let handle = TimerHandle(state.next_id);
        state.pending.push((handle.clone(), token));
        handle
    }

    fn cancel(&self, handle: &TimerHandle) {
        self.inner
            .lock()
            .unwrap()
            .pending
            .retain(|(pending, _)| pending != handle);
    }
}

pub fn queue_expiry(token: &TimerToken) -> bool {
    matches!(token, TimerToken::QueueExpiry { .. })
}

pub fn move_timeout(token: &TimerToken) -> bool {
    matches!(token, TimerToken::MoveTimeout { .. })
}

pub fn idle_timeout(token: &TimerToken) -> bool {
    matches!(token, TimerToken::IdleTimeout { .. })
}

/// Sink that records every delivery and edit, resolving edits back to their
/// recipient through the minted handles.
#[derive(Default)]
pub struct RecordingNotifier {
    inner: Mutex<RecorderState>,
}

#[derive(Default)]
struct RecorderState {
    next_handle: u64,
    recipients: HashMap<NoticeHandle, String>,
    sent: Vec<(String, Notice)>,
    updated: Vec<(String, Notice)>,
}

impl RecordingNotifier {
    /// Fresh deliveries to `id`, in order.
    pub fn sent_to(&self, id: &str) -> Vec<Notice> {
        self.inner
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|(to, _)| to == id)
            .map(|(_, notice)| notice.clone())
            .collect()
    }

    /// In-place edits, in order, regardless of recipient.
    pub fn updated(&self) -> Vec<Notice> {
        self.inner
            .lock()
            .unwrap()
            .updated
            .iter()
            .map(|(_, notice)| notice.clone())
            .collect()
    }

    /// Everything `id` has seen: fresh deliveries and edits, in order of kind.
    pub fn all_for(&self, id: &str) -> Vec<Notice> {
        let state = self.inner.lock().unwrap();
        state
            .sent
            .iter()
            .chain(state.updated.iter())
            .filter(|(to, _)| to == id)
            .map(|(_, notice)| notice.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, to: &str, notice: Notice) -> Option<NoticeHandle> {
        let mut state = self.inner.lock().unwrap();
        state.next_handle += 1;
        let handle = NoticeHandle(state.next_handle);
        state.recipients.insert(handle, to.to_string());
        state.sent.push((to.to_string(), notice));
        Some(handle)
    }

    async fn update(&self, handle: &NoticeHandle, notice: Notice) {
        let mut state = self.inner.lock().unwrap();
        let to = state.recipients.get(handle).cloned().unwrap_or_default();
        state.updated.push((to, notice));
    }

    async fn retract(&self, _handle: &NoticeHandle) {}
}

/// One arena with its collaborators, all inspectable.
pub struct Fixture {
    pub arena: Arc<Arena>,
    pub ledger: Arc<MemoryLedger>,
    pub notifier: Arc<RecordingNotifier>,
    pub timers: Arc<ManualTimers>,
}

pub fn fixture() -> Fixture {
    fixture_with(ArenaConfig::default())
}

pub fn fixture_with(config: ArenaConfig) -> Fixture {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let ledger = Arc::new(MemoryLedger::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let timers = Arc::new(ManualTimers::default());
    let arena = Arc::new(Arena::new(
        config,
        ledger.clone(),
        notifier.clone(),
        timers.clone(),
    ));
    Fixture {
        arena,
        ledger,
        notifier,
        timers,
    }
}

/// Enqueues both participants casually, leaving them paired with `a` to move.
pub async fn start_casual(fx: &Fixture, a: &str, b: &str) {
    fx.arena.enqueue(a, a, QueueKind::Casual).await.expect("enqueue first");
    fx.arena.enqueue(b, b, QueueKind::Casual).await.expect("enqueue second");
}

/// Plays the given moves, expecting each to be accepted.
pub async fn play(arena: &Arena, moves: &[(&str, usize)]) {
    for (participant, cell) in moves {
        arena
            .make_move(participant, *cell)
            .await
            .unwrap_or_else(|e| panic!("move {participant}:{cell} rejected: {e}"));
    }
}

pub async fn profile_of(fx: &Fixture, id: &str) -> Profile {
    fx.arena
        .profile(id)
        .await
        .expect("ledger read")
        .expect("profile present")
}

pub async fn balance_of(fx: &Fixture, id: &str) -> f64 {
    *profile_of(fx, id).await.balance()
}
