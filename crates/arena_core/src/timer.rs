//! Deferred-action scheduling.
//!
//! Timers never capture session state. A schedule carries a [`TimerToken`]
//! naming what it targets by id plus a generation counter; the arena resolves
//! the token through its lookups at fire time, so a token for a retired
//! session, a departed queue entry, or a superseded schedule lands as a
//! no-op.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::manager::Arena;
use crate::profile::ParticipantId;
use crate::session::SessionId;

/// What a fired timer targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerToken {
    /// A waiting queue entry reached its expiry window.
    QueueExpiry {
        /// Entry owner.
        participant: ParticipantId,
        /// Generation stamped into the entry at enqueue time.
        seq: u64,
    },
    /// The current mover ran out of time; they forfeit the match.
    MoveTimeout {
        /// Targeted session.
        session: SessionId,
        /// Generation stamped at the last reschedule.
        seq: u64,
    },
    /// Neither participant acted for the idle window; the match is voided.
    IdleTimeout {
        /// Targeted session.
        session: SessionId,
        /// Generation stamped at the last reschedule.
        seq: u64,
    },
}

/// Handle to one pending schedule, scoped to the provider that minted it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// Clock provider: schedules and cancels deferred token deliveries.
pub trait Timers: Send + Sync {
    /// Delivers `token` back to the arena after `delay`.
    fn after(&self, delay: Duration, token: TimerToken) -> TimerHandle;

    /// Cancels a pending delivery. Cancelling a handle that already fired is
    /// a no-op; the token-generation check absorbs the stray delivery.
    fn cancel(&self, handle: &TimerHandle);
}

/// Tokio-backed [`Timers`]: each schedule is a sleeping task that pushes its
/// token into a channel the arena driver consumes.
pub struct TokioTimers {
    tx: mpsc::UnboundedSender<TimerToken>,
    tasks: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
    next_id: AtomicU64,
}

impl TokioTimers {
    /// Creates the provider and the receiving end for [`drive`].
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<TimerToken>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let timers = Arc::new(Self {
            tx,
            tasks: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        });
        (timers, rx)
    }
}

impl Timers for TokioTimers {
    fn after(&self, delay: Duration, token: TimerToken) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tx = self.tx.clone();
        let tasks = Arc::clone(&self.tasks);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The driver may already be gone on shutdown.
            let _ = tx.send(token);
            tasks.lock().expect("timer table lock").remove(&id);
        });
        self.tasks.lock().expect("timer table lock").insert(id, task);
        TimerHandle(id)
    }

    fn cancel(&self, handle: &TimerHandle) {
        if let Some(task) = self.tasks.lock().expect("timer table lock").remove(&handle.0) {
            task.abort();
        }
    }
}

/// Pumps fired tokens into the arena until the provider is dropped.
///
/// Runs each firing to completion before taking the next, so timer effects
/// interleave with user actions at action granularity, never inside one.
pub async fn drive(arena: Arc<Arena>, mut rx: mpsc::UnboundedReceiver<TimerToken>) {
    while let Some(token) = rx.recv().await {
        if let Err(error) = arena.handle_timer(token).await {
            warn!(%error, "Timer action failed");
        }
    }
}
