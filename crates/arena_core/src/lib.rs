//! Session lifecycle and concurrency core for a staked tic-tac-toe arena.
//!
//! The crate pairs remote participants from two matchmaking queues, runs each
//! match as an isolated best-of-N session with move and idle timeouts, and
//! settles the outcome against a per-participant ledger. Transport, message
//! formatting, and durable storage are collaborators behind the [`Notifier`],
//! [`Ledger`], and [`Timers`] traits; the core is a pure logic layer driven
//! one inbound action at a time.
//!
//! # Architecture
//!
//! - [`Arena`]: front door for every action; sole owner of the queue and
//!   session lookups.
//! - [`session`](SessionState): explicit tagged state machine for one match.
//! - [`settlement`](MatchOutcome): terminal outcome → ledger deltas, exactly
//!   once per session.
//! - [`Timers`]: deferred tokens keyed by id and generation, never closures
//!   over live sessions, which is what makes late firings harmless.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod manager;
mod notify;
mod profile;
mod queue;
mod session;
mod settlement;
mod timer;

pub use config::{ArenaConfig, ConfigError};
pub use error::ArenaError;
pub use manager::Arena;
pub use notify::{GameView, MatchResultKind, Notice, NoticeHandle, Notifier, NullNotifier};
pub use profile::{Ledger, MemoryLedger, ParticipantId, Profile, ProfileDelta};
pub use queue::QueueKind;
pub use session::{SessionId, SessionState};
pub use settlement::MatchOutcome;
pub use timer::{TimerHandle, TimerToken, Timers, TokioTimers, drive};
