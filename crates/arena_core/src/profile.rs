//! Per-participant ledger records and the store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::ArenaError;

/// Identifier of a remote participant, assigned by the transport layer.
pub type ParticipantId = String;

/// Durable per-participant record: ranking score, currency balance, and
/// win/loss/draw counters.
///
/// Created on first contact, mutated only through [`Ledger::apply_delta`],
/// never deleted. `score` and `balance` are floored at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct Profile {
    id: ParticipantId,
    display_name: String,
    score: i64,
    balance: f64,
    games_played: u32,
    wins: u32,
    losses: u32,
    draws: u32,
    last_active: DateTime<Utc>,
}

impl Profile {
    fn seed(id: &str, display_name: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            score: 0,
            balance: 0.0,
            games_played: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            last_active: Utc::now(),
        }
    }

    fn apply(&mut self, delta: &ProfileDelta) {
        self.score = (self.score + delta.score).max(0);
        self.balance = (self.balance + delta.balance).max(0.0);
        self.games_played += delta.games_played;
        self.wins += delta.wins;
        self.losses += delta.losses;
        self.draws += delta.draws;
        self.last_active = Utc::now();
    }
}

/// Signed deltas applied to a profile in one mutation.
///
/// Counters only ever grow; `score` and `balance` may go negative here and
/// are clamped at zero on application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileDelta {
    /// Ranking score delta (may be negative).
    pub score: i64,
    /// Currency delta in TMT (may be negative).
    pub balance: f64,
    /// Games-played increment.
    pub games_played: u32,
    /// Wins increment.
    pub wins: u32,
    /// Losses increment.
    pub losses: u32,
    /// Draws increment.
    pub draws: u32,
}

/// Key-value store contract for profiles.
///
/// Mutations must be read-modify-write atomic per participant even when the
/// backing store is remote; the arena awaits any mutation that gates a
/// subsequent decision (staked balance checks) before deciding.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Returns the profile for `id`, if one was ever created.
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, ArenaError>;

    /// Returns the existing profile, or creates one seeded with
    /// `display_name`.
    async fn ensure_profile(&self, id: &str, display_name: &str) -> Result<Profile, ArenaError>;

    /// Applies `delta` to the profile and returns the result, with `score`
    /// and `balance` clamped at zero.
    ///
    /// # Errors
    ///
    /// [`ArenaError::ProfileAbsent`] when `id` was never ensured.
    async fn apply_delta(&self, id: &str, delta: ProfileDelta) -> Result<Profile, ArenaError>;

    /// Debits exactly `amount` after checking the balance covers it. The
    /// check and the debit are one read-modify-write step; a concurrent
    /// writer can never turn the debit into a clamped partial one.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InsufficientBalance`] when the balance falls short;
    /// nothing is debited. [`ArenaError::ProfileAbsent`] when `id` was never
    /// ensured.
    async fn reserve(&self, id: &str, amount: f64) -> Result<Profile, ArenaError>;
}

/// In-process [`Ledger`] backed by a mutex-guarded map.
///
/// The reference implementation and the test double; per-key atomicity falls
/// out of the single lock.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    profiles: Mutex<HashMap<ParticipantId, Profile>>,
}

impl MemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    #[instrument(skip(self))]
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, ArenaError> {
        Ok(self.profiles.lock().await.get(id).cloned())
    }

    #[instrument(skip(self))]
    async fn ensure_profile(&self, id: &str, display_name: &str) -> Result<Profile, ArenaError> {
        let mut profiles = self.profiles.lock().await;
        if let Some(profile) = profiles.get(id) {
            debug!(id, "Profile already present");
            return Ok(profile.clone());
        }
        info!(id, display_name, "Creating profile on first contact");
        let profile = Profile::seed(id, display_name);
        profiles.insert(id.to_string(), profile.clone());
        Ok(profile)
    }

    #[instrument(skip(self))]
    async fn apply_delta(&self, id: &str, delta: ProfileDelta) -> Result<Profile, ArenaError> {
        let mut profiles = self.profiles.lock().await;
        let profile = profiles
            .get_mut(id)
            .ok_or_else(|| ArenaError::ProfileAbsent(id.to_string()))?;
        profile.apply(&delta);
        debug!(id, score = profile.score, balance = profile.balance, "Delta applied");
        Ok(profile.clone())
    }

    #[instrument(skip(self))]
    async fn reserve(&self, id: &str, amount: f64) -> Result<Profile, ArenaError> {
        let mut profiles = self.profiles.lock().await;
        let profile = profiles
            .get_mut(id)
            .ok_or_else(|| ArenaError::ProfileAbsent(id.to_string()))?;
        if profile.balance < amount {
            debug!(id, balance = profile.balance, amount, "Reservation refused");
            return Err(ArenaError::InsufficientBalance);
        }
        profile.balance -= amount;
        profile.last_active = Utc::now();
        debug!(id, balance = profile.balance, "Stake reserved");
        Ok(profile.clone())
    }
}
