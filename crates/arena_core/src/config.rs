//! Arena tuning knobs: timeouts, round count, and stake economics.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

/// Tunable parameters for the arena core.
///
/// The defaults mirror production: 30 s queue expiry, 1 min move timeout,
/// 5 min idle timeout, best-of-3 rounds, 1 TMT stake with a 0.75 TMT
/// winner payout (the house keeps the rest; a loser's stake is never
/// refunded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Seconds a queue entry waits before expiring.
    pub queue_expiry_secs: u64,
    /// Seconds the current mover has before forfeiting the match.
    pub move_timeout_secs: u64,
    /// Seconds of total inactivity before the match is voided.
    pub idle_timeout_secs: u64,
    /// Rounds per match (best-of-N).
    pub rounds_per_match: u8,
    /// Stake debited from each participant of a staked match, in TMT.
    pub stake_amount: f64,
    /// Payout credited to a staked winner, in TMT.
    pub win_payout: f64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            queue_expiry_secs: 30,
            move_timeout_secs: 60,
            idle_timeout_secs: 300,
            rounds_per_match: 3,
            stake_amount: 1.0,
            win_payout: 0.75,
        }
    }
}

impl ArenaConfig {
    /// Loads configuration from a TOML file; absent keys fall back to the
    /// defaults.
    #[instrument]
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        info!(?config, "Loaded arena configuration");
        Ok(config)
    }

    /// Queue entry expiry window.
    pub fn queue_expiry(&self) -> Duration {
        Duration::from_secs(self.queue_expiry_secs)
    }

    /// Per-move deadline for the current mover.
    pub fn move_timeout(&self) -> Duration {
        Duration::from_secs(self.move_timeout_secs)
    }

    /// Whole-session inactivity deadline.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Round wins one side needs to take the match early.
    pub fn majority(&self) -> u8 {
        self.rounds_per_match / 2 + 1
    }
}

/// Failure to load an [`ArenaConfig`] from disk.
#[derive(Debug, Display, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[display("failed to read {path}: {source}")]
    Read {
        /// Path that was attempted.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[display("failed to parse {path}: {source}")]
    Parse {
        /// Path that was attempted.
        path: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}
