//! Matchmaking queues: two FIFO waiting lists with per-entry expiry.

use chrono::{DateTime, Utc};
use derive_new::new;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::profile::ParticipantId;
use crate::timer::TimerHandle;

/// Stake class of a matchmaking queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum QueueKind {
    /// No currency at risk.
    Casual,
    /// One stake unit debited per participant, at risk on loss.
    Staked,
}

/// A participant waiting to be paired.
#[derive(Debug, new)]
pub(crate) struct QueueEntry {
    pub(crate) participant: ParticipantId,
    pub(crate) kind: QueueKind,
    pub(crate) enqueued_at: DateTime<Utc>,
    /// Stake already debited; refunded in full if the entry expires.
    pub(crate) reserved: bool,
    pub(crate) expiry_timer: TimerHandle,
    /// Matches the seq inside the entry's expiry token; a token with any
    /// other seq belongs to an earlier incarnation of this participant's
    /// entry and must not touch this one.
    pub(crate) seq: u64,
}

/// The two waiting lists. Membership is disjoint: the arena rejects an
/// enqueue for a participant already present in either lane.
#[derive(Debug, Default)]
pub(crate) struct MatchQueues {
    casual: VecDeque<QueueEntry>,
    staked: VecDeque<QueueEntry>,
}

impl MatchQueues {
    fn lane(&self, kind: QueueKind) -> &VecDeque<QueueEntry> {
        match kind {
            QueueKind::Casual => &self.casual,
            QueueKind::Staked => &self.staked,
        }
    }

    fn lane_mut(&mut self, kind: QueueKind) -> &mut VecDeque<QueueEntry> {
        match kind {
            QueueKind::Casual => &mut self.casual,
            QueueKind::Staked => &mut self.staked,
        }
    }

    /// Whether `participant` is waiting in either lane.
    pub(crate) fn contains(&self, participant: &str) -> bool {
        self.casual
            .iter()
            .chain(self.staked.iter())
            .any(|e| e.participant == participant)
    }

    /// Number of entries waiting in `kind`.
    pub(crate) fn waiting(&self, kind: QueueKind) -> usize {
        self.lane(kind).len()
    }

    /// Appends an entry to the back of its lane.
    pub(crate) fn push(&mut self, entry: QueueEntry) {
        let kind = entry.kind;
        self.lane_mut(kind).push_back(entry);
    }

    /// Dequeues the two oldest entries of `kind` once the lane can pair.
    pub(crate) fn take_pair(&mut self, kind: QueueKind) -> Option<(QueueEntry, QueueEntry)> {
        let lane = self.lane_mut(kind);
        if lane.len() < 2 {
            return None;
        }
        let first = lane.pop_front()?;
        let second = lane.pop_front()?;
        Some((first, second))
    }

    /// Removes `participant`'s entry if it is still present with the given
    /// expiry generation. Idempotent against the pairing race: a stale seq or
    /// an already-departed entry removes nothing.
    pub(crate) fn remove_expired(&mut self, participant: &str, seq: u64) -> Option<QueueEntry> {
        for lane in [&mut self.casual, &mut self.staked] {
            if let Some(at) = lane
                .iter()
                .position(|e| e.participant == participant && e.seq == seq)
            {
                return lane.remove(at);
            }
        }
        None
    }
}
