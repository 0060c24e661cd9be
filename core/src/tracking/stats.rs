//! Running totals keyed by participant identity.
//!
//! Unlike per-session counters these persist across sessions for the
//! process lifetime, feeding admin inspection and summaries. Records are
//! created on first use; reads return defensive snapshots.

use std::sync::Mutex;

use hashbrown::HashMap;
use serde::Serialize;
use skirmish_types::ParticipantId;

/// Lifetime totals for one participant. All fields accumulate
/// monotonically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParticipantStats {
    pub damage_dealt: i64,
    pub damage_received: i64,
    pub hits_landed: u32,
    pub wins: u32,
    pub losses: u32,
    pub combat_time_secs: i64,
    pub combats: u32,
}

/// Concurrency-safe accumulator of lifetime statistics.
pub struct SessionTracker {
    stats: Mutex<HashMap<ParticipantId, ParticipantStats>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            stats: Mutex::new(HashMap::new()),
        }
    }

    fn with_entry(&self, participant: ParticipantId, update: impl FnOnce(&mut ParticipantStats)) {
        let mut stats = self.stats.lock().unwrap();
        update(stats.entry(participant).or_default());
    }

    pub fn record_damage_dealt(&self, participant: ParticipantId, amount: i64) {
        self.with_entry(participant, |s| {
            s.damage_dealt += amount.max(0);
            s.hits_landed += 1;
        });
    }

    pub fn record_damage_received(&self, participant: ParticipantId, amount: i64) {
        self.with_entry(participant, |s| s.damage_received += amount.max(0));
    }

    pub fn record_win(&self, participant: ParticipantId) {
        self.with_entry(participant, |s| s.wins += 1);
    }

    pub fn record_loss(&self, participant: ParticipantId) {
        self.with_entry(participant, |s| s.losses += 1);
    }

    pub fn add_combat_time(&self, participant: ParticipantId, secs: i64) {
        self.with_entry(participant, |s| s.combat_time_secs += secs.max(0));
    }

    pub fn increment_combats(&self, participant: ParticipantId) {
        self.with_entry(participant, |s| s.combats += 1);
    }

    /// Snapshot of one participant's totals; `None` if never recorded.
    pub fn snapshot(&self, participant: ParticipantId) -> Option<ParticipantStats> {
        self.stats.lock().unwrap().get(&participant).copied()
    }

    /// Defensive copy of every record.
    pub fn snapshot_all(&self) -> HashMap<ParticipantId, ParticipantStats> {
        self.stats.lock().unwrap().clone()
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}
