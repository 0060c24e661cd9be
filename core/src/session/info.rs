//! Combat session data: participants, lifecycle state, per-session counters.

use chrono::NaiveDateTime;
use serde::Serialize;
use skirmish_types::{ParticipantId, SessionId};

use super::{SessionError, TimerState};

/// Lifecycle state of one combat session.
///
/// `Cooldown` and `InterferenceFlagged` are labels for collaborators;
/// the registry's teardown logic keys off session removal, not the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SessionState {
    #[default]
    NotInCombat,
    Active,
    /// Terminal label set during teardown, just before removal.
    Cooldown,
    /// A third party has interfered with this session at least once.
    InterferenceFlagged,
}

/// Third-party interference incidents recorded against one session.
///
/// The count is monotonically non-decreasing for the life of the session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InterferenceRecord {
    pub incidents: u32,
    pub last_incident: Option<NaiveDateTime>,
}

impl InterferenceRecord {
    pub fn record(&mut self, now: NaiveDateTime) {
        self.incidents += 1;
        self.last_incident = Some(now);
    }
}

/// Damage and hit counters for one side of a session, scoped to that
/// session only (lifetime totals live in the tracking module).
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SessionSideStats {
    pub damage_dealt: i64,
    pub hits_landed: u32,
}

/// One ongoing combat between exactly two participants.
#[derive(Debug, Clone)]
pub struct CombatSession {
    pub id: SessionId,
    pub attacker: ParticipantId,
    pub defender: ParticipantId,
    pub created_at: NaiveDateTime,
    pub state: SessionState,
    pub timer: TimerState,
    /// Pass-through to visual collaborators; irrelevant to core logic.
    pub visuals_enabled: bool,
    attacker_stats: SessionSideStats,
    defender_stats: SessionSideStats,
    pub interference: InterferenceRecord,
}

impl CombatSession {
    pub fn new(
        id: SessionId,
        attacker: ParticipantId,
        defender: ParticipantId,
        duration_secs: i64,
        visuals_enabled: bool,
        now: NaiveDateTime,
    ) -> Result<Self, SessionError> {
        if attacker == defender {
            return Err(SessionError::SameParticipant(attacker));
        }
        Ok(Self {
            id,
            attacker,
            defender,
            created_at: now,
            state: SessionState::Active,
            timer: TimerState::new(duration_secs, now)?,
            visuals_enabled,
            attacker_stats: SessionSideStats::default(),
            defender_stats: SessionSideStats::default(),
            interference: InterferenceRecord::default(),
        })
    }

    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.attacker == participant || self.defender == participant
    }

    pub fn opponent_of(&self, participant: ParticipantId) -> Option<ParticipantId> {
        if participant == self.attacker {
            Some(self.defender)
        } else if participant == self.defender {
            Some(self.attacker)
        } else {
            None
        }
    }

    /// Credit one landed hit to `dealer`. Returns false if `dealer` is not
    /// part of this session.
    pub fn record_hit(&mut self, dealer: ParticipantId, amount: i64) -> bool {
        let stats = if dealer == self.attacker {
            &mut self.attacker_stats
        } else if dealer == self.defender {
            &mut self.defender_stats
        } else {
            return false;
        };
        stats.damage_dealt += amount.max(0);
        stats.hits_landed += 1;
        true
    }

    pub fn stats_for(&self, participant: ParticipantId) -> Option<SessionSideStats> {
        if participant == self.attacker {
            Some(self.attacker_stats)
        } else if participant == self.defender {
            Some(self.defender_stats)
        } else {
            None
        }
    }

    /// Defensive copy for notification sinks and inspection tooling.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            attacker: self.attacker,
            defender: self.defender,
            created_at: self.created_at,
            state: self.state,
            remaining_secs: self.timer.remaining_secs(),
            progress: self.timer.progress(),
            attacker_stats: self.attacker_stats,
            defender_stats: self.defender_stats,
            interference_incidents: self.interference.incidents,
        }
    }
}

/// Point-in-time copy of session state. Never aliases the live session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub attacker: ParticipantId,
    pub defender: ParticipantId,
    pub created_at: NaiveDateTime,
    pub state: SessionState,
    pub remaining_secs: i64,
    pub progress: f32,
    pub attacker_stats: SessionSideStats,
    pub defender_stats: SessionSideStats,
    pub interference_incidents: u32,
}
