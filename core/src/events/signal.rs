//! Signals emitted by the session core for cross-cutting concerns.
//!
//! These represent "interesting things that happened" at a higher level
//! than individual registry mutations; the registry routes them to the
//! collaborator sinks.

use chrono::NaiveDateTime;
use serde::Serialize;
use skirmish_types::{ParticipantId, SessionId};

use crate::session::SessionSnapshot;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EndReason {
    /// The countdown reached zero.
    Expired,
    /// A participant died; the opponent is credited the win.
    Death,
    /// A participant disconnected; treated as a loss, like death.
    Quit,
    /// Admin or host force-end; no win/loss recorded.
    Forced,
}

/// Session lifecycle signals routed to collaborator sinks.
#[derive(Debug, Clone)]
pub enum CombatSignal {
    SessionStarted {
        session: SessionSnapshot,
    },
    SessionEnded {
        session: SessionSnapshot,
        reason: EndReason,
    },
    TimerUpdated {
        session_id: SessionId,
        remaining_secs: i64,
        progress: f32,
    },
    Interference {
        session_id: SessionId,
        actor: ParticipantId,
        target: ParticipantId,
        opponent: ParticipantId,
        timestamp: NaiveDateTime,
    },
}
