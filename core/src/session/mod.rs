//! Session registry, lifecycle state machine, and countdown timers.

pub mod info;
pub mod registry;
pub mod timer;

#[cfg(test)]
mod registry_tests;

pub use info::{CombatSession, InterferenceRecord, SessionSideStats, SessionSnapshot, SessionState};
pub use registry::SessionManager;
pub use timer::TimerState;

use skirmish_types::ParticipantId;
use thiserror::Error;

/// Construction-time validation failures. Everything else in this module
/// is total and reports "not found" through boolean/`Option` sentinels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session duration must be non-negative, got {0}")]
    InvalidDuration(i64),

    #[error("a session requires two distinct participants, got {0} on both sides")]
    SameParticipant(ParticipantId),
}
