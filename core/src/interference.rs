//! Third-party interference detection.
//!
//! Interference is a third party hitting someone already bound to a
//! session with someone else. The check is a pure predicate over registry
//! state; the handler is its side-effecting companion, recording the
//! incident and notifying collaborators. Whether the triggering
//! interaction is actually blocked is the caller's policy decision
//! (`CombatConfig::block_interference`), not this module's.

use std::sync::Arc;

use skirmish_types::ParticipantId;

use crate::events::{CombatSignal, OpenZonePolicy, ZonePolicy};
use crate::session::{SessionManager, SessionState};

pub struct InterferenceCheck {
    manager: Arc<SessionManager>,
    zones: Arc<dyn ZonePolicy>,
}

impl InterferenceCheck {
    /// Check with the default open-world policy: no protected zones.
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self::with_zone_policy(manager, Arc::new(OpenZonePolicy))
    }

    pub fn with_zone_policy(manager: Arc<SessionManager>, zones: Arc<dyn ZonePolicy>) -> Self {
        Self { manager, zones }
    }

    /// Pure predicate: is `actor` interfering by hitting `target`?
    ///
    /// False when the target has no session, when the actor is exactly the
    /// target's recorded opponent, or when either party stands in a
    /// protected zone where combat rules do not apply.
    pub fn check_interference(&self, actor: ParticipantId, target: ParticipantId) -> bool {
        let Some(handle) = self.manager.handle_for(target) else {
            return false;
        };
        if handle.opponent_of(target) == Some(actor) {
            return false;
        }
        if self.zones.is_protected(target) || self.zones.is_protected(actor) {
            return false;
        }
        true
    }

    /// Record an interference incident against the target's session and
    /// notify collaborators. Returns false when no session exists (the
    /// interaction was not interference by the time it was handled).
    pub fn handle_interference(&self, actor: ParticipantId, target: ParticipantId) -> bool {
        if !self.check_interference(actor, target) {
            return false;
        }
        let Some(handle) = self.manager.handle_for(target) else {
            return false;
        };
        let Some(opponent) = handle.opponent_of(target) else {
            return false;
        };

        let now = self.manager.clock().now();
        let (session_id, incidents) = {
            let mut session = handle.session.lock().unwrap();
            session.interference.record(now);
            session.state = SessionState::InterferenceFlagged;
            (session.id, session.interference.incidents)
        };

        tracing::info!(
            "[INTERFERENCE] {} hit {} mid-session {} (incident #{})",
            actor,
            target,
            session_id,
            incidents
        );
        self.manager.emit(CombatSignal::Interference {
            session_id,
            actor,
            target,
            opponent,
            timestamp: now,
        });

        true
    }
}
