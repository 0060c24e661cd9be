//! Collaborator interfaces the core notifies.
//!
//! All calls are fire-and-forget: the core never consumes a return value,
//! never waits, and a panicking sink is caught at the dispatch boundary
//! (see `events::dispatch`) so it cannot leave a session half-torn-down.

use skirmish_types::{ParticipantId, SessionId};

use super::EndReason;
use crate::session::SessionSnapshot;

/// Visual/notification collaborator (progress bars, overlays, sounds).
/// Every method defaults to a no-op so hosts implement only what they use.
pub trait NotificationSink: Send + Sync {
    fn on_session_started(&self, _session: &SessionSnapshot) {}

    fn on_session_ended(&self, _session: &SessionSnapshot, _reason: EndReason) {}

    fn on_timer_updated(&self, _session_id: SessionId, _remaining_secs: i64, _progress: f32) {}

    fn on_interference(
        &self,
        _session_id: SessionId,
        _actor: ParticipantId,
        _target: ParticipantId,
        _opponent: ParticipantId,
    ) {
    }
}

/// Sink that ignores every notification.
pub struct NullSink;

impl NotificationSink for NullSink {}

/// Optional cross-instance broadcast. Fire-and-forget; the sink owns its
/// own retry and error handling.
pub trait BroadcastSink: Send + Sync {
    fn broadcast_start(&self, session: &SessionSnapshot);

    fn broadcast_end(&self, session_id: SessionId, reason: EndReason);
}

/// Pluggable safe-zone predicate consulted by the interference rule.
pub trait ZonePolicy: Send + Sync {
    /// Whether the participant currently stands in a protected zone where
    /// combat rules do not apply.
    fn is_protected(&self, participant: ParticipantId) -> bool;
}

/// Default policy: nowhere is protected.
pub struct OpenZonePolicy;

impl ZonePolicy for OpenZonePolicy {
    fn is_protected(&self, _participant: ParticipantId) -> bool {
        false
    }
}
