//! Signals and the collaborator sinks they are routed to.

pub mod signal;
pub mod sink;

pub use signal::{CombatSignal, EndReason};
pub use sink::{BroadcastSink, NotificationSink, NullSink, OpenZonePolicy, ZonePolicy};

use std::panic::{AssertUnwindSafe, catch_unwind};

/// Route one signal to a notification sink, isolating sink failures.
///
/// A panicking collaborator is caught and logged here; session state has
/// already been committed by the time a signal is dispatched, so the core
/// proceeds regardless.
pub fn dispatch(sink: &dyn NotificationSink, signal: &CombatSignal) {
    let result = catch_unwind(AssertUnwindSafe(|| match signal {
        CombatSignal::SessionStarted { session } => sink.on_session_started(session),
        CombatSignal::SessionEnded { session, reason } => sink.on_session_ended(session, *reason),
        CombatSignal::TimerUpdated {
            session_id,
            remaining_secs,
            progress,
        } => sink.on_timer_updated(*session_id, *remaining_secs, *progress),
        CombatSignal::Interference {
            session_id,
            actor,
            target,
            opponent,
            ..
        } => sink.on_interference(*session_id, *actor, *target, *opponent),
    }));

    if result.is_err() {
        tracing::warn!("[NOTIFY] Notification sink panicked; session state is unaffected");
    }
}

/// Route a start/end signal to the optional broadcast sink, isolated the
/// same way. Timer and interference signals are local-only.
pub fn dispatch_broadcast(sink: &dyn BroadcastSink, signal: &CombatSignal) {
    let result = catch_unwind(AssertUnwindSafe(|| match signal {
        CombatSignal::SessionStarted { session } => sink.broadcast_start(session),
        CombatSignal::SessionEnded { session, reason } => {
            sink.broadcast_end(session.id, *reason);
        }
        _ => {}
    }));

    if result.is_err() {
        tracing::warn!("[NOTIFY] Broadcast sink panicked; session state is unaffected");
    }
}
