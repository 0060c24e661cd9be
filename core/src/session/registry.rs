//! Session registry and lifecycle driver.
//!
//! The registry owns the map of active sessions keyed by participant,
//! enforces at-most-one-session-per-participant, drives per-session ticks
//! through the clock source, and funnels every termination trigger
//! (timeout, death, quit, admin force) into one idempotent teardown path.
//!
//! Concurrency model: the participant map sits behind one `RwLock`, which
//! makes "insert if absent for both keys" and "remove if present" atomic
//! with respect to lookups. Each session's mutable state sits behind its
//! own `Mutex`; the clock source guarantees at most one tick per session
//! is in flight at a time. Lock order is always map before session, never
//! the reverse.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::NaiveDateTime;
use hashbrown::HashMap;
use skirmish_types::{CombatConfig, ParticipantId, SessionId};

use crate::clock::{ClockSource, TickFlow, TickHandle};
use crate::events::{self, BroadcastSink, CombatSignal, EndReason, NotificationSink};
use crate::lag::{AdjustmentEngine, LagProbe, LoadMonitor, ResponsivenessTracker};
use crate::tracking::SessionTracker;

use super::{CombatSession, SessionSnapshot, SessionState};

/// Cadence of both the per-session tick and the maintenance tick.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Maintenance ticks between cleanup sweeps. Sweeps reclaim leaked lag
/// records and stale responsiveness samples; they never touch sessions.
const SWEEP_EVERY_TICKS: u32 = 60;

/// Shared handle to one live session and its scheduling state.
pub(crate) struct SessionHandle {
    pub(crate) id: SessionId,
    /// Both participants, immutable for the life of the session. Lookups
    /// read this without touching the session mutex.
    pub(crate) pair: (ParticipantId, ParticipantId),
    pub(crate) session: Mutex<CombatSession>,
    /// Flipped exactly once during teardown; the winner of the swap owns
    /// the teardown side effects.
    active: AtomicBool,
    tick: Mutex<Option<TickHandle>>,
}

impl SessionHandle {
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn opponent_of(&self, participant: ParticipantId) -> Option<ParticipantId> {
        let (a, b) = self.pair;
        if participant == a {
            Some(b)
        } else if participant == b {
            Some(a)
        } else {
            None
        }
    }
}

/// Registry and lifecycle driver for combat sessions.
pub struct SessionManager {
    config: CombatConfig,
    clock: Arc<dyn ClockSource>,
    probe: Arc<dyn LagProbe>,
    notifications: Arc<dyn NotificationSink>,
    broadcast: Option<Arc<dyn BroadcastSink>>,

    load: RwLock<LoadMonitor>,
    responsiveness: ResponsivenessTracker,
    adjustments: AdjustmentEngine,
    tracker: SessionTracker,

    by_participant: RwLock<HashMap<ParticipantId, Arc<SessionHandle>>>,
    next_session_id: AtomicU64,
    maintenance_tick: Mutex<Option<TickHandle>>,
}

impl SessionManager {
    /// Build a manager and schedule its maintenance tick on the clock.
    ///
    /// The maintenance tick holds only a weak reference, so dropping the
    /// last `Arc<SessionManager>` stops it on its next firing.
    pub fn new(
        config: CombatConfig,
        clock: Arc<dyn ClockSource>,
        probe: Arc<dyn LagProbe>,
        notifications: Arc<dyn NotificationSink>,
        broadcast: Option<Arc<dyn BroadcastSink>>,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            load: RwLock::new(LoadMonitor::new(
                config.throughput_floor,
                config.throughput_history_len,
            )),
            responsiveness: ResponsivenessTracker::new(
                config.sample_interval_ms,
                config.throughput_floor,
                config.responsiveness_ceiling_ms,
            ),
            adjustments: AdjustmentEngine::new(),
            tracker: SessionTracker::new(),
            by_participant: RwLock::new(HashMap::new()),
            next_session_id: AtomicU64::new(1),
            maintenance_tick: Mutex::new(None),
            config,
            clock,
            probe,
            notifications,
            broadcast,
        });

        let weak = Arc::downgrade(&manager);
        let mut ticks_until_sweep = SWEEP_EVERY_TICKS;
        let tick = manager.clock.schedule_recurring(
            TICK_INTERVAL,
            Box::new(move |now| {
                let Some(manager) = weak.upgrade() else {
                    return TickFlow::Stop;
                };
                manager.refresh_load(now);
                ticks_until_sweep -= 1;
                if ticks_until_sweep == 0 {
                    ticks_until_sweep = SWEEP_EVERY_TICKS;
                    manager.run_sweep(now);
                }
                TickFlow::Continue
            }),
        );
        *manager.maintenance_tick.lock().unwrap() = Some(tick);

        manager
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    /// Lifetime statistics accumulator, shared with hosts for inspection.
    pub fn stats(&self) -> &SessionTracker {
        &self.tracker
    }

    // ─── Session lifecycle ──────────────────────────────────────────────────

    /// Start a session between two participants.
    ///
    /// Fails closed (returns `None`, no session created) when either
    /// participant already has a session or the pair is degenerate.
    pub fn start_session(
        self: &Arc<Self>,
        a: ParticipantId,
        b: ParticipantId,
    ) -> Option<SessionId> {
        let now = self.clock.now();
        let id = SessionId(self.next_session_id.fetch_add(1, Ordering::Relaxed));

        let session = match CombatSession::new(
            id,
            a,
            b,
            self.config.session_duration_secs,
            self.config.visuals_enabled,
            now,
        ) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!("[SESSION] Rejected session between {} and {}: {}", a, b, err);
                return None;
            }
        };

        let handle = Arc::new(SessionHandle {
            id,
            pair: (a, b),
            session: Mutex::new(session),
            active: AtomicBool::new(true),
            tick: Mutex::new(None),
        });

        {
            let mut map = self.by_participant.write().unwrap();
            if map.contains_key(&a) || map.contains_key(&b) {
                return None;
            }
            map.insert(a, Arc::clone(&handle));
            map.insert(b, Arc::clone(&handle));
        }

        self.adjustments.register(id, now);

        tracing::info!("[SESSION] Started {} between {} and {}", id, a, b);
        let snapshot = handle.session.lock().unwrap().snapshot();
        self.emit(CombatSignal::SessionStarted { session: snapshot });

        // The tick holds only a weak manager reference; an in-flight tick
        // after teardown is a no-op via the active-flag self-check.
        let weak = Arc::downgrade(self);
        let tick_target = Arc::clone(&handle);
        let tick = self.clock.schedule_recurring(
            TICK_INTERVAL,
            Box::new(move |now| match weak.upgrade() {
                Some(manager) => manager.session_tick(&tick_target, now),
                None => TickFlow::Stop,
            }),
        );
        *handle.tick.lock().unwrap() = Some(tick);

        Some(id)
    }

    /// Admin/host force-end. No win or loss is recorded.
    ///
    /// Idempotent: returns false when the participant has no session,
    /// which is the expected shape of races between concurrent triggers.
    pub fn end_session(&self, participant: ParticipantId) -> bool {
        self.end_session_with(participant, EndReason::Forced)
    }

    /// A participant died: loss for them, win for the opponent, then the
    /// common teardown.
    pub fn handle_death(&self, deceased: ParticipantId) -> bool {
        self.end_session_with(deceased, EndReason::Death)
    }

    /// A participant disconnected mid-combat: scored like a death.
    pub fn handle_quit(&self, quitter: ParticipantId) -> bool {
        self.end_session_with(quitter, EndReason::Quit)
    }

    fn end_session_with(&self, participant: ParticipantId, reason: EndReason) -> bool {
        let handle = {
            let mut map = self.by_participant.write().unwrap();
            let Some(handle) = map.get(&participant) else {
                return false;
            };
            let handle = Arc::clone(handle);
            let (a, b) = handle.pair;
            map.remove(&a);
            map.remove(&b);
            handle
        };

        // The map removal above already serializes concurrent callers;
        // the swap covers teardown paths that bypass the map.
        if !handle.active.swap(false, Ordering::SeqCst) {
            return false;
        }

        if let Some(tick) = handle.tick.lock().unwrap().take() {
            tick.cancel();
        }

        let (a, b) = handle.pair;
        let snapshot = {
            let mut session = handle.session.lock().unwrap();
            session.state = SessionState::Cooldown;
            session.timer.pause();
            session.snapshot()
        };

        self.adjustments.unregister(handle.id);

        self.tracker.increment_combats(a);
        self.tracker.increment_combats(b);
        if matches!(reason, EndReason::Death | EndReason::Quit) {
            // Attribution belongs to whichever trigger won the teardown
            // race; a losing concurrent trigger records nothing.
            if let Some(opponent) = handle.opponent_of(participant) {
                self.tracker.record_loss(participant);
                self.tracker.record_win(opponent);
            }
        }

        tracing::info!(
            "[SESSION] Ended {} between {} and {} ({:?})",
            handle.id,
            a,
            b,
            reason
        );
        self.emit(CombatSignal::SessionEnded {
            session: snapshot,
            reason,
        });

        true
    }

    /// Restore a session's full countdown by id. Linear scan; session
    /// counts are bounded by concurrent combat pairs on one process.
    pub fn reset_session_timer(&self, id: SessionId) -> bool {
        let handle = self
            .by_participant
            .read()
            .unwrap()
            .values()
            .find(|h| h.id == id)
            .cloned();

        match handle {
            Some(handle) if handle.is_active() => {
                handle.session.lock().unwrap().timer.reset(self.clock.now());
                true
            }
            _ => false,
        }
    }

    // ─── Lookups ────────────────────────────────────────────────────────────

    pub fn is_in_session(&self, participant: ParticipantId) -> bool {
        self.by_participant
            .read()
            .unwrap()
            .contains_key(&participant)
    }

    pub fn get_opponent(&self, participant: ParticipantId) -> Option<ParticipantId> {
        self.handle_for(participant)?.opponent_of(participant)
    }

    /// Defensive snapshot of every active session, deduplicated (each
    /// session is indexed under both participants).
    pub fn active_sessions(&self) -> Vec<SessionSnapshot> {
        let map = self.by_participant.read().unwrap();
        let mut seen: Vec<SessionId> = Vec::with_capacity(map.len() / 2);
        let mut snapshots = Vec::with_capacity(map.len() / 2);
        for handle in map.values() {
            if seen.contains(&handle.id) {
                continue;
            }
            seen.push(handle.id);
            snapshots.push(handle.session.lock().unwrap().snapshot());
        }
        snapshots
    }

    pub fn session_count(&self) -> usize {
        self.by_participant.read().unwrap().len() / 2
    }

    pub(crate) fn handle_for(&self, participant: ParticipantId) -> Option<Arc<SessionHandle>> {
        self.by_participant
            .read()
            .unwrap()
            .get(&participant)
            .cloned()
    }

    // ─── Interaction events ─────────────────────────────────────────────────

    /// Record damage dealt inside an existing session.
    ///
    /// Updates the session counters and lifetime totals, and restores the
    /// full countdown: a renewed interaction re-arms the session.
    pub fn record_damage(&self, dealer: ParticipantId, amount: i64) -> bool {
        let Some(handle) = self.handle_for(dealer) else {
            return false;
        };
        let Some(opponent) = handle.opponent_of(dealer) else {
            return false;
        };

        {
            let mut session = handle.session.lock().unwrap();
            if !session.record_hit(dealer, amount) {
                return false;
            }
            session.timer.reset(self.clock.now());
        }

        self.tracker.record_damage_dealt(dealer, amount);
        self.tracker.record_damage_received(opponent, amount);
        true
    }

    // ─── Tick processing ────────────────────────────────────────────────────

    /// Per-session tick. Self-cancels when the session was torn down
    /// between scheduling and firing.
    fn session_tick(&self, handle: &Arc<SessionHandle>, now: NaiveDateTime) -> TickFlow {
        if !handle.is_active() {
            return TickFlow::Stop;
        }

        let (a, b) = handle.pair;

        // Refresh both participants' samples; the tracker rate-limits per
        // participant, bounding the cost of this hot path.
        let throughput = self.load.read().unwrap().current();
        if let Some(ms) = self.probe.responsiveness_of(a) {
            self.responsiveness.observe(a, ms, throughput, now);
        }
        if let Some(ms) = self.probe.responsiveness_of(b) {
            self.responsiveness.observe(b, ms, throughput, now);
        }

        let globally_degraded = self.load.read().unwrap().is_degraded();
        let severity = self.responsiveness.pair_severity(a, b, globally_degraded);
        let extension = self.adjustments.calculate_extension(
            handle.id,
            severity,
            self.config.base_extension_secs,
            self.config.extension_multiplier,
            now,
        );

        let (expired, remaining, progress, visuals) = {
            let mut session = handle.session.lock().unwrap();
            if extension > 0 {
                session.timer.extend(extension);
                tracing::debug!(
                    "[LAG] {} granted {}s at severity {:.2}",
                    handle.id,
                    extension,
                    severity
                );
            }
            let expired = session.timer.tick(now);
            (
                expired,
                session.timer.remaining_secs(),
                session.timer.progress(),
                session.visuals_enabled,
            )
        };

        // One second of combat per tick for both sides; clock drift is
        // already absorbed inside the timer.
        self.tracker.add_combat_time(a, 1);
        self.tracker.add_combat_time(b, 1);

        if expired {
            tracing::info!("[SESSION] {} countdown expired", handle.id);
            self.end_session_with(a, EndReason::Expired);
            return TickFlow::Stop;
        }

        if visuals {
            self.emit(CombatSignal::TimerUpdated {
                session_id: handle.id,
                remaining_secs: remaining,
                progress,
            });
        }

        TickFlow::Continue
    }

    fn refresh_load(&self, now: NaiveDateTime) {
        let ratio = self.probe.throughput_ratio();
        self.load.write().unwrap().refresh(ratio, now);
    }

    /// Reclaim stale lag state. Driven by the maintenance tick; hosts may
    /// also call it directly from their own cleanup schedule.
    pub fn run_sweep(&self, now: NaiveDateTime) {
        let samples = self
            .responsiveness
            .sweep(now, self.config.inactivity_window_ms);
        let adjustments = self.adjustments.sweep(now, self.config.inactivity_window_ms);
        if samples + adjustments > 0 {
            tracing::debug!(
                "[SESSION] Sweep removed {} samples, {} adjustment records",
                samples,
                adjustments
            );
        }
    }

    /// Whether the server currently counts as degraded.
    pub fn is_server_degraded(&self) -> bool {
        self.load.read().unwrap().is_degraded()
    }

    /// Current pairwise lag severity, for host-side inspection.
    pub fn pair_severity(&self, a: ParticipantId, b: ParticipantId) -> f64 {
        let globally_degraded = self.is_server_degraded();
        self.responsiveness.pair_severity(a, b, globally_degraded)
    }

    /// Force-end every active session and stop the maintenance tick.
    pub fn shutdown(&self) {
        if let Some(tick) = self.maintenance_tick.lock().unwrap().take() {
            tick.cancel();
        }
        let participants: Vec<ParticipantId> = {
            let map = self.by_participant.read().unwrap();
            map.keys().copied().collect()
        };
        for participant in participants {
            self.end_session_with(participant, EndReason::Forced);
        }
    }

    pub(crate) fn emit(&self, signal: CombatSignal) {
        events::dispatch(self.notifications.as_ref(), &signal);
        if let Some(broadcast) = &self.broadcast {
            events::dispatch_broadcast(broadcast.as_ref(), &signal);
        }
    }

    pub(crate) fn clock(&self) -> &dyn ClockSource {
        self.clock.as_ref()
    }
}
