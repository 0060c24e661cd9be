//! Tests for the session registry and lifecycle driver.
//!
//! Driven entirely through a `ManualClock`, so timer math is exact: one
//! advance equals one second for every schedule.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use hashbrown::HashMap;
use skirmish_types::{CombatConfig, ParticipantId, SessionId};

use crate::clock::{ClockSource, ManualClock};
use crate::events::{EndReason, NotificationSink};
use crate::interference::InterferenceCheck;
use crate::lag::LagProbe;
use crate::session::{SessionManager, SessionSnapshot};

const A: ParticipantId = ParticipantId(1);
const B: ParticipantId = ParticipantId(2);
const C: ParticipantId = ParticipantId(3);

/// Probe with settable throughput and per-participant responsiveness.
struct TestProbe {
    throughput: Mutex<f64>,
    responsiveness: Mutex<HashMap<ParticipantId, f64>>,
}

impl TestProbe {
    fn healthy() -> Arc<Self> {
        Arc::new(Self {
            throughput: Mutex::new(1.0),
            responsiveness: Mutex::new(HashMap::new()),
        })
    }

    fn set_throughput(&self, ratio: f64) {
        *self.throughput.lock().unwrap() = ratio;
    }

    fn set_responsiveness(&self, participant: ParticipantId, ms: f64) {
        self.responsiveness
            .lock()
            .unwrap()
            .insert(participant, ms);
    }
}

impl LagProbe for TestProbe {
    fn throughput_ratio(&self) -> f64 {
        *self.throughput.lock().unwrap()
    }

    fn responsiveness_of(&self, participant: ParticipantId) -> Option<f64> {
        self.responsiveness
            .lock()
            .unwrap()
            .get(&participant)
            .copied()
    }
}

/// Sink that counts everything it is told.
#[derive(Default)]
struct RecordingSink {
    started: AtomicU32,
    ended: Mutex<Vec<EndReason>>,
    timer_updates: AtomicU32,
    interference: AtomicU32,
}

impl NotificationSink for RecordingSink {
    fn on_session_started(&self, _session: &SessionSnapshot) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_session_ended(&self, _session: &SessionSnapshot, reason: EndReason) {
        self.ended.lock().unwrap().push(reason);
    }

    fn on_timer_updated(&self, _session_id: SessionId, _remaining_secs: i64, _progress: f32) {
        self.timer_updates.fetch_add(1, Ordering::SeqCst);
    }

    fn on_interference(
        &self,
        _session_id: SessionId,
        _actor: ParticipantId,
        _target: ParticipantId,
        _opponent: ParticipantId,
    ) {
        self.interference.fetch_add(1, Ordering::SeqCst);
    }
}

struct Fixture {
    clock: Arc<ManualClock>,
    probe: Arc<TestProbe>,
    sink: Arc<RecordingSink>,
    manager: Arc<SessionManager>,
}

fn fixture() -> Fixture {
    fixture_with(CombatConfig::default())
}

fn fixture_with(config: CombatConfig) -> Fixture {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let clock = Arc::new(ManualClock::new());
    let probe = TestProbe::healthy();
    let sink = Arc::new(RecordingSink::default());
    let manager = SessionManager::new(
        config,
        Arc::clone(&clock) as Arc<dyn ClockSource>,
        Arc::clone(&probe) as Arc<dyn LagProbe>,
        Arc::clone(&sink) as Arc<dyn NotificationSink>,
        None,
    );
    Fixture {
        clock,
        probe,
        sink,
        manager,
    }
}

// ─── Lifecycle basics ───────────────────────────────────────────────────────

#[test]
fn start_registers_both_participants() {
    let f = fixture();
    let id = f.manager.start_session(A, B).unwrap();

    assert!(f.manager.is_in_session(A));
    assert!(f.manager.is_in_session(B));
    assert_eq!(f.manager.get_opponent(A), Some(B));
    assert_eq!(f.manager.get_opponent(B), Some(A));
    assert_eq!(f.manager.session_count(), 1);
    assert_eq!(f.sink.started.load(Ordering::SeqCst), 1);

    let sessions = f.manager.active_sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, id);
    assert_eq!(sessions[0].remaining_secs, 30);
}

#[test]
fn busy_participant_fails_closed() {
    let f = fixture();
    f.manager.start_session(A, B).unwrap();

    assert!(f.manager.start_session(A, C).is_none());
    assert!(f.manager.start_session(C, B).is_none());
    assert_eq!(f.manager.session_count(), 1);
    assert_eq!(f.sink.started.load(Ordering::SeqCst), 1);
}

#[test]
fn degenerate_pair_is_rejected() {
    let f = fixture();
    assert!(f.manager.start_session(A, A).is_none());
    assert!(!f.manager.is_in_session(A));
}

#[test]
fn end_session_is_idempotent() {
    let f = fixture();
    f.manager.start_session(A, B).unwrap();

    assert!(f.manager.end_session(A));
    assert!(!f.manager.end_session(A));
    assert!(!f.manager.end_session(B));

    // Exactly one teardown side-effect sequence
    assert_eq!(f.sink.ended.lock().unwrap().len(), 1);
    assert_eq!(f.manager.stats().snapshot(A).unwrap().combats, 1);
    assert_eq!(f.manager.stats().snapshot(B).unwrap().combats, 1);
}

#[test]
fn forced_end_records_no_win_or_loss() {
    let f = fixture();
    f.manager.start_session(A, B).unwrap();
    f.manager.end_session(B);

    let a = f.manager.stats().snapshot(A).unwrap();
    let b = f.manager.stats().snapshot(B).unwrap();
    assert_eq!((a.wins, a.losses), (0, 0));
    assert_eq!((b.wins, b.losses), (0, 0));
    assert_eq!(f.sink.ended.lock().unwrap().as_slice(), &[EndReason::Forced]);
}

#[test]
fn death_credits_the_opponent() {
    let f = fixture();
    f.manager.start_session(A, B).unwrap();

    assert!(f.manager.handle_death(A));
    assert!(!f.manager.is_in_session(A));
    assert!(!f.manager.is_in_session(B));

    let a = f.manager.stats().snapshot(A).unwrap();
    let b = f.manager.stats().snapshot(B).unwrap();
    assert_eq!(a.losses, 1);
    assert_eq!(a.wins, 0);
    assert_eq!(b.wins, 1);
    assert_eq!(b.losses, 0);
    assert_eq!(f.sink.ended.lock().unwrap().as_slice(), &[EndReason::Death]);
}

#[test]
fn quit_is_scored_like_a_death() {
    let f = fixture();
    f.manager.start_session(A, B).unwrap();

    assert!(f.manager.handle_quit(B));
    let a = f.manager.stats().snapshot(A).unwrap();
    let b = f.manager.stats().snapshot(B).unwrap();
    assert_eq!(a.wins, 1);
    assert_eq!(b.losses, 1);
    assert_eq!(f.sink.ended.lock().unwrap().as_slice(), &[EndReason::Quit]);
}

#[test]
fn participants_can_rematch_after_teardown() {
    let f = fixture();
    let first = f.manager.start_session(A, B).unwrap();
    f.manager.end_session(A);

    let second = f.manager.start_session(A, B).unwrap();
    assert_ne!(first, second);
    assert_eq!(f.manager.session_count(), 1);
}

// ─── Countdown behavior ─────────────────────────────────────────────────────

#[test]
fn session_expires_after_the_configured_duration() {
    let f = fixture();
    f.manager.start_session(A, B).unwrap();

    f.clock.advance_by(29);
    assert!(f.manager.is_in_session(A));

    f.clock.advance();
    assert!(!f.manager.is_in_session(A));
    assert!(!f.manager.is_in_session(B));
    assert_eq!(
        f.sink.ended.lock().unwrap().as_slice(),
        &[EndReason::Expired]
    );

    // No win/loss on timeout, but the combat is counted and timed
    let a = f.manager.stats().snapshot(A).unwrap();
    assert_eq!((a.wins, a.losses), (0, 0));
    assert_eq!(a.combats, 1);
    assert_eq!(a.combat_time_secs, 30);
}

#[test]
fn custom_duration_is_honored() {
    let f = fixture_with(CombatConfig {
        session_duration_secs: 5,
        ..Default::default()
    });
    f.manager.start_session(A, B).unwrap();

    f.clock.advance_by(4);
    assert!(f.manager.is_in_session(A));
    f.clock.advance();
    assert!(!f.manager.is_in_session(A));
}

#[test]
fn timer_updates_flow_to_the_sink_while_counting_down() {
    let f = fixture();
    f.manager.start_session(A, B).unwrap();
    f.clock.advance_by(5);
    assert_eq!(f.sink.timer_updates.load(Ordering::SeqCst), 5);

    let sessions = f.manager.active_sessions();
    assert_eq!(sessions[0].remaining_secs, 25);
}

#[test]
fn record_damage_rearms_the_countdown() {
    let f = fixture();
    f.manager.start_session(A, B).unwrap();
    f.clock.advance_by(20);

    assert!(f.manager.record_damage(A, 140));
    let sessions = f.manager.active_sessions();
    assert_eq!(sessions[0].remaining_secs, 30);
    assert_eq!(sessions[0].attacker_stats.damage_dealt, 140);
    assert_eq!(sessions[0].attacker_stats.hits_landed, 1);

    // Lifetime totals on both sides
    assert_eq!(f.manager.stats().snapshot(A).unwrap().damage_dealt, 140);
    assert_eq!(f.manager.stats().snapshot(B).unwrap().damage_received, 140);

    // A full countdown again from the hit
    f.clock.advance_by(29);
    assert!(f.manager.is_in_session(A));
    f.clock.advance();
    assert!(!f.manager.is_in_session(A));
}

#[test]
fn record_damage_without_a_session_is_a_no_op() {
    let f = fixture();
    assert!(!f.manager.record_damage(A, 50));
    assert!(f.manager.stats().snapshot(A).is_none());
}

#[test]
fn reset_session_timer_by_id() {
    let f = fixture();
    let id = f.manager.start_session(A, B).unwrap();
    f.clock.advance_by(12);

    assert!(f.manager.reset_session_timer(id));
    assert_eq!(f.manager.active_sessions()[0].remaining_secs, 30);

    assert!(!f.manager.reset_session_timer(SessionId(999)));
    f.manager.end_session(A);
    assert!(!f.manager.reset_session_timer(id));
}

// ─── Lag integration ────────────────────────────────────────────────────────

#[test]
fn lag_grants_slow_down_expiry() {
    let f = fixture();
    // Latency at twice the ceiling with healthy throughput: severity 0.5,
    // so each tick grants ceil(5 * 0.5 * 1.5) = 4 extra seconds.
    f.probe.set_responsiveness(A, 400.0);
    f.manager.start_session(A, B).unwrap();

    f.clock.advance_by(10);
    assert!(f.manager.is_in_session(A));
    let remaining = f.manager.active_sessions()[0].remaining_secs;
    assert!(
        remaining > 20,
        "lag grants should outpace the countdown, remaining={remaining}"
    );
}

#[test]
fn healthy_participants_get_no_grants() {
    let f = fixture();
    f.probe.set_responsiveness(A, 40.0);
    f.probe.set_responsiveness(B, 55.0);
    f.manager.start_session(A, B).unwrap();

    f.clock.advance_by(10);
    assert_eq!(f.manager.active_sessions()[0].remaining_secs, 20);
}

#[test]
fn server_degradation_flag_follows_the_probe_with_hysteresis() {
    let f = fixture();
    f.probe.set_throughput(0.5);
    f.clock.advance();
    assert!(f.manager.is_server_degraded());

    // Just above the floor: inside the hysteresis band, flag holds
    f.probe.set_throughput(0.91);
    f.clock.advance();
    assert!(f.manager.is_server_degraded());

    f.probe.set_throughput(1.0);
    f.clock.advance();
    assert!(!f.manager.is_server_degraded());
}

#[test]
fn pair_severity_reflects_the_worse_participant() {
    let f = fixture();
    f.probe.set_responsiveness(A, 400.0);
    f.probe.set_responsiveness(B, 50.0);
    f.manager.start_session(A, B).unwrap();
    f.clock.advance();

    let severity = f.manager.pair_severity(A, B);
    assert!((severity - 0.5).abs() < 1e-9);
}

// ─── Interference ───────────────────────────────────────────────────────────

#[test]
fn interference_is_symmetric_for_the_bound_pair() {
    let f = fixture();
    let check = InterferenceCheck::new(Arc::clone(&f.manager));
    f.manager.start_session(A, B).unwrap();

    assert!(!check.check_interference(A, B));
    assert!(!check.check_interference(B, A));
    assert!(check.check_interference(C, A));
    assert!(check.check_interference(C, B));

    f.manager.end_session(A);
    assert!(!check.check_interference(C, A));
    assert!(!check.check_interference(C, B));
}

#[test]
fn handling_interference_records_and_notifies() {
    let f = fixture();
    let check = InterferenceCheck::new(Arc::clone(&f.manager));
    f.manager.start_session(A, B).unwrap();

    assert_eq!(f.manager.active_sessions()[0].interference_incidents, 0);
    assert!(check.handle_interference(C, B));
    assert_eq!(f.manager.active_sessions()[0].interference_incidents, 1);
    assert_eq!(f.sink.interference.load(Ordering::SeqCst), 1);

    // The bound opponent never registers as interference
    assert!(!check.handle_interference(A, B));
    assert_eq!(f.manager.active_sessions()[0].interference_incidents, 1);
}

#[test]
fn protected_zones_suppress_interference() {
    struct ProtectTarget(ParticipantId);
    impl crate::events::ZonePolicy for ProtectTarget {
        fn is_protected(&self, participant: ParticipantId) -> bool {
            participant == self.0
        }
    }

    let f = fixture();
    let check =
        InterferenceCheck::with_zone_policy(Arc::clone(&f.manager), Arc::new(ProtectTarget(B)));
    f.manager.start_session(A, B).unwrap();

    assert!(!check.check_interference(C, B));
    assert!(check.check_interference(C, A));
}

// ─── Concurrency ────────────────────────────────────────────────────────────

#[test]
fn at_most_one_session_per_participant_under_contention() {
    let f = fixture();
    let pairs: Vec<(u64, u64)> = (0..10u64)
        .flat_map(|a| (a + 1..10).map(move |b| (a, b)))
        .collect();

    let successes = Arc::new(AtomicU32::new(0));
    let mut workers = Vec::new();
    for offset in 0..8usize {
        let manager = Arc::clone(&f.manager);
        let pairs = pairs.clone();
        let successes = Arc::clone(&successes);
        workers.push(std::thread::spawn(move || {
            for i in 0..pairs.len() {
                let (a, b) = pairs[(i + offset * 7) % pairs.len()];
                if manager
                    .start_session(ParticipantId(a), ParticipantId(b))
                    .is_some()
                {
                    successes.fetch_add(1, Ordering::SeqCst);
                }
            }
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    let sessions = f.manager.active_sessions();
    assert_eq!(sessions.len() as u32, successes.load(Ordering::SeqCst));

    // No participant may appear in two sessions
    let mut seen = Vec::new();
    for session in &sessions {
        assert!(!seen.contains(&session.attacker));
        assert!(!seen.contains(&session.defender));
        seen.push(session.attacker);
        seen.push(session.defender);
    }
}

#[test]
fn concurrent_termination_triggers_tear_down_once() {
    let f = fixture();
    f.manager.start_session(A, B).unwrap();

    let ended = Arc::new(AtomicU32::new(0));
    let mut workers = Vec::new();
    for i in 0..6usize {
        let manager = Arc::clone(&f.manager);
        let ended = Arc::clone(&ended);
        workers.push(std::thread::spawn(move || {
            let done = match i % 3 {
                0 => manager.end_session(A),
                1 => manager.handle_death(A),
                _ => manager.handle_quit(B),
            };
            if done {
                ended.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(ended.load(Ordering::SeqCst), 1);
    assert_eq!(f.sink.ended.lock().unwrap().len(), 1);
    assert_eq!(f.manager.stats().snapshot(A).unwrap().combats, 1);
    // At most one attribution, whichever trigger won the race
    let a = f.manager.stats().snapshot(A).unwrap();
    let b = f.manager.stats().snapshot(B).unwrap();
    assert!(a.wins + a.losses <= 1);
    assert!(b.wins + b.losses <= 1);
}

#[test]
fn shutdown_ends_everything_and_stops_the_clock() {
    let f = fixture();
    f.manager.start_session(A, B).unwrap();
    f.manager.start_session(C, ParticipantId(4)).unwrap();

    f.manager.shutdown();
    assert_eq!(f.manager.session_count(), 0);
    assert_eq!(f.sink.ended.lock().unwrap().len(), 2);

    // Cancelled schedules are reclaimed on the next advance
    f.clock.advance();
    assert_eq!(f.clock.scheduled(), 0);
}

#[test]
fn snapshots_are_detached_from_live_state() {
    let f = fixture();
    f.manager.start_session(A, B).unwrap();
    let before = f.manager.active_sessions();

    f.manager.record_damage(A, 999);
    assert_eq!(before[0].attacker_stats.damage_dealt, 0);
    assert_eq!(
        f.manager.active_sessions()[0].attacker_stats.damage_dealt,
        999
    );
}
