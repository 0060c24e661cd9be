//! Clock source abstraction driving all time-based behavior.
//!
//! The core never spawns its own timing threads; it registers recurring
//! callbacks with a [`ClockSource`] and reacts when they fire. Two
//! implementations are provided:
//!
//! - [`IntervalClock`]: one tokio interval task per schedule, for hosts
//!   that run inside a tokio runtime.
//! - [`ManualClock`]: step-driven with a synthetic wall clock, for tests
//!   and hosts that own their own tick loop.
//!
//! Both guarantee non-overlapping invocation per callback: a callback is
//! never re-entered while a previous invocation is still running.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, NaiveDateTime};

/// Whether a scheduled callback should stay scheduled after this firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    /// Keep firing at the scheduled interval.
    Continue,
    /// Drop the schedule; the callback will not fire again.
    Stop,
}

/// Callback invoked once per scheduled interval with the current timestamp.
pub type TickCallback = Box<dyn FnMut(NaiveDateTime) -> TickFlow + Send>;

/// Handle to one recurring schedule.
///
/// Cancellation is cooperative: the flag flips synchronously and the next
/// firing becomes a guaranteed no-op. Callbacks additionally self-cancel
/// by returning [`TickFlow::Stop`], so both mechanisms cover the race
/// between cancellation and an in-flight tick.
#[derive(Debug, Clone)]
pub struct TickHandle {
    id: u64,
    cancelled: Arc<AtomicBool>,
}

impl TickHandle {
    fn new(id: u64) -> Self {
        Self {
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Schedule id, unique per clock source.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Mark the schedule cancelled. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Periodic tick driver the session core reacts to.
pub trait ClockSource: Send + Sync {
    /// Current wall-clock time as seen by this clock.
    ///
    /// All core timestamps flow through here so a synthetic clock can
    /// drive the timer math deterministically.
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    /// Register `callback` to fire once per `interval` until cancelled or
    /// until it returns [`TickFlow::Stop`].
    fn schedule_recurring(&self, interval: Duration, callback: TickCallback) -> TickHandle;

    /// Cancel a schedule. The default implementation flips the handle's
    /// cancellation flag; implementations may also reclaim slot storage.
    fn cancel(&self, handle: &TickHandle) {
        handle.cancel();
    }
}

// ─── Tokio-backed clock ─────────────────────────────────────────────────────

/// Clock source backed by tokio interval tasks.
///
/// Must be used from within a tokio runtime: `schedule_recurring` spawns
/// a task per schedule. Missed ticks are delayed rather than bursted, so
/// a stalled host never causes back-to-back callback storms; the wall
/// clock correction in the timer absorbs the drift.
#[derive(Debug, Default)]
pub struct IntervalClock {
    next_id: AtomicU64,
}

impl IntervalClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClockSource for IntervalClock {
    fn schedule_recurring(&self, interval: Duration, mut callback: TickCallback) -> TickHandle {
        let handle = TickHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let task_handle = handle.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first interval tick completes immediately; consume it so
            // callbacks fire one full interval after scheduling.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if task_handle.is_cancelled() {
                    break;
                }
                if callback(Local::now().naive_local()) == TickFlow::Stop {
                    break;
                }
            }
        });

        handle
    }
}

// ─── Manual clock ───────────────────────────────────────────────────────────

struct ManualSlot {
    handle: TickHandle,
    callback: TickCallback,
}

/// Step-driven clock with a synthetic wall clock.
///
/// Each [`advance`](ManualClock::advance) call moves time forward by the
/// configured step and fires every live callback once, in registration
/// order. Intervals passed to `schedule_recurring` are ignored; one
/// advance equals one tick for every schedule.
pub struct ManualClock {
    next_id: AtomicU64,
    now: Mutex<NaiveDateTime>,
    step: chrono::Duration,
    slots: Mutex<Vec<ManualSlot>>,
}

impl ManualClock {
    /// Manual clock starting at the real current time, stepping one second
    /// per advance.
    pub fn new() -> Self {
        Self::starting_at(Local::now().naive_local())
    }

    pub fn starting_at(now: NaiveDateTime) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            now: Mutex::new(now),
            step: chrono::Duration::seconds(1),
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Advance the synthetic clock by one step and fire all live callbacks.
    pub fn advance(&self) {
        let now = {
            let mut guard = self.now.lock().unwrap();
            *guard += self.step;
            *guard
        };

        let mut slots = self.slots.lock().unwrap();
        slots.retain_mut(|slot| {
            if slot.handle.is_cancelled() {
                return false;
            }
            match (slot.callback)(now) {
                TickFlow::Continue => !slot.handle.is_cancelled(),
                TickFlow::Stop => false,
            }
        });
    }

    /// Advance the clock `ticks` times.
    pub fn advance_by(&self, ticks: u32) {
        for _ in 0..ticks {
            self.advance();
        }
    }

    /// Number of schedules still registered (cancelled slots are reclaimed
    /// lazily on the next advance).
    pub fn scheduled(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }

    fn schedule_recurring(&self, _interval: Duration, callback: TickCallback) -> TickHandle {
        let handle = TickHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.slots.lock().unwrap().push(ManualSlot {
            handle: handle.clone(),
            callback,
        });
        handle
    }
}
