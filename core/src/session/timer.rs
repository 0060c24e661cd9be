//! Per-session countdown timer with wall-clock elapsed correction.
//!
//! The timer is driven by external ticks but measures time itself: each
//! `tick` consumes the whole seconds elapsed on the wall clock since the
//! last update, so missed or delayed ticks never lose time. The fractional
//! remainder carries over because `last_update` only advances by the
//! consumed whole seconds.

use chrono::NaiveDateTime;

use super::SessionError;

/// Countdown clock owned by one combat session.
///
/// No internal locking; the session registry guarantees single-writer
/// access per session.
#[derive(Debug, Clone)]
pub struct TimerState {
    initial_secs: i64,
    remaining_secs: i64,
    last_update: NaiveDateTime,
    paused: bool,
}

impl TimerState {
    pub fn new(duration_secs: i64, now: NaiveDateTime) -> Result<Self, SessionError> {
        if duration_secs < 0 {
            return Err(SessionError::InvalidDuration(duration_secs));
        }
        Ok(Self {
            initial_secs: duration_secs,
            remaining_secs: duration_secs,
            last_update: now,
            paused: false,
        })
    }

    /// Consume elapsed whole seconds and report whether the timer expired.
    ///
    /// No-op while paused (beyond reporting the current expiry state).
    /// A `now` earlier than the last update is treated as zero elapsed.
    pub fn tick(&mut self, now: NaiveDateTime) -> bool {
        if self.paused {
            return self.is_expired();
        }

        let elapsed = now.signed_duration_since(self.last_update).num_seconds();
        if elapsed > 0 {
            self.remaining_secs = (self.remaining_secs - elapsed).max(0);
            // Advance only by the consumed whole seconds so the fractional
            // remainder carries into the next tick.
            self.last_update += chrono::Duration::seconds(elapsed);
        }

        self.is_expired()
    }

    /// Grant extra seconds. Negative grants are ignored.
    ///
    /// Both the "reset to full on renewed interaction" and the lag-grant
    /// paths funnel through this primitive.
    pub fn extend(&mut self, secs: i64) {
        if secs > 0 {
            self.remaining_secs += secs;
        }
    }

    /// Restore the full initial duration and unpause.
    pub fn reset(&mut self, now: NaiveDateTime) {
        self.remaining_secs = self.initial_secs;
        self.last_update = now;
        self.paused = false;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume the countdown. Elapsed time while paused is not consumed.
    pub fn unpause(&mut self, now: NaiveDateTime) {
        self.paused = false;
        self.last_update = now;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_secs == 0
    }

    pub fn remaining_secs(&self) -> i64 {
        self.remaining_secs
    }

    pub fn initial_secs(&self) -> i64 {
        self.initial_secs
    }

    /// Fraction of the initial duration still remaining, in [0, 1].
    ///
    /// Lag grants can push `remaining` above `initial`; progress clamps
    /// at 1.0 so consumers can treat it as a bar fill.
    pub fn progress(&self) -> f32 {
        if self.initial_secs == 0 {
            return 0.0;
        }
        (self.remaining_secs as f32 / self.initial_secs as f32).clamp(0.0, 1.0)
    }
}
