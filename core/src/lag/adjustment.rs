//! Severity-to-extension conversion with per-session grant accounting.
//!
//! Each registered session owns a [`LagAdjustment`] record. The engine
//! turns a severity score into extra countdown seconds and keeps lifetime
//! grant totals for logging; the totals survive live-state resets.

use std::sync::Mutex;

use chrono::NaiveDateTime;
use hashbrown::HashMap;
use skirmish_types::SessionId;

/// Consecutive zero-severity checks required before the live flag drops.
/// A single quiet check between two lag spikes must not deactivate the
/// record, or the flag would flap on every boundary tick.
const DEACTIVATION_STREAK: u8 = 2;

/// Grant state for one session.
#[derive(Debug, Clone)]
pub struct LagAdjustment {
    session_id: SessionId,
    active: bool,
    zero_streak: u8,
    last_adjustment: NaiveDateTime,
    total_granted_secs: i64,
    grant_count: u32,
}

impl LagAdjustment {
    pub fn new(session_id: SessionId, now: NaiveDateTime) -> Self {
        Self {
            session_id,
            active: false,
            zero_streak: 0,
            last_adjustment: now,
            total_granted_secs: 0,
            grant_count: 0,
        }
    }

    /// Extra seconds to grant for this check.
    ///
    /// Zero severity contributes to the deactivation streak and returns 0.
    /// A positive severity yields `ceil(base * severity * multiplier)`,
    /// marks the record active, and bumps the cumulative totals.
    pub fn calculate_extension(
        &mut self,
        severity: f64,
        base_secs: i64,
        multiplier: f64,
        now: NaiveDateTime,
    ) -> i64 {
        if severity <= 0.0 {
            self.zero_streak = self.zero_streak.saturating_add(1);
            if self.zero_streak >= DEACTIVATION_STREAK {
                self.active = false;
            }
            return 0;
        }

        self.zero_streak = 0;
        let extension = (base_secs.max(0) as f64 * severity * multiplier).ceil() as i64;
        if extension > 0 {
            self.active = true;
            self.last_adjustment = now;
            self.total_granted_secs += extension;
            self.grant_count += 1;
        }
        extension
    }

    /// Reset live state. Cumulative totals are lifetime stats and survive.
    pub fn reset(&mut self) {
        self.active = false;
        self.zero_streak = 0;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn total_granted_secs(&self) -> i64 {
        self.total_granted_secs
    }

    pub fn grant_count(&self) -> u32 {
        self.grant_count
    }

    pub fn last_adjustment(&self) -> NaiveDateTime {
        self.last_adjustment
    }

    /// True only when inactive and idle past the threshold. Used by the
    /// periodic sweep, never by the per-tick path.
    pub fn should_cleanup(&self, now: NaiveDateTime, max_inactive_ms: i64) -> bool {
        !self.active
            && now
                .signed_duration_since(self.last_adjustment)
                .num_milliseconds()
                > max_inactive_ms
    }
}

/// Registry of per-session grant records.
pub struct AdjustmentEngine {
    entries: Mutex<HashMap<SessionId, LagAdjustment>>,
}

impl AdjustmentEngine {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, session_id: SessionId, now: NaiveDateTime) {
        self.entries
            .lock()
            .unwrap()
            .insert(session_id, LagAdjustment::new(session_id, now));
    }

    /// Remove and return a session's record, logging its lifetime totals.
    pub fn unregister(&self, session_id: SessionId) -> Option<LagAdjustment> {
        let removed = self.entries.lock().unwrap().remove(&session_id);
        if let Some(adjustment) = &removed {
            if adjustment.grant_count() > 0 {
                tracing::info!(
                    "[LAG] {} granted {}s across {} lag adjustments",
                    session_id,
                    adjustment.total_granted_secs(),
                    adjustment.grant_count()
                );
            }
        }
        removed
    }

    /// Extension for one session and check. Unregistered sessions get 0.
    pub fn calculate_extension(
        &self,
        session_id: SessionId,
        severity: f64,
        base_secs: i64,
        multiplier: f64,
        now: NaiveDateTime,
    ) -> i64 {
        self.entries
            .lock()
            .unwrap()
            .get_mut(&session_id)
            .map(|adjustment| adjustment.calculate_extension(severity, base_secs, multiplier, now))
            .unwrap_or(0)
    }

    /// Lifetime grant totals `(seconds, count)` for one session.
    pub fn grant_totals(&self, session_id: SessionId) -> Option<(i64, u32)> {
        self.entries
            .lock()
            .unwrap()
            .get(&session_id)
            .map(|a| (a.total_granted_secs(), a.grant_count()))
    }

    /// Drop records that are inactive past the threshold. Sessions normally
    /// unregister at teardown; this sweep only reclaims leaked records.
    pub fn sweep(&self, now: NaiveDateTime, max_inactive_ms: i64) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, adjustment| !adjustment.should_cleanup(now, max_inactive_ms));
        before - entries.len()
    }

    pub fn registered(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl Default for AdjustmentEngine {
    fn default() -> Self {
        Self::new()
    }
}
