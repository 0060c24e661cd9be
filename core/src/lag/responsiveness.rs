//! Per-participant responsiveness sampling.
//!
//! Observations are rate-limited per participant and smoothed with an
//! exponential moving average. The weights are deliberately asymmetric:
//! latency spikes should become visible quickly, while throughput is
//! smoothed more heavily.

use std::sync::Mutex;

use chrono::NaiveDateTime;
use hashbrown::HashMap;
use skirmish_types::ParticipantId;

/// EMA weight kept from the previous responsiveness value.
const RESPONSIVENESS_OLD_WEIGHT: f64 = 0.8;
/// EMA weight kept from the previous throughput value.
const THROUGHPUT_OLD_WEIGHT: f64 = 0.9;
/// Severity multiplier applied when the whole server is degraded.
const GLOBAL_DEGRADED_MULTIPLIER: f64 = 1.5;

/// Host-side measurement source the lag subsystem polls.
///
/// A participant with no measurement yet is assumed healthy until the
/// first sample lands.
pub trait LagProbe: Send + Sync {
    /// Current global throughput as a fraction of the nominal tick rate,
    /// capped at 1.0 by the consumer.
    fn throughput_ratio(&self) -> f64;

    /// Current responsiveness (round-trip latency proxy, in milliseconds)
    /// for one participant, or `None` when unknown.
    fn responsiveness_of(&self, participant: ParticipantId) -> Option<f64>;
}

/// Smoothed measurements for one participant.
#[derive(Debug, Clone)]
pub struct ResponsivenessSample {
    pub current_responsiveness: f64,
    pub smoothed_responsiveness: f64,
    pub current_throughput: f64,
    pub smoothed_throughput: f64,
    pub degraded: bool,
    pub last_degraded: Option<NaiveDateTime>,
    last_update: NaiveDateTime,
}

impl ResponsivenessSample {
    fn first(responsiveness: f64, throughput: f64, now: NaiveDateTime) -> Self {
        Self {
            current_responsiveness: responsiveness,
            smoothed_responsiveness: responsiveness,
            current_throughput: throughput,
            smoothed_throughput: throughput,
            degraded: false,
            last_degraded: None,
            last_update: now,
        }
    }

    fn apply(&mut self, responsiveness: f64, throughput: f64, now: NaiveDateTime) {
        self.current_responsiveness = responsiveness;
        self.smoothed_responsiveness = RESPONSIVENESS_OLD_WEIGHT * self.smoothed_responsiveness
            + (1.0 - RESPONSIVENESS_OLD_WEIGHT) * responsiveness;
        self.current_throughput = throughput;
        self.smoothed_throughput =
            THROUGHPUT_OLD_WEIGHT * self.smoothed_throughput + (1.0 - THROUGHPUT_OLD_WEIGHT) * throughput;
        self.last_update = now;
    }

    /// Degraded when either threshold is breached.
    pub fn is_lagging(&self, throughput_floor: f64, responsiveness_ceiling: f64) -> bool {
        self.smoothed_throughput < throughput_floor
            || self.smoothed_responsiveness > responsiveness_ceiling
    }

    /// Normalized severity contribution in [0, 1]: the throughput deficit
    /// and responsiveness excess ratios, each clamped, averaged.
    pub fn severity(&self, throughput_floor: f64, responsiveness_ceiling: f64) -> f64 {
        let throughput_deficit = if throughput_floor > 0.0 {
            ((throughput_floor - self.smoothed_throughput) / throughput_floor).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let latency_excess = if responsiveness_ceiling > 0.0 {
            ((self.smoothed_responsiveness - responsiveness_ceiling) / responsiveness_ceiling)
                .clamp(0.0, 1.0)
        } else {
            0.0
        };
        (throughput_deficit + latency_excess) / 2.0
    }

    pub fn last_update(&self) -> NaiveDateTime {
        self.last_update
    }
}

/// Rate-limited, concurrency-safe store of per-participant samples.
pub struct ResponsivenessTracker {
    samples: Mutex<HashMap<ParticipantId, ResponsivenessSample>>,
    sample_interval_ms: i64,
    throughput_floor: f64,
    responsiveness_ceiling: f64,
}

impl ResponsivenessTracker {
    pub fn new(sample_interval_ms: i64, throughput_floor: f64, responsiveness_ceiling: f64) -> Self {
        Self {
            samples: Mutex::new(HashMap::new()),
            sample_interval_ms,
            throughput_floor,
            responsiveness_ceiling,
        }
    }

    /// Record one observation for `participant`. Updates are dropped when
    /// they arrive faster than the configured interval, bounding the cost
    /// of chatty observers.
    pub fn observe(
        &self,
        participant: ParticipantId,
        responsiveness: f64,
        throughput: f64,
        now: NaiveDateTime,
    ) {
        let mut samples = self.samples.lock().unwrap();

        match samples.get_mut(&participant) {
            Some(sample) => {
                let since_last = now
                    .signed_duration_since(sample.last_update())
                    .num_milliseconds();
                if since_last < self.sample_interval_ms {
                    return;
                }
                sample.apply(responsiveness, throughput, now);
                let lagging = sample.is_lagging(self.throughput_floor, self.responsiveness_ceiling);
                if lagging && !sample.degraded {
                    sample.last_degraded = Some(now);
                    tracing::debug!(
                        "[LAG] {} degraded: responsiveness {:.0}ms, throughput {:.3}",
                        participant,
                        sample.smoothed_responsiveness,
                        sample.smoothed_throughput
                    );
                }
                sample.degraded = lagging;
            }
            None => {
                samples.insert(participant, ResponsivenessSample::first(responsiveness, throughput, now));
            }
        }
    }

    /// Severity contribution of one participant; 0 when never observed.
    pub fn severity_of(&self, participant: ParticipantId) -> f64 {
        self.samples
            .lock()
            .unwrap()
            .get(&participant)
            .map(|s| s.severity(self.throughput_floor, self.responsiveness_ceiling))
            .unwrap_or(0.0)
    }

    /// Pairwise severity for a session: the worse of the two participants,
    /// scaled up when the whole server is degraded.
    ///
    /// The global multiplier could push the score past 1.0; it is clamped
    /// here so downstream consumers get a probability-like bound.
    pub fn pair_severity(
        &self,
        a: ParticipantId,
        b: ParticipantId,
        globally_degraded: bool,
    ) -> f64 {
        let severity = self.severity_of(a).max(self.severity_of(b));
        let severity = if globally_degraded {
            severity * GLOBAL_DEGRADED_MULTIPLIER
        } else {
            severity
        };
        severity.min(1.0)
    }

    /// Copy of one participant's sample, for inspection.
    pub fn sample_of(&self, participant: ParticipantId) -> Option<ResponsivenessSample> {
        self.samples.lock().unwrap().get(&participant).cloned()
    }

    /// Drop samples that have not been updated within the inactivity
    /// window. Returns how many were removed.
    pub fn sweep(&self, now: NaiveDateTime, max_inactive_ms: i64) -> usize {
        let mut samples = self.samples.lock().unwrap();
        let before = samples.len();
        samples.retain(|_, sample| {
            now.signed_duration_since(sample.last_update()).num_milliseconds() <= max_inactive_ms
        });
        before - samples.len()
    }

    pub fn tracked(&self) -> usize {
        self.samples.lock().unwrap().len()
    }
}
