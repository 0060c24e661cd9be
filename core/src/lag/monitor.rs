//! Global throughput monitor.
//!
//! Tracks the fraction of the nominal tick rate the host actually
//! achieves, keeps a fixed-length rolling history, and maintains a
//! degraded flag with hysteresis so the flag does not oscillate when
//! throughput hovers at the threshold.

use std::collections::VecDeque;

use chrono::NaiveDateTime;

/// Width of the hysteresis band above the floor. One unit corresponds to
/// one tick out of a nominal twenty (0.05 of nominal throughput): the
/// degraded flag sets below the floor and clears only a full unit above it.
const HYSTERESIS_UNIT: f64 = 0.05;

#[derive(Debug)]
pub struct LoadMonitor {
    history: VecDeque<f64>,
    capacity: usize,
    rolling_avg: f64,
    current: f64,
    degraded: bool,
    floor: f64,
    last_refresh: Option<NaiveDateTime>,
}

impl LoadMonitor {
    pub fn new(floor: f64, history_len: usize) -> Self {
        let capacity = history_len.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            rolling_avg: 1.0,
            current: 1.0,
            degraded: false,
            floor,
            last_refresh: None,
        }
    }

    /// Push one throughput observation. Called once per external tick by
    /// exactly one caller; the ratio is capped into [0, 1].
    pub fn refresh(&mut self, ratio: f64, now: NaiveDateTime) {
        let ratio = ratio.clamp(0.0, 1.0);
        self.current = ratio;

        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(ratio);
        self.rolling_avg = self.history.iter().sum::<f64>() / self.history.len() as f64;

        if ratio < self.floor {
            if !self.degraded {
                tracing::info!(
                    "[LAG] Server throughput degraded: {:.3} below floor {:.3}",
                    ratio,
                    self.floor
                );
            }
            self.degraded = true;
        } else if ratio >= self.floor + HYSTERESIS_UNIT {
            if self.degraded {
                tracing::info!("[LAG] Server throughput recovered: {:.3}", ratio);
            }
            self.degraded = false;
        }
        // Inside the hysteresis band the flag holds its previous value.

        self.last_refresh = Some(now);
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn rolling_average(&self) -> f64 {
        self.rolling_avg
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn last_refresh(&self) -> Option<NaiveDateTime> {
        self.last_refresh
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}
