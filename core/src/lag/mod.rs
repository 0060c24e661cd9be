//! Lag detection and timer adjustment.
//!
//! Three pieces cooperate here:
//! - [`LoadMonitor`]: rolling view of global throughput with a hysteretic
//!   degraded flag.
//! - [`ResponsivenessTracker`]: per-participant latency/throughput samples
//!   with EMA smoothing, feeding a normalized severity score.
//! - [`AdjustmentEngine`]: converts severity into extra countdown seconds
//!   and keeps per-session grant accounting.

pub mod adjustment;
pub mod monitor;
pub mod responsiveness;

pub use adjustment::{AdjustmentEngine, LagAdjustment};
pub use monitor::LoadMonitor;
pub use responsiveness::{LagProbe, ResponsivenessSample, ResponsivenessTracker};
