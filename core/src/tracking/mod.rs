//! Lifetime per-participant combat statistics.

pub mod stats;

pub use stats::{ParticipantStats, SessionTracker};
