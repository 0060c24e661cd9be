pub mod clock;
pub mod config;
pub mod events;
pub mod interference;
pub mod lag;
pub mod session;
pub mod tracking;

// Re-exports for convenience
pub use clock::{ClockSource, IntervalClock, ManualClock, TickFlow, TickHandle};
pub use config::ConfigError;
pub use events::{BroadcastSink, CombatSignal, EndReason, NotificationSink, ZonePolicy};
pub use interference::InterferenceCheck;
pub use lag::LagProbe;
pub use session::{SessionError, SessionManager, SessionSnapshot, SessionState};
pub use skirmish_types::{CombatConfig, ParticipantId, SessionId};
pub use tracking::{ParticipantStats, SessionTracker};
