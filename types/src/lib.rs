//! Shared configuration and identity types for Skirmish.
//!
//! These types cross crate boundaries (core, hosts, tooling), so they stay
//! dependency-light: serde derives and nothing else.

pub mod config;
pub mod id;

pub use config::CombatConfig;
pub use id::{ParticipantId, SessionId};
