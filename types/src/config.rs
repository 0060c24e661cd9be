//! Tunable parameters for the combat-session core.
//!
//! Every field has a serde default so partial TOML files work; validation
//! (rejecting non-positive durations and thresholds) lives in
//! `skirmish-core::config`, next to the file loading code.

use serde::{Deserialize, Serialize};

/// Combat-session tuning knobs, loaded from TOML by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Initial countdown duration of a fresh session, in seconds.
    pub session_duration_secs: i64,

    /// Throughput floor as a fraction of the nominal tick rate.
    /// Below this the server (or a participant) counts as degraded.
    pub throughput_floor: f64,

    /// Responsiveness ceiling in milliseconds. Above this a participant
    /// counts as degraded.
    pub responsiveness_ceiling_ms: f64,

    /// Base seconds granted per lag extension before scaling by severity.
    pub base_extension_secs: i64,

    /// Multiplier applied on top of `base_extension_secs * severity`.
    pub extension_multiplier: f64,

    /// Minimum interval between responsiveness samples per participant,
    /// in milliseconds.
    pub sample_interval_ms: i64,

    /// Number of throughput samples kept in the rolling history.
    pub throughput_history_len: usize,

    /// How long an idle lag record survives before the cleanup sweep
    /// removes it, in milliseconds.
    pub inactivity_window_ms: i64,

    /// Whether sessions request visual updates from the notification sink.
    /// Pass-through to collaborators; the core logic ignores it otherwise.
    pub visuals_enabled: bool,

    /// Whether hosts should block interfering interactions. The core only
    /// classifies and records interference; this flag is consumed by the
    /// caller's policy layer.
    pub block_interference: bool,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            session_duration_secs: 30,
            throughput_floor: 0.9,
            responsiveness_ceiling_ms: 200.0,
            base_extension_secs: 5,
            extension_multiplier: 1.5,
            sample_interval_ms: 1000,
            throughput_history_len: 60,
            inactivity_window_ms: 300_000,
            visuals_enabled: true,
            block_interference: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CombatConfig::default();
        assert_eq!(config.session_duration_secs, 30);
        assert_eq!(config.throughput_floor, 0.9);
        assert_eq!(config.responsiveness_ceiling_ms, 200.0);
        assert_eq!(config.base_extension_secs, 5);
        assert_eq!(config.extension_multiplier, 1.5);
        assert_eq!(config.sample_interval_ms, 1000);
        assert_eq!(config.throughput_history_len, 60);
        assert_eq!(config.inactivity_window_ms, 300_000);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml = r#"
session_duration_secs = 45
throughput_floor = 0.85
"#;
        let config: CombatConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.session_duration_secs, 45);
        assert_eq!(config.throughput_floor, 0.85);
        // Unspecified fields keep their defaults
        assert_eq!(config.base_extension_secs, 5);
        assert_eq!(config.throughput_history_len, 60);
    }

    #[test]
    fn toml_round_trip() {
        let config = CombatConfig {
            session_duration_secs: 20,
            visuals_enabled: false,
            ..Default::default()
        };
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: CombatConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, config);
    }
}
