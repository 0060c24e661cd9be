//! Loading, validating, and saving the combat configuration.
//!
//! Configuration lives in a single TOML file: either an explicit path the
//! host supplies, or the platform default location under the user config
//! directory. Missing files are not an error; the defaults apply.

use std::fs;
use std::path::{Path, PathBuf};

use skirmish_types::CombatConfig;
use thiserror::Error;

/// Errors that can occur during config loading and saving.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Serialize error for {path:?}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}

/// Reject configurations the core cannot run with. Called by every load
/// path; hosts constructing a `CombatConfig` in code should call it too.
pub fn validate(config: &CombatConfig) -> Result<(), ConfigError> {
    let fail = |reason: String| Err(ConfigError::Invalid { reason });

    if config.session_duration_secs < 0 {
        return fail(format!(
            "session_duration_secs must be non-negative, got {}",
            config.session_duration_secs
        ));
    }
    if config.throughput_floor <= 0.0 || config.throughput_floor > 1.0 {
        return fail(format!(
            "throughput_floor must be in (0, 1], got {}",
            config.throughput_floor
        ));
    }
    if config.responsiveness_ceiling_ms <= 0.0 {
        return fail(format!(
            "responsiveness_ceiling_ms must be positive, got {}",
            config.responsiveness_ceiling_ms
        ));
    }
    if config.base_extension_secs < 0 {
        return fail(format!(
            "base_extension_secs must be non-negative, got {}",
            config.base_extension_secs
        ));
    }
    if config.extension_multiplier < 0.0 {
        return fail(format!(
            "extension_multiplier must be non-negative, got {}",
            config.extension_multiplier
        ));
    }
    if config.sample_interval_ms <= 0 {
        return fail(format!(
            "sample_interval_ms must be positive, got {}",
            config.sample_interval_ms
        ));
    }
    if config.throughput_history_len == 0 {
        return fail("throughput_history_len must be at least 1".to_string());
    }
    if config.inactivity_window_ms <= 0 {
        return fail(format!(
            "inactivity_window_ms must be positive, got {}",
            config.inactivity_window_ms
        ));
    }
    Ok(())
}

/// Load and validate a config from an explicit TOML file.
pub fn load_file(path: &Path) -> Result<CombatConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: CombatConfig = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;

    validate(&config)?;
    Ok(config)
}

/// Save a config to a TOML file, creating parent directories as needed.
pub fn save_file(path: &Path, config: &CombatConfig) -> Result<(), ConfigError> {
    let contents = toml::to_string_pretty(config).map_err(|e| ConfigError::Serialize {
        path: path.to_path_buf(),
        source: e,
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(path, contents).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Default config file location under the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("skirmish").join("combat.toml"))
}

/// Load from the default location, falling back to defaults when the file
/// does not exist. A present-but-broken file is reported, not ignored.
pub fn load_or_default() -> Result<CombatConfig, ConfigError> {
    match default_config_path() {
        Some(path) if path.exists() => {
            tracing::info!("[CONFIG] Loading combat config from {:?}", path);
            load_file(&path)
        }
        _ => Ok(CombatConfig::default()),
    }
}
