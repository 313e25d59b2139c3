//! Host configuration file.
//!
//! A TOML document with host settings at the top level and the session
//! tuning under `[session]`:
//!
//! ```toml
//! tick_rate_hz = 60
//! seed = 7
//!
//! [session.power]
//! drain_interval_ms = 15000
//! ```
//!
//! A missing file means defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use ubba_sim::{ConfigError, Cue, SessionConfig};

/// Default host loop rate.
pub const TICK_RATE_HZ: u32 = 60;

/// Longest step the frame clock hands the session after a stall.
pub const MAX_DT_MS: u64 = 250;

/// Longest report line accepted from the input collaborator.
pub const MAX_REPORT_LEN: usize = 32;

/// Errors loading a [`GameConfig`].
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid session config: {0}")]
    Session(#[from] ConfigError),

    #[error("{name} must be greater than zero")]
    NotPositive { name: &'static str },
}

/// Per-cue playback volume in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CueVolumes {
    pub ambient: f32,
    #[serde(rename = "static")]
    pub static_burst: f32,
    pub alert: f32,
    pub jumpscare: f32,
}

impl Default for CueVolumes {
    fn default() -> Self {
        Self {
            ambient: 0.3,
            static_burst: 0.3,
            alert: 0.5,
            jumpscare: 0.7,
        }
    }
}

impl CueVolumes {
    pub fn for_cue(&self, cue: Cue) -> f32 {
        let volume = match cue {
            Cue::Ambient => self.ambient,
            Cue::Static => self.static_burst,
            Cue::Alert => self.alert,
            Cue::Jumpscare => self.jumpscare,
        };
        volume.clamp(0.0, 1.0)
    }
}

/// Everything the host needs to run a night.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub tick_rate_hz: u32,
    /// Fixed seed; a time-derived one is used when unset.
    pub seed: Option<u64>,
    pub max_dt_ms: u64,
    pub max_report_len: usize,
    pub volumes: CueVolumes,
    pub session: SessionConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: TICK_RATE_HZ,
            seed: None,
            max_dt_ms: MAX_DT_MS,
            max_report_len: MAX_REPORT_LEN,
            volumes: CueVolumes::default(),
            session: SessionConfig::default(),
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.tick_rate_hz == 0 {
            return Err(LoadError::NotPositive {
                name: "tick_rate_hz",
            });
        }
        if self.max_dt_ms == 0 {
            return Err(LoadError::NotPositive { name: "max_dt_ms" });
        }
        if self.max_report_len == 0 {
            return Err(LoadError::NotPositive {
                name: "max_report_len",
            });
        }
        self.session.validate()?;
        Ok(())
    }
}

/// Parse and validate a TOML document.
pub fn parse_config(text: &str, path: &Path) -> Result<GameConfig, LoadError> {
    let config: GameConfig = toml::from_str(text).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Load the config at `path`, falling back to defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<GameConfig, LoadError> {
    match fs::read_to_string(path) {
        Ok(text) => {
            let config = parse_config(&text, path)?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("No config at {}, using defaults", path.display());
            Ok(GameConfig::default())
        }
        Err(source) => Err(LoadError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> &'static Path {
        Path::new("ubba.toml")
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = parse_config("", path()).unwrap();
        assert_eq!(config, GameConfig::default());
    }

    #[test]
    fn test_nested_session_tables() {
        let text = r#"
            tick_rate_hz = 30
            seed = 7

            [volumes]
            static = 0.1

            [session]
            cameras = ["LOBBY", "VENT"]

            [session.power]
            drain_interval_ms = 5000
            night_duration_ms = 360000

            [session.presence.alert]
            min_elapsed_ms = 0
            night_scale = [0.2, 0.4, 0.6]
        "#;
        let config = parse_config(text, path()).unwrap();
        assert_eq!(config.tick_rate_hz, 30);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.volumes.static_burst, 0.1);
        assert_eq!(config.volumes.jumpscare, 0.7);
        assert_eq!(config.session.cameras.len(), 2);
        assert_eq!(config.session.power.drain_interval_ms, 5_000);
        assert_eq!(config.session.power.drain_amount, 5.0);
        assert_eq!(config.session.power.night_duration_ms, Some(360_000));
        assert_eq!(config.session.presence.alert.night_scale, vec![0.2, 0.4, 0.6]);
        assert_eq!(config.session.presence.alert.probability, 0.5);
    }

    #[test]
    fn test_invalid_session_rejected() {
        let text = "[session.penalty]\njumpscare_chance = 2.0\n";
        assert!(matches!(
            parse_config(text, path()),
            Err(LoadError::Session(ConfigError::Probability { .. }))
        ));
    }

    #[test]
    fn test_zero_tick_rate_rejected() {
        assert!(matches!(
            parse_config("tick_rate_hz = 0", path()),
            Err(LoadError::NotPositive {
                name: "tick_rate_hz"
            })
        ));
    }

    #[test]
    fn test_syntax_error_names_file() {
        let err = parse_config("tick_rate_hz = = 3", path()).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
        assert!(err.to_string().contains("ubba.toml"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let missing = std::env::temp_dir().join("ubba-definitely-missing-config.toml");
        let config = load_config(&missing).unwrap();
        assert_eq!(config, GameConfig::default());
    }

    #[test]
    fn test_volume_clamped() {
        let volumes = CueVolumes {
            alert: 3.0,
            ..Default::default()
        };
        assert_eq!(volumes.for_cue(Cue::Alert), 1.0);
        assert_eq!(volumes.for_cue(Cue::Jumpscare), 0.7);
    }
}
