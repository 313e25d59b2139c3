//! Session tuning.
//!
//! Every threshold, dwell window and probability the session consults lives
//! here so hosts can load them from a file instead of baking one prototype
//! revision's numbers into the core.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Reference Constants
// ============================================================================

/// Upper bound of the power budget. Sessions and nights start here.
pub const MAX_POWER: f64 = 100.0;

/// Camera display names used when no configuration overrides them.
pub const DEFAULT_CAMERA_NAMES: [&str; 5] = ["LOBBY", "WEST HALL", "EAST HALL", "STORAGE", "BACKSTAGE"];

/// Visible camera frame size in pixels.
pub const FRAME_SIZE: [f64; 2] = [640.0, 480.0];

/// Symmetric pan limit per axis (the `VIEWPORT_OFFSET` of the viewport model).
pub const VIEWPORT_OFFSET: f64 = 80.0;

/// Largest number of camera slots a session can address.
pub const MAX_CAMERAS: usize = u8::MAX as usize;

// ============================================================================
// Errors
// ============================================================================

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("at least one camera slot is required")]
    NoCameras,

    #[error("{0} camera slots configured, at most {MAX_CAMERAS} are addressable")]
    TooManyCameras(usize),

    #[error("{name}: min {min} is greater than max {max}")]
    InvertedRange { name: &'static str, min: u64, max: u64 },

    #[error("{name}: probability {value} is outside [0, 1]")]
    Probability { name: &'static str, value: f64 },

    #[error("{name} must be greater than zero")]
    NotPositive { name: &'static str },

    #[error("{name}: {value} must be finite and non-negative")]
    Negative { name: &'static str, value: f64 },
}

// ============================================================================
// Dwell Windows
// ============================================================================

/// Inclusive `[min_ms, max_ms]` window a dwell timer is sampled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DwellRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DwellRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// A window that always yields `ms`.
    pub const fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }

    /// Uniformly sample a duration from the window.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        if self.min_ms >= self.max_ms {
            self.min_ms
        } else {
            rng.gen_range(self.min_ms..=self.max_ms)
        }
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.min_ms > self.max_ms {
            return Err(ConfigError::InvertedRange {
                name,
                min: self.min_ms,
                max: self.max_ms,
            });
        }
        if self.max_ms == 0 {
            return Err(ConfigError::NotPositive { name });
        }
        Ok(())
    }
}

// ============================================================================
// Presence
// ============================================================================

/// Which events re-roll the anomaly camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyRoll {
    /// Roll on every Hidden -> Chill transition (and at round start).
    #[default]
    ChillEntry,
    /// Roll only when a round starts: session start, restart, night advance.
    RoundStart,
}

/// Chill -> Alerting decision.
///
/// Alerting requires `elapsed > min_elapsed_ms`. Past `certain_after_ms` the
/// transition is unconditional; before it the scaled `probability` decides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertRule {
    pub min_elapsed_ms: u64,
    pub certain_after_ms: Option<u64>,
    pub probability: f64,
    /// Per-night multiplier for `probability`; night 1 uses index 0 and the
    /// last entry carries over to later nights. Empty means 1.0.
    pub night_scale: Vec<f64>,
}

impl Default for AlertRule {
    fn default() -> Self {
        Self {
            min_elapsed_ms: 60_000,
            certain_after_ms: None,
            probability: 0.5,
            night_scale: Vec::new(),
        }
    }
}

impl AlertRule {
    /// Effective probability for `night` (1-based), clamped to `[0, 1]`.
    pub fn probability_for_night(&self, night: u32) -> f64 {
        let scale = if self.night_scale.is_empty() {
            1.0
        } else {
            let index = (night.max(1) as usize - 1).min(self.night_scale.len() - 1);
            self.night_scale[index]
        };
        (self.probability * scale).clamp(0.0, 1.0)
    }

    /// Roll the Chill -> Alerting decision at session time `elapsed_ms`.
    pub fn should_alert<R: Rng + ?Sized>(&self, elapsed_ms: u64, night: u32, rng: &mut R) -> bool {
        if elapsed_ms <= self.min_elapsed_ms {
            return false;
        }
        if self.certain_after_ms.is_some_and(|t| elapsed_ms > t) {
            return true;
        }
        rng.gen_bool(self.probability_for_night(night))
    }
}

/// Presence state machine tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    pub hidden_dwell: DwellRange,
    pub chill_dwell: DwellRange,
    pub alert_dwell: DwellRange,
    pub alert: AlertRule,
    pub anomaly_roll: AnomalyRoll,
    /// Each velocity component is drawn from `[-max_speed, max_speed]` units per tick.
    pub max_speed: f64,
    /// Per-tick chance of re-rolling the roaming velocity.
    pub velocity_reroll_chance: f64,
    /// Sprite footprint `[w, h]`, kept inside the virtual frame while roaming.
    pub sprite_size: [f64; 2],
    /// Per-axis spread of the per-camera Chill anchors around the frame centre.
    pub anchor_jitter: f64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            hidden_dwell: DwellRange::new(15_000, 20_000),
            chill_dwell: DwellRange::new(15_000, 20_000),
            alert_dwell: DwellRange::new(5_000, 10_000),
            alert: AlertRule::default(),
            anomaly_roll: AnomalyRoll::default(),
            max_speed: 5.0,
            velocity_reroll_chance: 0.01,
            sprite_size: [64.0, 128.0],
            anchor_jitter: 40.0,
        }
    }
}

// ============================================================================
// Power, Penalties, View, Cues
// ============================================================================

/// Power budget clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    pub drain_interval_ms: u64,
    pub drain_amount: f64,
    /// Deducted on every accepted camera switch.
    pub camera_switch_cost: f64,
    /// Surviving this long in one night advances to the next.
    pub night_duration_ms: Option<u64>,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            drain_interval_ms: 15_000,
            drain_amount: 5.0,
            camera_switch_cost: 0.0,
            night_duration_ms: None,
        }
    }
}

/// Wrong-answer consequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyConfig {
    pub wrong_answer_power: f64,
    pub jumpscare_chance: f64,
    /// When a jumpscare is playing, postpone the power-out failure until it
    /// finishes instead of ending the session immediately.
    pub defer_failure_to_jumpscare: bool,
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            wrong_answer_power: 15.0,
            jumpscare_chance: 0.3,
            defer_failure_to_jumpscare: true,
        }
    }
}

/// Viewport geometry and pan behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub frame_size: [f64; 2],
    pub pan_limit: f64,
    /// Pan speed in units per second of held direction.
    pub pan_speed: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            frame_size: FRAME_SIZE,
            pan_limit: VIEWPORT_OFFSET,
            pan_speed: 240.0,
        }
    }
}

impl ViewConfig {
    /// Oversized frame the roaming presence moves in: frame plus twice the
    /// pan limit on each axis.
    pub fn virtual_frame(&self) -> [f64; 2] {
        [
            self.frame_size[0] + 2.0 * self.pan_limit,
            self.frame_size[1] + 2.0 * self.pan_limit,
        ]
    }
}

/// Fixed durations of the transient cues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CueConfig {
    pub static_ms: u64,
    pub alert_ms: u64,
    pub jumpscare_ms: u64,
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            static_ms: 300,
            alert_ms: 2_000,
            jumpscare_ms: 2_000,
        }
    }
}

// ============================================================================
// Session Config
// ============================================================================

/// Complete tuning for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cameras: Vec<String>,
    pub presence: PresenceConfig,
    pub power: PowerConfig,
    pub penalty: PenaltyConfig,
    pub view: ViewConfig,
    pub cues: CueConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cameras: DEFAULT_CAMERA_NAMES.iter().map(|s| s.to_string()).collect(),
            presence: PresenceConfig::default(),
            power: PowerConfig::default(),
            penalty: PenaltyConfig::default(),
            view: ViewConfig::default(),
            cues: CueConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Check every field a session relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cameras.is_empty() {
            return Err(ConfigError::NoCameras);
        }
        if self.cameras.len() > MAX_CAMERAS {
            return Err(ConfigError::TooManyCameras(self.cameras.len()));
        }

        let presence = &self.presence;
        presence.hidden_dwell.validate("presence.hidden_dwell")?;
        presence.chill_dwell.validate("presence.chill_dwell")?;
        presence.alert_dwell.validate("presence.alert_dwell")?;
        probability("presence.alert.probability", presence.alert.probability)?;
        probability(
            "presence.velocity_reroll_chance",
            presence.velocity_reroll_chance,
        )?;
        for &scale in &presence.alert.night_scale {
            non_negative("presence.alert.night_scale", scale)?;
        }
        non_negative("presence.max_speed", presence.max_speed)?;
        non_negative("presence.anchor_jitter", presence.anchor_jitter)?;
        non_negative("presence.sprite_size", presence.sprite_size[0])?;
        non_negative("presence.sprite_size", presence.sprite_size[1])?;

        if self.power.drain_interval_ms == 0 {
            return Err(ConfigError::NotPositive {
                name: "power.drain_interval_ms",
            });
        }
        if self.power.night_duration_ms == Some(0) {
            return Err(ConfigError::NotPositive {
                name: "power.night_duration_ms",
            });
        }
        non_negative("power.drain_amount", self.power.drain_amount)?;
        non_negative("power.camera_switch_cost", self.power.camera_switch_cost)?;

        non_negative("penalty.wrong_answer_power", self.penalty.wrong_answer_power)?;
        probability("penalty.jumpscare_chance", self.penalty.jumpscare_chance)?;

        non_negative("view.pan_limit", self.view.pan_limit)?;
        non_negative("view.pan_speed", self.view.pan_speed)?;
        if !(self.view.frame_size[0] > 0.0 && self.view.frame_size[1] > 0.0) {
            return Err(ConfigError::NotPositive {
                name: "view.frame_size",
            });
        }

        Ok(())
    }
}

fn probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Probability { name, value })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { name, value })
    }
}

// ============================================================================
// Tests
// ============================================================================
