//! UBBA Session Core
//!
//! Deterministic game-session state for the UBBA camera-monitoring minigame:
//! the presence state machine, the power clock, camera selection and viewport
//! panning, report evaluation and the cues hosts should play.
//!
//! # Constraints
//!
//! The session core MUST NOT:
//! - Perform I/O (file, network, audio, drawing)
//! - Read wall-clock time; hosts pass elapsed milliseconds in [`StepInput`]
//! - Use unseeded randomness; every roll goes through the session's seeded
//!   generator
//!
//! Hosts observe the session through [`Snapshot`] and the [`SessionEvent`]s
//! returned by [`Session::take_events`].

#![deny(unsafe_code)]

use serde::{Deserialize, Serialize};

mod camera;
mod config;
mod cue;
mod digest;
mod presence;
mod session;

pub use camera::{CameraBank, CameraId, CameraStep, nudge_offset};
pub use config::{
    AlertRule, AnomalyRoll, ConfigError, CueConfig, DEFAULT_CAMERA_NAMES, DwellRange, FRAME_SIZE,
    MAX_CAMERAS, MAX_POWER, PenaltyConfig, PowerConfig, PresenceConfig, SessionConfig,
    VIEWPORT_OFFSET, ViewConfig,
};
pub use cue::{Cue, Outcome, PowerCause, SessionEvent};
pub use digest::STATE_DIGEST_ALGO_ID;
pub use presence::Presence;
pub use session::{ReportIgnored, ReportResult, Session, normalize_report};

// ============================================================================
// Type Aliases
// ============================================================================

/// One host loop iteration; the session counts them for digests and replays.
pub type Tick = u64;

/// Identifier of the generator behind every session roll, recorded in replays.
pub const RNG_ALGORITHM: &str = "Pcg64Mcg";

// ============================================================================
// Core Types
// ============================================================================

/// Per-tick input consumed by [`Session::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepInput {
    /// Milliseconds since the previous tick.
    pub dt_ms: u64,
    /// Held pan directions per axis: -1, 0 or 1.
    pub pan: [i8; 2],
}

/// A between-ticks player action, in the form replays record it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    SelectCamera(CameraId),
    Cycle(CameraStep),
    Report(String),
    Restart,
    AdvanceNight,
}

/// Read-only view of a session after a tick.
///
/// Positions are in virtual-frame coordinates; the visible frame's origin
/// sits at `pan_limit - view_offset` inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub tick: Tick,
    pub night: u32,
    pub elapsed_ms: u64,
    pub power: f64,
    pub active: bool,
    pub outcome: Option<Outcome>,
    pub current_camera: CameraId,
    pub camera_name: String,
    pub view_offset: [f64; 2],
    pub presence: Presence,
    /// Camera the presence occupies; `None` while Hidden.
    pub presence_camera: Option<CameraId>,
    pub presence_position: Option<[f64; 2]>,
    pub presence_velocity: [f64; 2],
    pub can_report: bool,
    /// Cues currently playing, in [`Cue::ALL`] order.
    pub cues: Vec<Cue>,
    pub digest: u64,
}

impl Snapshot {
    /// Whether the presence should be drawn on the current camera.
    pub fn presence_visible(&self) -> bool {
        self.presence_camera == Some(self.current_camera) && self.presence_position.is_some()
    }

    /// Whether the jumpscare overlay should cover the frame.
    pub fn jumpscare_showing(&self) -> bool {
        self.cues.contains(&Cue::Jumpscare)
    }
}
