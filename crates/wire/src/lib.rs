//! UBBA Wire Types
//!
//! Protobuf messages shared by the night host and the replay tooling:
//! rendered frames, recorded player commands and the replay artifact.
//!
//! Conversions from the session types live here so the session core stays
//! free of encoding concerns.

#![deny(unsafe_code)]

use prost::Message;
use ubba_sim::{CameraId, CameraStep, Command, Snapshot};

/// Tick type alias for wire messages.
pub type Tick = u64;

// ============================================================================
// Frames
// ============================================================================

/// One rendered frame: everything a renderer needs after a tick.
#[derive(Clone, PartialEq, Message)]
pub struct FrameProto {
    #[prost(uint64, tag = "1")]
    pub tick: Tick,

    #[prost(uint32, tag = "2")]
    pub night: u32,

    #[prost(uint64, tag = "3")]
    pub elapsed_ms: u64,

    #[prost(double, tag = "4")]
    pub power: f64,

    #[prost(bool, tag = "5")]
    pub active: bool,

    /// "", "success" or "failure".
    #[prost(string, tag = "6")]
    pub outcome: String,

    /// 1-based camera number as shown on screen.
    #[prost(uint32, tag = "7")]
    pub camera: u32,

    #[prost(string, tag = "8")]
    pub camera_name: String,

    /// Pan offset [x, y].
    #[prost(double, repeated, tag = "9")]
    pub view_offset: Vec<f64>,

    /// Presence code: 0 hidden, 1 chill, 2 alerting.
    #[prost(uint32, tag = "10")]
    pub presence: u32,

    /// 1-based camera the presence occupies, unset while hidden.
    #[prost(uint32, optional, tag = "11")]
    pub presence_camera: Option<u32>,

    /// Presence position [x, y]; empty when there is nothing to draw.
    #[prost(double, repeated, tag = "12")]
    pub presence_position: Vec<f64>,

    #[prost(bool, tag = "13")]
    pub can_report: bool,

    /// Names of the cues playing.
    #[prost(string, repeated, tag = "14")]
    pub cues: Vec<String>,

    #[prost(uint64, tag = "15")]
    pub digest: u64,
}

impl From<&Snapshot> for FrameProto {
    fn from(s: &Snapshot) -> Self {
        Self {
            tick: s.tick,
            night: s.night,
            elapsed_ms: s.elapsed_ms,
            power: s.power,
            active: s.active,
            outcome: s.outcome.map(|o| o.as_str()).unwrap_or_default().to_string(),
            camera: u32::from(s.current_camera.number()),
            camera_name: s.camera_name.clone(),
            view_offset: s.view_offset.to_vec(),
            presence: u32::from(s.presence.code()),
            presence_camera: s.presence_camera.map(|c| u32::from(c.number())),
            presence_position: s.presence_position.map(|p| p.to_vec()).unwrap_or_default(),
            can_report: s.can_report,
            cues: s.cues.iter().map(|c| c.as_str().to_string()).collect(),
            digest: s.digest,
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// A recorded between-ticks player action.
#[derive(Clone, PartialEq, Message)]
pub struct CommandProto {
    #[prost(oneof = "command_proto::Kind", tags = "1, 2, 3, 4, 5")]
    pub kind: Option<command_proto::Kind>,
}

pub mod command_proto {
    /// Command payloads. `Cycle` is -1 for previous and +1 for next.
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        /// 1-based camera number.
        #[prost(uint32, tag = "1")]
        SelectCamera(u32),
        #[prost(sint32, tag = "2")]
        Cycle(i32),
        #[prost(string, tag = "3")]
        Report(String),
        #[prost(bool, tag = "4")]
        Restart(bool),
        #[prost(bool, tag = "5")]
        AdvanceNight(bool),
    }
}

impl From<&Command> for CommandProto {
    fn from(c: &Command) -> Self {
        use command_proto::Kind;

        let kind = match c {
            Command::SelectCamera(camera) => Kind::SelectCamera(u32::from(camera.number())),
            Command::Cycle(CameraStep::Prev) => Kind::Cycle(-1),
            Command::Cycle(CameraStep::Next) => Kind::Cycle(1),
            Command::Report(text) => Kind::Report(text.clone()),
            Command::Restart => Kind::Restart(true),
            Command::AdvanceNight => Kind::AdvanceNight(true),
        };
        Self { kind: Some(kind) }
    }
}

impl TryFrom<&CommandProto> for Command {
    type Error = &'static str;

    fn try_from(c: &CommandProto) -> Result<Self, Self::Error> {
        use command_proto::Kind;

        match c.kind.as_ref().ok_or("command kind missing")? {
            Kind::SelectCamera(number) => {
                let number = u8::try_from(*number).map_err(|_| "camera number out of range")?;
                CameraId::from_number(number)
                    .map(Command::SelectCamera)
                    .ok_or("camera numbers start at 1")
            }
            Kind::Cycle(-1) => Ok(Command::Cycle(CameraStep::Prev)),
            Kind::Cycle(1) => Ok(Command::Cycle(CameraStep::Next)),
            Kind::Cycle(_) => Err("cycle direction must be -1 or 1"),
            Kind::Report(text) => Ok(Command::Report(text.clone())),
            Kind::Restart(_) => Ok(Command::Restart),
            Kind::AdvanceNight(_) => Ok(Command::AdvanceNight),
        }
    }
}

// ============================================================================
// Replay Artifact Types
// ============================================================================

/// One `advance` call plus the commands applied just before it.
#[derive(Clone, PartialEq, Message)]
pub struct TickRecordProto {
    #[prost(message, repeated, tag = "1")]
    pub commands: Vec<CommandProto>,

    #[prost(uint64, tag = "2")]
    pub dt_ms: u64,

    /// Held pan directions [x, y], each -1, 0 or 1.
    #[prost(sint32, repeated, tag = "3")]
    pub pan: Vec<i32>,
}

/// Build fingerprint for replay scope verification.
#[derive(Clone, PartialEq, Message)]
pub struct BuildFingerprint {
    /// SHA-256 of the recording executable's bytes.
    #[prost(string, tag = "1")]
    pub binary_sha256: String,

    /// Target triple (e.g., "x86_64-unknown-linux-gnu").
    #[prost(string, tag = "2")]
    pub target_triple: String,

    /// Build profile ("release" or "dev").
    #[prost(string, tag = "3")]
    pub profile: String,

    /// Git commit hash (metadata/traceability).
    #[prost(string, tag = "4")]
    pub git_commit: String,
}

/// Complete replay artifact for one recorded session.
#[derive(Clone, PartialEq, Message)]
pub struct ReplayArtifact {
    /// Schema version (starts at 1).
    #[prost(uint32, tag = "1")]
    pub replay_format_version: u32,

    /// Frame at recording start.
    #[prost(message, optional, tag = "2")]
    pub initial_frame: Option<FrameProto>,

    #[prost(uint64, tag = "3")]
    pub seed: u64,

    /// RNG algorithm identifier (e.g., "Pcg64Mcg").
    #[prost(string, tag = "4")]
    pub rng_algorithm: String,

    /// Host loop rate the session was driven at (informational).
    #[prost(uint32, tag = "5")]
    pub tick_rate_hz: u32,

    #[prost(string, tag = "6")]
    pub state_digest_algo_id: String,

    /// Session configuration as JSON.
    #[prost(string, tag = "7")]
    pub config_json: String,

    /// Hex SHA-256 of `config_json`.
    #[prost(string, tag = "8")]
    pub config_sha256: String,

    #[prost(message, repeated, tag = "9")]
    pub ticks: Vec<TickRecordProto>,

    /// Commands applied after the last recorded tick.
    #[prost(message, repeated, tag = "10")]
    pub trailing_commands: Vec<CommandProto>,

    #[prost(message, optional, tag = "11")]
    pub build_fingerprint: Option<BuildFingerprint>,

    /// StateDigest after the last tick and trailing commands.
    #[prost(uint64, tag = "12")]
    pub final_digest: u64,

    /// Session tick at the end of the recording.
    #[prost(uint64, tag = "13")]
    pub checkpoint_tick: Tick,

    /// "success", "failure" or "stopped".
    #[prost(string, tag = "14")]
    pub end_reason: String,
}

// ============================================================================
// Tests
// ============================================================================
