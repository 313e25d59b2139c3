//! UBBA Replay System
//!
//! Records a session's inputs into a [`ReplayArtifact`] and verifies that
//! re-running them from the recorded seed and configuration lands on the
//! same state digest.
//!
//! # Architecture
//!
//! - `ReplayRecorder`: collects per-tick step inputs and between-tick commands
//! - `verify_replay`: rebuilds the session and replays the recording
//! - Build fingerprint acquisition for same-build verification scope
//!
//! Recordings must start from a session fresh out of [`Session::new`]; the
//! verifier reconstructs exactly that state and checks the initial digest.

#![deny(unsafe_code)]

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use prost::Message;
use sha2::{Digest, Sha256};
use thiserror::Error;
use ubba_sim::{
    Command, RNG_ALGORITHM, STATE_DIGEST_ALGO_ID, Session, SessionConfig, StepInput, Tick,
};
use ubba_wire::{BuildFingerprint, CommandProto, FrameProto, ReplayArtifact, TickRecordProto};

/// Current artifact schema version.
pub const REPLAY_FORMAT_VERSION: u32 = 1;

// ============================================================================
// Replay Recorder
// ============================================================================

/// Errors starting a recording.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("session already advanced to tick {0}; recordings start at tick 0")]
    NotAtStart(Tick),

    #[error("failed to serialize session config: {0}")]
    Config(#[from] serde_json::Error),
}

/// Build fingerprint data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFingerprintData {
    pub binary_sha256: String,
    pub target_triple: String,
    pub profile: String,
    pub git_commit: String,
}

impl From<BuildFingerprintData> for BuildFingerprint {
    fn from(f: BuildFingerprintData) -> Self {
        Self {
            binary_sha256: f.binary_sha256,
            target_triple: f.target_triple,
            profile: f.profile,
            git_commit: f.git_commit,
        }
    }
}

/// Records one session for replay artifact generation.
#[derive(Debug)]
pub struct ReplayRecorder {
    seed: u64,
    tick_rate_hz: u32,
    config_json: String,
    initial_frame: FrameProto,
    ticks: Vec<TickRecordProto>,
    pending: Vec<CommandProto>,
    build_fingerprint: Option<BuildFingerprintData>,
}

impl ReplayRecorder {
    /// Begin recording `session`, which must not have advanced yet.
    pub fn start(session: &Session, tick_rate_hz: u32) -> Result<Self, RecordError> {
        if session.tick() != 0 {
            return Err(RecordError::NotAtStart(session.tick()));
        }
        Ok(Self {
            seed: session.seed(),
            tick_rate_hz,
            config_json: serde_json::to_string(session.config())?,
            initial_frame: FrameProto::from(&session.snapshot()),
            ticks: Vec::new(),
            pending: Vec::new(),
            build_fingerprint: None,
        })
    }

    /// Record a command applied between ticks.
    pub fn record_command(&mut self, command: &Command) {
        self.pending.push(CommandProto::from(command));
    }

    /// Record one `advance` call, closing over the commands since the last.
    pub fn record_tick(&mut self, input: &StepInput) {
        self.ticks.push(TickRecordProto {
            commands: std::mem::take(&mut self.pending),
            dt_ms: input.dt_ms,
            pan: input.pan.iter().map(|&p| i32::from(p)).collect(),
        });
    }

    /// Number of ticks recorded so far.
    pub fn tick_count(&self) -> usize {
        self.ticks.len()
    }

    /// Set the build fingerprint.
    pub fn set_build_fingerprint(&mut self, fingerprint: BuildFingerprintData) {
        self.build_fingerprint = Some(fingerprint);
    }

    /// Finalize the artifact against the session's current state.
    pub fn finalize(self, session: &Session) -> ReplayArtifact {
        let end_reason = match session.outcome() {
            Some(outcome) => outcome.as_str(),
            None => "stopped",
        };

        ReplayArtifact {
            replay_format_version: REPLAY_FORMAT_VERSION,
            initial_frame: Some(self.initial_frame),
            seed: self.seed,
            rng_algorithm: RNG_ALGORITHM.to_string(),
            tick_rate_hz: self.tick_rate_hz,
            state_digest_algo_id: STATE_DIGEST_ALGO_ID.to_string(),
            config_sha256: sha256_hex(self.config_json.as_bytes()),
            config_json: self.config_json,
            ticks: self.ticks,
            trailing_commands: self.pending,
            build_fingerprint: self.build_fingerprint.map(Into::into),
            final_digest: session.state_digest(),
            checkpoint_tick: session.tick(),
            end_reason: end_reason.to_string(),
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

// ============================================================================
// Replay Verification
// ============================================================================

/// Replay verification error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VerifyError {
    #[error("build fingerprint mismatch: expected {expected}, got {actual}")]
    BuildMismatch { expected: String, actual: String },

    #[error("unsupported replay format version {0}")]
    UnsupportedVersion(u32),

    #[error("algorithm mismatch: artifact uses {recorded}, this build uses {current}")]
    AlgorithmMismatch { recorded: String, current: String },

    #[error("config hash mismatch: recorded {recorded}, computed {computed}")]
    ConfigHashMismatch { recorded: String, computed: String },

    #[error("recorded config rejected: {0}")]
    InvalidConfig(String),

    #[error("missing initial frame in replay artifact")]
    MissingInitialFrame,

    #[error("initialization anchor mismatch: expected {expected:#x}, got {actual:#x}")]
    InitializationAnchorMismatch { expected: u64, actual: u64 },

    #[error("final digest mismatch: expected {expected:#x}, got {actual:#x}")]
    FinalDigestMismatch { expected: u64, actual: u64 },

    #[error("checkpoint tick mismatch: expected {expected}, got {actual}")]
    CheckpointTickMismatch { expected: Tick, actual: Tick },

    #[error("end reason mismatch: expected {expected}, got {actual}")]
    EndReasonMismatch { expected: String, actual: String },

    #[error("invalid replay format: {reason}")]
    InvalidFormat { reason: String },
}

/// Options for replay verification.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Fail on build fingerprint mismatch instead of ignoring it.
    pub strict_build_check: bool,
    /// Current build fingerprint for comparison.
    pub current_build: Option<BuildFingerprintData>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            strict_build_check: true,
            current_build: None,
        }
    }
}

/// Verify a replay artifact reproduces the recorded session.
///
/// Steps:
/// 1. Check build fingerprint, format version and algorithm identifiers
/// 2. Check the config hash and rebuild the session from config and seed
/// 3. Compare the initial frame digest (initialization anchor)
/// 4. Apply each tick's commands, then advance with its step input
/// 5. Apply trailing commands
/// 6. Compare tick, digest and end reason with the recorded checkpoint
pub fn verify_replay(artifact: &ReplayArtifact, options: &VerifyOptions) -> Result<(), VerifyError> {
    if let (Some(recorded), Some(current)) = (&artifact.build_fingerprint, &options.current_build) {
        let mismatch = recorded.binary_sha256 != current.binary_sha256
            || recorded.target_triple != current.target_triple
            || recorded.profile != current.profile;
        if mismatch && options.strict_build_check {
            return Err(VerifyError::BuildMismatch {
                expected: recorded.binary_sha256.clone(),
                actual: current.binary_sha256.clone(),
            });
        }
    }

    if artifact.replay_format_version != REPLAY_FORMAT_VERSION {
        return Err(VerifyError::UnsupportedVersion(artifact.replay_format_version));
    }
    check_algorithm(&artifact.rng_algorithm, RNG_ALGORITHM)?;
    check_algorithm(&artifact.state_digest_algo_id, STATE_DIGEST_ALGO_ID)?;

    let computed = sha256_hex(artifact.config_json.as_bytes());
    if computed != artifact.config_sha256 {
        return Err(VerifyError::ConfigHashMismatch {
            recorded: artifact.config_sha256.clone(),
            computed,
        });
    }
    let config: SessionConfig =
        serde_json::from_str(&artifact.config_json).map_err(|e| VerifyError::InvalidFormat {
            reason: format!("config_json: {e}"),
        })?;

    let mut session = Session::new(config, artifact.seed)
        .map_err(|e| VerifyError::InvalidConfig(e.to_string()))?;

    let initial = artifact
        .initial_frame
        .as_ref()
        .ok_or(VerifyError::MissingInitialFrame)?;
    let actual = session.state_digest();
    if actual != initial.digest {
        return Err(VerifyError::InitializationAnchorMismatch {
            expected: initial.digest,
            actual,
        });
    }

    for (index, record) in artifact.ticks.iter().enumerate() {
        apply_commands(&mut session, &record.commands)?;
        let input = step_input(record).map_err(|reason| VerifyError::InvalidFormat {
            reason: format!("tick record {index}: {reason}"),
        })?;
        session.advance(&input);
    }
    apply_commands(&mut session, &artifact.trailing_commands)?;

    if session.tick() != artifact.checkpoint_tick {
        return Err(VerifyError::CheckpointTickMismatch {
            expected: artifact.checkpoint_tick,
            actual: session.tick(),
        });
    }

    let actual_digest = session.state_digest();
    if actual_digest != artifact.final_digest {
        return Err(VerifyError::FinalDigestMismatch {
            expected: artifact.final_digest,
            actual: actual_digest,
        });
    }

    let actual_reason = session.outcome().map_or("stopped", |o| o.as_str());
    if actual_reason != artifact.end_reason {
        return Err(VerifyError::EndReasonMismatch {
            expected: artifact.end_reason.clone(),
            actual: actual_reason.to_string(),
        });
    }

    Ok(())
}

fn check_algorithm(recorded: &str, current: &str) -> Result<(), VerifyError> {
    if recorded == current {
        Ok(())
    } else {
        Err(VerifyError::AlgorithmMismatch {
            recorded: recorded.to_string(),
            current: current.to_string(),
        })
    }
}

fn apply_commands(session: &mut Session, commands: &[CommandProto]) -> Result<(), VerifyError> {
    for proto in commands {
        let command = Command::try_from(proto).map_err(|reason| VerifyError::InvalidFormat {
            reason: reason.to_string(),
        })?;
        session.apply(&command);
    }
    Ok(())
}

fn step_input(record: &TickRecordProto) -> Result<StepInput, &'static str> {
    let [x, y] = record.pan.as_slice() else {
        return Err("pan must have exactly 2 elements");
    };
    let axis = |v: i32| match v {
        -1..=1 => Ok(v as i8),
        _ => Err("pan components must be -1, 0 or 1"),
    };
    Ok(StepInput {
        dt_ms: record.dt_ms,
        pan: [axis(*x)?, axis(*y)?],
    })
}

// ============================================================================
// Build Fingerprint Acquisition
// ============================================================================

/// Acquire the current build fingerprint.
///
/// Fails if the running executable cannot be read.
pub fn acquire_build_fingerprint() -> io::Result<BuildFingerprintData> {
    let exe_path = std::env::current_exe()?;

    let mut file = fs::File::open(&exe_path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    let profile = if cfg!(debug_assertions) {
        "dev"
    } else {
        "release"
    };

    Ok(BuildFingerprintData {
        binary_sha256: format!("{:x}", hasher.finalize()),
        target_triple: format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS),
        profile: profile.to_string(),
        git_commit: std::env::var("UBBA_GIT_COMMIT").unwrap_or_else(|_| "unknown".to_string()),
    })
}

// ============================================================================
// Replay I/O
// ============================================================================

/// Write a replay artifact to a new file. Existing files are never replaced.
pub fn write_replay(artifact: &ReplayArtifact, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(&artifact.encode_to_vec())?;

    Ok(())
}

/// Read a replay artifact from a file.
pub fn read_replay(path: &Path) -> io::Result<ReplayArtifact> {
    let data = fs::read(path)?;
    ReplayArtifact::decode(data.as_slice()).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("failed to decode replay: {e}"),
        )
    })
}

// ============================================================================
// Tests
// ============================================================================
