//! UBBA Host Edge
//!
//! The host edge sits between the session core and everything with side
//! effects. It owns:
//! - The one [`Session`] of a game instance
//! - Input validation and held-key tracking
//! - The frame clock (host timestamps to per-tick `dt_ms`)
//! - Render and audio collaborators
//! - Replay recording
//!
//! # Architecture
//!
//! The host performs all I/O on behalf of the session. The session is
//! invoked only with [`StepInput`]s and discrete commands; what it wants
//! played or logged comes back as [`SessionEvent`]s.

#![deny(unsafe_code)]

pub mod clock;
pub mod collaborators;
pub mod config;
pub mod input;
pub mod validation;

use std::time::Duration;

use tracing::{debug, info, warn};
use ubba_replay::{BuildFingerprintData, RecordError, ReplayRecorder};
use ubba_sim::{
    CameraId, Command, ConfigError, Presence, Session, SessionEvent, Snapshot, StepInput,
};
use ubba_wire::ReplayArtifact;

use clock::FrameClock;
use collaborators::{AudioSink, Renderer};
use config::GameConfig;
use input::{HeldDirections, InputEvent, Key};
use validation::{EventResult, ValidationConfig, validate_event};

// ============================================================================
// Controller
// ============================================================================

/// Runs one game instance: feeds input to the session, advances it on every
/// host tick and drives the collaborators.
pub struct Controller<R, A> {
    config: GameConfig,
    session: Session,
    renderer: R,
    audio: A,
    clock: FrameClock,
    held: HeldDirections,
    /// Report field contents since the last submit.
    report_line: String,
    validation: ValidationConfig,
    recorder: Option<ReplayRecorder>,
    build_fingerprint: Option<BuildFingerprintData>,
}

impl<R: Renderer, A: AudioSink> Controller<R, A> {
    /// Create a controller and start the first session.
    ///
    /// The initial cues (the ambient loop) are played before returning.
    pub fn new(config: GameConfig, seed: u64, renderer: R, audio: A) -> Result<Self, ConfigError> {
        let session = Session::new(config.session.clone(), seed)?;
        let validation = ValidationConfig {
            camera_count: session.cameras().len(),
            max_report_len: config.max_report_len,
        };
        info!(seed, cameras = session.cameras().len(), "Session started");

        let mut controller = Self {
            clock: FrameClock::new(config.max_dt_ms),
            config,
            session,
            renderer,
            audio,
            held: HeldDirections::default(),
            report_line: String::new(),
            validation,
            recorder: None,
            build_fingerprint: None,
        };
        controller.dispatch_events();
        Ok(controller)
    }

    /// Set the build fingerprint stamped into recordings.
    pub fn set_build_fingerprint(&mut self, fingerprint: BuildFingerprintData) {
        if let Some(recorder) = &mut self.recorder {
            recorder.set_build_fingerprint(fingerprint.clone());
        }
        self.build_fingerprint = Some(fingerprint);
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    /// Current report field contents.
    pub fn report_line(&self) -> &str {
        &self.report_line
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Handle one event from the input collaborator.
    pub fn handle_event(&mut self, event: InputEvent) -> EventResult {
        let result = validate_event(&event, &self.validation);
        if !result.is_accepted() {
            debug!(?event, ?result, "Dropped input");
            return result;
        }

        match event {
            InputEvent::KeyDown(Key::Arrow(direction)) => {
                self.held.press(direction);
                EventResult::Accepted
            }
            InputEvent::KeyUp(Key::Arrow(direction)) => {
                self.held.release(direction);
                EventResult::Accepted
            }
            InputEvent::KeyDown(Key::Digit(number)) => match CameraId::from_number(number) {
                Some(camera) => self.command(Command::SelectCamera(camera)),
                None => EventResult::DroppedUnknownCamera {
                    number,
                    count: self.validation.camera_count,
                },
            },
            InputEvent::KeyDown(Key::Enter) | InputEvent::SubmitClick => self.submit_report(),
            InputEvent::KeyUp(_) => EventResult::Accepted,
            InputEvent::ReportText(text) => {
                self.report_line = text;
                EventResult::Accepted
            }
            InputEvent::CameraClick(step) => self.command(Command::Cycle(step)),
        }
    }

    fn submit_report(&mut self) -> EventResult {
        if !self.session.is_active() {
            return EventResult::DroppedInactive;
        }
        let line = std::mem::take(&mut self.report_line);
        if line.trim().is_empty() {
            return EventResult::DroppedEmptyReport;
        }

        self.record(Command::Report(line.clone()));
        let result = self.session.submit_report(&line);
        info!(report = %line.trim(), ?result, "Report submitted");
        self.dispatch_events();
        EventResult::Reported(result)
    }

    /// Apply a session-mutating command, recording it first.
    fn command(&mut self, command: Command) -> EventResult {
        if !self.session.is_active() {
            return EventResult::DroppedInactive;
        }
        self.record(command.clone());
        self.session.apply(&command);
        self.dispatch_events();
        EventResult::Accepted
    }

    fn record(&mut self, command: Command) {
        if let Some(recorder) = &mut self.recorder {
            recorder.record_command(&command);
        }
    }

    /// Start a new round. Allowed at any time. The frame clock starts over
    /// too, so the first tick of the new round measures no time.
    pub fn restart(&mut self) {
        self.record(Command::Restart);
        self.session.restart();
        self.clock.reset();
        self.report_line.clear();
        info!(seed = self.session.seed(), "Session restarted");
        self.dispatch_events();
    }

    /// Continue with the next night. Only a successful report unlocks it.
    pub fn advance_night(&mut self) -> bool {
        self.record(Command::AdvanceNight);
        let advanced = self.session.advance_night();
        if !advanced {
            info!("Next night only follows a successful report");
        }
        self.dispatch_events();
        advanced
    }

    // ========================================================================
    // Ticks
    // ========================================================================

    /// Advance the session to host time `now`, play cues and render.
    pub fn tick(&mut self, now: Duration) -> Snapshot {
        let input = StepInput {
            dt_ms: self.clock.advance(now),
            pan: self.held.axes(),
        };
        self.step(input)
    }

    /// Advance the session by an explicit step.
    pub fn step(&mut self, input: StepInput) -> Snapshot {
        self.session.advance(&input);
        if let Some(recorder) = &mut self.recorder {
            recorder.record_tick(&input);
        }
        self.dispatch_events();

        let frame = self.session.snapshot();
        self.renderer.render(&frame);
        frame
    }

    fn dispatch_events(&mut self) {
        for event in self.session.take_events() {
            match event {
                SessionEvent::CueStarted(cue) => {
                    let volume = self.config.volumes.for_cue(cue);
                    if let Err(e) = self.audio.play(cue, cue.is_looping(), volume) {
                        warn!("Failed to play {} cue: {}", cue.as_str(), e);
                    }
                }
                SessionEvent::CueStopped(cue) => {
                    if let Err(e) = self.audio.stop(cue) {
                        warn!("Failed to stop {} cue: {}", cue.as_str(), e);
                    }
                }
                SessionEvent::CameraSwitched(camera) => {
                    debug!("Switched to {}", camera);
                }
                SessionEvent::AnomalyRolled(camera) => {
                    debug!("Anomaly on {}", camera);
                }
                SessionEvent::PresenceChanged {
                    from,
                    to,
                    at_ms,
                    deadline_ms,
                } => {
                    if to == Presence::Alerting {
                        info!(at_ms, "UBBA is alerting");
                    }
                    debug!(
                        from = from.as_str(),
                        to = to.as_str(),
                        at_ms,
                        deadline_ms,
                        "Presence changed"
                    );
                }
                SessionEvent::PowerChanged { power, cause } => {
                    debug!(power, ?cause, "Power changed");
                }
                SessionEvent::NightAdvanced { night } => {
                    info!(night, "Night started");
                }
                SessionEvent::Ended(outcome) => {
                    info!(
                        outcome = outcome.as_str(),
                        night = self.session.night(),
                        tick = self.session.tick(),
                        "Session ended"
                    );
                }
                SessionEvent::Restarted => {
                    debug!("Session rebuilt");
                }
            }
        }
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// Start recording. Only possible before the first tick of a round.
    pub fn start_recording(&mut self) -> Result<(), RecordError> {
        let mut recorder = ReplayRecorder::start(&self.session, self.config.tick_rate_hz)?;
        if let Some(fingerprint) = &self.build_fingerprint {
            recorder.set_build_fingerprint(fingerprint.clone());
        }
        self.recorder = Some(recorder);
        Ok(())
    }

    /// Stop recording and produce the artifact, if recording.
    pub fn finish_recording(&mut self) -> Option<ReplayArtifact> {
        let recorder = self.recorder.take()?;
        let ticks = recorder.tick_count();
        let artifact = recorder.finalize(&self.session);
        info!(ticks, end_reason = %artifact.end_reason, "Recording finished");
        Some(artifact)
    }
}

// ============================================================================
// Tests
// ============================================================================
