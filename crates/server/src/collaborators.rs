//! Host-side collaborators: whatever draws frames and plays cues.
//!
//! The controller owns one of each and drives them after every tick. The
//! implementations here are the headless ones `ubba-night` uses; graphical
//! hosts supply their own.

use std::io::Write;

use prost::Message;
use thiserror::Error;
use tracing::{debug, info, warn};
use ubba_sim::{Cue, Snapshot};
use ubba_wire::FrameProto;

/// Receives the frame after every tick.
pub trait Renderer {
    fn render(&mut self, frame: &Snapshot);
}

/// Playback failure reported by an [`AudioSink`].
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("cue '{0}' is not loaded")]
    NotLoaded(&'static str),

    #[error("audio device unavailable: {0}")]
    Device(String),
}

/// Plays and stops cues.
///
/// Failures are logged by the controller and never stop a session.
pub trait AudioSink {
    fn play(&mut self, cue: Cue, looping: bool, volume: f32) -> Result<(), AudioError>;
    fn stop(&mut self, cue: Cue) -> Result<(), AudioError>;
}

impl<A: Renderer, B: Renderer> Renderer for (A, B) {
    fn render(&mut self, frame: &Snapshot) {
        self.0.render(frame);
        self.1.render(frame);
    }
}

impl<R: Renderer> Renderer for Option<R> {
    fn render(&mut self, frame: &Snapshot) {
        if let Some(renderer) = self {
            renderer.render(frame);
        }
    }
}

// ============================================================================
// Headless Implementations
// ============================================================================

/// Logs a status line whenever it changes.
#[derive(Debug, Default)]
pub struct LogRenderer {
    last: Option<String>,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn status_line(frame: &Snapshot) -> String {
        let mut line = format!(
            "night {} | power {:.0}% | {} {}",
            frame.night,
            frame.power,
            frame.current_camera,
            frame.camera_name
        );
        if frame.presence_visible() {
            line.push_str(" | UBBA is here");
        }
        if frame.can_report {
            line.push_str(" | REPORT NOW");
        }
        if frame.jumpscare_showing() {
            line.push_str(" | !!!");
        }
        if let Some(outcome) = frame.outcome {
            line.push_str(" | ");
            line.push_str(outcome.as_str());
        }
        line
    }
}

impl Renderer for LogRenderer {
    fn render(&mut self, frame: &Snapshot) {
        let line = Self::status_line(frame);
        if self.last.as_deref() != Some(line.as_str()) {
            info!("{}", line);
            self.last = Some(line);
        }
    }
}

/// Logs cue playback.
#[derive(Debug, Default)]
pub struct LogAudio;

impl AudioSink for LogAudio {
    fn play(&mut self, cue: Cue, looping: bool, volume: f32) -> Result<(), AudioError> {
        debug!(cue = cue.as_str(), looping, volume, "play");
        Ok(())
    }

    fn stop(&mut self, cue: Cue) -> Result<(), AudioError> {
        debug!(cue = cue.as_str(), "stop");
        Ok(())
    }
}

/// Streams every frame as a length-delimited [`FrameProto`].
///
/// Write errors are logged once; later frames are dropped silently.
#[derive(Debug)]
pub struct FrameStreamRenderer<W: Write> {
    writer: W,
    failed: bool,
}

impl<W: Write> FrameStreamRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            failed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Renderer for FrameStreamRenderer<W> {
    fn render(&mut self, frame: &Snapshot) {
        if self.failed {
            return;
        }
        let bytes = FrameProto::from(frame).encode_length_delimited_to_vec();
        if let Err(e) = self.writer.write_all(&bytes) {
            warn!("Frame stream stopped: {}", e);
            self.failed = true;
        }
    }
}
