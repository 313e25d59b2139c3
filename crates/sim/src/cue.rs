//! Audio/visual cues and the events a session reports to its host.
//!
//! Cues carry no behaviour of their own; the session only tracks when each
//! transient one expires so ending or resetting a session can stop all of
//! them in the same call.

use serde::{Deserialize, Serialize};

use crate::camera::CameraId;
use crate::digest::Fnv1a64;
use crate::presence::Presence;

/// The four cues a host plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cue {
    /// Looping background hum while a session is active.
    Ambient,
    /// Short static burst on camera switches.
    Static,
    /// Alert loop on entering Alerting.
    Alert,
    /// One-shot full-screen jumpscare after a wrong report.
    Jumpscare,
}

impl Cue {
    pub const ALL: [Cue; 4] = [Cue::Ambient, Cue::Static, Cue::Alert, Cue::Jumpscare];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ambient => "ambient",
            Self::Static => "static",
            Self::Alert => "alert",
            Self::Jumpscare => "jumpscare",
        }
    }

    /// Whether hosts should loop the cue's audio.
    pub fn is_looping(&self) -> bool {
        matches!(self, Self::Ambient | Self::Alert)
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// Correct report while Alerting.
    Success,
    /// Power ran out.
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Reason for a power deduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerCause {
    Drain,
    WrongAnswer,
    CameraSwitch,
}

/// Something the host may want to react to (audio, logging, UI).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    CueStarted(Cue),
    CueStopped(Cue),
    CameraSwitched(CameraId),
    AnomalyRolled(CameraId),
    PresenceChanged {
        from: Presence,
        to: Presence,
        at_ms: u64,
        deadline_ms: u64,
    },
    PowerChanged {
        power: f64,
        cause: PowerCause,
    },
    NightAdvanced {
        night: u32,
    },
    Ended(Outcome),
    Restarted,
}

/// Expiry deadlines of the transient cues plus the ambient loop flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CueTimers {
    ambient: bool,
    static_until: Option<u64>,
    alert_until: Option<u64>,
    jumpscare_until: Option<u64>,
}

impl CueTimers {
    pub fn is_active(&self, cue: Cue) -> bool {
        match cue {
            Cue::Ambient => self.ambient,
            Cue::Static => self.static_until.is_some(),
            Cue::Alert => self.alert_until.is_some(),
            Cue::Jumpscare => self.jumpscare_until.is_some(),
        }
    }

    pub fn active(&self) -> Vec<Cue> {
        Cue::ALL.into_iter().filter(|c| self.is_active(*c)).collect()
    }

    pub fn start_ambient(&mut self) {
        self.ambient = true;
    }

    /// Start (or restart) a transient cue ending at `now_ms + duration_ms`.
    pub fn start(&mut self, cue: Cue, now_ms: u64, duration_ms: u64) {
        let until = Some(now_ms + duration_ms);
        match cue {
            Cue::Ambient => self.ambient = true,
            Cue::Static => self.static_until = until,
            Cue::Alert => self.alert_until = until,
            Cue::Jumpscare => self.jumpscare_until = until,
        }
    }

    /// Clear every transient cue whose deadline has passed.
    pub fn expire(&mut self, now_ms: u64) -> Vec<Cue> {
        let mut expired = Vec::new();
        for (cue, slot) in [
            (Cue::Static, &mut self.static_until),
            (Cue::Alert, &mut self.alert_until),
            (Cue::Jumpscare, &mut self.jumpscare_until),
        ] {
            if slot.is_some_and(|until| now_ms >= until) {
                *slot = None;
                expired.push(cue);
            }
        }
        expired
    }

    /// Feed the looping flag and every transient deadline into `h`.
    pub(crate) fn digest_into(&self, h: &mut Fnv1a64) {
        h.update(&[u8::from(self.ambient)]);
        for slot in [self.static_until, self.alert_until, self.jumpscare_until] {
            match slot {
                Some(until) => {
                    h.update(&[1]);
                    h.u64(until);
                }
                None => h.update(&[0]),
            }
        }
    }

    /// Stop everything, returning what was playing.
    pub fn stop_all(&mut self) -> Vec<Cue> {
        let active = self.active();
        *self = Self::default();
        active
    }
}
