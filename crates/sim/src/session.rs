//! The session: one playthrough's full mutable state.
//!
//! A `Session` is advanced by the host's fixed-rate loop through
//! [`Session::advance`] and mutated between ticks by the input operations
//! ([`Session::select_camera`], [`Session::cycle_camera`],
//! [`Session::submit_report`]). Nothing here reads a clock: `StepInput`
//! carries the elapsed milliseconds since the previous tick.
//!
//! Once a session is inactive every operation except [`Session::restart`]
//! and [`Session::advance_night`] is a no-op. The same holds for camera and
//! report input while a power-out failure waits on its jumpscare.

use rand::{Rng, RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

use crate::camera::{CameraBank, CameraId, CameraStep, nudge_offset};
use crate::config::{AnomalyRoll, ConfigError, MAX_POWER, SessionConfig};
use crate::cue::{Cue, CueTimers, Outcome, PowerCause, SessionEvent};
use crate::digest::Fnv1a64;
use crate::presence::{Presence, PresenceMachine};
use crate::{Command, Snapshot, StepInput, Tick};

/// Result of a report submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReportResult {
    /// Nothing changed.
    Ignored(ReportIgnored),
    /// Matched the anomaly camera; the session ended in success.
    Correct,
    /// Did not match; `penalty` power was deducted.
    Wrong { penalty: f64, jumpscare: bool },
}

/// Why a report was not evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportIgnored {
    Inactive,
    NotAlerting,
}

/// Canonical form of a typed report: trimmed and lowercased.
pub fn normalize_report(text: &str) -> String {
    text.trim().to_lowercase()
}

/// One playthrough.
#[derive(Debug, Clone)]
pub struct Session {
    config: SessionConfig,
    seed: u64,
    rng: Pcg64Mcg,
    tick: Tick,
    night: u32,
    elapsed_ms: u64,
    night_started_ms: u64,
    next_drain_ms: u64,
    power: f64,
    active: bool,
    outcome: Option<Outcome>,
    cameras: CameraBank,
    current_camera: CameraId,
    view_offset: [f64; 2],
    anomaly_camera: CameraId,
    presence: PresenceMachine,
    cues: CueTimers,
    events: Vec<SessionEvent>,
}

impl Session {
    /// Create a session at night 1 with full power and a hidden presence.
    ///
    /// Per-camera Chill anchors are rolled here, once, from `seed`.
    pub fn new(config: SessionConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut rng = Pcg64Mcg::seed_from_u64(seed);
        let mut cameras = CameraBank::new(config.cameras.clone());
        roll_anchors(&mut cameras, &config, &mut rng);
        Ok(Self::build(config, seed, rng, cameras))
    }

    fn build(config: SessionConfig, seed: u64, mut rng: Pcg64Mcg, cameras: CameraBank) -> Self {
        let presence = PresenceMachine::new(0, &config.presence, &mut rng);
        let anomaly_camera = random_camera(&cameras, &mut rng);
        let mut cues = CueTimers::default();
        cues.start_ambient();

        Self {
            next_drain_ms: config.power.drain_interval_ms,
            seed,
            rng,
            tick: 0,
            night: 1,
            elapsed_ms: 0,
            night_started_ms: 0,
            power: MAX_POWER,
            active: true,
            outcome: None,
            current_camera: CameraId::from_index(0),
            view_offset: [0.0, 0.0],
            anomaly_camera,
            presence,
            cues,
            events: vec![
                SessionEvent::CueStarted(Cue::Ambient),
                SessionEvent::AnomalyRolled(anomaly_camera),
            ],
            cameras,
            config,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of `advance` calls applied since creation or the last restart.
    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn night(&self) -> u32 {
        self.night
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn power(&self) -> f64 {
        self.power
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn cameras(&self) -> &CameraBank {
        &self.cameras
    }

    pub fn current_camera(&self) -> CameraId {
        self.current_camera
    }

    pub fn view_offset(&self) -> [f64; 2] {
        self.view_offset
    }

    pub fn anomaly_camera(&self) -> CameraId {
        self.anomaly_camera
    }

    pub fn presence(&self) -> Presence {
        self.presence.state()
    }

    pub fn next_presence_deadline(&self) -> u64 {
        self.presence.deadline_ms()
    }

    pub fn next_drain_ms(&self) -> u64 {
        self.next_drain_ms
    }

    /// Reports are only evaluated while accepting input and Alerting.
    pub fn can_report(&self) -> bool {
        self.accepts_input() && self.presence.state() == Presence::Alerting
    }

    /// Power ran out but the jumpscare still holds off the failure.
    pub fn failure_pending(&self) -> bool {
        self.active && self.power <= 0.0
    }

    fn accepts_input(&self) -> bool {
        self.active && !self.failure_pending()
    }

    pub fn is_cue_active(&self, cue: Cue) -> bool {
        self.cues.is_active(cue)
    }

    /// Drain the events produced since the last call.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance one logical tick.
    ///
    /// Order: elapsed time, pan, cue expiry, power drain, night survival,
    /// presence deadline, roaming integration. Each stage stops the tick if
    /// it ended the session.
    pub fn advance(&mut self, input: &StepInput) {
        if !self.active {
            return;
        }

        self.tick += 1;
        let now = self.elapsed_ms + input.dt_ms;
        self.elapsed_ms = now;

        self.view_offset = nudge_offset(
            self.view_offset,
            input.pan,
            self.config.view.pan_speed,
            input.dt_ms,
            self.config.view.pan_limit,
        );

        self.expire_cues(now);
        if !self.active {
            return;
        }

        self.drain_power(now);
        if !self.active {
            return;
        }

        if let Some(duration) = self.config.power.night_duration_ms
            && now - self.night_started_ms >= duration
        {
            self.begin_night(self.night + 1);
            return;
        }

        self.poll_presence(now);

        let bounds = self.roam_bounds();
        self.presence
            .integrate(&self.config.presence, bounds, &mut self.rng);
    }

    fn expire_cues(&mut self, now: u64) {
        for cue in self.cues.expire(now) {
            self.events.push(SessionEvent::CueStopped(cue));
            if cue == Cue::Jumpscare && self.power <= 0.0 {
                self.end(Outcome::Failure);
            }
        }
    }

    fn drain_power(&mut self, now: u64) {
        while self.active && now >= self.next_drain_ms {
            self.next_drain_ms += self.config.power.drain_interval_ms;
            self.deduct(self.config.power.drain_amount, PowerCause::Drain);
        }
    }

    fn poll_presence(&mut self, now: u64) {
        if !self.presence.is_due(now) {
            return;
        }

        let rule = &self.config.presence.alert;
        let (elapsed, night) = (self.elapsed_ms, self.night);
        let rng = &mut self.rng;
        let next = self
            .presence
            .next_state(|| rule.should_alert(elapsed, night, rng));

        if next == Presence::Chill && self.config.presence.anomaly_roll == AnomalyRoll::ChillEntry {
            self.roll_anomaly();
        }

        let bounds = self.roam_bounds();
        let transition = self
            .presence
            .enter(next, now, &self.config.presence, bounds, &mut self.rng);
        self.events.push(SessionEvent::PresenceChanged {
            from: transition.from,
            to: transition.to,
            at_ms: transition.at_ms,
            deadline_ms: transition.deadline_ms,
        });

        if next == Presence::Alerting {
            self.cues.start(Cue::Alert, now, self.config.cues.alert_ms);
            self.events.push(SessionEvent::CueStarted(Cue::Alert));
        }
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Switch to `camera`: zero the pan offset and fire the static cue.
    ///
    /// Returns false (and changes nothing) when input is not accepted or
    /// `camera` is not a configured slot.
    pub fn select_camera(&mut self, camera: CameraId) -> bool {
        if !self.accepts_input() || !self.cameras.contains(camera) {
            return false;
        }

        self.current_camera = camera;
        self.view_offset = [0.0, 0.0];
        self.cues
            .start(Cue::Static, self.elapsed_ms, self.config.cues.static_ms);
        self.events.push(SessionEvent::CameraSwitched(camera));
        self.events.push(SessionEvent::CueStarted(Cue::Static));

        let cost = self.config.power.camera_switch_cost;
        if cost > 0.0 {
            self.deduct(cost, PowerCause::CameraSwitch);
        }
        true
    }

    /// Switch to the previous or next slot, wrapping.
    pub fn cycle_camera(&mut self, step: CameraStep) -> bool {
        let target = self.cameras.step(self.current_camera, step);
        self.select_camera(target)
    }

    /// Evaluate a typed report against the anomaly camera.
    pub fn submit_report(&mut self, text: &str) -> ReportResult {
        if !self.accepts_input() {
            return ReportResult::Ignored(ReportIgnored::Inactive);
        }
        if self.presence.state() != Presence::Alerting {
            return ReportResult::Ignored(ReportIgnored::NotAlerting);
        }

        if normalize_report(text) == self.anomaly_camera.label() {
            self.end(Outcome::Success);
            return ReportResult::Correct;
        }

        let jumpscare = self.rng.gen_bool(self.config.penalty.jumpscare_chance);
        if jumpscare {
            self.cues
                .start(Cue::Jumpscare, self.elapsed_ms, self.config.cues.jumpscare_ms);
            self.events.push(SessionEvent::CueStarted(Cue::Jumpscare));
        }

        let penalty = self.config.penalty.wrong_answer_power;
        self.deduct(penalty, PowerCause::WrongAnswer);
        ReportResult::Wrong { penalty, jumpscare }
    }

    /// Apply a recorded command. Returns whether it changed anything.
    pub fn apply(&mut self, command: &Command) -> bool {
        match command {
            Command::SelectCamera(camera) => self.select_camera(*camera),
            Command::Cycle(step) => self.cycle_camera(*step),
            Command::Report(text) => !matches!(self.submit_report(text), ReportResult::Ignored(_)),
            Command::Restart => {
                self.restart();
                true
            }
            Command::AdvanceNight => self.advance_night(),
        }
    }

    /// Replace a camera's Chill anchor, e.g. once real frame sizes are known.
    pub fn set_chill_anchor(&mut self, camera: CameraId, anchor: Option<[f64; 2]>) -> bool {
        self.cameras.set_anchor(camera, anchor)
    }

    // ========================================================================
    // Resets
    // ========================================================================

    /// Rebuild the session from scratch with the same configuration.
    ///
    /// Anchors survive (they belong to the loaded assets); the new round is
    /// seeded from this session's generator so successive restarts differ.
    pub fn restart(&mut self) {
        let stopped = self.cues.stop_all();
        let seed = self.rng.next_u64();
        let rng = Pcg64Mcg::seed_from_u64(seed);
        let rebuilt = Self::build(self.config.clone(), seed, rng, self.cameras.clone());

        let mut events = std::mem::take(&mut self.events);
        events.extend(stopped.into_iter().map(SessionEvent::CueStopped));
        events.push(SessionEvent::Restarted);
        *self = rebuilt;
        let fresh = std::mem::take(&mut self.events);
        events.extend(fresh);
        self.events = events;
    }

    /// Continue with the next night after a successful report: power
    /// refilled, presence hidden, a new anomaly camera. Refused while the
    /// night is still running and after a power-out failure.
    pub fn advance_night(&mut self) -> bool {
        if self.outcome != Some(Outcome::Success) {
            return false;
        }
        self.begin_night(self.night + 1);
        true
    }

    fn begin_night(&mut self, night: u32) {
        for cue in self.cues.stop_all() {
            self.events.push(SessionEvent::CueStopped(cue));
        }

        let now = self.elapsed_ms;
        self.night = night;
        self.night_started_ms = now;
        self.next_drain_ms = now + self.config.power.drain_interval_ms;
        self.power = MAX_POWER;
        self.active = true;
        self.outcome = None;
        self.view_offset = [0.0, 0.0];
        self.presence = PresenceMachine::new(now, &self.config.presence, &mut self.rng);

        self.cues.start_ambient();
        self.events.push(SessionEvent::NightAdvanced { night });
        self.events.push(SessionEvent::CueStarted(Cue::Ambient));
        self.roll_anomaly();
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn deduct(&mut self, amount: f64, cause: PowerCause) {
        self.power = (self.power - amount).clamp(0.0, MAX_POWER);
        self.events.push(SessionEvent::PowerChanged {
            power: self.power,
            cause,
        });

        if self.power <= 0.0 {
            let waiting_on_jumpscare = self.config.penalty.defer_failure_to_jumpscare
                && self.cues.is_active(Cue::Jumpscare);
            if !waiting_on_jumpscare {
                self.end(Outcome::Failure);
            }
        }
    }

    fn end(&mut self, outcome: Outcome) {
        if !self.active {
            return;
        }
        self.active = false;
        self.outcome = Some(outcome);
        for cue in self.cues.stop_all() {
            self.events.push(SessionEvent::CueStopped(cue));
        }
        self.events.push(SessionEvent::Ended(outcome));
    }

    fn roll_anomaly(&mut self) {
        self.anomaly_camera = random_camera(&self.cameras, &mut self.rng);
        self.events
            .push(SessionEvent::AnomalyRolled(self.anomaly_camera));
    }

    /// Upper corner of the area the roaming sprite's origin may occupy.
    fn roam_bounds(&self) -> [f64; 2] {
        let frame = self.config.view.virtual_frame();
        let sprite = self.config.presence.sprite_size;
        [(frame[0] - sprite[0]).max(0.0), (frame[1] - sprite[1]).max(0.0)]
    }

    /// Where the presence is drawn, in virtual-frame coordinates.
    ///
    /// `None` while Hidden, or while chilling on a camera whose anchor is not
    /// ready yet.
    pub fn presence_position(&self) -> Option<[f64; 2]> {
        match self.presence.state() {
            Presence::Hidden => None,
            Presence::Chill => self.cameras.anchor(self.anomaly_camera),
            Presence::Alerting => Some(self.presence.position()),
        }
    }

    // ========================================================================
    // Read-only Views
    // ========================================================================

    /// Read-only view handed to the render collaborator.
    pub fn snapshot(&self) -> Snapshot {
        let presence = self.presence.state();
        Snapshot {
            tick: self.tick,
            night: self.night,
            elapsed_ms: self.elapsed_ms,
            power: self.power,
            active: self.active,
            outcome: self.outcome,
            current_camera: self.current_camera,
            camera_name: self
                .cameras
                .name(self.current_camera)
                .unwrap_or_default()
                .to_string(),
            view_offset: self.view_offset,
            presence,
            presence_camera: (presence != Presence::Hidden).then_some(self.anomaly_camera),
            presence_position: self.presence_position(),
            presence_velocity: self.presence.velocity(),
            can_report: self.can_report(),
            cues: self.cues.active(),
            digest: self.state_digest(),
        }
    }

    /// Digest of every field that influences future behaviour, cue deadlines
    /// included.
    pub fn state_digest(&self) -> u64 {
        let mut h = Fnv1a64::new();
        h.u64(self.tick);
        h.u64(u64::from(self.night));
        h.u64(self.elapsed_ms);
        h.u64(self.night_started_ms);
        h.u64(self.next_drain_ms);
        h.f64(self.power);
        h.update(&[u8::from(self.active)]);
        h.update(&[match self.outcome {
            None => 0,
            Some(Outcome::Success) => 1,
            Some(Outcome::Failure) => 2,
        }]);
        h.u64(self.current_camera.index() as u64);
        h.f64(self.view_offset[0]);
        h.f64(self.view_offset[1]);
        h.u64(self.anomaly_camera.index() as u64);
        h.update(&[self.presence.state().code()]);
        h.u64(self.presence.deadline_ms());
        let [x, y] = self.presence.position();
        let [vx, vy] = self.presence.velocity();
        h.f64(x);
        h.f64(y);
        h.f64(vx);
        h.f64(vy);
        self.cues.digest_into(&mut h);
        h.finish()
    }
}

fn random_camera(cameras: &CameraBank, rng: &mut Pcg64Mcg) -> CameraId {
    CameraId::from_index(rng.gen_range(0..cameras.len()) as u8)
}

/// Place each camera's Chill anchor near the centre of the virtual frame.
fn roll_anchors(cameras: &mut CameraBank, config: &SessionConfig, rng: &mut Pcg64Mcg) {
    let frame = config.view.virtual_frame();
    let sprite = config.presence.sprite_size;
    let jitter = config.presence.anchor_jitter;
    let centre = [(frame[0] - sprite[0]) / 2.0, (frame[1] - sprite[1]) / 2.0];

    let ids: Vec<CameraId> = cameras.ids().collect();
    for camera in ids {
        let anchor = [
            centre[0] + rng.gen_range(-jitter..=jitter),
            centre[1] + rng.gen_range(-jitter..=jitter),
        ];
        cameras.set_anchor(camera, Some(anchor));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AlertRule, DwellRange};

    const SEED: u64 = 42;

    fn step(dt_ms: u64) -> StepInput {
        StepInput { dt_ms, pan: [0, 0] }
    }

    /// Presence walks Hidden -> Chill -> Alerting in 20 ms and then stays
    /// Alerting for a long time. No jumpscares, no roaming re-rolls.
    fn fast_config() -> SessionConfig {
        let mut config = SessionConfig::default();
        config.presence.hidden_dwell = DwellRange::fixed(10);
        config.presence.chill_dwell = DwellRange::fixed(10);
        config.presence.alert_dwell = DwellRange::fixed(1_000_000);
        config.presence.alert = AlertRule {
            min_elapsed_ms: 0,
            certain_after_ms: None,
            probability: 1.0,
            night_scale: Vec::new(),
        };
        config.presence.velocity_reroll_chance = 0.0;
        config.penalty.jumpscare_chance = 0.0;
        config
    }

    fn alerting_session(config: SessionConfig) -> Session {
        let mut session = Session::new(config, SEED).unwrap();
        session.advance(&step(10));
        assert_eq!(session.presence(), Presence::Chill);
        session.advance(&step(10));
        assert_eq!(session.presence(), Presence::Alerting);
        session.take_events();
        session
    }

    #[test]
    fn test_new_session_initial_state() {
        let mut session = Session::new(SessionConfig::default(), SEED).unwrap();
        assert_eq!(session.power(), MAX_POWER);
        assert_eq!(session.presence(), Presence::Hidden);
        assert!(session.is_active());
        assert_eq!(session.night(), 1);
        assert_eq!(session.elapsed_ms(), 0);
        assert_eq!(session.current_camera(), CameraId::from_index(0));
        assert!(session.cameras().contains(session.anomaly_camera()));
        assert!(session.is_cue_active(Cue::Ambient));
        assert!(
            (15_000..=20_000).contains(&session.next_presence_deadline()),
            "hidden dwell armed on entry"
        );

        let events = session.take_events();
        assert_eq!(events[0], SessionEvent::CueStarted(Cue::Ambient));
        assert!(matches!(events[1], SessionEvent::AnomalyRolled(_)));
        assert!(session.take_events().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SessionConfig {
            cameras: Vec::new(),
            ..Default::default()
        };
        assert_eq!(
            Session::new(config, SEED).unwrap_err(),
            ConfigError::NoCameras
        );
    }

    #[test]
    fn test_anchors_rolled_near_centre() {
        let session = Session::new(SessionConfig::default(), SEED).unwrap();
        let config = session.config();
        let frame = config.view.virtual_frame();
        let sprite = config.presence.sprite_size;
        let jitter = config.presence.anchor_jitter;
        for camera in session.cameras().ids() {
            let [x, y] = session.cameras().anchor(camera).unwrap();
            assert!((x - (frame[0] - sprite[0]) / 2.0).abs() <= jitter);
            assert!((y - (frame[1] - sprite[1]) / 2.0).abs() <= jitter);
        }
    }

    // ------------------------------------------------------------------------
    // Power clock
    // ------------------------------------------------------------------------

    /// power=100, interval 15000 ms, amount 5: 300000 ms of ticks ends the
    /// session in failure at exactly zero power.
    #[test]
    fn test_power_runs_out_after_twenty_intervals() {
        let mut config = SessionConfig::default();
        // Keep the presence out of the way
        config.presence.alert.min_elapsed_ms = u64::MAX;
        let mut session = Session::new(config, SEED).unwrap();

        for _ in 0..2_999 {
            session.advance(&step(100));
        }
        assert!(session.is_active());
        assert_eq!(session.power(), 5.0);

        session.advance(&step(100));
        assert_eq!(session.elapsed_ms(), 300_000);
        assert_eq!(session.power(), 0.0);
        assert!(!session.is_active());
        assert_eq!(session.outcome(), Some(Outcome::Failure));
    }

    #[test]
    fn test_power_non_increasing_and_bounded() {
        let mut config = fast_config();
        config.presence.alert_dwell = DwellRange::new(50, 400);
        config.presence.alert.probability = 0.5;
        config.power.drain_interval_ms = 700;
        let mut session = Session::new(config, 7).unwrap();

        let mut last = session.power();
        let mut i = 0u64;
        while session.is_active() {
            session.advance(&step(16));
            if i % 37 == 0 {
                session.submit_report("cam99");
            }
            let power = session.power();
            assert!((0.0..=MAX_POWER).contains(&power));
            assert!(power <= last, "power rose from {last} to {power}");
            last = power;
            i += 1;
        }
        assert_eq!(session.power(), 0.0);
    }

    #[test]
    fn test_large_step_applies_every_due_drain() {
        let mut config = SessionConfig::default();
        config.presence.alert.min_elapsed_ms = u64::MAX;
        let mut session = Session::new(config, SEED).unwrap();
        session.advance(&step(45_000));
        assert_eq!(session.power(), 85.0);
        assert_eq!(session.next_drain_ms(), 60_000);
    }

    #[test]
    fn test_inactive_session_ignores_ticks() {
        let mut session = Session::new(SessionConfig::default(), SEED).unwrap();
        session.advance(&step(400_000));
        assert!(!session.is_active());
        let digest = session.state_digest();
        session.take_events();

        session.advance(&step(10_000));
        assert_eq!(session.state_digest(), digest);
        assert!(session.take_events().is_empty());
    }

    // ------------------------------------------------------------------------
    // Presence
    // ------------------------------------------------------------------------

    #[test]
    fn test_presence_only_transitions_at_deadline() {
        let mut session = Session::new(SessionConfig::default(), SEED).unwrap();
        let deadline = session.next_presence_deadline();

        session.advance(&step(deadline - 1));
        assert_eq!(session.presence(), Presence::Hidden);
        assert_eq!(session.next_presence_deadline(), deadline);

        session.advance(&step(1));
        assert_eq!(session.presence(), Presence::Chill);
        let rearmed = session.next_presence_deadline();
        assert!((deadline + 15_000..=deadline + 20_000).contains(&rearmed));
    }

    #[test]
    fn test_every_transition_rearms_deadline() {
        let mut config = SessionConfig::default();
        config.presence.alert.min_elapsed_ms = 0;
        let mut session = Session::new(config, 3).unwrap();

        for _ in 0..20_000 {
            let before_state = session.presence();
            let before_deadline = session.next_presence_deadline();
            session.advance(&step(50));
            if !session.is_active() {
                break;
            }
            if session.presence() != before_state {
                assert!(session.elapsed_ms() >= before_deadline);
                assert!(session.next_presence_deadline() > session.elapsed_ms());
            } else {
                assert_eq!(session.next_presence_deadline(), before_deadline);
            }
        }
    }

    #[test]
    fn test_chill_returns_to_hidden_before_minimum() {
        let mut config = fast_config();
        config.presence.alert.min_elapsed_ms = 1_000;
        let mut session = Session::new(config, SEED).unwrap();
        session.advance(&step(10));
        assert_eq!(session.presence(), Presence::Chill);
        session.advance(&step(10));
        assert_eq!(session.presence(), Presence::Hidden);
    }

    #[test]
    fn test_chill_entry_rolls_anomaly() {
        let mut session = Session::new(fast_config(), SEED).unwrap();
        session.take_events();
        session.advance(&step(10));
        let events = session.take_events();
        let rolled = events
            .iter()
            .position(|e| matches!(e, SessionEvent::AnomalyRolled(_)))
            .expect("anomaly rolled on chill entry");
        let changed = events
            .iter()
            .position(|e| matches!(e, SessionEvent::PresenceChanged { .. }))
            .unwrap();
        assert!(rolled < changed, "roll happens while still hidden");
    }

    #[test]
    fn test_round_start_policy_keeps_anomaly() {
        let mut config = fast_config();
        config.presence.anomaly_roll = AnomalyRoll::RoundStart;
        config.presence.alert_dwell = DwellRange::fixed(10);
        let mut session = Session::new(config, SEED).unwrap();
        let anomaly = session.anomaly_camera();
        session.take_events();
        for _ in 0..50 {
            session.advance(&step(10));
        }
        assert_eq!(session.anomaly_camera(), anomaly);
        assert!(
            !session
                .take_events()
                .iter()
                .any(|e| matches!(e, SessionEvent::AnomalyRolled(_)))
        );
    }

    #[test]
    fn test_alerting_fires_alert_cue_that_clears_on_its_own() {
        let mut session = alerting_session(fast_config());
        assert!(session.is_cue_active(Cue::Alert));

        session.advance(&step(1_999));
        assert!(session.is_cue_active(Cue::Alert));
        session.advance(&step(1));
        assert!(!session.is_cue_active(Cue::Alert));
        assert_eq!(session.presence(), Presence::Alerting);
        assert!(
            session
                .take_events()
                .contains(&SessionEvent::CueStopped(Cue::Alert))
        );
    }

    #[test]
    fn test_roaming_position_stays_in_virtual_frame() {
        let mut config = fast_config();
        config.presence.velocity_reroll_chance = 0.1;
        let mut session = alerting_session(config);
        let bounds = session.roam_bounds();
        for _ in 0..5_000 {
            session.advance(&step(16));
            let [x, y] = session.presence_position().unwrap();
            assert!((0.0..=bounds[0]).contains(&x));
            assert!((0.0..=bounds[1]).contains(&y));
        }
    }

    #[test]
    fn test_chill_position_is_camera_anchor() {
        let mut session = Session::new(fast_config(), SEED).unwrap();
        session.advance(&step(10));
        assert_eq!(session.presence(), Presence::Chill);
        let anomaly = session.anomaly_camera();
        assert_eq!(
            session.presence_position(),
            session.cameras().anchor(anomaly)
        );

        session.set_chill_anchor(anomaly, None);
        assert_eq!(session.presence_position(), None);
    }

    // ------------------------------------------------------------------------
    // Reports
    // ------------------------------------------------------------------------

    #[test]
    fn test_report_ignored_unless_alerting() {
        let mut session = Session::new(fast_config(), SEED).unwrap();
        session.advance(&step(10));
        assert_eq!(session.presence(), Presence::Chill);
        session.take_events();
        let digest = session.state_digest();

        let label = session.anomaly_camera().label();
        assert_eq!(
            session.submit_report(&label),
            ReportResult::Ignored(ReportIgnored::NotAlerting)
        );
        assert_eq!(session.power(), MAX_POWER);
        assert_eq!(session.state_digest(), digest);
        assert!(session.take_events().is_empty());
    }

    #[test]
    fn test_correct_report_ends_in_success() {
        let mut session = alerting_session(fast_config());
        session.anomaly_camera = CameraId::from_number(3).unwrap();

        assert_eq!(session.submit_report("CAM3"), ReportResult::Correct);
        assert!(!session.is_active());
        assert_eq!(session.outcome(), Some(Outcome::Success));
        for cue in Cue::ALL {
            assert!(!session.is_cue_active(cue), "{} still playing", cue.as_str());
        }
        let events = session.take_events();
        assert!(events.contains(&SessionEvent::CueStopped(Cue::Ambient)));
        assert_eq!(events.last(), Some(&SessionEvent::Ended(Outcome::Success)));
    }

    #[test]
    fn test_report_is_trimmed_and_case_insensitive() {
        let mut session = alerting_session(fast_config());
        session.anomaly_camera = CameraId::from_number(2).unwrap();
        assert_eq!(session.submit_report("  Cam2\n"), ReportResult::Correct);
    }

    #[test]
    fn test_wrong_report_deducts_exact_penalty() {
        let mut session = alerting_session(fast_config());
        session.anomaly_camera = CameraId::from_number(3).unwrap();

        let result = session.submit_report("cam4");
        assert_eq!(
            result,
            ReportResult::Wrong {
                penalty: 15.0,
                jumpscare: false
            }
        );
        assert_eq!(session.power(), 85.0);
        assert!(session.is_active());
        assert!(session.can_report());
    }

    #[test]
    fn test_wrong_report_can_end_session() {
        let mut session = alerting_session(fast_config());
        session.anomaly_camera = CameraId::from_number(1).unwrap();
        session.power = 10.0;

        session.submit_report("cam5");
        assert_eq!(session.power(), 0.0);
        assert!(!session.is_active());
        assert_eq!(session.outcome(), Some(Outcome::Failure));
    }

    #[test]
    fn test_jumpscare_defers_power_out_failure() {
        let mut config = fast_config();
        config.penalty.jumpscare_chance = 1.0;
        let mut session = alerting_session(config);
        session.anomaly_camera = CameraId::from_number(1).unwrap();
        session.power = 10.0;

        let result = session.submit_report("cam2");
        assert_eq!(
            result,
            ReportResult::Wrong {
                penalty: 15.0,
                jumpscare: true
            }
        );
        assert_eq!(session.power(), 0.0);
        assert!(session.is_active(), "failure waits for the jumpscare");
        assert!(session.is_cue_active(Cue::Jumpscare));

        session.advance(&step(1_999));
        assert!(session.is_active());
        session.advance(&step(1));
        assert!(!session.is_active());
        assert_eq!(session.outcome(), Some(Outcome::Failure));
    }

    #[test]
    fn test_pending_power_out_blocks_input() {
        let mut config = fast_config();
        config.penalty.jumpscare_chance = 1.0;
        let mut session = alerting_session(config);
        session.anomaly_camera = CameraId::from_number(1).unwrap();
        session.power = 10.0;
        session.submit_report("cam2");
        assert!(session.failure_pending());
        session.take_events();

        let before = session.current_camera();
        assert!(!session.select_camera(CameraId::from_number(3).unwrap()));
        assert!(!session.cycle_camera(CameraStep::Next));
        assert_eq!(session.current_camera(), before);
        assert!(!session.is_cue_active(Cue::Static));

        assert!(!session.can_report());
        assert_eq!(
            session.submit_report("cam1"),
            ReportResult::Ignored(ReportIgnored::Inactive)
        );
        assert_eq!(session.outcome(), None);
        assert!(session.take_events().is_empty());

        session.advance(&step(2_000));
        assert_eq!(session.outcome(), Some(Outcome::Failure));
        assert!(!session.failure_pending());
    }

    #[test]
    fn test_jumpscare_without_deferral_fails_immediately() {
        let mut config = fast_config();
        config.penalty.jumpscare_chance = 1.0;
        config.penalty.defer_failure_to_jumpscare = false;
        let mut session = alerting_session(config);
        session.anomaly_camera = CameraId::from_number(1).unwrap();
        session.power = 10.0;

        session.submit_report("cam2");
        assert!(!session.is_active());
        assert!(!session.is_cue_active(Cue::Jumpscare));
    }

    #[test]
    fn test_jumpscare_with_power_left_is_cosmetic() {
        let mut config = fast_config();
        config.penalty.jumpscare_chance = 1.0;
        let mut session = alerting_session(config);
        session.anomaly_camera = CameraId::from_number(1).unwrap();

        session.submit_report("cam2");
        session.advance(&step(2_000));
        assert!(session.is_active());
        assert!(!session.is_cue_active(Cue::Jumpscare));
        assert_eq!(session.power(), 85.0);
    }

    // ------------------------------------------------------------------------
    // Cameras
    // ------------------------------------------------------------------------

    #[test]
    fn test_camera_switch_zeroes_offset_and_fires_static() {
        let mut session = Session::new(SessionConfig::default(), SEED).unwrap();
        session.advance(&StepInput {
            dt_ms: 100,
            pan: [1, -1],
        });
        assert_ne!(session.view_offset(), [0.0, 0.0]);
        session.take_events();

        let target = CameraId::from_number(4).unwrap();
        assert!(session.select_camera(target));
        assert_eq!(session.current_camera(), target);
        assert_eq!(session.view_offset(), [0.0, 0.0]);
        assert!(session.is_cue_active(Cue::Static));
        assert_eq!(
            session.take_events(),
            vec![
                SessionEvent::CameraSwitched(target),
                SessionEvent::CueStarted(Cue::Static)
            ]
        );

        session.advance(&step(300));
        assert!(!session.is_cue_active(Cue::Static));
    }

    #[test]
    fn test_camera_switch_rejects_unknown_slot_and_inactive() {
        let mut session = Session::new(SessionConfig::default(), SEED).unwrap();
        assert!(!session.select_camera(CameraId::from_index(5)));
        assert_eq!(session.current_camera(), CameraId::from_index(0));

        session.advance(&step(400_000));
        assert!(!session.is_active());
        assert!(!session.select_camera(CameraId::from_index(1)));
        assert_eq!(session.current_camera(), CameraId::from_index(0));
    }

    #[test]
    fn test_cycle_camera_wraps() {
        let mut session = Session::new(SessionConfig::default(), SEED).unwrap();
        assert!(session.cycle_camera(CameraStep::Prev));
        assert_eq!(session.current_camera(), CameraId::from_index(4));
        assert!(session.cycle_camera(CameraStep::Next));
        assert_eq!(session.current_camera(), CameraId::from_index(0));
    }

    #[test]
    fn test_camera_switch_cost() {
        let mut config = SessionConfig::default();
        config.power.camera_switch_cost = 2.0;
        let mut session = Session::new(config, SEED).unwrap();
        session.select_camera(CameraId::from_index(1));
        session.select_camera(CameraId::from_index(2));
        assert_eq!(session.power(), 96.0);
    }

    #[test]
    fn test_pan_clamped_for_any_held_sequence() {
        let mut session = Session::new(SessionConfig::default(), SEED).unwrap();
        let limit = session.config().view.pan_limit;
        let patterns: [[i8; 2]; 5] = [[1, 0], [1, 1], [-1, 1], [0, -1], [-1, -1]];
        for i in 0..3_000 {
            session.advance(&StepInput {
                dt_ms: 16 + (i % 7),
                pan: patterns[(i as usize / 40) % patterns.len()],
            });
            let [x, y] = session.view_offset();
            assert!(x.abs() <= limit && y.abs() <= limit);
        }
    }

    // ------------------------------------------------------------------------
    // Resets and nights
    // ------------------------------------------------------------------------

    #[test]
    fn test_restart_rebuilds_session() {
        let mut session = Session::new(SessionConfig::default(), SEED).unwrap();
        session.advance(&step(400_000));
        assert!(!session.is_active());
        let anchors: Vec<_> = session
            .cameras()
            .ids()
            .map(|c| session.cameras().anchor(c))
            .collect();
        session.take_events();

        session.restart();
        assert!(session.is_active());
        assert_eq!(session.power(), MAX_POWER);
        assert_eq!(session.elapsed_ms(), 0);
        assert_eq!(session.tick(), 0);
        assert_eq!(session.night(), 1);
        assert_eq!(session.presence(), Presence::Hidden);
        assert_eq!(session.outcome(), None);
        let after: Vec<_> = session
            .cameras()
            .ids()
            .map(|c| session.cameras().anchor(c))
            .collect();
        assert_eq!(anchors, after);

        let events = session.take_events();
        assert_eq!(events[0], SessionEvent::Restarted);
        assert!(events.contains(&SessionEvent::CueStarted(Cue::Ambient)));
    }

    #[test]
    fn test_restart_stops_playing_cues() {
        let mut session = alerting_session(fast_config());
        session.restart();
        let events = session.take_events();
        let stopped_alert = events
            .iter()
            .position(|e| *e == SessionEvent::CueStopped(Cue::Alert))
            .unwrap();
        let restarted = events
            .iter()
            .position(|e| *e == SessionEvent::Restarted)
            .unwrap();
        assert!(stopped_alert < restarted);
        assert!(!session.is_cue_active(Cue::Alert));
    }

    #[test]
    fn test_advance_night_after_success() {
        let mut session = alerting_session(fast_config());
        let label = session.anomaly_camera().label();
        assert_eq!(session.submit_report(&label), ReportResult::Correct);
        session.take_events();

        assert!(session.advance_night());
        assert_eq!(session.night(), 2);
        assert!(session.is_active());
        assert_eq!(session.power(), MAX_POWER);
        assert_eq!(session.presence(), Presence::Hidden);
        assert!(session.next_presence_deadline() > session.elapsed_ms());
        assert!(
            session
                .take_events()
                .contains(&SessionEvent::NightAdvanced { night: 2 })
        );
    }

    #[test]
    fn test_advance_night_refused_after_failure() {
        let mut session = Session::new(SessionConfig::default(), SEED).unwrap();
        session.advance(&step(400_000));
        assert!(!session.advance_night());
        assert_eq!(session.night(), 1);
        assert!(!session.is_active());
    }

    #[test]
    fn test_advance_night_refused_while_active() {
        let mut config = SessionConfig::default();
        config.presence.alert.min_elapsed_ms = u64::MAX;
        let mut session = Session::new(config, SEED).unwrap();
        session.advance(&step(150_000));
        assert!(session.is_active());
        assert_eq!(session.power(), 50.0);
        session.take_events();

        assert!(!session.advance_night());
        assert_eq!(session.night(), 1);
        assert_eq!(session.power(), 50.0);
        assert!(session.take_events().is_empty());
    }

    #[test]
    fn test_digest_covers_cue_deadlines() {
        let mut a = alerting_session(fast_config());
        let mut b = a.clone();
        assert_eq!(a.state_digest(), b.state_digest());

        let camera = a.current_camera();
        assert!(b.select_camera(camera));
        assert!(b.is_cue_active(Cue::Static));
        assert_ne!(a.state_digest(), b.state_digest());

        a.select_camera(camera);
        a.advance(&step(10));
        b.advance(&step(10));
        assert_eq!(a.state_digest(), b.state_digest());

        let mut late = a.clone();
        late.cues.start(Cue::Jumpscare, late.elapsed_ms, 2_000);
        a.cues.start(Cue::Jumpscare, a.elapsed_ms, 1_000);
        assert_ne!(a.state_digest(), late.state_digest());
    }

    #[test]
    fn test_surviving_the_night_advances() {
        let mut config = SessionConfig::default();
        config.power.night_duration_ms = Some(60_000);
        config.presence.alert.min_elapsed_ms = u64::MAX;
        let mut session = Session::new(config, SEED).unwrap();

        for _ in 0..599 {
            session.advance(&step(100));
        }
        assert_eq!(session.night(), 1);
        assert_eq!(session.power(), 85.0);

        session.advance(&step(100));
        assert_eq!(session.night(), 2);
        assert_eq!(session.power(), MAX_POWER);
        assert_eq!(session.next_drain_ms(), 75_000);
    }

    // ------------------------------------------------------------------------
    // Determinism
    // ------------------------------------------------------------------------

    #[test]
    fn test_same_seed_same_digest() {
        fn run() -> u64 {
            let mut config = SessionConfig::default();
            config.presence.alert.min_elapsed_ms = 0;
            let mut session = Session::new(config, 1234).unwrap();
            for i in 0..5_000u64 {
                session.advance(&StepInput {
                    dt_ms: 16,
                    pan: [(i % 3) as i8 - 1, 0],
                });
                if i % 500 == 0 {
                    session.cycle_camera(CameraStep::Next);
                }
                if i % 97 == 0 {
                    session.submit_report("cam1");
                }
            }
            session.state_digest()
        }
        assert_eq!(run(), run());
    }

    #[test]
    fn test_digest_changes_with_state() {
        let mut session = Session::new(SessionConfig::default(), SEED).unwrap();
        let before = session.state_digest();
        session.advance(&step(16));
        assert_ne!(before, session.state_digest());
    }

    #[test]
    fn test_snapshot_reflects_session() {
        let mut session = alerting_session(fast_config());
        session.select_camera(session.anomaly_camera());
        let snapshot = session.snapshot();
        assert_eq!(snapshot.presence, Presence::Alerting);
        assert!(snapshot.can_report);
        assert_eq!(snapshot.presence_camera, Some(session.anomaly_camera()));
        assert!(snapshot.presence_visible());
        assert_eq!(snapshot.power, session.power());
        assert_eq!(snapshot.night, 1);
        assert_eq!(snapshot.digest, session.state_digest());
        assert!(snapshot.cues.contains(&Cue::Static));
        assert_eq!(
            snapshot.camera_name,
            session.config().cameras[session.anomaly_camera().index()]
        );
    }

    #[test]
    fn test_apply_dispatches_commands() {
        let mut session = alerting_session(fast_config());
        session.anomaly_camera = CameraId::from_number(2).unwrap();

        assert!(session.apply(&Command::Cycle(CameraStep::Next)));
        assert_eq!(session.current_camera(), CameraId::from_index(1));
        assert!(!session.apply(&Command::SelectCamera(CameraId::from_index(200))));
        assert!(session.apply(&Command::Report("cam2".to_string())));
        assert_eq!(session.outcome(), Some(Outcome::Success));
        assert!(!session.apply(&Command::Report("cam2".to_string())));
        assert!(session.apply(&Command::AdvanceNight));
        assert_eq!(session.night(), 2);
        assert!(session.apply(&Command::Restart));
        assert_eq!(session.night(), 1);
    }

    #[test]
    fn test_normalize_report() {
        assert_eq!(normalize_report("  CAM3 \t"), "cam3");
        assert_eq!(normalize_report("cam 3"), "cam 3");
    }
}
