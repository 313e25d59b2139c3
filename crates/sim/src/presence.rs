//! Presence state machine for the antagonist.
//!
//! Hidden -> Chill -> (Alerting | Hidden), Alerting -> Hidden. Transitions are
//! evaluated only once session time reaches the armed deadline, and every
//! transition arms a fresh deadline from the new state's dwell window.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{DwellRange, PresenceConfig};

/// Where the antagonist is and whether a report is currently accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Presence {
    Hidden,
    Chill,
    /// Roaming and reportable ("freaking").
    Alerting,
}

impl Presence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hidden => "hidden",
            Self::Chill => "chill",
            Self::Alerting => "alerting",
        }
    }

    /// Stable numeric code used by digests and wire messages.
    pub fn code(&self) -> u8 {
        match self {
            Self::Hidden => 0,
            Self::Chill => 1,
            Self::Alerting => 2,
        }
    }
}

/// One presence transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Presence,
    pub to: Presence,
    pub at_ms: u64,
    pub deadline_ms: u64,
}

/// Presence state plus its deadline and roaming kinematics.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceMachine {
    state: Presence,
    deadline_ms: u64,
    position: [f64; 2],
    velocity: [f64; 2],
}

impl PresenceMachine {
    /// Start Hidden with a freshly armed dwell timer.
    pub fn new<R: Rng + ?Sized>(now_ms: u64, config: &PresenceConfig, rng: &mut R) -> Self {
        Self {
            state: Presence::Hidden,
            deadline_ms: now_ms + config.hidden_dwell.sample(rng),
            position: [0.0, 0.0],
            velocity: [0.0, 0.0],
        }
    }

    pub fn state(&self) -> Presence {
        self.state
    }

    pub fn deadline_ms(&self) -> u64 {
        self.deadline_ms
    }

    pub fn position(&self) -> [f64; 2] {
        self.position
    }

    pub fn velocity(&self) -> [f64; 2] {
        self.velocity
    }

    /// Which state the machine would move to at a due deadline.
    ///
    /// `should_alert` is only consulted when leaving Chill.
    pub fn next_state(&self, should_alert: impl FnOnce() -> bool) -> Presence {
        match self.state {
            Presence::Hidden => Presence::Chill,
            Presence::Chill => {
                if should_alert() {
                    Presence::Alerting
                } else {
                    Presence::Hidden
                }
            }
            Presence::Alerting => Presence::Hidden,
        }
    }

    /// Whether the armed deadline has passed at `now_ms`.
    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms >= self.deadline_ms
    }

    /// Enter `next` at `now_ms`, arming its dwell timer.
    ///
    /// Entering Alerting places the sprite uniformly inside `bounds` (the
    /// virtual frame minus the sprite footprint) with a random velocity.
    pub fn enter<R: Rng + ?Sized>(
        &mut self,
        next: Presence,
        now_ms: u64,
        config: &PresenceConfig,
        bounds: [f64; 2],
        rng: &mut R,
    ) -> Transition {
        let from = self.state;
        self.state = next;
        self.deadline_ms = now_ms + dwell_for(next, config).sample(rng);

        if next == Presence::Alerting {
            self.position = [
                rng.gen_range(0.0..=bounds[0]),
                rng.gen_range(0.0..=bounds[1]),
            ];
            self.velocity = random_velocity(config.max_speed, rng);
        } else {
            self.position = [0.0, 0.0];
            self.velocity = [0.0, 0.0];
        }

        Transition {
            from,
            to: next,
            at_ms: now_ms,
            deadline_ms: self.deadline_ms,
        }
    }

    /// Advance the roaming sprite by one tick. No-op unless Alerting.
    pub fn integrate<R: Rng + ?Sized>(&mut self, config: &PresenceConfig, bounds: [f64; 2], rng: &mut R) {
        if self.state != Presence::Alerting {
            return;
        }
        if rng.gen_bool(config.velocity_reroll_chance) {
            self.velocity = random_velocity(config.max_speed, rng);
        }
        let (position, velocity) = reflect_step(self.position, self.velocity, bounds);
        self.position = position;
        self.velocity = velocity;
    }
}

fn dwell_for(state: Presence, config: &PresenceConfig) -> DwellRange {
    match state {
        Presence::Hidden => config.hidden_dwell,
        Presence::Chill => config.chill_dwell,
        Presence::Alerting => config.alert_dwell,
    }
}

fn random_velocity<R: Rng + ?Sized>(max_speed: f64, rng: &mut R) -> [f64; 2] {
    [
        rng.gen_range(-max_speed..=max_speed),
        rng.gen_range(-max_speed..=max_speed),
    ]
}

/// Move one step and bounce off `[0, bounds]` on each axis.
///
/// A component that touches or crosses a wall is clamped to it and negated.
fn reflect_step(position: [f64; 2], velocity: [f64; 2], bounds: [f64; 2]) -> ([f64; 2], [f64; 2]) {
    let mut position = [position[0] + velocity[0], position[1] + velocity[1]];
    let mut velocity = velocity;
    for axis in 0..2 {
        let max = bounds[axis].max(0.0);
        if position[axis] <= 0.0 {
            position[axis] = 0.0;
            velocity[axis] = -velocity[axis];
        } else if position[axis] >= max {
            position[axis] = max;
            velocity[axis] = -velocity[axis];
        }
    }
    (position, velocity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlertRule;
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    const BOUNDS: [f64; 2] = [736.0, 512.0];

    fn config() -> PresenceConfig {
        PresenceConfig {
            hidden_dwell: DwellRange::new(15_000, 20_000),
            chill_dwell: DwellRange::new(15_000, 20_000),
            alert_dwell: DwellRange::new(5_000, 10_000),
            alert: AlertRule::default(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_starts_hidden_with_armed_deadline() {
        let mut rng = Pcg64Mcg::seed_from_u64(3);
        let machine = PresenceMachine::new(1_000, &config(), &mut rng);
        assert_eq!(machine.state(), Presence::Hidden);
        assert!((16_000..=21_000).contains(&machine.deadline_ms()));
        assert!(!machine.is_due(machine.deadline_ms() - 1));
        assert!(machine.is_due(machine.deadline_ms()));
    }

    #[test]
    fn test_next_state_table() {
        let mut rng = Pcg64Mcg::seed_from_u64(3);
        let cfg = config();
        let mut machine = PresenceMachine::new(0, &cfg, &mut rng);

        assert_eq!(machine.next_state(|| unreachable!()), Presence::Chill);

        machine.enter(Presence::Chill, 0, &cfg, BOUNDS, &mut rng);
        assert_eq!(machine.next_state(|| true), Presence::Alerting);
        assert_eq!(machine.next_state(|| false), Presence::Hidden);

        machine.enter(Presence::Alerting, 0, &cfg, BOUNDS, &mut rng);
        assert_eq!(machine.next_state(|| unreachable!()), Presence::Hidden);
    }

    #[test]
    fn test_enter_rearms_deadline_from_now() {
        let mut rng = Pcg64Mcg::seed_from_u64(11);
        let cfg = config();
        let mut machine = PresenceMachine::new(0, &cfg, &mut rng);

        let t = machine.enter(Presence::Alerting, 40_000, &cfg, BOUNDS, &mut rng);
        assert_eq!(t.from, Presence::Hidden);
        assert_eq!(t.to, Presence::Alerting);
        assert_eq!(t.at_ms, 40_000);
        assert!((45_000..=50_000).contains(&t.deadline_ms));
        assert_eq!(machine.deadline_ms(), t.deadline_ms);
    }

    #[test]
    fn test_alerting_spawns_inside_bounds_with_bounded_velocity() {
        let mut rng = Pcg64Mcg::seed_from_u64(5);
        let cfg = config();
        let mut machine = PresenceMachine::new(0, &cfg, &mut rng);
        for _ in 0..100 {
            machine.enter(Presence::Alerting, 0, &cfg, BOUNDS, &mut rng);
            let [x, y] = machine.position();
            let [vx, vy] = machine.velocity();
            assert!((0.0..=BOUNDS[0]).contains(&x));
            assert!((0.0..=BOUNDS[1]).contains(&y));
            assert!(vx.abs() <= 5.0 && vy.abs() <= 5.0);
        }
    }

    #[test]
    fn test_leaving_alerting_clears_kinematics() {
        let mut rng = Pcg64Mcg::seed_from_u64(5);
        let cfg = config();
        let mut machine = PresenceMachine::new(0, &cfg, &mut rng);
        machine.enter(Presence::Alerting, 0, &cfg, BOUNDS, &mut rng);
        machine.enter(Presence::Hidden, 10, &cfg, BOUNDS, &mut rng);
        assert_eq!(machine.position(), [0.0, 0.0]);
        assert_eq!(machine.velocity(), [0.0, 0.0]);
    }

    #[test]
    fn test_reflect_negates_on_contact() {
        let (pos, vel) = reflect_step([2.0, 100.0], [-5.0, 3.0], BOUNDS);
        assert_eq!(pos, [0.0, 103.0]);
        assert_eq!(vel, [5.0, 3.0]);

        let (pos, vel) = reflect_step([734.0, 510.0], [4.0, 4.0], BOUNDS);
        assert_eq!(pos, [736.0, 512.0]);
        assert_eq!(vel, [-4.0, -4.0]);
    }

    #[test]
    fn test_integrate_stays_in_bounds() {
        let mut rng = Pcg64Mcg::seed_from_u64(99);
        let cfg = PresenceConfig {
            velocity_reroll_chance: 0.05,
            ..config()
        };
        let mut machine = PresenceMachine::new(0, &cfg, &mut rng);
        machine.enter(Presence::Alerting, 0, &cfg, BOUNDS, &mut rng);
        for _ in 0..10_000 {
            machine.integrate(&cfg, BOUNDS, &mut rng);
            let [x, y] = machine.position();
            assert!((0.0..=BOUNDS[0]).contains(&x));
            assert!((0.0..=BOUNDS[1]).contains(&y));
        }
    }

    #[test]
    fn test_integrate_is_noop_when_not_alerting() {
        let mut rng = Pcg64Mcg::seed_from_u64(1);
        let cfg = config();
        let mut machine = PresenceMachine::new(0, &cfg, &mut rng);
        let before = machine.clone();
        machine.integrate(&cfg, BOUNDS, &mut rng);
        assert_eq!(machine, before);
    }

    #[test]
    fn test_presence_codes_distinct() {
        let codes = [Presence::Hidden, Presence::Chill, Presence::Alerting].map(|p| p.code());
        assert_eq!(codes, [0, 1, 2]);
    }
}
