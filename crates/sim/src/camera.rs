//! Camera slots and the pannable viewport.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Zero-based camera slot. Players see and type the 1-based number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CameraId(u8);

impl CameraId {
    pub const fn from_index(index: u8) -> Self {
        Self(index)
    }

    /// Build from the 1-based number shown on screen (`CAM 3` -> index 2).
    pub fn from_number(number: u8) -> Option<Self> {
        number.checked_sub(1).map(Self)
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    pub fn number(self) -> u16 {
        u16::from(self.0) + 1
    }

    /// Canonical report label, e.g. `cam3`.
    pub fn label(self) -> String {
        format!("cam{}", self.number())
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CAM {}", self.number())
    }
}

/// Prev/next camera control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraStep {
    Prev,
    Next,
}

/// The fixed palette of camera slots plus each slot's Chill anchor.
///
/// Anchors are `None` until known; a camera without one has nothing to draw
/// while the presence is chilling there.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraBank {
    names: Vec<String>,
    anchors: Vec<Option<[f64; 2]>>,
}

impl CameraBank {
    pub fn new(names: Vec<String>) -> Self {
        let anchors = vec![None; names.len()];
        Self { names, anchors }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, camera: CameraId) -> bool {
        camera.index() < self.names.len()
    }

    pub fn name(&self, camera: CameraId) -> Option<&str> {
        self.names.get(camera.index()).map(String::as_str)
    }

    pub fn ids(&self) -> impl Iterator<Item = CameraId> + '_ {
        (0..self.names.len()).map(|i| CameraId::from_index(i as u8))
    }

    /// Neighbouring slot, wrapping at both ends.
    pub fn step(&self, from: CameraId, step: CameraStep) -> CameraId {
        let len = self.names.len();
        let index = from.index() % len;
        let next = match step {
            CameraStep::Next => (index + 1) % len,
            CameraStep::Prev => (index + len - 1) % len,
        };
        CameraId::from_index(next as u8)
    }

    pub fn anchor(&self, camera: CameraId) -> Option<[f64; 2]> {
        self.anchors.get(camera.index()).copied().flatten()
    }

    /// Store a Chill anchor. Non-finite coordinates are stored as "not ready".
    pub fn set_anchor(&mut self, camera: CameraId, anchor: Option<[f64; 2]>) -> bool {
        let Some(slot) = self.anchors.get_mut(camera.index()) else {
            return false;
        };
        *slot = anchor.filter(|a| a[0].is_finite() && a[1].is_finite());
        true
    }
}

/// Nudge a pan offset along the held axes.
///
/// `held` components are direction signs; the distance is `speed` units per
/// second scaled by `dt_ms`. Each axis is clamped to `[-limit, limit]`
/// independently.
pub fn nudge_offset(offset: [f64; 2], held: [i8; 2], speed: f64, dt_ms: u64, limit: f64) -> [f64; 2] {
    let step = speed * dt_ms as f64 / 1000.0;
    let mut next = offset;
    for axis in 0..2 {
        let dir = f64::from(held[axis].signum());
        if dir != 0.0 {
            next[axis] = (next[axis] + dir * step).clamp(-limit, limit);
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> CameraBank {
        CameraBank::new(
            ["LOBBY", "WEST HALL", "EAST HALL", "STORAGE", "BACKSTAGE"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    #[test]
    fn test_number_and_label() {
        let cam = CameraId::from_number(3).unwrap();
        assert_eq!(cam.index(), 2);
        assert_eq!(cam.number(), 3);
        assert_eq!(cam.label(), "cam3");
        assert_eq!(cam.to_string(), "CAM 3");
        assert_eq!(CameraId::from_number(0), None);
    }

    #[test]
    fn test_step_wraps() {
        let bank = bank();
        let first = CameraId::from_index(0);
        let last = CameraId::from_index(4);
        assert_eq!(bank.step(first, CameraStep::Prev), last);
        assert_eq!(bank.step(last, CameraStep::Next), first);
        assert_eq!(bank.step(first, CameraStep::Next), CameraId::from_index(1));
    }

    #[test]
    fn test_contains_and_name() {
        let bank = bank();
        assert!(bank.contains(CameraId::from_index(4)));
        assert!(!bank.contains(CameraId::from_index(5)));
        assert_eq!(bank.name(CameraId::from_index(3)), Some("STORAGE"));
        assert_eq!(bank.ids().count(), 5);
    }

    #[test]
    fn test_non_finite_anchor_is_not_ready() {
        let mut bank = bank();
        let cam = CameraId::from_index(1);
        assert!(bank.set_anchor(cam, Some([f64::NAN, 10.0])));
        assert_eq!(bank.anchor(cam), None);
        assert!(bank.set_anchor(cam, Some([300.0, 200.0])));
        assert_eq!(bank.anchor(cam), Some([300.0, 200.0]));
        assert!(!bank.set_anchor(CameraId::from_index(9), Some([0.0, 0.0])));
    }

    #[test]
    fn test_nudge_scales_with_elapsed_time() {
        let next = nudge_offset([0.0, 0.0], [1, 0], 240.0, 500, 80.0);
        assert_eq!(next, [80.0, 0.0]);
        let next = nudge_offset([0.0, 0.0], [-1, 1], 100.0, 100, 80.0);
        assert_eq!(next, [-10.0, 10.0]);
    }

    #[test]
    fn test_nudge_clamps_each_axis() {
        let mut offset = [0.0, 0.0];
        for _ in 0..1_000 {
            offset = nudge_offset(offset, [1, -1], 240.0, 16, 80.0);
            assert!(offset[0].abs() <= 80.0);
            assert!(offset[1].abs() <= 80.0);
        }
        assert_eq!(offset, [80.0, -80.0]);
    }

    #[test]
    fn test_nudge_ignores_released_axes() {
        let offset = nudge_offset([12.0, -7.0], [0, 0], 240.0, 1_000, 80.0);
        assert_eq!(offset, [12.0, -7.0]);
    }
}
