//! Monotonic timestamps to per-tick millisecond steps.

use std::time::Duration;

/// Turns host timestamps into the `dt_ms` fed to the session.
///
/// Sub-millisecond remainders carry over to the next tick so a fractional
/// tick period does not drift. Steps longer than `max_dt_ms` (a suspended
/// process, a debugger pause) are clamped and their remainder dropped.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Option<Duration>,
    carry: Duration,
    max_dt_ms: u64,
}

impl FrameClock {
    pub fn new(max_dt_ms: u64) -> Self {
        Self {
            last: None,
            carry: Duration::ZERO,
            max_dt_ms,
        }
    }

    /// Milliseconds since the previous call. The first call returns 0.
    pub fn advance(&mut self, now: Duration) -> u64 {
        let Some(last) = self.last.replace(now) else {
            return 0;
        };

        let elapsed = now.saturating_sub(last) + self.carry;
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        if ms > self.max_dt_ms {
            self.carry = Duration::ZERO;
            return self.max_dt_ms;
        }
        self.carry = elapsed - Duration::from_millis(ms);
        ms
    }

    /// Forget the previous timestamp; the next call returns 0.
    pub fn reset(&mut self) {
        self.last = None;
        self.carry = Duration::ZERO;
    }
}
