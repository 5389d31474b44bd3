//! Single-slot retransmission timer

use std::time::{Duration, Instant};

/// A single-shot alarm with one slot: arming replaces any pending deadline
pub trait Timer {
    /// Arm the alarm to fire once after `delay`
    fn arm(&mut self, delay: Duration);

    /// Cancel the pending alarm, if any
    fn cancel(&mut self);
}

/// [`Timer`] driven by an externally supplied clock
///
/// The owner advances the clock with the current time and polls
/// [`TimerSlot::fire`]; nothing here reads the system clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSlot {
    now: Instant,
    deadline: Option<Instant>,
}

impl TimerSlot {
    /// Create an unarmed slot whose clock reads `now`
    pub fn new(now: Instant) -> Self {
        Self {
            now,
            deadline: None,
        }
    }

    /// Move the clock forward; earlier instants are ignored
    pub fn advance(&mut self, now: Instant) {
        if now > self.now {
            self.now = now;
        }
    }

    /// Advance to `now` and report whether the alarm went off. Fires once per arm.
    pub fn fire(&mut self, now: Instant) -> bool {
        self.advance(now);
        match self.deadline {
            Some(deadline) if deadline <= self.now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Pending deadline
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True while armed
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
}

impl Timer for TimerSlot {
    /// A delay past the end of the clock leaves the slot unarmed
    fn arm(&mut self, delay: Duration) {
        self.deadline = self.now.checked_add(delay);
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once() {
        let start = Instant::now();
        let mut slot = TimerSlot::new(start);
        slot.arm(Duration::from_millis(100));

        assert!(!slot.fire(start + Duration::from_millis(99)));
        assert!(slot.fire(start + Duration::from_millis(100)));
        assert!(!slot.fire(start + Duration::from_millis(500)));
    }

    #[test]
    fn test_rearm_replaces_deadline() {
        let start = Instant::now();
        let mut slot = TimerSlot::new(start);
        slot.arm(Duration::from_millis(100));
        slot.arm(Duration::from_millis(300));

        assert!(!slot.fire(start + Duration::from_millis(200)));
        assert!(slot.fire(start + Duration::from_millis(300)));
    }

    #[test]
    fn test_cancel() {
        let start = Instant::now();
        let mut slot = TimerSlot::new(start);
        slot.arm(Duration::from_millis(10));
        slot.cancel();

        assert!(!slot.is_armed());
        assert!(!slot.fire(start + Duration::from_secs(1)));
    }

    #[test]
    fn test_unrepresentable_delay_does_not_panic() {
        let start = Instant::now();
        let mut slot = TimerSlot::new(start);
        slot.arm(Duration::MAX);

        assert!(!slot.is_armed());
        assert!(!slot.fire(start + Duration::from_secs(3600)));
    }

    #[test]
    fn test_clock_never_goes_back() {
        let start = Instant::now();
        let mut slot = TimerSlot::new(start + Duration::from_secs(1));
        slot.advance(start);
        slot.arm(Duration::from_millis(10));

        assert_eq!(
            slot.deadline(),
            Some(start + Duration::from_secs(1) + Duration::from_millis(10))
        );
    }
}
