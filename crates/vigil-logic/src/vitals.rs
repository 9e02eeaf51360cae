//! Guard vitals published to the decision tree each thinking frame.
//!
//! Health, fear and confidence are bounded scores owned by combat and morale
//! code elsewhere; this module only keeps them clamped. The terminal clock
//! tracks how long ago the guard left its terminal (destroy) behavior so the
//! decision tree can stay jumpy for a while afterwards.

use serde::{Deserialize, Serialize};

/// A score with inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounded {
    pub value: f32,
    pub min: f32,
    pub max: f32,
}

impl Bounded {
    pub fn new(value: f32, min: f32, max: f32) -> Self {
        Self {
            value: value.clamp(min, max),
            min,
            max,
        }
    }

    pub fn set(&mut self, value: f32) {
        self.value = value.clamp(self.min, self.max);
    }

    pub fn add(&mut self, amount: f32) {
        self.set(self.value + amount);
    }
}

/// Health, fear and confidence for one guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub health: Bounded,
    pub fear: Bounded,
    pub confidence: Bounded,
}

impl Default for Vitals {
    fn default() -> Self {
        Self {
            health: Bounded::new(100.0, 0.0, 100.0),
            // Authored as 100 but bounded to 10: guards start at max fear.
            fear: Bounded::new(100.0, 0.0, 10.0),
            confidence: Bounded::new(50.0, 0.0, 100.0),
        }
    }
}

impl Vitals {
    pub fn is_alive(&self) -> bool {
        self.health.value > self.health.min
    }
}

/// Seconds since the guard was last in its terminal behavior.
///
/// Negative means "not recently". [`TerminalClock::zero`] starts the clock;
/// it resets itself once `forget_after` seconds have elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerminalClock {
    elapsed: f32,
    forget_after: f32,
}

impl TerminalClock {
    pub const NEVER: f32 = -1.0;

    pub fn new(forget_after: f32) -> Self {
        Self {
            elapsed: Self::NEVER,
            forget_after,
        }
    }

    pub fn zero(&mut self) {
        self.elapsed = 0.0;
    }

    pub fn reset(&mut self) {
        self.elapsed = Self::NEVER;
    }

    pub fn is_running(&self) -> bool {
        self.elapsed >= 0.0
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Advance by `dt`. Returns `true` while the clock is running after the
    /// advance, i.e. when the value should be republished.
    pub fn advance(&mut self, dt: f32) -> bool {
        if !self.is_running() {
            return false;
        }
        self.elapsed += dt;
        if self.elapsed >= self.forget_after {
            self.reset();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fear_is_clamped() {
        let v = Vitals::default();
        assert_eq!(v.fear.value, 10.0);
        assert_eq!(v.health.value, 100.0);
        assert_eq!(v.confidence.value, 50.0);
        assert!(v.is_alive());
    }

    #[test]
    fn bounded_add_clamps() {
        let mut b = Bounded::new(5.0, 0.0, 10.0);
        b.add(20.0);
        assert_eq!(b.value, 10.0);
        b.add(-50.0);
        assert_eq!(b.value, 0.0);
    }

    #[test]
    fn dead_at_min_health() {
        let mut v = Vitals::default();
        v.health.set(0.0);
        assert!(!v.is_alive());
    }

    #[test]
    fn clock_idle_until_zeroed() {
        let mut clock = TerminalClock::new(45.0);
        assert!(!clock.advance(1.0));
        assert_eq!(clock.elapsed(), TerminalClock::NEVER);
        clock.zero();
        assert!(clock.advance(1.0));
        assert_eq!(clock.elapsed(), 1.0);
    }

    #[test]
    fn clock_forgets_after_window() {
        let mut clock = TerminalClock::new(45.0);
        clock.zero();
        for _ in 0..44 {
            clock.advance(1.0);
        }
        assert!(clock.is_running());
        clock.advance(1.0);
        assert!(!clock.is_running());
        assert_eq!(clock.elapsed(), TerminalClock::NEVER);
    }
}
