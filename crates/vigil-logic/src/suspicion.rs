//! Suspicion, a bounded per-agent alertness score.
//!
//! Suspicion rises while hostiles are in view (faster the closer they are),
//! rises briefly when a peer guard is sensed, and decays toward the minimum
//! when nothing is visible. Every mutation clamps to
//! `[min_suspicion, max_suspicion]`.
//!
//! # Distance bands
//!
//! | Band | Distance | Factor |
//! |------|----------|--------|
//! | Close | < 400 | 3.0 |
//! | Medium | < 800 | 1.5 |
//! | Far | otherwise | 1.0 |
//!
//! ```
//! use vigil_logic::suspicion::{Suspicion, SuspicionConfig};
//!
//! let config = SuspicionConfig { up_rate: 5.0, ..SuspicionConfig::default() };
//! let mut suspicion = Suspicion::new(0.0, &config);
//! suspicion.observe_hostile(200.0, 1.0, &config);
//! assert_eq!(suspicion.value(), 15.0);
//! ```

use serde::{Deserialize, Serialize};

/// Tuning for suspicion growth and decay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuspicionConfig {
    /// Growth per second while a hostile is in view (before distance factor).
    pub up_rate: f32,
    /// Decay per second while nothing hostile is in view.
    pub down_rate: f32,
    pub min_suspicion: f32,
    pub max_suspicion: f32,
    /// Distances below this use `close_factor`.
    pub close_band: f32,
    /// Distances below this (and not close) use `medium_factor`.
    pub medium_band: f32,
    pub close_factor: f32,
    pub medium_factor: f32,
    /// Fraction of `up_rate` added once when a peer guard is sensed.
    pub peer_sighting_scale: f32,
}

impl Default for SuspicionConfig {
    fn default() -> Self {
        Self {
            up_rate: 20.0,
            down_rate: 5.0,
            min_suspicion: 0.0,
            max_suspicion: 100.0,
            close_band: 400.0,
            medium_band: 800.0,
            close_factor: 3.0,
            medium_factor: 1.5,
            peer_sighting_scale: 0.06,
        }
    }
}

impl SuspicionConfig {
    /// Growth multiplier for a hostile at `distance`.
    pub fn distance_factor(&self, distance: f32) -> f32 {
        if distance < self.close_band {
            self.close_factor
        } else if distance < self.medium_band {
            self.medium_factor
        } else {
            1.0
        }
    }
}

/// Clamped suspicion score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Suspicion {
    value: f32,
}

impl Suspicion {
    /// Start at `value`, clamped into the configured bounds.
    pub fn new(value: f32, config: &SuspicionConfig) -> Self {
        let mut s = Self { value: 0.0 };
        s.set(value, config);
        s
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Overwrite the score, clamped.
    pub fn set(&mut self, value: f32, config: &SuspicionConfig) {
        self.value = clamp(value, config);
    }

    /// Add `amount` (may be negative), clamped.
    pub fn add(&mut self, amount: f32, config: &SuspicionConfig) {
        self.set(self.value + amount, config);
    }

    /// Raise to at least `floor`. Never lowers the score.
    pub fn raise_to(&mut self, floor: f32, config: &SuspicionConfig) {
        if self.value < floor {
            self.set(floor, config);
        }
    }

    /// One frame of growth from a visible hostile at `distance`.
    pub fn observe_hostile(&mut self, distance: f32, dt: f32, config: &SuspicionConfig) {
        let factor = config.distance_factor(distance);
        self.add(config.up_rate * factor * dt, config);
    }

    /// One frame of growth from a peer guard held in the known set.
    pub fn observe_peer(&mut self, dt: f32, config: &SuspicionConfig) {
        self.add(config.up_rate * dt, config);
    }

    /// One-off bump when a peer guard is sensed.
    pub fn peer_sighted(&mut self, config: &SuspicionConfig) {
        self.add(config.up_rate * config.peer_sighting_scale, config);
    }

    /// One frame of decay with nothing hostile in view.
    pub fn decay(&mut self, dt: f32, config: &SuspicionConfig) {
        self.add(-config.down_rate * dt, config);
    }

    pub fn is_at_max(&self, config: &SuspicionConfig) -> bool {
        self.value >= config.max_suspicion
    }
}

fn clamp(value: f32, config: &SuspicionConfig) -> f32 {
    if value.is_nan() {
        return config.min_suspicion;
    }
    value.clamp(config.min_suspicion, config.max_suspicion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn distance_bands() {
        let c = SuspicionConfig::default();
        assert_eq!(c.distance_factor(0.0), 3.0);
        assert_eq!(c.distance_factor(399.9), 3.0);
        assert_eq!(c.distance_factor(400.0), 1.5);
        assert_eq!(c.distance_factor(799.0), 1.5);
        assert_eq!(c.distance_factor(800.0), 1.0);
        assert_eq!(c.distance_factor(5000.0), 1.0);
    }

    #[test]
    fn decay_clamps_at_minimum() {
        let c = SuspicionConfig {
            down_rate: 10.0,
            ..SuspicionConfig::default()
        };
        let mut s = Suspicion::new(100.0, &c);
        // 10 seconds in half-second frames
        for _ in 0..20 {
            s.decay(0.5, &c);
        }
        assert_eq!(s.value(), 0.0);
        s.decay(1.0, &c);
        assert_eq!(s.value(), 0.0);
    }

    #[test]
    fn close_hostile_grows_three_times_faster() {
        let c = SuspicionConfig {
            up_rate: 5.0,
            ..SuspicionConfig::default()
        };
        let mut s = Suspicion::new(10.0, &c);
        s.observe_hostile(200.0, 1.0, &c);
        assert!((s.value() - 25.0).abs() < 1e-4);
    }

    #[test]
    fn growth_clamps_at_maximum() {
        let c = SuspicionConfig {
            up_rate: 5.0,
            ..SuspicionConfig::default()
        };
        let mut s = Suspicion::new(95.0, &c);
        s.observe_hostile(200.0, 1.0, &c);
        assert_eq!(s.value(), 100.0);
        assert!(s.is_at_max(&c));
    }

    #[test]
    fn peer_sighting_is_a_small_bump() {
        let c = SuspicionConfig::default();
        let mut s = Suspicion::new(0.0, &c);
        s.peer_sighted(&c);
        assert!((s.value() - 20.0 * 0.06).abs() < 1e-5);
    }

    #[test]
    fn raise_to_never_lowers() {
        let c = SuspicionConfig::default();
        let mut s = Suspicion::new(90.0, &c);
        s.raise_to(80.0, &c);
        assert_eq!(s.value(), 90.0);
        let mut t = Suspicion::new(10.0, &c);
        t.raise_to(80.0, &c);
        assert_eq!(t.value(), 80.0);
    }

    #[test]
    fn nan_input_falls_to_minimum() {
        let c = SuspicionConfig::default();
        let s = Suspicion::new(f32::NAN, &c);
        assert_eq!(s.value(), 0.0);
    }

    #[derive(Debug, Clone)]
    enum Step {
        Hostile(f32, f32),
        Peer(f32),
        Sighted,
        Decay(f32),
        Add(f32),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0.0f32..3000.0, 0.0f32..2.0).prop_map(|(d, dt)| Step::Hostile(d, dt)),
            (0.0f32..2.0).prop_map(Step::Peer),
            Just(Step::Sighted),
            (0.0f32..5.0).prop_map(Step::Decay),
            (-500.0f32..500.0).prop_map(Step::Add),
        ]
    }

    proptest! {
        #[test]
        fn suspicion_stays_within_bounds(
            start in -200.0f32..300.0,
            up in 0.0f32..100.0,
            down in 0.0f32..100.0,
            steps in prop::collection::vec(step(), 0..64),
        ) {
            let c = SuspicionConfig { up_rate: up, down_rate: down, ..SuspicionConfig::default() };
            let mut s = Suspicion::new(start, &c);
            for step in steps {
                match step {
                    Step::Hostile(d, dt) => s.observe_hostile(d, dt, &c),
                    Step::Peer(dt) => s.observe_peer(dt, &c),
                    Step::Sighted => s.peer_sighted(&c),
                    Step::Decay(dt) => s.decay(dt, &c),
                    Step::Add(a) => s.add(a, &c),
                }
                prop_assert!(s.value() >= c.min_suspicion);
                prop_assert!(s.value() <= c.max_suspicion);
            }
        }
    }
}
