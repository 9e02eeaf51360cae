//! Construction-time configuration for the scheduler and perception engine.
//!
//! Everything here is fixed once a simulation is built; there is no live
//! reload. Defaults match the shipped level tuning. A config can be loaded
//! from JSON; missing fields fall back to their defaults.
//!
//! ```
//! use vigil_logic::config::VigilConfig;
//!
//! let config = VigilConfig::from_json(r#"{ "scheduler": { "thinking_budget": 4 } }"#).unwrap();
//! assert_eq!(config.scheduler.thinking_budget, 4);
//! assert_eq!(config.scheduler.intelligent_budget, 3);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lod::TierConfig;
use crate::suspicion::SuspicionConfig;

/// Ranking budgets for the background scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How many of the closest agents may think at all.
    pub thinking_budget: usize,
    /// How many of the closest agents think at full rate (`Normal`).
    pub intelligent_budget: usize,
    /// Beyond this distance agents neither think nor render.
    pub too_far_away_distance: f32,
    /// Minimum wall time between ranking cycles. Zero lets the loop free-run
    /// and only yield between cycles.
    pub min_cycle_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            thinking_budget: 10,
            intelligent_budget: 3,
            too_far_away_distance: 5000.0,
            min_cycle_interval_ms: 0,
        }
    }
}

/// Per-frame drain budgets for the command queues.
///
/// Enable budgets are gated by a per-frame coin flip (all or nothing);
/// disable budgets always apply in full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainBudgets {
    pub think_enable_per_tick: usize,
    pub think_disable_per_tick: usize,
    pub render_enable_per_tick: usize,
    pub render_disable_per_tick: usize,
}

impl Default for DrainBudgets {
    fn default() -> Self {
        Self {
            think_enable_per_tick: 2,
            think_disable_per_tick: 4,
            render_enable_per_tick: 2,
            render_disable_per_tick: 4,
        }
    }
}

/// Sensing and hostile-tracking tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Hostiles entering vision beyond this planar distance are forgotten
    /// immediately.
    pub real_sight_radius: f32,
    /// Seconds of hostile velocity the lost-sight probe sweeps ahead.
    pub probe_seconds: f32,
    /// Probe capsule is this much thinner than the hostile's capsule.
    pub probe_radius_inset: f32,
    /// Probe capsule is this much shorter (half height) than the hostile's.
    pub probe_half_height_inset: f32,
    /// Suspicion floor applied when a patrolling guard is told to respond.
    pub respond_suspicion: f32,
    /// Radius within which a guard can alert its peers.
    pub notify_radius: f32,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            real_sight_radius: 1500.0,
            probe_seconds: 1.0,
            probe_radius_inset: 1.0,
            probe_half_height_inset: 5.0,
            respond_suspicion: 80.0,
            notify_radius: 1000.0,
        }
    }
}

/// Death and deferred-destruction timings (seconds unless noted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Interval between ragdoll settle checks.
    pub ragdoll_check_interval: f32,
    /// A ragdoll slower than this (units/s) counts as settled.
    pub ragdoll_settle_speed: f32,
    /// Delay between a destroy request being drained and the despawn.
    pub destroy_delay: f32,
    /// How long the terminal-state clock runs before resetting.
    pub time_to_forget_terminal: f32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            ragdoll_check_interval: 2.0,
            ragdoll_settle_speed: 50.0,
            destroy_delay: 10.0,
            time_to_forget_terminal: 45.0,
        }
    }
}

/// Complete configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    pub scheduler: SchedulerConfig,
    pub drain: DrainBudgets,
    pub perception: PerceptionConfig,
    pub suspicion: SuspicionConfig,
    pub tiers: TierConfig,
    pub lifecycle: LifecycleConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("intelligent budget {intelligent} exceeds thinking budget {thinking}")]
    IntelligentExceedsThinking { intelligent: usize, thinking: usize },
    #[error("suspicion bounds inverted: min {min} > max {max}")]
    SuspicionBounds { min: f32, max: f32 },
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f32 },
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f32 },
    #[error("distance bands out of order: close {close} >= medium {medium}")]
    BandsOutOfOrder { close: f32, medium: f32 },
}

impl VigilConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scheduler;
        if s.intelligent_budget > s.thinking_budget {
            return Err(ConfigError::IntelligentExceedsThinking {
                intelligent: s.intelligent_budget,
                thinking: s.thinking_budget,
            });
        }
        positive("scheduler.too_far_away_distance", s.too_far_away_distance)?;
        positive("perception.real_sight_radius", self.perception.real_sight_radius)?;
        non_negative("perception.probe_seconds", self.perception.probe_seconds)?;
        positive("perception.notify_radius", self.perception.notify_radius)?;

        let q = &self.suspicion;
        if q.min_suspicion.is_nan() || q.max_suspicion.is_nan() || q.min_suspicion > q.max_suspicion {
            return Err(ConfigError::SuspicionBounds {
                min: q.min_suspicion,
                max: q.max_suspicion,
            });
        }
        non_negative("suspicion.up_rate", q.up_rate)?;
        non_negative("suspicion.down_rate", q.down_rate)?;
        if q.close_band >= q.medium_band {
            return Err(ConfigError::BandsOutOfOrder {
                close: q.close_band,
                medium: q.medium_band,
            });
        }

        for (field, value) in [
            ("tiers.basic.sensing", self.tiers.basic.sensing),
            ("tiers.basic.movement", self.tiers.basic.movement),
            ("tiers.normal.sensing", self.tiers.normal.sensing),
            ("tiers.normal.movement", self.tiers.normal.movement),
        ] {
            non_negative(field, value)?;
        }

        let l = &self.lifecycle;
        positive("lifecycle.ragdoll_check_interval", l.ragdoll_check_interval)?;
        non_negative("lifecycle.destroy_delay", l.destroy_delay)?;
        positive("lifecycle.time_to_forget_terminal", l.time_to_forget_terminal)?;
        Ok(())
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}
