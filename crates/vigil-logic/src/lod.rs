//! Level-of-detail (LOD) cognition tiers for large guard populations.
//!
//! Running perception, decision trees, and animation for every guard in a
//! level is prohibitive. This module provides the pure ranking rules the
//! background scheduler applies each cycle: agents are sorted by distance to
//! the reference viewpoint, and only the closest few are allowed to think.
//!
//! # Tiers
//!
//! | Tier | Who | Sensing | Movement | Renders |
//! |------|-----|---------|----------|---------|
//! | `Normal` | Rank < intelligent budget, in range | full rate | 0.03 s | yes |
//! | `Basic` | Rank < thinking budget, in range | reduced | 0.05 s | yes |
//! | `Sleep` | Everyone else | off | off | only inside range |
//!
//! # Usage
//!
//! ```
//! use vigil_logic::config::SchedulerConfig;
//! use vigil_logic::lod::{plan, Observed, RenderDirective, ThinkDirective, Tier};
//!
//! let config = SchedulerConfig {
//!     thinking_budget: 3,
//!     intelligent_budget: 1,
//!     too_far_away_distance: 1000.0,
//!     ..SchedulerConfig::default()
//! };
//! let observed = Observed { tier: Tier::Sleep, rendering: false };
//! let directives = plan(0, 100.0, observed, &config);
//! assert_eq!(directives.think, Some(ThinkDirective::Enable(Tier::Normal)));
//! assert_eq!(directives.render, Some(RenderDirective::Enable));
//! ```

use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;

/// Cognition tier of an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    /// Dormant: no sensing, no decision tree, no movement ticks.
    #[default]
    Sleep,
    /// Reduced-rate sensing and movement.
    Basic,
    /// Full-rate sensing and movement.
    Normal,
}

impl Tier {
    /// Stable byte encoding, used for lock-free flag storage.
    pub fn as_u8(self) -> u8 {
        match self {
            Tier::Sleep => 0,
            Tier::Basic => 1,
            Tier::Normal => 2,
        }
    }

    /// Inverse of [`Tier::as_u8`]. Unknown bytes decode as `Sleep`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Tier::Basic,
            2 => Tier::Normal,
            _ => Tier::Sleep,
        }
    }

    /// Whether an agent at this tier runs its decision tree.
    pub fn is_thinking(self) -> bool {
        self != Tier::Sleep
    }

    pub fn name(self) -> &'static str {
        match self {
            Tier::Sleep => "Sleep",
            Tier::Basic => "Basic",
            Tier::Normal => "Normal",
        }
    }
}

/// Tick intervals (seconds) for the subsystems a tier throttles.
///
/// An interval of `0.0` means "every frame".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierIntervals {
    pub sensing: f32,
    pub movement: f32,
}

/// Per-tier tick intervals. `Sleep` has none: sensing and movement are off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    pub basic: TierIntervals,
    pub normal: TierIntervals,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            basic: TierIntervals {
                sensing: 0.5,
                movement: 0.05,
            },
            normal: TierIntervals {
                sensing: 0.1,
                movement: 0.03,
            },
        }
    }
}

impl TierConfig {
    /// Intervals for a tier, or `None` when the tier disables the subsystems.
    pub fn intervals_for(&self, tier: Tier) -> Option<&TierIntervals> {
        match tier {
            Tier::Sleep => None,
            Tier::Basic => Some(&self.basic),
            Tier::Normal => Some(&self.normal),
        }
    }
}

/// What the scheduler last observed about an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observed {
    pub tier: Tier,
    pub rendering: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThinkDirective {
    /// Wake (or re-tier) the agent at the given tier.
    Enable(Tier),
    /// Put the agent to sleep.
    Disable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderDirective {
    Enable,
    Disable,
}

/// Commands the scheduler should publish for one ranked agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Directives {
    pub think: Option<ThinkDirective>,
    pub render: Option<RenderDirective>,
}

/// Whether the agent at `rank` and `distance` falls inside the thinking set.
pub fn within_thinking_budget(rank: usize, distance: f32, config: &SchedulerConfig) -> bool {
    rank < config.thinking_budget && distance < config.too_far_away_distance
}

/// The tier an agent at `rank` and `distance` should converge to.
pub fn target_tier(rank: usize, distance: f32, config: &SchedulerConfig) -> Tier {
    if !within_thinking_budget(rank, distance, config) {
        return Tier::Sleep;
    }
    if rank < config.intelligent_budget {
        Tier::Normal
    } else {
        Tier::Basic
    }
}

/// Decide which commands to publish for one agent this cycle.
///
/// Agents beyond the thinking budget but still inside `too_far_away_distance`
/// keep rendering; they just don't think.
pub fn plan(rank: usize, distance: f32, observed: Observed, config: &SchedulerConfig) -> Directives {
    let mut directives = Directives::default();

    if within_thinking_budget(rank, distance, config) {
        let target = target_tier(rank, distance, config);
        if !observed.rendering {
            directives.render = Some(RenderDirective::Enable);
        }
        if observed.tier != target {
            directives.think = Some(ThinkDirective::Enable(target));
        }
        return directives;
    }

    if observed.tier != Tier::Sleep {
        directives.think = Some(ThinkDirective::Disable);
    }
    if distance > config.too_far_away_distance {
        if observed.rendering {
            directives.render = Some(RenderDirective::Disable);
        }
    } else if !observed.rendering {
        directives.render = Some(RenderDirective::Enable);
    }
    directives
}

/// Sort `(key, distance)` candidates by ascending distance.
///
/// Equal distances fall back to ascending key so a ranking pass is
/// reproducible. NaN distances sort last.
pub fn rank_by_distance<K: Ord>(candidates: &mut [(K, f32)]) {
    candidates.sort_by(|(ka, da), (kb, db)| {
        let by_distance = match (da.is_nan(), db.is_nan()) {
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            _ => da.total_cmp(db),
        };
        by_distance.then_with(|| ka.cmp(kb))
    });
}

/// Tier distribution across a population.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub normal: usize,
    pub basic: usize,
    pub sleep: usize,
}

impl TierCounts {
    pub fn from_tiers(tiers: impl IntoIterator<Item = Tier>) -> Self {
        let mut counts = Self::default();
        for tier in tiers {
            match tier {
                Tier::Normal => counts.normal += 1,
                Tier::Basic => counts.basic += 1,
                Tier::Sleep => counts.sleep += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.normal + self.basic + self.sleep
    }

    /// Agents holding a non-Sleep tier.
    pub fn thinking(&self) -> usize {
        self.normal + self.basic
    }

    /// Estimated relative cognition cost (normal = 1.0 per agent).
    ///
    /// Basic ≈ 0.35, sleep ≈ 0.01.
    pub fn estimated_cost(&self) -> f64 {
        self.normal as f64 + self.basic as f64 * 0.35 + self.sleep as f64 * 0.01
    }
}
