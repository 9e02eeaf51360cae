//! Guard identity, the shared handle read by the scheduler thread, and the
//! per-tier controller state.

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use hecs::Entity;
use serde::{Deserialize, Serialize};
use vigil_logic::lod::{Observed, Tier, TierConfig};

use super::Vec3;

/// Stable identity of a registered guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

struct AgentCell {
    id: AgentId,
    entity: Entity,
    location: [AtomicU32; 3],
    tier: AtomicU8,
    rendering: AtomicBool,
    dead: AtomicBool,
    valid: AtomicBool,
}

/// Shared view of one guard.
///
/// The scheduler thread holds clones in its pool and only reads. The frame
/// loop owns every write: location is mirrored from [`super::Position`] each
/// frame, tier and rendering flags change only when the tick applier drains
/// a command, and `dead`/`valid` flip on death and despawn.
#[derive(Clone)]
pub struct AgentHandle(Arc<AgentCell>);

impl AgentHandle {
    pub fn new(id: AgentId, entity: Entity, location: Vec3) -> Self {
        let handle = Self(Arc::new(AgentCell {
            id,
            entity,
            location: [AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0)],
            tier: AtomicU8::new(Tier::Sleep.as_u8()),
            rendering: AtomicBool::new(true),
            dead: AtomicBool::new(false),
            valid: AtomicBool::new(true),
        }));
        handle.store_location(location);
        handle
    }

    pub fn id(&self) -> AgentId {
        self.0.id
    }

    pub fn entity(&self) -> Entity {
        self.0.entity
    }

    /// Last mirrored location. Components may be from different frames.
    pub fn location(&self) -> Vec3 {
        let [x, y, z] = &self.0.location;
        Vec3::new(
            f32::from_bits(x.load(Ordering::Relaxed)),
            f32::from_bits(y.load(Ordering::Relaxed)),
            f32::from_bits(z.load(Ordering::Relaxed)),
        )
    }

    pub(crate) fn store_location(&self, location: Vec3) {
        let [x, y, z] = &self.0.location;
        x.store(location.x.to_bits(), Ordering::Relaxed);
        y.store(location.y.to_bits(), Ordering::Relaxed);
        z.store(location.z.to_bits(), Ordering::Relaxed);
    }

    pub fn tier(&self) -> Tier {
        Tier::from_u8(self.0.tier.load(Ordering::Acquire))
    }

    pub fn is_thinking(&self) -> bool {
        self.tier().is_thinking()
    }

    pub fn is_rendering(&self) -> bool {
        self.0.rendering.load(Ordering::Acquire)
    }

    pub fn is_dead(&self) -> bool {
        self.0.dead.load(Ordering::Acquire)
    }

    /// False once the guard's entity has been despawned.
    pub fn is_valid(&self) -> bool {
        self.0.valid.load(Ordering::Acquire)
    }

    /// Tier and rendering as the scheduler sees them this cycle.
    pub fn observed(&self) -> Observed {
        Observed {
            tier: self.tier(),
            rendering: self.is_rendering(),
        }
    }

    pub(crate) fn apply_tier(&self, tier: Tier) {
        self.0.tier.store(tier.as_u8(), Ordering::Release);
    }

    pub(crate) fn apply_rendering(&self, rendering: bool) {
        self.0.rendering.store(rendering, Ordering::Release);
    }

    /// Dead guards stop thinking at once; the scheduler only routes them to
    /// destruction after this.
    pub(crate) fn retire(&self) {
        self.apply_tier(Tier::Sleep);
        self.0.dead.store(true, Ordering::Release);
    }

    pub(crate) fn invalidate(&self) {
        self.0.valid.store(false, Ordering::Release);
    }
}

impl PartialEq for AgentHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for AgentHandle {}

impl Hash for AgentHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl PartialOrd for AgentHandle {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for AgentHandle {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.id().cmp(&other.id())
    }
}

impl fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentHandle")
            .field("id", &self.id())
            .field("tier", &self.tier())
            .field("rendering", &self.is_rendering())
            .field("dead", &self.is_dead())
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// Fixed-interval gate for a throttled subsystem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cadence {
    interval: f32,
    elapsed: f32,
}

impl Cadence {
    /// A cadence that fires on its first tick.
    pub fn new(interval: f32) -> Self {
        Self {
            interval,
            elapsed: interval,
        }
    }

    pub fn interval(&self) -> f32 {
        self.interval
    }

    /// Advance by `dt`. When due, returns the time accumulated since the
    /// last firing and restarts.
    pub fn tick(&mut self, dt: f32) -> Option<f32> {
        self.elapsed += dt;
        if self.elapsed + f32::EPSILON >= self.interval {
            let elapsed = self.elapsed;
            self.elapsed = 0.0;
            Some(elapsed)
        } else {
            None
        }
    }
}

/// Frame-side cognition state of a guard.
///
/// Mirrors the tier the tick applier last applied and owns the sensing and
/// movement cadences that tier selects. Sleep disables both.
#[derive(Debug, Clone, PartialEq)]
pub struct Controller {
    status: Tier,
    sensing: Option<Cadence>,
    movement: Option<Cadence>,
    notifier_enabled: bool,
}

impl Default for Controller {
    fn default() -> Self {
        Self {
            status: Tier::Sleep,
            sensing: None,
            movement: None,
            notifier_enabled: false,
        }
    }
}

impl Controller {
    pub fn status(&self) -> Tier {
        self.status
    }

    /// Run the entry actions for `tier`.
    pub fn enter(&mut self, tier: Tier, tiers: &TierConfig) {
        self.status = tier;
        let intervals = tiers.intervals_for(tier);
        self.sensing = intervals.map(|i| Cadence::new(i.sensing));
        self.movement = intervals.map(|i| Cadence::new(i.movement));
        // Only full-rate guards can alert their peers.
        self.notifier_enabled = tier == Tier::Normal;
    }

    pub fn sensing_interval(&self) -> Option<f32> {
        self.sensing.map(|c| c.interval())
    }

    pub fn movement_interval(&self) -> Option<f32> {
        self.movement.map(|c| c.interval())
    }

    pub fn notifier_enabled(&self) -> bool {
        self.notifier_enabled
    }

    pub fn sensing_due(&mut self, dt: f32) -> bool {
        self.sensing.as_mut().and_then(|c| c.tick(dt)).is_some()
    }

    /// Seconds of movement to integrate this frame, if movement ticks now.
    pub fn movement_due(&mut self, dt: f32) -> Option<f32> {
        self.movement.as_mut().and_then(|c| c.tick(dt))
    }
}

/// Presentation side of rendering: animation and collision follow the
/// rendering flag, ragdoll state follows death.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presentation {
    pub animating: bool,
    pub collidable: bool,
    pub ragdoll: bool,
    pub settled: bool,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            animating: true,
            collidable: true,
            ragdoll: false,
            settled: false,
        }
    }
}

impl Presentation {
    pub fn set_rendering(&mut self, rendering: bool) {
        self.animating = rendering && !self.ragdoll;
        self.collidable = rendering;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> AgentHandle {
        let mut world = hecs::World::new();
        let entity = world.spawn(());
        AgentHandle::new(AgentId(1), entity, Vec3::new(1.0, 2.0, 3.0))
    }

    #[test]
    fn handle_starts_asleep_and_rendering() {
        let h = handle();
        assert_eq!(h.tier(), Tier::Sleep);
        assert!(!h.is_thinking());
        assert!(h.is_rendering());
        assert!(h.is_valid());
        assert!(!h.is_dead());
        assert_eq!(h.location(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn clones_share_flags() {
        let h = handle();
        let seen_by_scheduler = h.clone();
        h.apply_tier(Tier::Basic);
        h.apply_rendering(false);
        h.store_location(Vec3::new(9.0, 0.0, 0.0));
        assert_eq!(seen_by_scheduler.tier(), Tier::Basic);
        assert!(!seen_by_scheduler.is_rendering());
        assert_eq!(seen_by_scheduler.location().x, 9.0);
    }

    #[test]
    fn retire_sleeps_and_marks_dead() {
        let h = handle();
        h.apply_tier(Tier::Normal);
        h.retire();
        assert!(h.is_dead());
        assert_eq!(h.tier(), Tier::Sleep);
    }

    #[test]
    fn cadence_fires_immediately_then_on_interval() {
        let mut cadence = Cadence::new(0.5);
        let first = cadence.tick(0.1).unwrap();
        assert!((first - 0.6).abs() < 1e-5);
        assert_eq!(cadence.tick(0.25), None);
        assert!(cadence.tick(0.25).is_some());
    }

    #[test]
    fn zero_interval_fires_every_tick() {
        let mut cadence = Cadence::new(0.0);
        for _ in 0..5 {
            assert!(cadence.tick(0.016).is_some());
        }
    }

    #[test]
    fn controller_entry_actions_follow_tier() {
        let tiers = TierConfig::default();
        let mut controller = Controller::default();
        assert!(!controller.sensing_due(1.0));

        controller.enter(Tier::Basic, &tiers);
        assert_eq!(controller.movement_interval(), Some(0.05));
        assert!(!controller.notifier_enabled());

        controller.enter(Tier::Normal, &tiers);
        assert_eq!(controller.movement_interval(), Some(0.03));
        assert!(controller.notifier_enabled());

        controller.enter(Tier::Sleep, &tiers);
        assert_eq!(controller.sensing_interval(), None);
        assert_eq!(controller.movement_due(1.0), None);
        assert!(!controller.notifier_enabled());
    }

    #[test]
    fn hidden_ragdoll_does_not_animate() {
        let mut p = Presentation::default();
        p.set_rendering(false);
        assert!(!p.animating && !p.collidable);
        p.ragdoll = true;
        p.set_rendering(true);
        assert!(!p.animating);
        assert!(p.collidable);
    }
}
