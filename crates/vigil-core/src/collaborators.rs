//! Seams to the host engine.
//!
//! Physics queries, the player viewpoint, the decision tree, and the spawn
//! manager all live outside Vigil. Each is reached through a small trait or a
//! shared mailbox so the core can be driven headlessly.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use hecs::Entity;
use vigil_logic::behavior::{BehaviorMode, SearchMode};
use vigil_logic::lod::Tier;

use crate::components::{AgentId, Capsule, Vec3};

/// Swept-shape queries against level geometry.
pub trait SpatialProbe {
    /// Sweep `capsule` from `from` to `to`, ignoring `ignore`. Returns the
    /// first blocking hit location.
    fn sweep_capsule(&self, from: Vec3, to: Vec3, capsule: Capsule, ignore: Entity) -> Option<Vec3>;
}

/// A level with nothing to hit.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSpace;

impl SpatialProbe for OpenSpace {
    fn sweep_capsule(&self, _from: Vec3, _to: Vec3, _capsule: Capsule, _ignore: Entity) -> Option<Vec3> {
        None
    }
}

/// Where the scheduler measures distances from. Read on the scheduler
/// thread.
pub trait ViewpointProvider: Send + Sync {
    fn location(&self) -> Vec3;
}

/// A viewpoint the frame loop updates and the scheduler reads without
/// locking.
#[derive(Debug, Default)]
pub struct SharedViewpoint {
    bits: [AtomicU32; 3],
}

impl SharedViewpoint {
    pub fn new(location: Vec3) -> Self {
        let viewpoint = Self::default();
        viewpoint.set(location);
        viewpoint
    }

    pub fn set(&self, location: Vec3) {
        self.bits[0].store(location.x.to_bits(), Ordering::Relaxed);
        self.bits[1].store(location.y.to_bits(), Ordering::Relaxed);
        self.bits[2].store(location.z.to_bits(), Ordering::Relaxed);
    }
}

impl ViewpointProvider for SharedViewpoint {
    fn location(&self) -> Vec3 {
        Vec3::new(
            f32::from_bits(self.bits[0].load(Ordering::Relaxed)),
            f32::from_bits(self.bits[1].load(Ordering::Relaxed)),
            f32::from_bits(self.bits[2].load(Ordering::Relaxed)),
        )
    }
}

/// The behavior layer that consumes tiers, targets, and mode requests.
///
/// Every method has a no-op default so hosts only implement what they use.
pub trait DecisionTree {
    /// The guard's tier changed; the tree should pause or resume.
    fn tier_changed(&mut self, _agent: AgentId, _tier: Tier) {}

    fn mode(&self, _agent: AgentId) -> BehaviorMode {
        BehaviorMode::Patrol
    }

    fn switch_mode(&mut self, _agent: AgentId, _mode: BehaviorMode) {}

    fn set_search_mode(&mut self, _agent: AgentId, _mode: SearchMode) {}

    fn target_changed(&mut self, _agent: AgentId, _hostile: Option<Entity>) {}
}

#[derive(Debug, Clone, Default)]
pub struct DecisionState {
    pub modes: HashMap<AgentId, BehaviorMode>,
    pub search_modes: HashMap<AgentId, SearchMode>,
    pub targets: HashMap<AgentId, Entity>,
    pub tier_changes: Vec<(AgentId, Tier)>,
}

/// Keeps modes in a table. Clones share state, so a host can keep one clone
/// for inspection after handing the other to the engine.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDecisionTree {
    state: Arc<Mutex<DecisionState>>,
}

impl InMemoryDecisionTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> DecisionState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn search_mode(&self, agent: AgentId) -> Option<SearchMode> {
        self.snapshot().search_modes.get(&agent).copied()
    }

    fn with<R>(&self, f: impl FnOnce(&mut DecisionState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

impl DecisionTree for InMemoryDecisionTree {
    fn tier_changed(&mut self, agent: AgentId, tier: Tier) {
        self.with(|s| s.tier_changes.push((agent, tier)));
    }

    fn mode(&self, agent: AgentId) -> BehaviorMode {
        self.with(|s| s.modes.get(&agent).copied().unwrap_or_default())
    }

    fn switch_mode(&mut self, agent: AgentId, mode: BehaviorMode) {
        self.with(|s| s.modes.insert(agent, mode));
    }

    fn set_search_mode(&mut self, agent: AgentId, mode: SearchMode) {
        self.with(|s| s.search_modes.insert(agent, mode));
    }

    fn target_changed(&mut self, agent: AgentId, hostile: Option<Entity>) {
        self.with(|s| match hostile {
            Some(h) => s.targets.insert(agent, h),
            None => s.targets.remove(&agent),
        });
    }
}

/// Despawn requests posted by the scheduler for the spawn manager.
#[derive(Debug, Clone, Default)]
pub struct DespawnMailbox {
    queue: Arc<Mutex<VecDeque<AgentId>>>,
}

impl DespawnMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post without blocking. Returns `false` if the lock is busy.
    pub fn try_post(&self, agent: AgentId) -> bool {
        match self.queue.try_lock() {
            Ok(mut queue) => {
                queue.push_back(agent);
                true
            }
            Err(std::sync::TryLockError::Poisoned(poisoned)) => {
                poisoned.into_inner().push_back(agent);
                true
            }
            Err(std::sync::TryLockError::WouldBlock) => false,
        }
    }

    pub fn drain(&self) -> Vec<AgentId> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
