//! Pending thinking/rendering commands between the scheduler thread and the
//! frame loop.
//!
//! One [`CommandQueue`] sits behind a single mutex. The scheduler publishes
//! with `try_lock` and skips on contention; the tick applier drains under a
//! blocking lock once per frame.

use std::collections::{HashMap, HashSet, VecDeque};

use vigil_logic::lod::{RenderDirective, ThinkDirective, Tier};

use crate::components::{AgentHandle, AgentId};

/// Outcome of a publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    Queued,
    /// An identical command is already pending.
    Duplicate,
    /// The opposite command is pending; retry on a later cycle once it has
    /// been applied.
    Conflicting,
}

/// Queue depths, for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
    pub think_enable: usize,
    pub think_disable: usize,
    pub render_enable: usize,
    pub render_disable: usize,
    pub destroy: usize,
}

impl PendingCounts {
    pub fn total(&self) -> usize {
        self.think_enable + self.think_disable + self.render_enable + self.render_disable + self.destroy
    }
}

/// Deduplicated FIFO of agents with a membership set alongside.
#[derive(Debug, Default)]
struct UniqueQueue {
    order: VecDeque<AgentHandle>,
    members: HashSet<AgentId>,
}

impl UniqueQueue {
    fn contains(&self, id: AgentId) -> bool {
        self.members.contains(&id)
    }

    fn push(&mut self, agent: &AgentHandle) -> bool {
        if !self.members.insert(agent.id()) {
            return false;
        }
        self.order.push_back(agent.clone());
        true
    }

    fn pop(&mut self) -> Option<AgentHandle> {
        let agent = self.order.pop_front()?;
        self.members.remove(&agent.id());
        Some(agent)
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

/// The five command queues.
///
/// An agent appears at most once per queue, and never in both the enable
/// and disable queue of the same kind.
#[derive(Debug, Default)]
pub struct CommandQueue {
    think_enable: UniqueQueue,
    /// Target tier for each pending think-enable entry.
    pending_tiers: HashMap<AgentId, Tier>,
    think_disable: UniqueQueue,
    render_enable: UniqueQueue,
    render_disable: UniqueQueue,
    destroy: UniqueQueue,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_think(&mut self, agent: &AgentHandle, directive: ThinkDirective) -> Publish {
        let id = agent.id();
        match directive {
            ThinkDirective::Enable(Tier::Sleep) | ThinkDirective::Disable => {
                if self.think_enable.contains(id) {
                    return Publish::Conflicting;
                }
                if self.think_disable.push(agent) {
                    Publish::Queued
                } else {
                    Publish::Duplicate
                }
            }
            ThinkDirective::Enable(tier) => {
                if self.think_disable.contains(id) {
                    return Publish::Conflicting;
                }
                if self.think_enable.push(agent) {
                    self.pending_tiers.insert(id, tier);
                    return Publish::Queued;
                }
                // Already pending: a re-rank may have changed the target
                // tier, which updates in place without reordering.
                match self.pending_tiers.insert(id, tier) {
                    Some(previous) if previous == tier => Publish::Duplicate,
                    _ => Publish::Queued,
                }
            }
        }
    }

    pub fn request_render(&mut self, agent: &AgentHandle, directive: RenderDirective) -> Publish {
        let (wanted, opposite) = match directive {
            RenderDirective::Enable => (&mut self.render_enable, &self.render_disable),
            RenderDirective::Disable => (&mut self.render_disable, &self.render_enable),
        };
        if opposite.contains(agent.id()) {
            return Publish::Conflicting;
        }
        if wanted.push(agent) {
            Publish::Queued
        } else {
            Publish::Duplicate
        }
    }

    pub fn request_destroy(&mut self, agent: &AgentHandle) -> Publish {
        if self.destroy.push(agent) {
            Publish::Queued
        } else {
            Publish::Duplicate
        }
    }

    pub fn pop_think_enable(&mut self) -> Option<(AgentHandle, Tier)> {
        let agent = self.think_enable.pop()?;
        let tier = self.pending_tiers.remove(&agent.id()).unwrap_or(Tier::Basic);
        Some((agent, tier))
    }

    pub fn pop_think_disable(&mut self) -> Option<AgentHandle> {
        self.think_disable.pop()
    }

    pub fn pop_render_enable(&mut self) -> Option<AgentHandle> {
        self.render_enable.pop()
    }

    pub fn pop_render_disable(&mut self) -> Option<AgentHandle> {
        self.render_disable.pop()
    }

    pub fn pop_destroy(&mut self) -> Option<AgentHandle> {
        self.destroy.pop()
    }

    /// Target tier of a pending think-enable, if any.
    pub fn pending_tier(&self, id: AgentId) -> Option<Tier> {
        self.pending_tiers.get(&id).copied()
    }

    pub fn is_disable_pending(&self, id: AgentId) -> bool {
        self.think_disable.contains(id)
    }

    pub fn is_render_pending(&self, id: AgentId, directive: RenderDirective) -> bool {
        match directive {
            RenderDirective::Enable => self.render_enable.contains(id),
            RenderDirective::Disable => self.render_disable.contains(id),
        }
    }

    pub fn counts(&self) -> PendingCounts {
        PendingCounts {
            think_enable: self.think_enable.len(),
            think_disable: self.think_disable.len(),
            render_enable: self.render_enable.len(),
            render_disable: self.render_disable.len(),
            destroy: self.destroy.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Vec3;
    use proptest::prelude::*;

    fn agents(n: usize) -> Vec<AgentHandle> {
        let mut world = hecs::World::new();
        (0..n)
            .map(|i| AgentHandle::new(AgentId(i as u64), world.spawn(()), Vec3::ZERO))
            .collect()
    }

    #[test]
    fn duplicate_enable_is_dropped() {
        let a = &agents(1)[0];
        let mut q = CommandQueue::new();
        assert_eq!(q.request_think(a, ThinkDirective::Enable(Tier::Basic)), Publish::Queued);
        assert_eq!(q.request_think(a, ThinkDirective::Enable(Tier::Basic)), Publish::Duplicate);
        assert_eq!(q.counts().think_enable, 1);
    }

    #[test]
    fn pending_enable_retargets_in_place() {
        let a = &agents(1)[0];
        let mut q = CommandQueue::new();
        q.request_think(a, ThinkDirective::Enable(Tier::Basic));
        assert_eq!(q.request_think(a, ThinkDirective::Enable(Tier::Normal)), Publish::Queued);
        assert_eq!(q.counts().think_enable, 1);
        assert_eq!(q.pop_think_enable().map(|(_, t)| t), Some(Tier::Normal));
    }

    #[test]
    fn opposite_think_request_conflicts() {
        let a = &agents(1)[0];
        let mut q = CommandQueue::new();
        q.request_think(a, ThinkDirective::Disable);
        assert_eq!(
            q.request_think(a, ThinkDirective::Enable(Tier::Normal)),
            Publish::Conflicting
        );
        assert!(q.pop_think_disable().is_some());
        assert_eq!(
            q.request_think(a, ThinkDirective::Enable(Tier::Normal)),
            Publish::Queued
        );
        assert_eq!(q.request_think(a, ThinkDirective::Disable), Publish::Conflicting);
    }

    #[test]
    fn opposite_render_request_conflicts() {
        let a = &agents(1)[0];
        let mut q = CommandQueue::new();
        assert_eq!(q.request_render(a, RenderDirective::Enable), Publish::Queued);
        assert_eq!(q.request_render(a, RenderDirective::Disable), Publish::Conflicting);
        assert_eq!(q.request_render(a, RenderDirective::Enable), Publish::Duplicate);
        assert!(q.is_render_pending(a.id(), RenderDirective::Enable));
    }

    #[test]
    fn fifo_order_is_kept() {
        let all = agents(3);
        let mut q = CommandQueue::new();
        for a in all.iter().rev() {
            q.request_render(a, RenderDirective::Disable);
        }
        let order: Vec<u64> = std::iter::from_fn(|| q.pop_render_disable())
            .map(|a| a.id().0)
            .collect();
        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn destroy_is_deduplicated() {
        let a = &agents(1)[0];
        let mut q = CommandQueue::new();
        assert_eq!(q.request_destroy(a), Publish::Queued);
        assert_eq!(q.request_destroy(a), Publish::Duplicate);
        assert_eq!(q.counts().destroy, 1);
        assert!(q.pop_destroy().is_some());
        assert!(q.pop_destroy().is_none());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Think(usize, ThinkDirective),
        Render(usize, RenderDirective),
        PopEnable,
        PopDisable,
        PopRenderOn,
        PopRenderOff,
    }

    fn op() -> impl Strategy<Value = Op> {
        let think = prop_oneof![
            Just(ThinkDirective::Enable(Tier::Basic)),
            Just(ThinkDirective::Enable(Tier::Normal)),
            Just(ThinkDirective::Disable),
        ];
        let render = prop_oneof![Just(RenderDirective::Enable), Just(RenderDirective::Disable)];
        prop_oneof![
            (0usize..4, think).prop_map(|(i, d)| Op::Think(i, d)),
            (0usize..4, render).prop_map(|(i, d)| Op::Render(i, d)),
            Just(Op::PopEnable),
            Just(Op::PopDisable),
            Just(Op::PopRenderOn),
            Just(Op::PopRenderOff),
        ]
    }

    proptest! {
        #[test]
        fn queues_stay_unique_and_exclusive(ops in prop::collection::vec(op(), 0..80)) {
            let all = agents(4);
            let mut q = CommandQueue::new();
            for op in ops {
                match op {
                    Op::Think(i, d) => { q.request_think(&all[i], d); }
                    Op::Render(i, d) => { q.request_render(&all[i], d); }
                    Op::PopEnable => { q.pop_think_enable(); }
                    Op::PopDisable => { q.pop_think_disable(); }
                    Op::PopRenderOn => { q.pop_render_enable(); }
                    Op::PopRenderOff => { q.pop_render_disable(); }
                }
                for a in &all {
                    let id = a.id();
                    prop_assert!(!(q.pending_tier(id).is_some() && q.is_disable_pending(id)));
                    prop_assert!(!(q.is_render_pending(id, RenderDirective::Enable)
                        && q.is_render_pending(id, RenderDirective::Disable)));
                }
                let counts = q.counts();
                prop_assert!(counts.think_enable <= all.len());
                prop_assert!(counts.render_disable <= all.len());
                prop_assert_eq!(counts.think_enable, q.pending_tiers.len());
            }
        }
    }
}
