//! Per-frame drain of the command queues.
//!
//! Runs on the frame thread. Enable queues drain under a coin-flip budget so
//! wake-ups trickle in over several frames; disables always drain at their
//! full budget. At most one destroy request is taken per frame.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vigil_logic::config::DrainBudgets;
use vigil_logic::lod::Tier;

use super::commands::CommandQueue;
use crate::components::AgentHandle;

/// Commands applied to agent flags this frame. The engine runs the
/// component-side effects after the lock is released.
#[derive(Debug, Default)]
pub struct AppliedBatch {
    pub woke: Vec<(AgentHandle, Tier)>,
    pub slept: Vec<AgentHandle>,
    pub shown: Vec<AgentHandle>,
    pub hidden: Vec<AgentHandle>,
    pub destroy: Option<AgentHandle>,
}

impl AppliedBatch {
    pub fn is_empty(&self) -> bool {
        self.woke.is_empty()
            && self.slept.is_empty()
            && self.shown.is_empty()
            && self.hidden.is_empty()
            && self.destroy.is_none()
    }
}

pub struct TickApplier<R: Rng = StdRng> {
    budgets: DrainBudgets,
    rng: R,
}

impl TickApplier<StdRng> {
    pub fn seeded(budgets: DrainBudgets, seed: u64) -> Self {
        Self::with_rng(budgets, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> TickApplier<R> {
    pub fn with_rng(budgets: DrainBudgets, rng: R) -> Self {
        Self { budgets, rng }
    }

    /// All or nothing, with even odds.
    fn coin_flip(&mut self, budget: usize) -> usize {
        if self.rng.gen_bool(0.5) {
            budget
        } else {
            0
        }
    }

    /// Drain one frame's worth of commands and apply them to agent flags.
    pub fn drain(&mut self, commands: &Mutex<CommandQueue>) -> AppliedBatch {
        let think_budget = self.coin_flip(self.budgets.think_enable_per_tick);
        let render_budget = self.coin_flip(self.budgets.render_enable_per_tick);

        let mut queue = commands.lock().unwrap_or_else(PoisonError::into_inner);
        let mut batch = AppliedBatch::default();

        for _ in 0..think_budget {
            let Some((agent, tier)) = queue.pop_think_enable() else {
                break;
            };
            if !agent.is_valid() || agent.is_dead() || agent.tier() == tier {
                continue;
            }
            agent.apply_tier(tier);
            batch.woke.push((agent, tier));
        }

        for _ in 0..self.budgets.think_disable_per_tick {
            let Some(agent) = queue.pop_think_disable() else {
                break;
            };
            if !agent.is_valid() || agent.tier() == Tier::Sleep {
                continue;
            }
            agent.apply_tier(Tier::Sleep);
            batch.slept.push(agent);
        }

        for _ in 0..render_budget {
            let Some(agent) = queue.pop_render_enable() else {
                break;
            };
            if !agent.is_valid() || agent.is_rendering() {
                continue;
            }
            agent.apply_rendering(true);
            batch.shown.push(agent);
        }

        for _ in 0..self.budgets.render_disable_per_tick {
            let Some(agent) = queue.pop_render_disable() else {
                break;
            };
            if !agent.is_valid() || !agent.is_rendering() {
                continue;
            }
            agent.apply_rendering(false);
            batch.hidden.push(agent);
        }

        batch.destroy = queue.pop_destroy().filter(AgentHandle::is_valid);
        batch
    }
}
