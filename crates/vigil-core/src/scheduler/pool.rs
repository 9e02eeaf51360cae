//! The scheduler thread's private set of registered agents.

use std::collections::HashMap;

use vigil_logic::lod::rank_by_distance;

use crate::components::{AgentHandle, AgentId, Vec3};

/// Registration traffic from the frame loop to the scheduler thread.
#[derive(Debug, Clone)]
pub enum PoolRequest {
    Add(AgentHandle),
    Remove(AgentHandle),
}

/// Agents the scheduler ranks. Only the scheduler thread touches this.
#[derive(Debug, Default)]
pub struct AgentPool {
    members: HashMap<AgentId, AgentHandle>,
}

impl AgentPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the agent was already registered.
    pub fn insert(&mut self, agent: AgentHandle) -> bool {
        self.members.insert(agent.id(), agent).is_none()
    }

    pub fn remove(&mut self, id: AgentId) -> Option<AgentHandle> {
        self.members.remove(&id)
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members with their distance from `viewpoint`, closest first.
    ///
    /// Each location is read once, so a guard moving mid-cycle is ranked
    /// from a single consistent sample.
    pub fn ranked_from(&self, viewpoint: Vec3) -> Vec<(AgentHandle, f32)> {
        let mut ranked: Vec<(AgentHandle, f32)> = self
            .members
            .values()
            .map(|agent| (agent.clone(), agent.location().distance(&viewpoint)))
            .collect();
        rank_by_distance(&mut ranked);
        ranked
    }
}
