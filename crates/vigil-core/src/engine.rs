//! Simulation engine - main entry point for driving guards frame by frame

use std::collections::HashMap;
use std::sync::Arc;

use hecs::{Entity, EntityBuilder, World};
use vigil_logic::behavior::{plan_response, BehaviorMode, ResponsePlan, SearchMode};
use vigil_logic::config::VigilConfig;
use vigil_logic::lod::{Tier, TierCounts};

use crate::collaborators::{
    DecisionTree, DespawnMailbox, InMemoryDecisionTree, OpenSpace, SharedViewpoint, SpatialProbe,
};
use crate::components::*;
use crate::error::{EngineError, SchedulerError};
use crate::scheduler::{
    AppliedBatch, CycleReport, PendingCounts, Scheduler, SchedulerCore, SchedulerLink, SchedulerStats,
    TickApplier,
};
use crate::systems::*;
use crate::telemetry::{LogTelemetry, Telemetry, TelemetryEvent};

enum SchedulerState {
    /// Not running on a thread; can be stepped by hand.
    Inline(SchedulerCore),
    Threaded(Scheduler),
    /// The thread failed to start or panicked. Guards keep whatever tiers
    /// they had.
    Unavailable,
}

/// Assembles a [`SimulationEngine`] with its collaborators.
pub struct EngineBuilder {
    config: VigilConfig,
    seed: u64,
    viewpoint: Vec3,
    probe: Box<dyn SpatialProbe>,
    decision: Box<dyn DecisionTree>,
    telemetry: Arc<dyn Telemetry>,
}

impl EngineBuilder {
    pub fn new(config: VigilConfig) -> Self {
        Self {
            config,
            seed: 0x5eed,
            viewpoint: Vec3::ZERO,
            probe: Box::new(OpenSpace),
            decision: Box::new(InMemoryDecisionTree::new()),
            telemetry: Arc::new(LogTelemetry),
        }
    }

    /// Seed for the tick applier's coin flips.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn viewpoint(mut self, location: Vec3) -> Self {
        self.viewpoint = location;
        self
    }

    pub fn probe(mut self, probe: impl SpatialProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn decision_tree(mut self, decision: impl DecisionTree + 'static) -> Self {
        self.decision = Box::new(decision);
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn build(self) -> Result<SimulationEngine, EngineError> {
        self.config.validate()?;

        let viewpoint = Arc::new(SharedViewpoint::new(self.viewpoint));
        let despawn = DespawnMailbox::new();
        let (core, link) = SchedulerCore::new(
            self.config.scheduler.clone(),
            viewpoint.clone(),
            despawn.clone(),
            Arc::clone(&self.telemetry),
        );

        Ok(SimulationEngine {
            world: World::new(),
            applier: TickApplier::seeded(self.config.drain.clone(), self.seed),
            config: self.config,
            sim_time: 0.0,
            link,
            scheduler: SchedulerState::Inline(core),
            tasks: TaskQueue::new(),
            agents: HashMap::new(),
            next_agent_id: 1,
            viewpoint,
            despawn,
            probe: self.probe,
            decision: self.decision,
            telemetry: self.telemetry,
        })
    }
}

/// Main simulation engine
pub struct SimulationEngine {
    /// ECS world containing guards, hostiles, and props
    pub world: World,
    config: VigilConfig,
    /// Simulation time in seconds since start
    sim_time: f64,
    link: SchedulerLink,
    scheduler: SchedulerState,
    applier: TickApplier,
    tasks: TaskQueue,
    agents: HashMap<AgentId, Entity>,
    next_agent_id: u64,
    viewpoint: Arc<SharedViewpoint>,
    despawn: DespawnMailbox,
    probe: Box<dyn SpatialProbe>,
    decision: Box<dyn DecisionTree>,
    telemetry: Arc<dyn Telemetry>,
}

impl SimulationEngine {
    pub fn builder(config: VigilConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &VigilConfig {
        &self.config
    }

    // --- scheduler lifecycle ---

    /// Move the scheduler onto its background thread.
    ///
    /// A spawn failure is logged and leaves scheduling disabled; the engine
    /// keeps running frames either way.
    pub fn start_scheduler(&mut self) -> Result<(), SchedulerError> {
        match std::mem::replace(&mut self.scheduler, SchedulerState::Unavailable) {
            SchedulerState::Inline(core) => match Scheduler::spawn(core) {
                Ok(scheduler) => {
                    self.scheduler = SchedulerState::Threaded(scheduler);
                    Ok(())
                }
                Err(err) => {
                    self.telemetry.record(TelemetryEvent::SchedulerUnavailable {
                        reason: err.to_string(),
                    });
                    Err(err)
                }
            },
            SchedulerState::Threaded(scheduler) => {
                self.scheduler = SchedulerState::Threaded(scheduler);
                Err(SchedulerError::AlreadyRunning)
            }
            SchedulerState::Unavailable => Err(SchedulerError::Unavailable),
        }
    }

    /// Stop and join the scheduler thread. The scheduler can be stepped or
    /// restarted afterwards.
    pub fn stop_scheduler(&mut self) -> Result<SchedulerStats, SchedulerError> {
        match std::mem::replace(&mut self.scheduler, SchedulerState::Unavailable) {
            SchedulerState::Threaded(mut scheduler) => {
                let core = scheduler.stop()?;
                let stats = core.stats();
                self.scheduler = SchedulerState::Inline(core);
                Ok(stats)
            }
            SchedulerState::Inline(core) => {
                let stats = core.stats();
                self.scheduler = SchedulerState::Inline(core);
                Ok(stats)
            }
            SchedulerState::Unavailable => Err(SchedulerError::Unavailable),
        }
    }

    /// Run one ranking cycle on the calling thread.
    pub fn step_scheduler(&mut self) -> Result<CycleReport, SchedulerError> {
        match &mut self.scheduler {
            SchedulerState::Inline(core) => Ok(core.run_cycle()),
            SchedulerState::Threaded(_) => Err(SchedulerError::AlreadyRunning),
            SchedulerState::Unavailable => Err(SchedulerError::Unavailable),
        }
    }

    pub fn scheduler_running(&self) -> bool {
        matches!(&self.scheduler, SchedulerState::Threaded(s) if s.is_running())
    }

    pub fn pending_commands(&self) -> PendingCounts {
        self.link
            .commands()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .counts()
    }

    // --- population ---

    /// Spawn a guard and register it with the scheduler. Guards start asleep
    /// and rendering.
    pub fn spawn_guard(&mut self, position: Vec3, name: &str) -> AgentId {
        let id = AgentId(self.next_agent_id);
        self.next_agent_id += 1;

        let entity = self.world.reserve_entity();
        let handle = AgentHandle::new(id, entity, position);
        let suspicion = &self.config.suspicion;

        let mut builder = EntityBuilder::new();
        builder
            .add(handle.clone())
            .add(Name::new(name))
            .add(Position(position))
            .add(Velocity::default())
            .add(Capsule::default())
            .add(SensedKind::Peer)
            .add(Controller::default())
            .add(Stimuli::default())
            .add(Perception::default())
            .add(Suspicion::new(suspicion.min_suspicion, suspicion))
            .add(Vitals::default())
            .add(TerminalClock::new(self.config.lifecycle.time_to_forget_terminal))
            .add(Blackboard::default())
            .add(Presentation::default());
        self.world.spawn_at(entity, builder.build());
        self.agents.insert(id, entity);

        if !self.link.register(handle) {
            self.telemetry.record(TelemetryEvent::RegisterDropped(id));
        }
        id
    }

    pub fn spawn_hostile(&mut self, position: Vec3, velocity: Vec3) -> Entity {
        self.world.spawn((
            Position(position),
            Velocity(velocity),
            Capsule::default(),
            SensedKind::Hostile,
        ))
    }

    /// Something sensable that is neither hostile nor a guard.
    pub fn spawn_prop(&mut self, position: Vec3) -> Entity {
        self.world.spawn((Position(position), SensedKind::Other))
    }

    /// Remove a live guard from scheduling. The spawn manager receives a
    /// despawn request through [`SimulationEngine::take_despawn_requests`].
    pub fn unregister_guard(&mut self, id: AgentId) -> Result<(), EngineError> {
        let handle = self.handle(id).ok_or(EngineError::UnknownAgent(id))?;
        if !self.link.unregister(handle) {
            self.telemetry.record(TelemetryEvent::UnregisterDropped(id));
        }
        Ok(())
    }

    /// Despawn requests the scheduler has posted since the last call.
    pub fn take_despawn_requests(&mut self) -> Vec<AgentId> {
        self.despawn.drain()
    }

    /// Despawn a guard immediately, as the spawn manager does in response to
    /// a despawn request.
    pub fn despawn_guard(&mut self, id: AgentId) -> Result<(), EngineError> {
        let entity = self.entity(id)?;
        self.destroy_entity(entity);
        Ok(())
    }

    // --- external inputs ---

    pub fn set_viewpoint(&mut self, location: Vec3) {
        self.viewpoint.set(location);
    }

    pub fn set_position(&mut self, entity: Entity, location: Vec3) -> Result<(), EngineError> {
        let mut position = self
            .world
            .get::<&mut Position>(entity)
            .map_err(|_| EngineError::UnknownEntity(entity))?;
        position.0 = location;
        Ok(())
    }

    pub fn set_velocity(&mut self, entity: Entity, velocity: Vec3) -> Result<(), EngineError> {
        let mut current = self
            .world
            .get::<&mut Velocity>(entity)
            .map_err(|_| EngineError::UnknownEntity(entity))?;
        current.0 = velocity;
        Ok(())
    }

    /// Deliver sensed-set changes for a guard. Dropped while the guard is
    /// asleep or dead, since its sensing is off.
    pub fn report_sensed(&mut self, id: AgentId, changed: &[Entity]) -> Result<(), EngineError> {
        let entity = self.entity(id)?;
        let handle = self.handle(id).ok_or(EngineError::UnknownAgent(id))?;
        if handle.is_dead() || !handle.is_thinking() {
            return Ok(());
        }
        if let Ok(mut stimuli) = self.world.get::<&mut Stimuli>(entity) {
            stimuli.push(changed.iter().copied());
        }
        Ok(())
    }

    /// Ask a guard to investigate `location`.
    pub fn respond_to(&mut self, id: AgentId, location: Vec3) -> Result<ResponsePlan, EngineError> {
        let entity = self.entity(id)?;
        if self.handle(id).is_some_and(|h| h.is_dead()) {
            return Ok(ResponsePlan::Ignore);
        }

        if let Ok(mut board) = self.world.get::<&mut Blackboard>(entity) {
            board.set(keys::RESPOND_LOCATION, BlackboardValue::Vector(location));
        }
        let visible = self
            .world
            .get::<&Perception>(entity)
            .map(|p| p.has_visible_hostile())
            .unwrap_or(false);
        let plan = plan_response(self.decision.mode(id), visible);

        match plan {
            ResponsePlan::EnterSearch => {
                if let Ok(mut suspicion) = self.world.get::<&mut Suspicion>(entity) {
                    suspicion.raise_to(self.config.perception.respond_suspicion, &self.config.suspicion);
                }
                self.decision.switch_mode(id, BehaviorMode::Search);
                self.request_search_mode(id, entity, SearchMode::Responding);
            }
            ResponsePlan::Redirect => self.request_search_mode(id, entity, SearchMode::Responding),
            ResponsePlan::Ignore => return Ok(plan),
        }
        self.telemetry.record(TelemetryEvent::Responding { agent: id, location });
        Ok(plan)
    }

    /// Have a full-rate guard alert every live guard within the notify
    /// radius. Returns how many peers were asked to respond.
    pub fn alert_peers(&mut self, id: AgentId, location: Vec3) -> Result<usize, EngineError> {
        let entity = self.entity(id)?;
        let can_notify = self
            .world
            .get::<&Controller>(entity)
            .map(|c| c.notifier_enabled())
            .unwrap_or(false);
        if !can_notify {
            return Ok(0);
        }
        let origin = self.position_of(entity)?;
        let radius = self.config.perception.notify_radius;

        let mut peers: Vec<AgentId> = self
            .world
            .query::<(&AgentHandle, &Position)>()
            .iter()
            .filter(|(other, (handle, position))| {
                *other != entity
                    && handle.is_valid()
                    && !handle.is_dead()
                    && position.0.distance(&origin) <= radius
            })
            .map(|(_, (handle, _))| handle.id())
            .collect();
        peers.sort();

        for peer in &peers {
            self.respond_to(*peer, location)?;
        }
        self.telemetry.record(TelemetryEvent::PeersAlerted {
            agent: id,
            count: peers.len(),
        });
        Ok(peers.len())
    }

    /// Kill a guard: it stops thinking at once, goes ragdoll, and is routed
    /// to deferred destruction by the scheduler.
    pub fn mark_dead(&mut self, id: AgentId) -> Result<(), EngineError> {
        let entity = self.entity(id)?;
        let handle = self.handle(id).ok_or(EngineError::UnknownAgent(id))?;
        if handle.is_dead() {
            return Ok(());
        }
        handle.retire();
        self.enter_tier(&handle, Tier::Sleep);

        if let Ok(mut presentation) = self.world.get::<&mut Presentation>(entity) {
            presentation.ragdoll = true;
            presentation.animating = false;
        }
        self.telemetry.record(TelemetryEvent::AgentDied(id));
        self.tasks.schedule(
            self.sim_time,
            self.config.lifecycle.ragdoll_check_interval,
            Task::SettleRagdoll(entity),
        );
        Ok(())
    }

    /// Start the terminal-state clock, when the decision tree leaves its
    /// destroy behavior.
    pub fn zero_terminal_clock(&mut self, id: AgentId) -> Result<(), EngineError> {
        let entity = self.entity(id)?;
        if let Ok(mut clock) = self.world.get::<&mut TerminalClock>(entity) {
            clock.zero();
        }
        Ok(())
    }

    // --- frame ---

    /// Advance the simulation by `delta_seconds`.
    pub fn update(&mut self, delta_seconds: f32) {
        let dt = delta_seconds.max(0.0);
        self.sim_time += f64::from(dt);

        // Apply what the scheduler published since last frame
        let batch = self.applier.drain(self.link.commands());
        self.apply_batch(batch);

        self.run_due_tasks();

        locomotion_system(&mut self.world, dt);
        sync_locations(&mut self.world);

        let mut ctx = PerceptionContext {
            perception: &self.config.perception,
            suspicion: &self.config.suspicion,
            probe: self.probe.as_ref(),
            decision: self.decision.as_mut(),
            telemetry: self.telemetry.as_ref(),
        };
        sensing_system(&self.world, &mut ctx, dt);
        awareness_system(&self.world, &mut ctx, dt);

        blackboard_system(&mut self.world, dt);
    }

    fn apply_batch(&mut self, batch: AppliedBatch) {
        for (agent, tier) in batch.woke {
            self.enter_tier(&agent, tier);
        }
        for agent in batch.slept {
            self.enter_tier(&agent, Tier::Sleep);
        }
        for agent in batch.shown {
            self.set_rendering(&agent, true);
        }
        for agent in batch.hidden {
            self.set_rendering(&agent, false);
        }
        if let Some(agent) = batch.destroy {
            let delay = self.config.lifecycle.destroy_delay;
            self.tasks.schedule(self.sim_time, delay, Task::Destroy(agent.entity()));
            self.telemetry.record(TelemetryEvent::DestroyScheduled {
                agent: agent.id(),
                delay,
            });
        }
    }

    fn enter_tier(&mut self, agent: &AgentHandle, tier: Tier) {
        let entity = agent.entity();
        if let Ok(mut controller) = self.world.get::<&mut Controller>(entity) {
            controller.enter(tier, &self.config.tiers);
        }
        if tier == Tier::Sleep {
            if let Ok(mut stimuli) = self.world.get::<&mut Stimuli>(entity) {
                stimuli.clear();
            }
        }
        if let Ok(mut board) = self.world.get::<&mut Blackboard>(entity) {
            board.set(keys::CONTROLLER_STATUS, BlackboardValue::Tier(tier));
        }
        self.decision.tier_changed(agent.id(), tier);
        self.telemetry.record(TelemetryEvent::TierChanged {
            agent: agent.id(),
            tier,
        });
    }

    fn set_rendering(&mut self, agent: &AgentHandle, rendering: bool) {
        if let Ok(mut presentation) = self.world.get::<&mut Presentation>(agent.entity()) {
            presentation.set_rendering(rendering);
        }
        self.telemetry.record(TelemetryEvent::RenderingChanged {
            agent: agent.id(),
            rendering,
        });
    }

    fn run_due_tasks(&mut self) {
        while let Some(task) = self.tasks.pop_due(self.sim_time) {
            match task {
                Task::SettleRagdoll(entity) => self.check_ragdoll(entity),
                Task::Destroy(entity) => self.destroy_entity(entity),
            }
        }
    }

    fn check_ragdoll(&mut self, entity: Entity) {
        let Ok(id) = self.world.get::<&AgentHandle>(entity).map(|h| h.id()) else {
            return;
        };
        let speed = self
            .world
            .get::<&Velocity>(entity)
            .map(|v| v.0.length())
            .unwrap_or(0.0);
        if speed < self.config.lifecycle.ragdoll_settle_speed {
            if let Ok(mut presentation) = self.world.get::<&mut Presentation>(entity) {
                presentation.settled = true;
            }
            self.telemetry.record(TelemetryEvent::RagdollSettled(id));
        } else {
            self.tasks.schedule(
                self.sim_time,
                self.config.lifecycle.ragdoll_check_interval,
                Task::SettleRagdoll(entity),
            );
        }
    }

    fn destroy_entity(&mut self, entity: Entity) {
        let Ok(handle) = self.world.get::<&AgentHandle>(entity).map(|h| (*h).clone()) else {
            return;
        };
        handle.invalidate();
        self.agents.remove(&handle.id());
        if self.world.despawn(entity).is_ok() {
            self.telemetry.record(TelemetryEvent::Despawned(handle.id()));
        }
    }

    fn request_search_mode(&mut self, id: AgentId, entity: Entity, mode: SearchMode) {
        self.decision.set_search_mode(id, mode);
        if let Ok(mut board) = self.world.get::<&mut Blackboard>(entity) {
            board.set(keys::SEARCH_MODE, BlackboardValue::Name(mode.name()));
        }
        self.telemetry
            .record(TelemetryEvent::SearchModeRequested { agent: id, mode });
    }

    // --- queries ---

    /// Get current simulation time in seconds
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn guard_count(&self) -> usize {
        self.agents.len()
    }

    pub fn guards(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.agents.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn entity(&self, id: AgentId) -> Result<Entity, EngineError> {
        self.agents
            .get(&id)
            .copied()
            .ok_or(EngineError::UnknownAgent(id))
    }

    pub fn handle(&self, id: AgentId) -> Option<AgentHandle> {
        let entity = self.agents.get(&id)?;
        self.world.get::<&AgentHandle>(*entity).ok().map(|h| (*h).clone())
    }

    pub fn tier(&self, id: AgentId) -> Option<Tier> {
        self.handle(id).map(|h| h.tier())
    }

    /// Tier distribution over live guards.
    pub fn tier_counts(&self) -> TierCounts {
        TierCounts::from_tiers(
            self.world
                .query::<&AgentHandle>()
                .iter()
                .filter(|(_, h)| h.is_valid() && !h.is_dead())
                .map(|(_, h)| h.tier()),
        )
    }

    pub fn suspicion(&self, id: AgentId) -> Option<f32> {
        let entity = self.agents.get(&id)?;
        self.world.get::<&Suspicion>(*entity).ok().map(|s| s.value())
    }

    pub fn perception(&self, id: AgentId) -> Option<Perception> {
        self.component::<Perception>(id)
    }

    pub fn blackboard(&self, id: AgentId) -> Option<Blackboard> {
        self.component::<Blackboard>(id)
    }

    pub fn controller(&self, id: AgentId) -> Option<Controller> {
        self.component::<Controller>(id)
    }

    pub fn presentation(&self, id: AgentId) -> Option<Presentation> {
        self.component::<Presentation>(id)
    }

    pub fn position(&self, id: AgentId) -> Option<Vec3> {
        let entity = self.agents.get(&id)?;
        self.position_of(*entity).ok()
    }

    fn position_of(&self, entity: Entity) -> Result<Vec3, EngineError> {
        self.world
            .get::<&Position>(entity)
            .map(|p| p.0)
            .map_err(|_| EngineError::UnknownEntity(entity))
    }

    fn component<T: hecs::Component + Clone>(&self, id: AgentId) -> Option<T> {
        let entity = self.agents.get(&id)?;
        self.world.get::<&T>(*entity).ok().map(|c| (*c).clone())
    }
}
