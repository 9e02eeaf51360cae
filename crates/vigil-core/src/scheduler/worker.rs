//! The background ranking loop.
//!
//! [`SchedulerCore`] owns everything the scheduler thread touches and runs
//! one deterministic cycle at a time, so tests can step it without a thread.
//! [`Scheduler`] moves a core onto a named thread and loops it until stopped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use vigil_logic::config::SchedulerConfig;
use vigil_logic::lod::{plan, within_thinking_budget, Directives};

use super::commands::{CommandQueue, Publish};
use super::pool::{AgentPool, PoolRequest};
use crate::collaborators::{DespawnMailbox, ViewpointProvider};
use crate::components::{AgentHandle, AgentId};
use crate::error::SchedulerError;
use crate::telemetry::{Telemetry, TelemetryEvent};

/// Running totals, reported when the thread stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles: u64,
    pub published: u64,
    pub duplicates: u64,
    pub conflicts: u64,
    /// Publishes skipped because the command lock was busy.
    pub deferred: u64,
    pub dead_routed: u64,
    pub despawns_posted: u64,
}

/// What one cycle saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub ranked: usize,
    /// Ranked agents inside the thinking set this cycle.
    pub thinking: usize,
    pub dead: usize,
    pub invalid: usize,
}

/// Frame-side end of the scheduler: registration and the shared command
/// queue.
#[derive(Debug, Clone)]
pub struct SchedulerLink {
    requests: Sender<PoolRequest>,
    commands: Arc<Mutex<CommandQueue>>,
}

impl SchedulerLink {
    /// Returns `false` once the scheduler side is gone.
    pub fn register(&self, agent: AgentHandle) -> bool {
        self.requests.send(PoolRequest::Add(agent)).is_ok()
    }

    pub fn unregister(&self, agent: AgentHandle) -> bool {
        self.requests.send(PoolRequest::Remove(agent)).is_ok()
    }

    pub fn commands(&self) -> &Arc<Mutex<CommandQueue>> {
        &self.commands
    }
}

pub struct SchedulerCore {
    config: SchedulerConfig,
    pool: AgentPool,
    requests: Receiver<PoolRequest>,
    commands: Arc<Mutex<CommandQueue>>,
    viewpoint: Arc<dyn ViewpointProvider>,
    despawn: DespawnMailbox,
    telemetry: Arc<dyn Telemetry>,
    /// Dead agents seen while ranking, removed at the start of next cycle.
    dead: Vec<AgentHandle>,
    /// Dead agents waiting for the command lock to reach the destroy queue.
    destroy_backlog: Vec<AgentHandle>,
    /// Unregistered agents waiting for the spawner mailbox.
    despawn_backlog: Vec<AgentId>,
    stats: SchedulerStats,
}

impl SchedulerCore {
    pub fn new(
        config: SchedulerConfig,
        viewpoint: Arc<dyn ViewpointProvider>,
        despawn: DespawnMailbox,
        telemetry: Arc<dyn Telemetry>,
    ) -> (Self, SchedulerLink) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let commands = Arc::new(Mutex::new(CommandQueue::new()));
        let core = Self {
            config,
            pool: AgentPool::new(),
            requests: rx,
            commands: Arc::clone(&commands),
            viewpoint,
            despawn,
            telemetry,
            dead: Vec::new(),
            destroy_backlog: Vec::new(),
            despawn_backlog: Vec::new(),
            stats: SchedulerStats::default(),
        };
        (core, SchedulerLink { requests: tx, commands })
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_registered(&self, id: AgentId) -> bool {
        self.pool.contains(id)
    }

    /// One ranking cycle.
    pub fn run_cycle(&mut self) -> CycleReport {
        self.apply_pool_requests();
        self.flush_despawns();
        self.collect_dead();
        self.flush_destroys();

        let viewpoint = self.viewpoint.location();
        let mut report = CycleReport::default();
        let mut rank = 0;
        for (agent, distance) in self.pool.ranked_from(viewpoint) {
            if !agent.is_valid() {
                self.pool.remove(agent.id());
                report.invalid += 1;
                continue;
            }
            if agent.is_dead() {
                self.dead.push(agent);
                report.dead += 1;
                continue;
            }
            if within_thinking_budget(rank, distance, &self.config) {
                report.thinking += 1;
            }
            let directives = plan(rank, distance, agent.observed(), &self.config);
            self.publish(&agent, directives);
            rank += 1;
        }
        report.ranked = rank;
        self.stats.cycles += 1;
        report
    }

    /// Loop cycles until `stop` is set, then hand the core back.
    pub fn run(mut self, stop: &AtomicBool) -> Self {
        let interval = Duration::from_millis(self.config.min_cycle_interval_ms);
        self.telemetry.record(TelemetryEvent::SchedulerStarted);

        while !stop.load(Ordering::Acquire) {
            let started = Instant::now();
            self.run_cycle();
            if interval.is_zero() {
                thread::yield_now();
            } else if let Some(rest) = interval.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }

        self.telemetry.record(TelemetryEvent::SchedulerStopped(self.stats));
        self
    }

    fn apply_pool_requests(&mut self) {
        while let Ok(request) = self.requests.try_recv() {
            match request {
                PoolRequest::Add(agent) => {
                    let id = agent.id();
                    if self.pool.insert(agent) {
                        self.telemetry.record(TelemetryEvent::AgentRegistered(id));
                    }
                }
                PoolRequest::Remove(agent) => {
                    if self.pool.remove(agent.id()).is_some() {
                        self.telemetry.record(TelemetryEvent::AgentUnregistered(agent.id()));
                        self.despawn_backlog.push(agent.id());
                    }
                }
            }
        }
    }

    fn flush_despawns(&mut self) {
        let despawn = &self.despawn;
        let before = self.despawn_backlog.len();
        self.despawn_backlog.retain(|id| !despawn.try_post(*id));
        self.stats.despawns_posted += (before - self.despawn_backlog.len()) as u64;
    }

    fn collect_dead(&mut self) {
        for agent in std::mem::take(&mut self.dead) {
            if self.pool.remove(agent.id()).is_some() {
                self.destroy_backlog.push(agent);
                self.stats.dead_routed += 1;
            }
        }
    }

    fn flush_destroys(&mut self) {
        if self.destroy_backlog.is_empty() {
            return;
        }
        let mut queue = match self.commands.try_lock() {
            Ok(queue) => queue,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return,
        };
        for agent in self.destroy_backlog.drain(..) {
            queue.request_destroy(&agent);
        }
    }

    fn publish(&mut self, agent: &AgentHandle, directives: Directives) {
        if let Some(think) = directives.think {
            self.try_publish(|queue| queue.request_think(agent, think));
        }
        if let Some(render) = directives.render {
            self.try_publish(|queue| queue.request_render(agent, render));
        }
    }

    fn try_publish(&mut self, request: impl FnOnce(&mut CommandQueue) -> Publish) {
        let mut queue = match self.commands.try_lock() {
            Ok(queue) => queue,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                self.stats.deferred += 1;
                return;
            }
        };
        let outcome = request(&mut *queue);
        drop(queue);
        match outcome {
            Publish::Queued => self.stats.published += 1,
            Publish::Duplicate => self.stats.duplicates += 1,
            Publish::Conflicting => self.stats.conflicts += 1,
        }
    }
}

/// A [`SchedulerCore`] running on its own thread.
pub struct Scheduler {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<SchedulerCore>>,
}

impl Scheduler {
    pub fn spawn(core: SchedulerCore) -> Result<Self, SchedulerError> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("vigil-lod-scheduler".into())
            .spawn(move || core.run(&flag))?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the loop and join it. Returns the core so it can be stepped or
    /// respawned.
    pub fn stop(&mut self) -> Result<SchedulerCore, SchedulerError> {
        self.stop.store(true, Ordering::Release);
        let handle = self.handle.take().ok_or(SchedulerError::Unavailable)?;
        handle.join().map_err(|_| SchedulerError::Panicked)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::SharedViewpoint;
    use crate::components::Vec3;
    use crate::telemetry::RecordingTelemetry;
    use vigil_logic::lod::{RenderDirective, Tier};

    struct Rig {
        core: SchedulerCore,
        link: SchedulerLink,
        mailbox: DespawnMailbox,
        telemetry: Arc<RecordingTelemetry>,
        world: hecs::World,
        next_id: u64,
    }

    impl Rig {
        fn new(config: SchedulerConfig) -> Self {
            let mailbox = DespawnMailbox::new();
            let telemetry = Arc::new(RecordingTelemetry::new());
            let (core, link) = SchedulerCore::new(
                config,
                Arc::new(SharedViewpoint::new(Vec3::ZERO)),
                mailbox.clone(),
                telemetry.clone(),
            );
            Self {
                core,
                link,
                mailbox,
                telemetry,
                world: hecs::World::new(),
                next_id: 0,
            }
        }

        fn agent_at(&mut self, x: f32) -> AgentHandle {
            self.next_id += 1;
            let agent = AgentHandle::new(AgentId(self.next_id), self.world.spawn(()), Vec3::new(x, 0.0, 0.0));
            assert!(self.link.register(agent.clone()));
            agent
        }

        fn queue(&self) -> std::sync::MutexGuard<'_, CommandQueue> {
            self.link.commands().lock().unwrap()
        }
    }

    fn small() -> SchedulerConfig {
        SchedulerConfig {
            thinking_budget: 3,
            intelligent_budget: 1,
            too_far_away_distance: 1000.0,
            min_cycle_interval_ms: 0,
        }
    }

    #[test]
    fn ranks_closest_agents_into_tiers() {
        let mut rig = Rig::new(small());
        let agents: Vec<_> = [100.0, 300.0, 600.0, 1200.0, 1500.0]
            .into_iter()
            .map(|x| rig.agent_at(x))
            .collect();

        let report = rig.core.run_cycle();
        assert_eq!(report.ranked, 5);
        assert_eq!(report.thinking, 3);

        let q = rig.queue();
        assert_eq!(q.pending_tier(agents[0].id()), Some(Tier::Normal));
        assert_eq!(q.pending_tier(agents[1].id()), Some(Tier::Basic));
        assert_eq!(q.pending_tier(agents[2].id()), Some(Tier::Basic));
        assert_eq!(q.pending_tier(agents[3].id()), None);
        assert!(q.is_render_pending(agents[3].id(), RenderDirective::Disable));
        assert!(q.is_render_pending(agents[4].id(), RenderDirective::Disable));
        assert_eq!(q.counts().render_enable, 0);
    }

    #[test]
    fn repeated_cycles_do_not_duplicate_commands() {
        let mut rig = Rig::new(small());
        rig.agent_at(100.0);
        rig.agent_at(2000.0);
        rig.core.run_cycle();
        let first = rig.queue().counts();
        for _ in 0..10 {
            rig.core.run_cycle();
        }
        assert_eq!(rig.queue().counts(), first);
        assert_eq!(rig.core.stats().duplicates, 20);
    }

    #[test]
    fn busy_lock_defers_publishing() {
        let mut rig = Rig::new(small());
        let agent = rig.agent_at(100.0);
        let commands = Arc::clone(rig.link.commands());
        {
            let _held = commands.lock().unwrap();
            rig.core.run_cycle();
        }
        assert_eq!(rig.core.stats().published, 0);
        assert_eq!(rig.core.stats().deferred, 1);

        rig.core.run_cycle();
        assert_eq!(rig.queue().pending_tier(agent.id()), Some(Tier::Normal));
    }

    #[test]
    fn dead_agent_routes_to_destroy_once() {
        let mut rig = Rig::new(small());
        let agent = rig.agent_at(100.0);
        rig.core.run_cycle();
        agent.retire();

        let report = rig.core.run_cycle();
        assert_eq!(report.dead, 1);
        assert_eq!(report.ranked, 0);
        rig.core.run_cycle();
        rig.core.run_cycle();

        assert!(!rig.core.is_registered(agent.id()));
        assert_eq!(rig.queue().counts().destroy, 1);
        assert_eq!(rig.core.stats().dead_routed, 1);
        // Dead agents are not despawn requests.
        assert!(rig.mailbox.is_empty());
    }

    #[test]
    fn unregister_posts_despawn_request() {
        let mut rig = Rig::new(small());
        let agent = rig.agent_at(100.0);
        rig.core.run_cycle();
        assert!(rig.link.unregister(agent.clone()));
        rig.core.run_cycle();

        assert!(!rig.core.is_registered(agent.id()));
        assert_eq!(rig.mailbox.drain(), vec![agent.id()]);
        assert_eq!(
            rig.telemetry
                .count(|e| matches!(e, TelemetryEvent::AgentUnregistered(_))),
            1
        );
    }

    #[test]
    fn add_then_remove_in_one_drain_leaves_nothing() {
        let mut rig = Rig::new(small());
        let agent = rig.agent_at(100.0);
        rig.link.unregister(agent.clone());
        let report = rig.core.run_cycle();
        assert_eq!(report.ranked, 0);
        assert_eq!(rig.core.pool_len(), 0);
    }

    #[test]
    fn invalid_agents_are_skipped_and_dropped() {
        let mut rig = Rig::new(small());
        let gone = rig.agent_at(50.0);
        let kept = rig.agent_at(100.0);
        gone.invalidate();
        let report = rig.core.run_cycle();
        assert_eq!(report.invalid, 1);
        assert_eq!(report.ranked, 1);
        // The surviving agent takes rank 0.
        assert_eq!(rig.queue().pending_tier(kept.id()), Some(Tier::Normal));
        assert_eq!(rig.core.pool_len(), 1);
    }

    #[test]
    fn empty_pool_cycles_cleanly() {
        let mut rig = Rig::new(small());
        assert_eq!(rig.core.run_cycle(), CycleReport::default());
        assert_eq!(rig.core.stats().cycles, 1);
    }

    #[test]
    fn thread_starts_and_stops() {
        let rig = Rig::new(small());
        let telemetry = rig.telemetry.clone();
        let mut scheduler = Scheduler::spawn(rig.core).unwrap();
        assert!(scheduler.is_running());

        let deadline = Instant::now() + Duration::from_secs(5);
        while telemetry.count(|e| matches!(e, TelemetryEvent::SchedulerStarted)) == 0 {
            assert!(Instant::now() < deadline, "scheduler never started");
            thread::sleep(Duration::from_millis(1));
        }

        let core = scheduler.stop().unwrap();
        assert!(!scheduler.is_running());
        assert!(core.stats().cycles > 0);
        assert!(matches!(scheduler.stop(), Err(SchedulerError::Unavailable)));
        assert_eq!(
            telemetry.count(|e| matches!(e, TelemetryEvent::SchedulerStopped(_))),
            1
        );
    }

    #[test]
    fn paced_thread_ranks_registered_agents() {
        let mut config = small();
        config.min_cycle_interval_ms = 2;
        let mut rig = Rig::new(config);
        let agent = rig.agent_at(10.0);
        let commands = Arc::clone(rig.link.commands());
        let mut scheduler = Scheduler::spawn(rig.core).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if commands.lock().unwrap().pending_tier(agent.id()).is_some() {
                break;
            }
            assert!(Instant::now() < deadline, "agent never ranked");
            thread::sleep(Duration::from_millis(1));
        }
        scheduler.stop().unwrap();
    }
}
