//! Observable scheduler and perception events.
//!
//! The core never writes to a console itself. Everything worth watching goes
//! through a [`Telemetry`] sink; [`LogTelemetry`] forwards to the `log`
//! facade and [`RecordingTelemetry`] keeps events in memory for assertions.

use std::sync::{Mutex, PoisonError};

use hecs::Entity;
use vigil_logic::behavior::SearchMode;
use vigil_logic::lod::Tier;

use crate::components::{AgentId, Vec3};
use crate::scheduler::SchedulerStats;

#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    SchedulerStarted,
    SchedulerStopped(SchedulerStats),
    /// The scheduler thread could not start; LOD scheduling is off.
    SchedulerUnavailable { reason: String },
    AgentRegistered(AgentId),
    AgentUnregistered(AgentId),
    /// Registration could not reach the scheduler; the guard will never wake.
    RegisterDropped(AgentId),
    /// Unregistration could not reach the scheduler.
    UnregisterDropped(AgentId),
    TierChanged { agent: AgentId, tier: Tier },
    RenderingChanged { agent: AgentId, rendering: bool },
    AgentDied(AgentId),
    RagdollSettled(AgentId),
    DestroyScheduled { agent: AgentId, delay: f32 },
    Despawned(AgentId),
    HostileSighted { agent: AgentId, hostile: Entity, distance: f32 },
    HostileIgnored { agent: AgentId, hostile: Entity, distance: f32 },
    HostileLost { agent: AgentId, hostile: Entity, guess: Vec3 },
    SearchModeRequested { agent: AgentId, mode: SearchMode },
    Responding { agent: AgentId, location: Vec3 },
    PeersAlerted { agent: AgentId, count: usize },
}

/// Sink for [`TelemetryEvent`]s. Called from both the frame loop and the
/// scheduler thread.
pub trait Telemetry: Send + Sync {
    fn record(&self, event: TelemetryEvent);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn record(&self, event: TelemetryEvent) {
        use TelemetryEvent::*;
        match event {
            SchedulerStarted => log::info!("LOD scheduler started"),
            SchedulerStopped(stats) => log::info!(
                "LOD scheduler stopped after {} cycles ({} published, {} deferred)",
                stats.cycles,
                stats.published,
                stats.deferred
            ),
            SchedulerUnavailable { reason } => {
                log::error!("LOD scheduler unavailable, guards keep their current tiers: {reason}")
            }
            AgentRegistered(agent) => log::debug!("{agent} registered"),
            AgentUnregistered(agent) => log::debug!("{agent} unregistered"),
            RegisterDropped(agent) => {
                log::warn!("{agent} spawned while the scheduler is gone; it will never wake")
            }
            UnregisterDropped(agent) => log::warn!("{agent} unregistered while the scheduler is gone"),
            TierChanged { agent, tier } => log::debug!("{agent} -> {}", tier.name()),
            RenderingChanged { agent, rendering } => {
                log::trace!("{agent} rendering {}", if rendering { "on" } else { "off" })
            }
            AgentDied(agent) => log::info!("{agent} died"),
            RagdollSettled(agent) => log::debug!("{agent} ragdoll settled"),
            DestroyScheduled { agent, delay } => {
                log::debug!("{agent} will be destroyed in {delay:.1}s")
            }
            Despawned(agent) => log::info!("{agent} despawned"),
            HostileSighted { agent, hostile, distance } => {
                log::debug!("{agent} sighted {hostile:?} at {distance:.0}")
            }
            HostileIgnored { agent, hostile, distance } => {
                log::trace!("{agent} ignored {hostile:?} beyond sight radius ({distance:.0})")
            }
            HostileLost { agent, hostile, guess } => log::debug!(
                "{agent} lost {hostile:?}, guessing ({:.0}, {:.0}, {:.0})",
                guess.x,
                guess.y,
                guess.z
            ),
            SearchModeRequested { agent, mode } => {
                log::trace!("{agent} search mode {}", mode.name())
            }
            Responding { agent, location } => log::debug!(
                "{agent} responding to ({:.0}, {:.0}, {:.0})",
                location.x,
                location.y,
                location.z
            ),
            PeersAlerted { agent, count } => log::debug!("{agent} alerted {count} peers"),
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetry;

impl Telemetry for NullTelemetry {
    fn record(&self, _event: TelemetryEvent) {}
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self, pred: impl Fn(&TelemetryEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| pred(e))
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Telemetry for RecordingTelemetry {
    fn record(&self, event: TelemetryEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_counts_matching_events() {
        let telemetry = RecordingTelemetry::new();
        telemetry.record(TelemetryEvent::AgentRegistered(AgentId(1)));
        telemetry.record(TelemetryEvent::AgentRegistered(AgentId(2)));
        telemetry.record(TelemetryEvent::Despawned(AgentId(1)));

        assert_eq!(
            telemetry.count(|e| matches!(e, TelemetryEvent::AgentRegistered(_))),
            2
        );
        telemetry.clear();
        assert!(telemetry.events().is_empty());
    }

    #[test]
    fn log_sink_accepts_every_event() {
        let sink = LogTelemetry;
        sink.record(TelemetryEvent::SchedulerStarted);
        sink.record(TelemetryEvent::SchedulerStopped(SchedulerStats::default()));
        sink.record(TelemetryEvent::SchedulerUnavailable {
            reason: "no threads".into(),
        });
        sink.record(TelemetryEvent::RegisterDropped(AgentId(4)));
        sink.record(TelemetryEvent::UnregisterDropped(AgentId(4)));
    }
}
