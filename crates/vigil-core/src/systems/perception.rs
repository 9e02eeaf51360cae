//! Perception: sensed-set processing and the per-frame suspicion tick.

use hecs::{Entity, World};
use vigil_logic::behavior::SearchMode;
use vigil_logic::config::PerceptionConfig;
use vigil_logic::suspicion::SuspicionConfig;

use crate::collaborators::{DecisionTree, SpatialProbe};
use crate::components::{
    keys, AgentHandle, AgentId, Blackboard, BlackboardValue, Capsule, Controller, Perception, Position,
    SensedKind, Stimuli, Suspicion, Vec3, Velocity,
};
use crate::telemetry::{Telemetry, TelemetryEvent};

/// Borrowed collaborators and tuning for one perception pass.
pub struct PerceptionContext<'a> {
    pub perception: &'a PerceptionConfig,
    pub suspicion: &'a SuspicionConfig,
    pub probe: &'a dyn SpatialProbe,
    pub decision: &'a mut dyn DecisionTree,
    pub telemetry: &'a dyn Telemetry,
}

/// Process pending stimuli for every thinking guard whose sensing cadence
/// fires this frame. Sleeping and dead guards drop their stimuli.
pub fn sensing_system(world: &World, ctx: &mut PerceptionContext<'_>, dt: f32) {
    let mut due: Vec<(Entity, AgentId, Vec<Entity>)> = Vec::new();
    for (entity, (agent, controller, stimuli)) in world
        .query::<(&AgentHandle, &mut Controller, &mut Stimuli)>()
        .iter()
    {
        if agent.is_dead() || !agent.is_thinking() {
            stimuli.clear();
            continue;
        }
        if controller.sensing_due(dt) && !stimuli.is_empty() {
            due.push((entity, agent.id(), stimuli.take()));
        }
    }

    for (entity, id, sensed) in due {
        process_stimuli(world, entity, id, sensed, ctx);
    }
}

fn process_stimuli(world: &World, agent: Entity, id: AgentId, sensed: Vec<Entity>, ctx: &mut PerceptionContext<'_>) {
    let Ok(origin) = world.get::<&Position>(agent).map(|p| p.0) else {
        return;
    };
    for other in sensed {
        if other == agent || !world.contains(other) {
            continue;
        }
        match kind_of(world, other) {
            SensedKind::Hostile => sense_hostile(world, agent, id, origin, other, ctx),
            SensedKind::Peer => {
                if let Ok(mut suspicion) = world.get::<&mut Suspicion>(agent) {
                    suspicion.peer_sighted(ctx.suspicion);
                }
            }
            SensedKind::Other => {}
        }
    }
}

fn sense_hostile(
    world: &World,
    agent: Entity,
    id: AgentId,
    origin: Vec3,
    hostile: Entity,
    ctx: &mut PerceptionContext<'_>,
) {
    let Ok(location) = world.get::<&Position>(hostile).map(|p| p.0) else {
        return;
    };
    let Ok(mut perception) = world.get::<&mut Perception>(agent) else {
        return;
    };

    if perception.is_known(hostile) {
        let guess = predict_destination(world, hostile, location, ctx);
        perception.lose(hostile, guess);
        ctx.telemetry.record(TelemetryEvent::HostileLost {
            agent: id,
            hostile,
            guess,
        });
    } else {
        let distance = origin.distance_2d(&location);
        if distance > ctx.perception.real_sight_radius {
            ctx.telemetry.record(TelemetryEvent::HostileIgnored {
                agent: id,
                hostile,
                distance,
            });
            return;
        }
        perception.sight(hostile, location);
        ctx.decision.target_changed(id, Some(hostile));
        ctx.telemetry.record(TelemetryEvent::HostileSighted {
            agent: id,
            hostile,
            distance,
        });
    }

    if !ctx.decision.mode(id).is_terminal() {
        perception.note_suspicious(hostile);
    }
}

/// Where a hostile that just slipped out of view is probably heading: the
/// first obstruction along its next second of travel, else where it was.
fn predict_destination(world: &World, hostile: Entity, location: Vec3, ctx: &PerceptionContext<'_>) -> Vec3 {
    let velocity = world.get::<&Velocity>(hostile).map(|v| v.0).unwrap_or(Vec3::ZERO);
    let capsule = world.get::<&Capsule>(hostile).map(|c| *c).unwrap_or_default();
    let probe = capsule.inset(
        ctx.perception.probe_radius_inset,
        ctx.perception.probe_half_height_inset,
    );
    let to = location + velocity * ctx.perception.probe_seconds;
    ctx.probe
        .sweep_capsule(location, to, probe, hostile)
        .unwrap_or(location)
}

fn kind_of(world: &World, entity: Entity) -> SensedKind {
    world
        .get::<&SensedKind>(entity)
        .map(|k| *k)
        .unwrap_or(SensedKind::Other)
}

/// Per-frame suspicion tick for thinking guards.
///
/// Visible hostiles raise suspicion by distance band and refresh the guess
/// location; an empty known set lets suspicion decay.
pub fn awareness_system(world: &World, ctx: &mut PerceptionContext<'_>, dt: f32) {
    for (_, (agent, position, perception, suspicion, board)) in world
        .query::<(
            &AgentHandle,
            &Position,
            &mut Perception,
            &mut Suspicion,
            Option<&mut Blackboard>,
        )>()
        .iter()
    {
        if agent.is_dead() || !agent.is_thinking() {
            continue;
        }

        let gone: Vec<Entity> = perception
            .known_hostiles()
            .iter()
            .chain(perception.out_of_sight())
            .copied()
            .filter(|e| !world.contains(*e))
            .collect();
        for entity in gone {
            perception.forget(entity);
        }

        if !perception.has_visible_hostile() {
            suspicion.decay(dt, ctx.suspicion);
            continue;
        }

        let visible = perception.known_hostiles().to_vec();
        for hostile in visible {
            match kind_of(world, hostile) {
                SensedKind::Peer => suspicion.observe_peer(dt, ctx.suspicion),
                _ => {
                    let Ok(location) = world.get::<&Position>(hostile).map(|p| p.0) else {
                        continue;
                    };
                    suspicion.observe_hostile(position.0.distance(&location), dt, ctx.suspicion);
                    perception.track(location);
                }
            }
        }
        ctx.decision.set_search_mode(agent.id(), SearchMode::Tracking);
        if let Some(board) = board {
            board.set(keys::SEARCH_MODE, BlackboardValue::Name(SearchMode::Tracking.name()));
        }
    }
}
