//! Tier-throttled movement and location mirroring.

use hecs::World;

use crate::components::{AgentHandle, Controller, Position, Velocity};

/// Integrate velocity for thinking guards on their tier's movement cadence.
/// Sleeping and dead guards hold still.
pub fn locomotion_system(world: &mut World, dt: f32) {
    for (_, (agent, controller, position, velocity)) in
        world.query_mut::<(&AgentHandle, &mut Controller, &mut Position, &Velocity)>()
    {
        if agent.is_dead() {
            continue;
        }
        if let Some(elapsed) = controller.movement_due(dt) {
            position.0 = position.0 + velocity.0 * elapsed;
        }
    }
}

/// Publish each guard's position to its shared handle for the scheduler.
pub fn sync_locations(world: &mut World) {
    for (_, (agent, position)) in world.query_mut::<(&AgentHandle, &Position)>() {
        agent.store_location(position.0);
    }
}
