//! Publishes per-guard state to the decision tree's blackboard.

use hecs::World;

use crate::components::{
    keys, AgentHandle, Blackboard, BlackboardValue, Controller, Perception, Suspicion, TerminalClock,
    Vitals,
};

/// Refresh blackboard values for thinking guards and advance their terminal
/// clocks.
pub fn blackboard_system(world: &mut World, dt: f32) {
    for (_, (agent, controller, vitals, suspicion, clock, perception, board)) in world.query_mut::<(
        &AgentHandle,
        &Controller,
        &Vitals,
        &Suspicion,
        &mut TerminalClock,
        &Perception,
        &mut Blackboard,
    )>() {
        if agent.is_dead() || !agent.is_thinking() {
            continue;
        }

        board.set_float(keys::HEALTH, vitals.health.value);
        board.set_float(keys::FEAR, vitals.fear.value);
        board.set_float(keys::CONFIDENCE, vitals.confidence.value);
        board.set_float(keys::SUSPICION, suspicion.value());

        clock.advance(dt);
        board.set_float(keys::TIME_SINCE_DESTROY, clock.elapsed());

        board.set(keys::CONTROLLER_STATUS, BlackboardValue::Tier(controller.status()));
        match perception.target() {
            Some(target) => board.set(keys::TARGET_HOSTILE, BlackboardValue::Entity(target)),
            None => board.clear(keys::TARGET_HOSTILE),
        }
        if let Some(guess) = perception.guess_location() {
            board.set(keys::GUESS_LOCATION, BlackboardValue::Vector(guess));
        }
    }
}
