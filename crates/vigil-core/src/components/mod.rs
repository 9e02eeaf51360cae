//! Component definitions for the ECS world.
//!
//! Components are pure data structs attached to entities.
//! They have no behavior - that lives in systems.

mod agent;
mod blackboard;
mod common;
mod perception;

pub use agent::*;
pub use blackboard::*;
pub use common::*;
pub use perception::*;

pub use vigil_logic::suspicion::Suspicion;
pub use vigil_logic::vitals::{TerminalClock, Vitals};
